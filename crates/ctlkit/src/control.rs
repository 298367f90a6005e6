use std::any::Any;
use std::io::{self, BufRead, IsTerminal, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::cli::ControlArgs;
use crate::endpoint::{Endpoints, Outcome, DEFAULT_TIMEOUT};
use crate::error::{CommandError, Error};
use crate::registry::{Handler, Registry};
use crate::response::Response;
use crate::split::split;
use crate::transport::Reply;

pub const PROMPT: &str = "ctl > ";

/// Control client: runs local commands itself and forwards everything else to
/// its endpoint(s).
pub struct Control {
	description: String,
	address: Option<String>,
	registry: Registry<Control>,
	endpoints: Option<Endpoints>,
	color: bool,
}

impl Control {
	pub fn new(description: impl Into<String>, address: Option<&str>) -> Self {
		let mut control = Self {
			description: description.into(),
			address: address.map(str::to_string),
			registry: Registry::new(),
			endpoints: address.map(|a| Endpoints::new(a, DEFAULT_TIMEOUT)),
			color: io::stdout().is_terminal(),
		};
		control.add_command("quit", |_, _| std::process::exit(0), Some("quit ctl"));
		control
	}

	/// Receive timeout for every endpoint.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		if let Some(endpoints) = &mut self.endpoints {
			endpoints.close();
		}
		self.endpoints = self
			.address
			.as_deref()
			.map(|a| Endpoints::new(a, timeout));
		self
	}

	pub fn with_color(mut self, color: bool) -> Self {
		self.color = color;
		self
	}

	pub fn description(&self) -> &str {
		&self.description
	}

	pub fn endpoints(&self) -> Option<&Endpoints> {
		self.endpoints.as_ref()
	}

	pub fn commands(&self) -> &Registry<Control> {
		&self.registry
	}

	pub fn add_command<F>(&mut self, name: &str, handler: F, description: Option<&str>) -> &mut Self
	where
		F: Fn(&Control, &[String]) -> Result<Value, CommandError> + Send + Sync + 'static,
	{
		self.add_handler(name, Arc::new(handler), description)
	}

	pub fn add_handler(
		&mut self,
		name: &str,
		handler: Arc<dyn Handler<Control>>,
		description: Option<&str>,
	) -> &mut Self {
		self.registry
			.add(name, handler, description.map(str::to_string));
		self
	}

	/// Run `command` locally if registered, otherwise remotely.
	///
	/// Returns `None` for an empty command.
	pub fn call(&mut self, command: &str, args: &[String]) -> Option<Response> {
		if command.is_empty() {
			return None;
		}

		if let Some(handler) = self.registry.lookup(command) {
			tracing::debug!("local {} {:?}", command, args);
			let this: &Control = self;
			let reply = match panic::catch_unwind(AssertUnwindSafe(|| handler.call(this, args))) {
				Ok(Ok(value)) => Reply::ok(value),
				Ok(Err(e)) => Reply::err(e.to_string()),
				Err(payload) => Reply::err(panic_message(payload.as_ref())),
			};
			return Some(Response::local(reply));
		}

		tracing::debug!("remote {} {:?}", command, args);
		let outcome = match &mut self.endpoints {
			Some(endpoints) => endpoints.call(command, args),
			None => Outcome::Single(Reply::err("no remote endpoint configured")),
		};
		Some(Response::remote(outcome))
	}

	/// Tokenize `text`, lower-case the command and dispatch it.
	pub fn execute(&mut self, text: &str) -> Option<Response> {
		let (command, args) = parse_input(text)?;
		self.call(&command, &args)
	}

	/// One-shot mode when `args` carries a command, otherwise the interactive
	/// loop on stdin/stdout if `interactive` is set.
	pub fn run(&mut self, args: &ControlArgs, interactive: bool) -> Result<(), Error> {
		let tokens = match args.command.as_slice() {
			[single] => split(single),
			many => many.to_vec(),
		};

		if let Some((command, rest)) = tokens.split_first() {
			if let Some(response) = self.call(&command.to_lowercase(), rest) {
				response.show(self.color);
			}
			self.close();
			return Ok(());
		}

		if interactive {
			let stdin = io::stdin();
			self.interact(stdin.lock(), io::stdout())?;
			self.close();
		}
		Ok(())
	}

	/// Prompt, read a line, dispatch, print; until end of input or `quit`.
	pub fn interact<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> io::Result<()> {
		let mut line = String::new();
		loop {
			write!(output, "{}", PROMPT)?;
			output.flush()?;

			line.clear();
			if input.read_line(&mut line)? == 0 {
				writeln!(output)?;
				return Ok(());
			}

			if let Some(response) = self.execute(&line) {
				response.write_to(&mut output, self.color)?;
			}
		}
	}

	pub fn close(&mut self) {
		if let Some(endpoints) = &mut self.endpoints {
			endpoints.close();
		}
	}
}

/// Split a line of user input into a lower-cased command and its arguments.
pub fn parse_input(text: &str) -> Option<(String, Vec<String>)> {
	let mut tokens = split(text).into_iter();
	let command = tokens.next()?.to_lowercase();
	Some((command, tokens.collect()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	let msg = payload
		.downcast_ref::<&str>()
		.map(|s| s.to_string())
		.or_else(|| payload.downcast_ref::<String>().cloned())
		.unwrap_or_else(|| "unknown panic".to_string());
	format!("command panicked: {}", msg)
}

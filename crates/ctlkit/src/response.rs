use std::fmt;
use std::io::{self, Write};

use owo_colors::OwoColorize;
use serde_json::Value;

use crate::endpoint::Outcome;
use crate::transport::Reply;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
	Local,
	Remote,
}

impl fmt::Display for Origin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Origin::Local => write!(f, "local"),
			Origin::Remote => write!(f, "remote"),
		}
	}
}

/// The answer to one control command, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
	origin: Origin,
	outcome: Outcome,
}

impl Response {
	pub fn local(reply: Reply) -> Self {
		Self {
			origin: Origin::Local,
			outcome: Outcome::Single(reply),
		}
	}

	pub fn remote(outcome: Outcome) -> Self {
		Self {
			origin: Origin::Remote,
			outcome,
		}
	}

	pub fn origin(&self) -> Origin {
		self.origin
	}

	pub fn outcome(&self) -> &Outcome {
		&self.outcome
	}

	pub fn is_aggregate(&self) -> bool {
		matches!(self.outcome, Outcome::Multiple { .. })
	}

	/// Result of a single-endpoint response.
	pub fn result(&self) -> Option<&Value> {
		match &self.outcome {
			Outcome::Single(reply) => reply.result.as_ref(),
			Outcome::Multiple { .. } => None,
		}
	}

	/// Error of a single-endpoint response.
	pub fn error(&self) -> Option<&str> {
		match &self.outcome {
			Outcome::Single(reply) => reply.error.as_deref(),
			Outcome::Multiple { .. } => None,
		}
	}

	/// Whether any endpoint reported an error.
	pub fn is_error(&self) -> bool {
		match &self.outcome {
			Outcome::Single(reply) => reply.error.is_some(),
			Outcome::Multiple { errors, .. } => errors.values().any(Option::is_some),
		}
	}

	/// Display lines, optionally colored.
	pub fn lines(&self, color: bool) -> Vec<String> {
		match (&self.outcome, self.origin) {
			(Outcome::Single(reply), Origin::Local) => local_line(reply).into_iter().collect(),
			(Outcome::Single(reply), Origin::Remote) => {
				remote_line(reply.result.as_ref(), reply.error.as_deref(), color)
					.into_iter()
					.collect()
			}
			(Outcome::Multiple { results, errors }, _) => results
				.iter()
				.filter_map(|(address, result)| {
					let error = errors.get(address).and_then(|e| e.as_deref());
					remote_line(result.as_ref(), error, color)
						.map(|line| format!("{}: {}", address, line))
				})
				.collect(),
		}
	}

	pub fn write_to<W: Write>(&self, out: &mut W, color: bool) -> io::Result<()> {
		for line in self.lines(color) {
			writeln!(out, "{}", line)?;
		}
		Ok(())
	}

	/// Print to stdout.
	pub fn show(&self, color: bool) {
		for line in self.lines(color) {
			println!("{}", line);
		}
	}
}

fn local_line(reply: &Reply) -> Option<String> {
	if reply.has_result() {
		reply.result.as_ref().map(format_value)
	} else {
		reply
			.error
			.as_ref()
			.map(|e| format!("{} err: {}", Origin::Local, e))
	}
}

fn remote_line(result: Option<&Value>, error: Option<&str>, color: bool) -> Option<String> {
	if let Some(e) = error {
		let line = format!("{} err: {}", Origin::Remote, e);
		return Some(if color { line.red().to_string() } else { line });
	}
	match result {
		Some(v) if !v.is_null() => {
			let line = format_value(v);
			Some(if color { line.green().to_string() } else { line })
		}
		_ => None,
	}
}

/// Strings print bare, everything else as compact JSON.
pub fn format_value(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

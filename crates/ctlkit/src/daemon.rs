use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::cli::DaemonArgs;
use crate::config::Config;
use crate::error::{CommandError, Error};
use crate::registry::{Handler, Registry};
use crate::server;
use crate::state::State;
use crate::transport::Address;
use crate::worker::Worker;

/// What a daemon handler or worker gets to work with.
#[derive(Clone)]
pub struct Context {
	state: Arc<State>,
	config: Arc<Config>,
	commands: Arc<Registry<Context>>,
}

impl Context {
	pub fn new(state: Arc<State>, config: Config, commands: Registry<Context>) -> Self {
		Self {
			state,
			config: Arc::new(config),
			commands: Arc::new(commands),
		}
	}

	pub fn state(&self) -> &State {
		&self.state
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn commands(&self) -> &Registry<Context> {
		&self.commands
	}
}

/// Long running program exposing its commands over a socket.
pub struct Daemon {
	description: String,
	address: Option<String>,
	registry: Registry<Context>,
	state: Arc<State>,
	workers: Vec<Box<dyn Worker>>,
}

impl Daemon {
	/// Without an address the daemon serves nothing and only runs the workers
	/// attached to it.
	pub fn new(description: impl Into<String>, address: Option<&str>) -> Self {
		let mut daemon = Self {
			description: description.into(),
			address: address.map(str::to_string),
			registry: Registry::new(),
			state: Arc::new(State::new()),
			workers: Vec::new(),
		};

		if daemon.address.is_some() {
			daemon.add_command("ping", |_, _| Ok(json!("pong")), Some("check the daemon is alive"));
			daemon.add_command("help", help, Some("list commands, or describe one"));
		}

		daemon
	}

	pub fn description(&self) -> &str {
		&self.description
	}

	pub fn address(&self) -> Option<&str> {
		self.address.as_deref()
	}

	pub fn state(&self) -> Arc<State> {
		Arc::clone(&self.state)
	}

	pub fn commands(&self) -> &Registry<Context> {
		&self.registry
	}

	pub fn add_command<F>(&mut self, name: &str, handler: F, description: Option<&str>) -> &mut Self
	where
		F: Fn(&Context, &[String]) -> Result<Value, CommandError> + Send + Sync + 'static,
	{
		self.add_handler(name, Arc::new(handler), description)
	}

	pub fn add_handler(
		&mut self,
		name: &str,
		handler: Arc<dyn Handler<Context>>,
		description: Option<&str>,
	) -> &mut Self {
		self.registry
			.add(name, handler, description.map(str::to_string));
		self
	}

	pub fn add_worker<W: Worker>(&mut self, worker: W) -> &mut Self {
		self.workers.push(Box::new(worker));
		self
	}

	/// Load the config named in `args`, then [`serve`](Self::serve).
	pub async fn run(self, args: &DaemonArgs) -> Result<(), Error> {
		let config = match &args.config {
			Some(path) => Config::load(path)?,
			None => Config::default(),
		};
		self.serve(config).await
	}

	/// Start the service worker (when bound to an address) and every attached
	/// worker, then wait for all of them, Ctrl-C, or SIGTERM.
	pub async fn serve(self, config: Config) -> Result<(), Error> {
		let Daemon {
			description,
			address,
			registry,
			state,
			workers,
		} = self;
		let ctx = Context::new(state, config, registry);

		let mut service = None;
		let mut cleanup = Cleanup::default();
		if let Some(address) = address {
			let address: Address = address.parse()?;
			let listener = server::bind(&address).await?;
			cleanup.socket = listener.socket_path();
			let handle = tokio::spawn(listener.serve(ctx.clone()));
			cleanup.service = Some(handle.abort_handle());
			service = Some(handle);
		}

		let mut running = Vec::new();
		for worker in workers {
			let name = worker.name().to_string();
			let ctx = ctx.clone();
			let (done, finished) = oneshot::channel::<()>();
			tracing::debug!("starting worker {}", name);
			std::thread::Builder::new().name(name.clone()).spawn(move || {
				worker.run(ctx);
				let _ = done.send(());
			})?;
			running.push((name, finished));
		}

		tracing::info!("{} started (pid {})", description, std::process::id());

		let wait = async {
			let mut failed = None;
			if let Some(service) = service {
				if let Err(e) = service.await {
					tracing::error!("service worker stopped: {}", e);
					failed.get_or_insert_with(|| "service".to_string());
				}
			}
			for (name, finished) in running {
				if finished.await.is_err() {
					tracing::error!("worker {} exited abnormally", name);
					failed.get_or_insert(name);
				}
			}
			match failed {
				Some(name) => Err(Error::WorkerPanicked { name }),
				None => Ok(()),
			}
		};

		tokio::select! {
			result = wait => result,
			_ = shutdown_signal() => {
				tracing::info!("shutting down");
				Ok(())
			}
		}
	}
}

/// Stops the service task and removes its socket file when `serve` returns,
/// however it returns.
#[derive(Default)]
struct Cleanup {
	socket: Option<PathBuf>,
	service: Option<AbortHandle>,
}

impl Drop for Cleanup {
	fn drop(&mut self) {
		if let Some(service) = self.service.take() {
			service.abort();
		}
		if let Some(path) = self.socket.take() {
			let _ = std::fs::remove_file(path);
		}
	}
}

fn help(ctx: &Context, args: &[String]) -> Result<Value, CommandError> {
	let commands = ctx.commands();
	match args.first() {
		Some(name) if commands.contains(name) => Ok(json!(commands.describe(name))),
		Some(name) => Err(CommandError::UnknownCommand(name.clone())),
		None => Ok(json!(commands.list().join(", "))),
	}
}

async fn shutdown_signal() {
	use tokio::signal::unix::{signal, SignalKind};

	match signal(SignalKind::terminate()) {
		Ok(mut term) => {
			tokio::select! {
				_ = ctrl_c() => {},
				_ = term.recv() => {},
			}
		}
		Err(e) => {
			tracing::warn!("cannot listen for SIGTERM: {}", e);
			ctrl_c().await;
		}
	}
}

async fn ctrl_c() {
	if tokio::signal::ctrl_c().await.is_err() {
		std::future::pending::<()>().await;
	}
}

use std::io;
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UnixListener};

use crate::daemon::Context;
use crate::error::CommandError;
use crate::transport::{Address, Reply, Request};

/// A bound server socket, ready to serve.
pub enum Listener {
	Unix { listener: UnixListener, path: PathBuf },
	Tcp(TcpListener),
}

/// Bind `address`.
///
/// For `ipc://` addresses the parent directory is created and a stale socket
/// file is replaced, unless another daemon still answers on it.
pub async fn bind(address: &Address) -> io::Result<Listener> {
	match address {
		Address::Ipc(path) => {
			if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
				std::fs::create_dir_all(parent)?;
			}
			if path.exists() {
				if std::os::unix::net::UnixStream::connect(path).is_ok() {
					return Err(io::Error::new(
						io::ErrorKind::AddrInUse,
						format!("daemon already running at {}", address),
					));
				}
				let _ = std::fs::remove_file(path);
			}
			let listener = UnixListener::bind(path)?;
			Ok(Listener::Unix {
				listener,
				path: path.clone(),
			})
		}
		Address::Tcp(hostport) => Ok(Listener::Tcp(TcpListener::bind(hostport.as_str()).await?)),
	}
}

impl Listener {
	/// The address clients should connect to (resolves `tcp://host:0`).
	pub fn address(&self) -> io::Result<Address> {
		match self {
			Listener::Unix { path, .. } => Ok(Address::Ipc(path.clone())),
			Listener::Tcp(listener) => Ok(Address::Tcp(listener.local_addr()?.to_string())),
		}
	}

	pub fn socket_path(&self) -> Option<PathBuf> {
		match self {
			Listener::Unix { path, .. } => Some(path.clone()),
			Listener::Tcp(_) => None,
		}
	}

	/// Accept connections forever, one task per connection.
	pub async fn serve(self, ctx: Context) {
		match self {
			Listener::Unix { listener, path } => {
				tracing::info!("listening on {}", path.display());
				loop {
					match listener.accept().await {
						Ok((stream, _)) => {
							tokio::spawn(handle_connection(stream, ctx.clone()));
						}
						Err(e) => tracing::error!("accept error: {}", e),
					}
				}
			}
			Listener::Tcp(listener) => {
				if let Ok(addr) = listener.local_addr() {
					tracing::info!("listening on tcp://{}", addr);
				}
				loop {
					match listener.accept().await {
						Ok((stream, peer)) => {
							tracing::debug!("connection from {}", peer);
							tokio::spawn(handle_connection(stream, ctx.clone()));
						}
						Err(e) => tracing::error!("accept error: {}", e),
					}
				}
			}
		}
	}
}

async fn handle_connection<S>(stream: S, ctx: Context)
where
	S: AsyncRead + AsyncWrite + Send + 'static,
{
	let (reader, mut writer) = tokio::io::split(stream);
	let mut lines = BufReader::new(reader).lines();

	while let Ok(Some(line)) = lines.next_line().await {
		let reply = match serde_json::from_str::<Request>(&line) {
			Ok(request) => dispatch(&ctx, request).await,
			Err(e) => {
				tracing::warn!("invalid request: {}", e);
				Reply::err(format!("invalid request: {}", e))
			}
		};

		let mut data = match serde_json::to_vec(&reply) {
			Ok(d) => d,
			Err(e) => {
				tracing::error!("failed to serialize reply: {}", e);
				continue;
			}
		};
		data.push(b'\n');

		if writer.write_all(&data).await.is_err() {
			break;
		}
	}
}

/// Run `request` against the daemon's registry.
///
/// Handlers are synchronous, so they run on the blocking pool; a panicking
/// handler becomes an error reply.
pub async fn dispatch(ctx: &Context, request: Request) -> Reply {
	let Request { command, args } = request;
	let Some(handler) = ctx.commands().lookup(&command) else {
		tracing::debug!("unknown command {:?}", command);
		return Reply::err(CommandError::UnknownCommand(command).to_string());
	};

	tracing::debug!("dispatching {} {:?}", command, args);
	let handler_ctx = ctx.clone();
	match tokio::task::spawn_blocking(move || handler.call(&handler_ctx, &args)).await {
		Ok(Ok(value)) => Reply::ok(value),
		Ok(Err(e)) => Reply::err(e.to_string()),
		Err(e) => {
			tracing::error!("command {} failed: {}", command, e);
			Reply::err(format!("command {} failed: {}", command, e))
		}
	}
}

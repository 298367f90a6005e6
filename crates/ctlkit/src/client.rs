use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use thiserror::Error;

use crate::transport::{Address, AddressError, Reply, Request};

/// Errors from daemon client operations.
#[derive(Debug, Error)]
pub enum ClientError {
	/// Nothing is listening at the address.
	#[error("daemon not running at {0}")]
	NotRunning(String),
	#[error("io error: {0}")]
	Io(#[from] io::Error),
	#[error("timed out after {0}ms")]
	Timeout(u128),
	#[error("connection closed by daemon")]
	Closed,
	#[error("serialize error: {0}")]
	Serialize(String),
	#[error("deserialize error: {0}")]
	Deserialize(String),
	#[error(transparent)]
	Address(#[from] AddressError),
}

enum Connection {
	Unix(UnixStream),
	Tcp(TcpStream),
}

impl Connection {
	fn open(address: &Address, timeout: Duration) -> Result<Self, ClientError> {
		let conn = match address {
			Address::Ipc(path) => UnixStream::connect(path)
				.map(Connection::Unix)
				.map_err(|e| connect_error(e, address))?,
			Address::Tcp(hostport) => {
				let mut last = None;
				let mut stream = None;
				for addr in hostport.to_socket_addrs()? {
					let attempt = if timeout.is_zero() {
						TcpStream::connect(addr)
					} else {
						TcpStream::connect_timeout(&addr, timeout)
					};
					match attempt {
						Ok(s) => {
							stream = Some(s);
							break;
						}
						Err(e) => last = Some(e),
					}
				}
				match (stream, last) {
					(Some(s), _) => Connection::Tcp(s),
					(None, Some(e)) => return Err(connect_error(e, address)),
					(None, None) => return Err(ClientError::NotRunning(address.to_string())),
				}
			}
		};
		conn.set_timeout(timeout)?;
		Ok(conn)
	}

	fn set_timeout(&self, timeout: Duration) -> io::Result<()> {
		let timeout = (!timeout.is_zero()).then_some(timeout);
		match self {
			Connection::Unix(s) => {
				s.set_read_timeout(timeout)?;
				s.set_write_timeout(timeout)
			}
			Connection::Tcp(s) => {
				s.set_read_timeout(timeout)?;
				s.set_write_timeout(timeout)
			}
		}
	}

	fn shutdown(&self) {
		let _ = match self {
			Connection::Unix(s) => s.shutdown(Shutdown::Both),
			Connection::Tcp(s) => s.shutdown(Shutdown::Both),
		};
	}
}

impl Read for Connection {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		match self {
			Connection::Unix(s) => s.read(buf),
			Connection::Tcp(s) => s.read(buf),
		}
	}
}

impl Write for Connection {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self {
			Connection::Unix(s) => s.write(buf),
			Connection::Tcp(s) => s.write(buf),
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match self {
			Connection::Unix(s) => s.flush(),
			Connection::Tcp(s) => s.flush(),
		}
	}
}

fn connect_error(e: io::Error, address: &Address) -> ClientError {
	match e.kind() {
		io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => {
			ClientError::NotRunning(address.to_string())
		}
		_ => ClientError::Io(e),
	}
}

fn io_error(e: io::Error, timeout: Duration) -> ClientError {
	match e.kind() {
		io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
			ClientError::Timeout(timeout.as_millis())
		}
		io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe => ClientError::Closed,
		_ => ClientError::Io(e),
	}
}

/// Synchronous client for one daemon endpoint.
///
/// Connects on first use. Any failure drops the connection so that a late
/// reply can never be mistaken for the answer to the next request.
pub struct Client {
	address: String,
	timeout: Duration,
	conn: Option<Connection>,
}

impl Client {
	pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
		Self {
			address: address.into(),
			timeout,
			conn: None,
		}
	}

	pub fn address(&self) -> &str {
		&self.address
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	pub fn set_timeout(&mut self, timeout: Duration) {
		self.timeout = timeout;
		let failed = self
			.conn
			.as_ref()
			.is_some_and(|conn| conn.set_timeout(timeout).is_err());
		if failed {
			self.close();
		}
	}

	/// Send one command and wait for its reply.
	pub fn call(&mut self, command: &str, args: &[String]) -> Result<Reply, ClientError> {
		let result = self.roundtrip(command, args);
		if result.is_err() {
			self.close();
		}
		result
	}

	fn roundtrip(&mut self, command: &str, args: &[String]) -> Result<Reply, ClientError> {
		let request = Request {
			command: command.to_string(),
			args: args.to_vec(),
		};
		let mut data =
			serde_json::to_vec(&request).map_err(|e| ClientError::Serialize(e.to_string()))?;
		data.push(b'\n');

		let timeout = self.timeout;
		let conn = self.connection()?;
		conn.write_all(&data).map_err(|e| io_error(e, timeout))?;

		let mut line = String::new();
		let n = BufReader::new(conn)
			.read_line(&mut line)
			.map_err(|e| io_error(e, timeout))?;
		if n == 0 {
			return Err(ClientError::Closed);
		}

		serde_json::from_str(&line).map_err(|e| ClientError::Deserialize(e.to_string()))
	}

	fn connection(&mut self) -> Result<&mut Connection, ClientError> {
		let conn = match self.conn.take() {
			Some(conn) => conn,
			None => {
				let address: Address = self.address.parse()?;
				tracing::debug!("connecting to {}", address);
				Connection::open(&address, self.timeout)?
			}
		};
		Ok(self.conn.insert(conn))
	}

	pub fn is_connected(&self) -> bool {
		self.conn.is_some()
	}

	pub fn close(&mut self) {
		if let Some(conn) = self.conn.take() {
			conn.shutdown();
		}
	}
}

/// Check if a daemon is accepting connections at `address`.
pub fn is_running(address: &str) -> bool {
	match address.parse::<Address>() {
		Ok(address) => Connection::open(&address, Duration::from_millis(500)).is_ok(),
		Err(_) => false,
	}
}

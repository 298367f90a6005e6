//! Addressing and wire format shared by the socket server and client.
//!
//! Every message is one JSON object followed by `\n`. A client sends a
//! [`Request`] and the server answers each one with exactly one [`Reply`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Separator between endpoints in a multi-endpoint address list.
pub const ADDRESS_SEPARATOR: char = ',';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
	#[error("empty address")]
	Empty,
	#[error("unsupported address scheme in {0:?} (expected ipc:// or tcp://)")]
	UnsupportedScheme(String),
	#[error("tcp address {0:?} is missing a port")]
	MissingPort(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
	/// Unix domain socket.
	Ipc(PathBuf),
	/// `host:port`.
	Tcp(String),
}

impl FromStr for Address {
	type Err = AddressError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(AddressError::Empty);
		}
		if let Some(path) = s.strip_prefix("ipc://") {
			if path.is_empty() {
				return Err(AddressError::Empty);
			}
			return Ok(Address::Ipc(PathBuf::from(path)));
		}
		if let Some(hostport) = s.strip_prefix("tcp://") {
			return match hostport.rsplit_once(':') {
				Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
					Ok(Address::Tcp(hostport.to_string()))
				}
				_ => Err(AddressError::MissingPort(s.to_string())),
			};
		}
		if s.starts_with('/') {
			return Ok(Address::Ipc(PathBuf::from(s)));
		}
		Err(AddressError::UnsupportedScheme(s.to_string()))
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Address::Ipc(path) => write!(f, "ipc://{}", path.display()),
			Address::Tcp(hostport) => write!(f, "tcp://{}", hostport),
		}
	}
}

impl Address {
	/// Per-user socket for `app`: `$XDG_RUNTIME_DIR/<app>.sock`, or the temp
	/// directory when no runtime directory is set.
	pub fn local(app: &str) -> Self {
		let dir = std::env::var_os("XDG_RUNTIME_DIR")
			.filter(|d| !d.is_empty())
			.map(PathBuf::from)
			.unwrap_or_else(std::env::temp_dir);
		Self::local_in(dir, app)
	}

	fn local_in(dir: PathBuf, app: &str) -> Self {
		Address::Ipc(dir.join(format!("{}.sock", app)))
	}
}

/// Split a (possibly comma separated) address list into trimmed, non-empty
/// addresses, preserving order and dropping duplicates.
pub fn split_addresses(spec: &str) -> Vec<String> {
	let mut out: Vec<String> = Vec::new();
	for part in spec.split(ADDRESS_SEPARATOR) {
		let part = part.trim();
		if !part.is_empty() && !out.iter().any(|a| a == part) {
			out.push(part.to_string());
		}
	}
	out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	pub command: String,
	#[serde(default)]
	pub args: Vec<String>,
}

/// Outcome of one command: a result, an error, or neither.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reply {
	#[serde(default)]
	pub result: Option<Value>,
	#[serde(default)]
	pub error: Option<String>,
}

impl Reply {
	pub fn ok(result: Value) -> Self {
		Self {
			result: Some(result),
			error: None,
		}
	}

	pub fn err(error: impl Into<String>) -> Self {
		Self {
			result: None,
			error: Some(error.into()),
		}
	}

	/// Whether the reply carries a non-null result.
	pub fn has_result(&self) -> bool {
		matches!(&self.result, Some(v) if !v.is_null())
	}
}

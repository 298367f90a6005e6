use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

use crate::client::ClientError;
use crate::config::ConfigError;
use crate::transport::AddressError;

/// Failure raised by a command handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
	#[error("missing argument #{index}")]
	MissingArgument { index: usize },
	#[error("invalid argument {value:?}: {reason}")]
	InvalidArgument { value: String, reason: String },
	#[error("unknown command: {0}")]
	UnknownCommand(String),
	#[error("{0}")]
	Failed(String),
}

impl CommandError {
	pub fn failed(message: impl Into<String>) -> Self {
		CommandError::Failed(message.into())
	}
}

/// Parse the positional argument at `index`.
pub fn arg<T>(args: &[String], index: usize) -> Result<T, CommandError>
where
	T: FromStr,
	T::Err: Display,
{
	let value = args
		.get(index)
		.ok_or(CommandError::MissingArgument { index })?;
	value.parse().map_err(|e: T::Err| CommandError::InvalidArgument {
		value: value.clone(),
		reason: e.to_string(),
	})
}

/// Top-level errors from running a daemon or control program.
#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error(transparent)]
	Address(#[from] AddressError),
	#[error(transparent)]
	Client(#[from] ClientError),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("worker {name} panicked")]
	WorkerPanicked { name: String },
}

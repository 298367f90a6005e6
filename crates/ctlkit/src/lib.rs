pub mod cli;
pub mod client;
pub mod config;
pub mod control;
pub mod daemon;
pub mod endpoint;
pub mod error;
pub mod registry;
pub mod response;
pub mod server;
pub mod split;
pub mod state;
pub mod transport;
pub mod worker;

pub use cli::{init_logging, ControlArgs, DaemonArgs};
pub use client::{Client, ClientError};
pub use config::Config;
pub use control::Control;
pub use daemon::{Context, Daemon};
pub use endpoint::{Endpoints, Outcome};
pub use error::{arg, CommandError, Error};
pub use registry::{Handler, Registry};
pub use response::{Origin, Response};
pub use split::split;
pub use state::State;
pub use transport::{Address, Reply, Request};
pub use worker::Worker;

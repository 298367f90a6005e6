use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

/// Flags understood by every daemon.
#[derive(Debug, Clone, Default, Parser)]
#[command(version)]
pub struct DaemonArgs {
	/// Enable verbose diagnostics
	#[arg(long)]
	pub debug: bool,
	/// Configuration file to use (INI)
	#[arg(long, value_name = "PATH")]
	pub config: Option<PathBuf>,
}

/// Flags understood by every control client.
#[derive(Debug, Clone, Default, Parser)]
#[command(version)]
pub struct ControlArgs {
	/// Enable verbose diagnostics
	#[arg(long)]
	pub debug: bool,
	/// Command to execute followed by its arguments; omit for interactive mode
	#[arg(value_name = "COMMAND", trailing_var_arg = true)]
	pub command: Vec<String>,
}

/// Parse the process arguments into `P`, using `description` as the about
/// text. Exits on `--help`, `--version` and usage errors.
pub fn parse<P: Parser>(description: &str) -> P {
	let matches = P::command().about(description.to_string()).get_matches();
	P::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

/// Install the global `tracing` subscriber, writing to stderr.
pub fn init_logging(debug: bool) {
	let level = if debug { Level::DEBUG } else { Level::INFO };
	let _ = tracing_subscriber::fmt()
		.with_max_level(level)
		.with_writer(std::io::stderr)
		.try_init();
}

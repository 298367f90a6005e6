use std::time::Duration;

use clap::Parser;
use serde_json::{json, Value};

use ctlkit::worker::Named;
use ctlkit::{arg, cli, Address, CommandError, Context, Daemon, DaemonArgs};

const DESCRIPTION: &str = "ctlkit demo daemon";
const APP_NAME: &str = "ctlkit-demo";

#[derive(Debug, Parser)]
#[command(version)]
struct Args {
	#[command(flatten)]
	daemon: DaemonArgs,
	/// Address to serve on (ipc://PATH or tcp://HOST:PORT)
	#[arg(long, value_name = "ADDRESS")]
	address: Option<String>,
}

fn add(_: &Context, args: &[String]) -> Result<Value, CommandError> {
	let a: i64 = arg(args, 0)?;
	let b: i64 = arg(args, 1)?;
	Ok(json!(a + b))
}

fn store(ctx: &Context, args: &[String]) -> Result<Value, CommandError> {
	let key: String = arg(args, 0)?;
	let value: String = arg(args, 1)?;
	Ok(ctx.state().set(key, value).unwrap_or(Value::Null))
}

fn get(ctx: &Context, args: &[String]) -> Result<Value, CommandError> {
	let key: String = arg(args, 0)?;
	ctx.state()
		.get(&key)
		.ok_or_else(|| CommandError::failed(format!("no such key: {}", key)))
}

fn config(ctx: &Context, args: &[String]) -> Result<Value, CommandError> {
	let section: String = arg(args, 0)?;
	let key: String = arg(args, 1)?;
	Ok(ctx
		.config()
		.get(&section, &key)
		.map(|v| json!(v))
		.unwrap_or(Value::Null))
}

fn ticker(ctx: Context) {
	loop {
		std::thread::sleep(Duration::from_secs(1));
		let ticks = ctx
			.state()
			.update("ticks", |v| json!(v.and_then(Value::as_u64).unwrap_or(0) + 1));
		tracing::debug!("tick {}", ticks);
	}
}

#[tokio::main]
async fn main() {
	let args: Args = cli::parse(DESCRIPTION);
	cli::init_logging(args.daemon.debug);

	let address = args
		.address
		.unwrap_or_else(|| Address::local(APP_NAME).to_string());

	let mut daemon = Daemon::new(DESCRIPTION, Some(&address));
	daemon
		.add_command("add", add, Some("add two integers"))
		.add_command("echo", |_, args| Ok(json!(args.join(" "))), Some("echo the arguments"))
		.add_command("state", |ctx, _| Ok(ctx.state().snapshot()), Some("dump program state"))
		.add_command("store", store, Some("store <key> <value>"))
		.add_command("get", get, Some("get <key>"))
		.add_command("config", config, Some("config <section> <key>"))
		.add_worker(Named::new("ticker", ticker));

	if let Err(e) = daemon.run(&args.daemon).await {
		tracing::error!("{}", e);
		std::process::exit(1);
	}
}

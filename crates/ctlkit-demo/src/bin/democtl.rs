use std::time::Duration;

use clap::Parser;
use serde_json::json;

use ctlkit::{cli, Address, ControlArgs, Control};

const DESCRIPTION: &str = "ctlkit demo control";
const APP_NAME: &str = "ctlkit-demo";

#[derive(Debug, Parser)]
#[command(version)]
struct Args {
	/// Daemon address; separate several with commas
	#[arg(long, value_name = "ADDRESS[,ADDRESS...]")]
	address: Option<String>,
	/// Receive timeout in milliseconds
	#[arg(long, value_name = "MS", default_value_t = 3000)]
	timeout: u64,
	#[command(flatten)]
	control: ControlArgs,
}

fn main() {
	let args: Args = cli::parse(DESCRIPTION);
	cli::init_logging(args.control.debug);

	let address = args
		.address
		.unwrap_or_else(|| Address::local(APP_NAME).to_string());

	let mut ctl = Control::new(DESCRIPTION, Some(&address))
		.with_timeout(Duration::from_millis(args.timeout));
	ctl.add_command(
		"endpoints",
		|ctl, _| {
			let addresses = ctl.endpoints().map(|e| e.addresses().join(", "));
			Ok(json!(addresses.unwrap_or_default()))
		},
		Some("list configured endpoints"),
	);

	if let Err(e) = ctl.run(&args.control, true) {
		tracing::error!("{}", e);
		std::process::exit(1);
	}
}

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::task::JoinHandle;

use ctlkit::client::{self, Client, ClientError};
use ctlkit::response::Origin;
use ctlkit::{
	arg, server, Address, CommandError, Config, Context, Control, Daemon, Endpoints, Error,
	Outcome, Registry, State,
};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Socket paths live directly under /tmp so they stay short (SUN_LEN limit).
fn temp_address(name: &str) -> (String, PathBuf) {
	let n = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
	let path = PathBuf::from(format!("/tmp/ckt{}-{}-{}.sock", std::process::id(), n, name));
	(format!("ipc://{}", path.display()), path)
}

fn demo_daemon(address: &str) -> Daemon {
	let mut daemon = Daemon::new("test daemon", Some(address));
	daemon.add_command(
		"add",
		|_, args| {
			let a: i64 = arg(args, 0)?;
			let b: i64 = arg(args, 1)?;
			Ok(json!(a + b))
		},
		Some("add two integers"),
	);
	daemon.add_command("echo", |_, args| Ok(json!(args)), None);
	daemon.add_command(
		"bump",
		|ctx, _| {
			Ok(ctx
				.state()
				.update("hits", |v| json!(v.and_then(Value::as_i64).unwrap_or(0) + 1)))
		},
		None,
	);
	daemon
}

async fn start(daemon: Daemon, address: &str) -> JoinHandle<Result<(), Error>> {
	let handle = tokio::spawn(daemon.serve(Config::default()));
	for _ in 0..200 {
		if client::is_running(address) {
			break;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	assert!(client::is_running(address), "daemon did not come up at {}", address);
	handle
}

fn strings(values: &[&str]) -> Vec<String> {
	values.iter().map(|s| s.to_string()).collect()
}

// --- Client helpers ---

#[test]
fn is_running_false_when_no_socket() {
	let (address, _) = temp_address("nosock");
	assert!(!client::is_running(&address));
	assert!(!client::is_running("not an address"));
}

#[test]
fn client_call_returns_not_running() {
	let (address, _) = temp_address("noserver");
	let mut client = Client::new(address.clone(), Duration::from_millis(200));
	match client.call("ping", &[]) {
		Err(ClientError::NotRunning(a)) => assert_eq!(a, address),
		other => panic!("expected NotRunning, got {:?}", other),
	}
	assert!(!client.is_connected());
}

// --- Client + Server roundtrip ---

#[tokio::test]
async fn server_client_roundtrip() {
	let (address, path) = temp_address("roundtrip");
	let server = start(demo_daemon(&address), &address).await;

	let client_address = address.clone();
	tokio::task::spawn_blocking(move || {
		let mut client = Client::new(client_address, Duration::from_secs(2));

		let r = client.call("ping", &[]).unwrap();
		assert_eq!(r.result, Some(json!("pong")));
		assert_eq!(r.error, None);
		assert!(client.is_connected());

		let r = client.call("add", &strings(&["2", "3"])).unwrap();
		assert_eq!(r.result, Some(json!(5)));

		let r = client.call("echo", &strings(&["a b", "c"])).unwrap();
		assert_eq!(r.result, Some(json!(["a b", "c"])));

		let r = client.call("add", &strings(&["2"])).unwrap();
		assert_eq!(r.result, None);
		assert_eq!(r.error.as_deref(), Some("missing argument #1"));

		let r = client.call("help", &strings(&["add"])).unwrap();
		assert_eq!(r.result, Some(json!("add two integers")));

		client.close();
		assert!(!client.is_connected());
	})
	.await
	.unwrap();

	server.abort();
	let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn unknown_command_is_an_error_reply() {
	let (address, path) = temp_address("unknown");
	let server = start(demo_daemon(&address), &address).await;

	let client_address = address.clone();
	let reply = tokio::task::spawn_blocking(move || {
		Client::new(client_address, Duration::from_secs(2)).call("frobnicate", &[])
	})
	.await
	.unwrap()
	.unwrap();
	assert_eq!(reply.result, None);
	assert_eq!(reply.error.as_deref(), Some("unknown command: frobnicate"));

	server.abort();
	let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn malformed_request_gets_error_and_connection_survives() {
	let (address, path) = temp_address("malformed");
	let server = start(demo_daemon(&address), &address).await;

	let socket = path.clone();
	tokio::task::spawn_blocking(move || {
		let mut stream = UnixStream::connect(&socket).unwrap();
		stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
		let mut reader = BufReader::new(stream.try_clone().unwrap());

		stream.write_all(b"this is not json\n").unwrap();
		let mut line = String::new();
		reader.read_line(&mut line).unwrap();
		let reply: Value = serde_json::from_str(&line).unwrap();
		assert_eq!(reply["result"], Value::Null);
		assert!(reply["error"].as_str().unwrap().starts_with("invalid request"));

		stream.write_all(b"{\"command\":\"ping\",\"args\":[]}\n").unwrap();
		line.clear();
		reader.read_line(&mut line).unwrap();
		let reply: Value = serde_json::from_str(&line).unwrap();
		assert_eq!(reply, json!({"result": "pong", "error": null}));
	})
	.await
	.unwrap();

	server.abort();
	let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn concurrent_clients_share_state() {
	let (address, path) = temp_address("shared");
	let daemon = demo_daemon(&address);
	let state = daemon.state();
	let server = start(daemon, &address).await;

	let mut handles = vec![];
	for _ in 0..5 {
		let a = address.clone();
		handles.push(tokio::task::spawn_blocking(move || {
			let mut client = Client::new(a, Duration::from_secs(2));
			for _ in 0..4 {
				assert!(client.call("bump", &[]).unwrap().error.is_none());
			}
		}));
	}
	for h in handles {
		h.await.unwrap();
	}
	assert_eq!(state.get("hits"), Some(json!(20)));

	server.abort();
	let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn second_daemon_on_live_socket_is_refused() {
	let (address, path) = temp_address("twice");
	let server = start(demo_daemon(&address), &address).await;

	let second = Daemon::new("second", Some(&address)).serve(Config::default()).await;
	assert!(matches!(second, Err(Error::Io(_))));
	assert!(client::is_running(&address));

	server.abort();
	let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn stale_socket_file_is_replaced() {
	let (address, path) = temp_address("stale");
	{
		let _listener = std::os::unix::net::UnixListener::bind(&path).unwrap();
	}
	assert!(path.exists());
	assert!(!client::is_running(&address));

	let server = start(demo_daemon(&address), &address).await;
	server.abort();
	let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn tcp_roundtrip() {
	let listener = server::bind(&"tcp://127.0.0.1:0".parse::<Address>().unwrap())
		.await
		.unwrap();
	let address = listener.address().unwrap().to_string();
	assert!(address.starts_with("tcp://127.0.0.1:"));
	assert_eq!(listener.socket_path(), None);

	let mut registry = Registry::new();
	registry.add(
		"add",
		Arc::new(|_: &Context, args: &[String]| -> Result<Value, CommandError> {
			Ok(json!(arg::<i64>(args, 0)? + arg::<i64>(args, 1)?))
		}),
		None,
	);
	let ctx = Context::new(Arc::new(State::new()), Config::default(), registry);
	let server = tokio::spawn(listener.serve(ctx));

	let reply = tokio::task::spawn_blocking(move || {
		Client::new(address, Duration::from_secs(2)).call("add", &strings(&["40", "2"]))
	})
	.await
	.unwrap()
	.unwrap();
	assert_eq!(reply.result, Some(json!(42)));

	server.abort();
}

// --- Fan-out ---

#[tokio::test]
async fn fan_out_reports_every_endpoint() {
	let (first, first_path) = temp_address("fan1");
	let (second, second_path) = temp_address("fan2");
	let (missing, _) = temp_address("fan3");
	let s1 = start(demo_daemon(&first), &first).await;
	let s2 = start(demo_daemon(&second), &second).await;

	let spec = format!("{}, {},{}", first, second, missing);
	let outcome = tokio::task::spawn_blocking(move || {
		let mut endpoints = Endpoints::new(&spec, Duration::from_millis(500));
		let outcome = endpoints.call("ping", &[]);
		endpoints.close();
		outcome
	})
	.await
	.unwrap();

	match outcome {
		Outcome::Multiple { results, errors } => {
			assert_eq!(results.len(), 3);
			assert_eq!(errors.len(), 3);
			assert_eq!(results[&first], Some(json!("pong")));
			assert_eq!(results[&second], Some(json!("pong")));
			assert_eq!(errors[&first], None);
			assert_eq!(results[&missing], None);
			assert!(errors[&missing].as_deref().unwrap().contains("not running"));
		}
		other => panic!("expected multiple outcome, got {:?}", other),
	}

	s1.abort();
	s2.abort();
	let _ = std::fs::remove_file(first_path);
	let _ = std::fs::remove_file(second_path);
}

#[tokio::test]
async fn silent_endpoint_times_out_without_blocking_others() {
	let (silent, silent_path) = temp_address("silent");
	let (missing, _) = temp_address("gone");
	// Accepts connections but never answers.
	let listener = std::os::unix::net::UnixListener::bind(&silent_path).unwrap();
	let spec = format!("{}, {}", silent, missing);

	let (outcome, elapsed) = tokio::task::spawn_blocking(move || {
		let _listener = listener;
		let started = std::time::Instant::now();
		let mut endpoints = Endpoints::new(&spec, Duration::from_millis(200));
		let outcome = endpoints.call("ping", &[]);
		endpoints.close();
		(outcome, started.elapsed())
	})
	.await
	.unwrap();

	assert!(elapsed < Duration::from_secs(2), "fan-out took {:?}", elapsed);
	match outcome {
		Outcome::Multiple { results, errors } => {
			assert_eq!(results.len(), 2);
			assert_eq!(results[&silent], None);
			assert_eq!(errors[&silent].as_deref(), Some("timed out after 200ms"));
			assert_eq!(results[&missing], None);
			assert!(errors[&missing].as_deref().unwrap().starts_with("daemon not running"));
		}
		other => panic!("expected multiple outcome, got {:?}", other),
	}

	let _ = std::fs::remove_file(silent_path);
}

// --- Control end to end ---

#[tokio::test]
async fn control_against_daemon() {
	let (address, path) = temp_address("ctl");
	let server = start(demo_daemon(&address), &address).await;

	let ctl_address = address.clone();
	tokio::task::spawn_blocking(move || {
		let mut ctl = Control::new("test ctl", Some(&ctl_address))
			.with_timeout(Duration::from_secs(2))
			.with_color(false);
		ctl.add_command("echo", |_, _| Ok(json!("local echo")), None);

		let r = ctl.execute("PING").unwrap();
		assert_eq!(r.origin(), Origin::Remote);
		assert_eq!(r.lines(false), vec!["pong"]);

		let r = ctl.execute("add 2 3").unwrap();
		assert_eq!(r.result(), Some(&json!(5)));

		let r = ctl.execute("echo \"not sent\"").unwrap();
		assert_eq!(r.origin(), Origin::Local);
		assert_eq!(r.result(), Some(&json!("local echo")));

		let r = ctl.execute("add x 3").unwrap();
		assert_eq!(r.origin(), Origin::Remote);
		assert_eq!(r.lines(false), vec!["remote err: invalid argument \"x\": invalid digit found in string"]);

		let mut output = Vec::new();
		ctl.interact(&b"ping\nhelp add\n"[..], &mut output).unwrap();
		let output = String::from_utf8(output).unwrap();
		assert!(output.contains("pong\n"));
		assert!(output.contains("add two integers\n"));

		ctl.close();
	})
	.await
	.unwrap();

	server.abort();
	let _ = std::fs::remove_file(path);
}

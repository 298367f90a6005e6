use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use crate::client::Client;
use crate::transport::{split_addresses, Reply, ADDRESS_SEPARATOR};

/// Receive timeout used when none is given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// What one logical call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
	Single(Reply),
	/// Keyed by endpoint address; both maps hold every address.
	Multiple {
		results: BTreeMap<String, Option<Value>>,
		errors: BTreeMap<String, Option<String>>,
	},
}

/// The remote side of a control session: one endpoint, or several addressed
/// together.
pub enum Endpoints {
	Single(Client),
	Multiple(BTreeMap<String, Client>),
}

impl Endpoints {
	/// A spec containing a comma becomes one client per trimmed address.
	pub fn new(spec: &str, timeout: Duration) -> Self {
		if spec.contains(ADDRESS_SEPARATOR) {
			let clients = split_addresses(spec)
				.into_iter()
				.map(|address| (address.clone(), Client::new(address, timeout)))
				.collect();
			Endpoints::Multiple(clients)
		} else {
			Endpoints::Single(Client::new(spec.trim(), timeout))
		}
	}

	pub fn is_multi(&self) -> bool {
		matches!(self, Endpoints::Multiple(_))
	}

	pub fn addresses(&self) -> Vec<&str> {
		match self {
			Endpoints::Single(client) => vec![client.address()],
			Endpoints::Multiple(clients) => clients.keys().map(|a| a.as_str()).collect(),
		}
	}

	/// Call `command` on every endpoint. Transport failures come back as
	/// errors in the outcome and never stop the remaining endpoints.
	pub fn call(&mut self, command: &str, args: &[String]) -> Outcome {
		match self {
			Endpoints::Single(client) => Outcome::Single(call_one(client, command, args)),
			Endpoints::Multiple(clients) => {
				let mut results = BTreeMap::new();
				let mut errors = BTreeMap::new();
				for (address, client) in clients.iter_mut() {
					let reply = call_one(client, command, args);
					results.insert(address.clone(), reply.result);
					errors.insert(address.clone(), reply.error);
				}
				Outcome::Multiple { results, errors }
			}
		}
	}

	pub fn close(&mut self) {
		match self {
			Endpoints::Single(client) => client.close(),
			Endpoints::Multiple(clients) => clients.values_mut().for_each(Client::close),
		}
	}
}

fn call_one(client: &mut Client, command: &str, args: &[String]) -> Reply {
	match client.call(command, args) {
		Ok(reply) => reply,
		Err(e) => {
			tracing::debug!("{} {}: {}", client.address(), command, e);
			Reply::err(e.to_string())
		}
	}
}

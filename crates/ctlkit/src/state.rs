use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

/// Key-value store shared between a daemon's handlers and workers.
///
/// A single lock guards the map; it is taken per operation and never held
/// while a handler runs.
#[derive(Debug, Default)]
pub struct State {
	entries: Mutex<BTreeMap<String, Value>>,
}

impl State {
	pub fn new() -> Self {
		Self::default()
	}

	fn entries(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner)
	}

	pub fn get(&self, key: &str) -> Option<Value> {
		self.entries().get(key).cloned()
	}

	/// Store `value` under `key`, returning the previous value.
	pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
		self.entries().insert(key.into(), value.into())
	}

	pub fn remove(&self, key: &str) -> Option<Value> {
		self.entries().remove(key)
	}

	/// Apply `f` to the current value of `key` under the lock.
	pub fn update<F>(&self, key: &str, f: F) -> Value
	where
		F: FnOnce(Option<&Value>) -> Value,
	{
		let mut entries = self.entries();
		let value = f(entries.get(key));
		entries.insert(key.to_string(), value.clone());
		value
	}

	/// All entries as a JSON object.
	pub fn snapshot(&self) -> Value {
		Value::Object(
			self.entries()
				.iter()
				.map(|(k, v)| (k.clone(), v.clone()))
				.collect(),
		)
	}

	pub fn len(&self) -> usize {
		self.entries().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries().is_empty()
	}
}

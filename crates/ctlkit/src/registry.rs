use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::CommandError;

pub const NO_DESCRIPTION: &str = "no description";

/// A command implementation.
///
/// `C` is whatever the owning role hands to its handlers: the daemon passes a
/// [`Context`](crate::daemon::Context), the control client passes itself.
pub trait Handler<C>: Send + Sync {
	fn call(&self, ctx: &C, args: &[String]) -> Result<Value, CommandError>;
}

impl<C, F> Handler<C> for F
where
	F: Fn(&C, &[String]) -> Result<Value, CommandError> + Send + Sync,
{
	fn call(&self, ctx: &C, args: &[String]) -> Result<Value, CommandError> {
		self(ctx, args)
	}
}

pub struct Command<C> {
	pub name: String,
	pub handler: Arc<dyn Handler<C>>,
	pub description: Option<String>,
}

impl<C> Clone for Command<C> {
	fn clone(&self) -> Self {
		Self {
			name: self.name.clone(),
			handler: Arc::clone(&self.handler),
			description: self.description.clone(),
		}
	}
}

/// Name → command table. Lookups are exact; callers normalise case.
pub struct Registry<C> {
	commands: BTreeMap<String, Command<C>>,
}

impl<C> Default for Registry<C> {
	fn default() -> Self {
		Self {
			commands: BTreeMap::new(),
		}
	}
}

impl<C> Registry<C> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or replace `name`.
	pub fn add(
		&mut self,
		name: impl Into<String>,
		handler: Arc<dyn Handler<C>>,
		description: Option<String>,
	) {
		let name = name.into();
		self.commands.insert(
			name.clone(),
			Command {
				name,
				handler,
				description,
			},
		);
	}

	pub fn lookup(&self, name: &str) -> Option<Arc<dyn Handler<C>>> {
		self.commands.get(name).map(|c| Arc::clone(&c.handler))
	}

	pub fn contains(&self, name: &str) -> bool {
		self.commands.contains_key(name)
	}

	pub fn describe(&self, name: &str) -> &str {
		self.commands
			.get(name)
			.and_then(|c| c.description.as_deref())
			.unwrap_or(NO_DESCRIPTION)
	}

	/// Registered names, sorted.
	pub fn list(&self) -> Vec<&str> {
		self.commands.keys().map(|s| s.as_str()).collect()
	}

	pub fn len(&self) -> usize {
		self.commands.len()
	}

	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}
}

use crate::daemon::Context;

/// Background work attached to a daemon.
///
/// Every worker gets its own thread when the daemon runs. There is no
/// cancellation: a worker ends when `run` returns or the process exits.
pub trait Worker: Send + 'static {
	fn name(&self) -> &str {
		"worker"
	}

	fn run(self: Box<Self>, ctx: Context);
}

impl<F> Worker for F
where
	F: FnOnce(Context) + Send + 'static,
{
	fn run(self: Box<Self>, ctx: Context) {
		(*self)(ctx)
	}
}

/// A closure with a thread name.
pub struct Named<F> {
	name: String,
	f: F,
}

impl<F> Named<F>
where
	F: FnOnce(Context) + Send + 'static,
{
	pub fn new(name: impl Into<String>, f: F) -> Self {
		Self {
			name: name.into(),
			f,
		}
	}
}

impl<F> Worker for Named<F>
where
	F: FnOnce(Context) + Send + 'static,
{
	fn name(&self) -> &str {
		&self.name
	}

	fn run(self: Box<Self>, ctx: Context) {
		let Named { f, .. } = *self;
		f(ctx)
	}
}

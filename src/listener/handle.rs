use super::ListenerStats;
use crate::errors::{NetworkError, ShutdownError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub(super) struct ListenerHandleInner {
	pub(super) thread: std::thread::JoinHandle<Result<(), NetworkError>>,
	pub(super) shutdown: CancellationToken,
	pub(super) stats: Arc<ListenerStats>,
}

pub(super) struct ListenerHandleDrop(pub(super) Option<ListenerHandleInner>);
impl ListenerHandleDrop {
	fn shutdown(&mut self) -> Result<(), ShutdownError> {
		let ListenerHandleInner { thread, shutdown, .. } = match self.0.take() {
			Some(inner) => inner,
			None => return Ok(()),
		};

		shutdown.cancel();

		match thread.join() {
			Ok(Ok(_)) => Ok(()),
			Ok(Err(err)) => Err(ShutdownError::Network(err)),
			Err(err) => Err(ShutdownError::ThreadJoinError(err)),
		}
	}
}
impl Drop for ListenerHandleDrop {
	fn drop(&mut self) {
		if let Err(ShutdownError::ThreadJoinError(err)) = self.shutdown() {
			if !std::thread::panicking() {
				std::panic::resume_unwind(err);
			}
		}
	}
}

/// Controls a [`Listener`](super::Listener) running in the background.
///
/// Dropping the handle shuts the listener down.
pub struct ListenerHandle(pub(super) ListenerHandleDrop);
impl ListenerHandle {
	/// Stops the listener and waits for its thread to exit.
	///
	/// Does not wait for a running event handler to finish. Returns the error that stopped
	/// the listener early, if one did.
	pub fn shutdown(mut self) -> Result<(), ShutdownError> {
		self.0.shutdown()
	}

	/// Whether the listener thread has exited (because of an error, or a shutdown).
	pub fn is_finished(&self) -> bool {
		self.0 .0.as_ref().map_or(true, |inner| inner.thread.is_finished())
	}

	pub fn stats(&self) -> Option<Arc<ListenerStats>> {
		self.0 .0.as_ref().map(|inner| inner.stats.clone())
	}
}

//! Cancellation and deadlines for blocking transport calls.

use crate::errors::NetworkError;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, Default)]
/// Carries a cancellation signal and an optional deadline into [`Transport`](crate::transport::Transport) calls.
///
/// Both are checked before any I/O is attempted. [`Transport::receive`](crate::transport::Transport::receive)
/// also turns the deadline into the socket's read timeout, so a blocked read wakes up on
/// its own even if nobody is around to cancel it.
pub struct Context {
	token: CancellationToken,
	deadline: Option<Instant>,
}
impl Context {
	/// A context that is never canceled and has no deadline.
	pub fn background() -> Self {
		Self::default()
	}

	/// A context canceled through `token`.
	pub fn with_token(token: CancellationToken) -> Self {
		Self { token, deadline: None }
	}

	/// The same context, expiring at `deadline` (or earlier, if it already had an earlier deadline).
	pub fn deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(match self.deadline {
			Some(current) => current.min(deadline),
			None => deadline,
		});
		self
	}

	/// The same context, expiring `timeout` from now.
	///
	/// A timeout too large to represent as an [`Instant`] leaves the context without a new deadline.
	pub fn timeout(self, timeout: Duration) -> Self {
		match Instant::now().checked_add(timeout) {
			Some(deadline) => self.deadline(deadline),
			None => self,
		}
	}

	#[inline(always)]
	pub fn token(&self) -> &CancellationToken {
		&self.token
	}

	#[inline(always)]
	pub fn get_deadline(&self) -> Option<Instant> {
		self.deadline
	}

	#[inline]
	pub fn cancel(&self) {
		self.token.cancel()
	}

	#[inline]
	pub fn is_canceled(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Fails if the context is canceled or its deadline has passed.
	///
	/// Otherwise returns the time left before the deadline, if there is one.
	pub fn check(&self) -> Result<Option<Duration>, NetworkError> {
		if self.token.is_cancelled() {
			return Err(NetworkError::Canceled);
		}

		match self.deadline {
			None => Ok(None),
			Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
				Some(remaining) if !remaining.is_zero() => Ok(Some(remaining)),
				_ => Err(NetworkError::DeadlineExceeded),
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn background_never_expires() {
		assert!(matches!(Context::background().check(), Ok(None)));
	}

	#[test]
	fn canceled() {
		let ctx = Context::background();
		let child = ctx.clone();
		ctx.cancel();
		assert!(child.is_canceled());
		assert!(matches!(child.check(), Err(NetworkError::Canceled)));
	}

	#[test]
	fn cancellation_wins_over_deadline() {
		let ctx = Context::background().timeout(Duration::from_secs(60));
		ctx.cancel();
		assert!(matches!(ctx.check(), Err(NetworkError::Canceled)));
	}

	#[test]
	fn deadline_remaining() {
		let ctx = Context::background().timeout(Duration::from_secs(60));
		let remaining = ctx.check().unwrap().unwrap();
		assert!(remaining <= Duration::from_secs(60));
		assert!(remaining > Duration::from_secs(59));
	}

	#[test]
	fn deadline_passed() {
		let ctx = Context::background().deadline(Instant::now() - Duration::from_millis(1));
		assert!(matches!(ctx.check(), Err(NetworkError::DeadlineExceeded)));
	}

	#[test]
	fn unrepresentable_timeout_means_no_deadline() {
		let ctx = Context::background().timeout(Duration::MAX);
		assert_eq!(ctx.get_deadline(), None);
		assert!(matches!(ctx.check(), Ok(None)));

		let soon = Instant::now() + Duration::from_secs(1);
		let ctx = Context::background().deadline(soon).timeout(Duration::MAX);
		assert_eq!(ctx.get_deadline(), Some(soon));
	}

	#[test]
	fn keeps_earliest_deadline() {
		let soon = Instant::now() + Duration::from_secs(1);
		let ctx = Context::background().deadline(soon).timeout(Duration::from_secs(60));
		assert_eq!(ctx.get_deadline(), Some(soon));
	}

	#[test]
	fn shares_token() {
		let token = CancellationToken::new();
		let ctx = Context::with_token(token.child_token());
		token.cancel();
		assert!(ctx.is_canceled());
	}
}

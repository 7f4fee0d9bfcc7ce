use super::{Listener, Pipeline};
use crate::{
	security::{RateLimiter, RateLimiterConfig, SourceFilter},
	transport::Transport,
};
use std::{sync::Arc, time::Duration};

pub struct ListenerBuilder {
	filters: Option<Vec<SourceFilter>>,
	rate_limiter: RateLimiterConfig,
	poll_interval: Duration,
	cleanup_interval: Duration,
	queue_len: usize,
}
impl ListenerBuilder {
	pub fn new() -> Self {
		Self {
			filters: None,
			rate_limiter: RateLimiterConfig::default(),
			poll_interval: Duration::from_millis(250),
			cleanup_interval: Duration::from_secs(30),
			queue_len: 64,
		}
	}

	/// The source filters to apply. A packet is admitted if any filter accepts its source.
	///
	/// Defaults to one filter per interface the transport joined the group on. The transport
	/// does not know which interface a datagram arrived on, so with several joined interfaces
	/// a source on the subnet of interface B is also admitted when it arrives on interface A.
	pub fn filters(mut self, filters: Vec<SourceFilter>) -> Self {
		self.filters = Some(filters);
		self
	}

	pub fn rate_limiter(mut self, config: RateLimiterConfig) -> Self {
		self.rate_limiter = config;
		self
	}

	/// How long a single read may block before the reader checks for shutdown.
	///
	/// Shutting down returns immediately regardless; this only bounds how long the reader
	/// keeps the transport busy afterwards. Clamped to at least a millisecond.
	pub fn poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval.max(Duration::from_millis(1));
		self
	}

	/// How often quiet sources are dropped from the rate limiter.
	pub fn cleanup_interval(mut self, interval: Duration) -> Self {
		self.cleanup_interval = interval;
		self
	}

	/// How many admitted messages may wait for the event handler. Once full, newly admitted
	/// messages are dropped and counted in [`ListenerStats::overflowed`](super::ListenerStats::overflowed).
	///
	/// Clamped to at least one.
	pub fn queue_len(mut self, queue_len: usize) -> Self {
		self.queue_len = queue_len.max(1);
		self
	}

	pub fn build(self, transport: Arc<Transport>) -> Listener {
		let ListenerBuilder {
			filters,
			rate_limiter,
			poll_interval,
			cleanup_interval,
			queue_len,
		} = self;

		let filters = filters.unwrap_or_else(|| transport.joined_interfaces().iter().map(SourceFilter::new).collect());

		Listener {
			transport,
			pipeline: Pipeline {
				filters,
				limiter: RateLimiter::new(rate_limiter),
				stats: Arc::default(),
			},
			poll_interval,
			cleanup_interval,
			queue_len,
		}
	}
}
impl Default for ListenerBuilder {
	fn default() -> Self {
		Self::new()
	}
}

//! The receive pipeline: read a datagram, check its source, rate limit it, parse it.
//!
//! A [`Listener`] runs this pipeline over a shared [`Transport`] and hands every admitted
//! message to an event handler. Reading happens on a dedicated blocking task, so the pipeline
//! sees packets as they arrive; the handler runs separately and a slow handler only delays
//! other events, never reception. Malformed or unwanted packets are counted, logged at debug
//! level and dropped; only a socket failure stops the listener.

use crate::{
	context::Context,
	errors::NetworkError,
	message::{parse_message, Message},
	security::{RateLimiter, SourceFilter},
	transport::Transport,
};
use std::{
	net::SocketAddr,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
	time::{Duration, Instant},
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

mod builder;
pub use builder::ListenerBuilder;

mod event;
pub use event::{Inbound, ListenerEvent};
use event::*;

mod handle;
pub use handle::ListenerHandle;
use handle::*;

#[derive(Debug, Default)]
/// Packet counters for a [`Listener`].
pub struct ListenerStats {
	accepted: AtomicU64,
	filtered: AtomicU64,
	rate_limited: AtomicU64,
	malformed: AtomicU64,
	receive_errors: AtomicU64,
	overflowed: AtomicU64,
}
impl ListenerStats {
	/// Packets that passed every check
	pub fn accepted(&self) -> u64 {
		self.accepted.load(Ordering::Relaxed)
	}

	/// Packets dropped because their source address was not on-link
	pub fn filtered(&self) -> u64 {
		self.filtered.load(Ordering::Relaxed)
	}

	/// Packets dropped by the rate limiter
	pub fn rate_limited(&self) -> u64 {
		self.rate_limited.load(Ordering::Relaxed)
	}

	/// Packets that failed to parse
	pub fn malformed(&self) -> u64 {
		self.malformed.load(Ordering::Relaxed)
	}

	/// Datagrams lost to a per-packet receive error, such as being too large for the receive buffer
	pub fn receive_errors(&self) -> u64 {
		self.receive_errors.load(Ordering::Relaxed)
	}

	/// Accepted packets dropped because the event handler had fallen too far behind
	pub fn overflowed(&self) -> u64 {
		self.overflowed.load(Ordering::Relaxed)
	}
}

/// Source filtering, rate limiting and parsing, independent of any socket.
pub(crate) struct Pipeline {
	filters: Vec<SourceFilter>,
	limiter: RateLimiter,
	stats: Arc<ListenerStats>,
}
impl Pipeline {
	/// Runs one datagram through the checks, returning the parsed message if it got through.
	fn admit(&self, packet: &[u8], source: SocketAddr) -> Option<Message> {
		if !self.filters.iter().any(|filter| filter.is_valid(source.ip())) {
			log::trace!("Dropping packet from off-link source {source}");
			self.stats.filtered.fetch_add(1, Ordering::Relaxed);
			return None;
		}

		if !self.limiter.allow(source.ip()) {
			log::trace!("Dropping packet from rate limited source {source}");
			self.stats.rate_limited.fetch_add(1, Ordering::Relaxed);
			return None;
		}

		match parse_message(packet) {
			Ok(message) => {
				self.stats.accepted.fetch_add(1, Ordering::Relaxed);
				Some(message)
			}
			Err(err) => {
				log::debug!("Dropping malformed packet from {source}: {err}");
				self.stats.malformed.fetch_add(1, Ordering::Relaxed);
				None
			}
		}
	}
}

/// Drives the receive pipeline over a [`Transport`].
///
/// Built with a [`ListenerBuilder`].
pub struct Listener {
	transport: Arc<Transport>,
	pipeline: Pipeline,
	poll_interval: Duration,
	cleanup_interval: Duration,
	queue_len: usize,
}
impl Listener {
	#[inline(always)]
	pub fn builder() -> ListenerBuilder {
		ListenerBuilder::new()
	}

	#[inline(always)]
	pub fn stats(&self) -> Arc<ListenerStats> {
		self.pipeline.stats.clone()
	}

	/// Runs the listener on its own thread until the returned handle is shut down or dropped.
	pub fn run_in_background<F>(self, handler: F) -> Result<ListenerHandle, std::io::Error>
	where
		F: Fn(ListenerEvent) + Send + Sync + 'static,
	{
		let runtime = runtime()?;
		let shutdown = CancellationToken::new();
		let stats = self.stats();

		let thread = {
			let shutdown = shutdown.clone();
			std::thread::Builder::new().name("lanbeam mDNS listener".into()).spawn(move || {
				let res = runtime.block_on(self.impl_run(Arc::new(handler), shutdown));
				runtime.shutdown_background();
				res
			})?
		};

		Ok(ListenerHandle(ListenerHandleDrop(Some(ListenerHandleInner { thread, shutdown, stats }))))
	}

	/// Runs the listener on the current thread until `shutdown` is canceled.
	///
	/// Returns an error if the transport fails for any reason other than a read timeout or a
	/// problem with a single datagram.
	pub fn run<F>(self, shutdown: CancellationToken, handler: F) -> Result<(), NetworkError>
	where
		F: Fn(ListenerEvent) + Send + Sync + 'static,
	{
		let runtime = runtime().map_err(NetworkError::Runtime)?;
		let res = runtime.block_on(self.impl_run(Arc::new(handler), shutdown));
		runtime.shutdown_background();
		res
	}
}
impl Listener {
	async fn impl_run(self, handler: EventHandler, shutdown: CancellationToken) -> Result<(), NetworkError> {
		let Listener {
			transport,
			pipeline,
			poll_interval,
			cleanup_interval,
			queue_len,
		} = self;

		let (event_tx, mut event_rx) = mpsc::channel(queue_len);

		let reader = {
			let reader = Reader {
				transport,
				pipeline,
				poll_interval,
				cleanup_interval,
			};
			let shutdown = shutdown.clone();
			tokio::task::spawn_blocking(move || reader.run(&shutdown, &event_tx))
		};

		let dispatch = async {
			while let Some(event) = event_rx.recv().await {
				let handler = handler.clone();
				tokio::task::spawn_blocking(move || handler(event)).await.ok();
			}
		};

		tokio::select! {
			biased;
			_ = shutdown.cancelled() => return Ok(()),
			_ = dispatch => {}
		}

		// The event channel only closes once the reader has returned
		match reader.await {
			Ok(res) => res,
			Err(err) => match err.try_into_panic() {
				Ok(panic) => std::panic::resume_unwind(panic),
				Err(_) => Ok(()),
			},
		}
	}
}

fn runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
	tokio::runtime::Builder::new_current_thread()
		.thread_name("lanbeam mDNS listener (Tokio)")
		.enable_all()
		.build()
}

/// The blocking half of a [`Listener`]: reads datagrams and runs them through the pipeline.
struct Reader {
	transport: Arc<Transport>,
	pipeline: Pipeline,
	poll_interval: Duration,
	cleanup_interval: Duration,
}
impl Reader {
	fn run(self, shutdown: &CancellationToken, events: &mpsc::Sender<ListenerEvent>) -> Result<(), NetworkError> {
		let mut next_cleanup = Instant::now().checked_add(self.cleanup_interval);

		loop {
			let ctx = Context::with_token(shutdown.clone()).timeout(self.poll_interval);

			match self.transport.receive(&ctx) {
				Ok((packet, source)) => {
					if let Some(message) = self.pipeline.admit(&packet, source) {
						match events.try_send(ListenerEvent::from_message(source, message)) {
							Ok(()) => {}
							Err(TrySendError::Full(_)) => {
								log::debug!("Event handler is behind, dropping message from {source}");
								self.pipeline.stats.overflowed.fetch_add(1, Ordering::Relaxed);
							}
							Err(TrySendError::Closed(_)) => return Ok(()),
						}
					}
				}

				Err(NetworkError::Timeout | NetworkError::DeadlineExceeded) => {}

				Err(NetworkError::Canceled) => return Ok(()),

				Err(err) if err.is_per_packet() => {
					log::debug!("Dropping datagram: {err}");
					self.pipeline.stats.receive_errors.fetch_add(1, Ordering::Relaxed);
				}

				Err(err) => {
					log::warn!("mDNS listener stopped: {err}");
					return Err(err);
				}
			}

			if let Some(at) = next_cleanup {
				if Instant::now() >= at {
					let removed = self.pipeline.limiter.cleanup();
					if removed > 0 {
						log::trace!("Forgot {removed} quiet mDNS sources");
					}
					next_cleanup = Instant::now().checked_add(self.cleanup_interval);
				}
			}
		}
	}
}

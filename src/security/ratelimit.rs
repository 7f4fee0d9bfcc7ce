use std::{
	collections::{BTreeMap, HashMap},
	net::IpAddr,
	sync::{PoisonError, RwLock},
	time::{Duration, Instant},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Limits applied by a [`RateLimiter`].
pub struct RateLimiterConfig {
	/// Packets admitted per source per window
	pub threshold: u32,
	/// Length of a counting window
	pub window: Duration,
	/// How long a source is rejected after exceeding the threshold
	pub cooldown: Duration,
	/// Maximum number of sources tracked at once
	pub max_sources: usize,
	/// Sources not seen for this long are dropped by [`RateLimiter::cleanup`]
	pub stale_after: Duration,
}
impl Default for RateLimiterConfig {
	fn default() -> Self {
		Self {
			threshold: 100,
			window: Duration::from_secs(1),
			cooldown: Duration::from_secs(60),
			max_sources: 10_000,
			stale_after: Duration::from_secs(300),
		}
	}
}

/// Builds a [`RateLimiter`].
pub struct RateLimiterBuilder(RateLimiterConfig);
impl RateLimiterBuilder {
	pub fn new() -> Self {
		Self(RateLimiterConfig::default())
	}

	pub fn threshold(mut self, threshold: u32) -> Self {
		self.0.threshold = threshold;
		self
	}

	pub fn window(mut self, window: Duration) -> Self {
		self.0.window = window;
		self
	}

	pub fn cooldown(mut self, cooldown: Duration) -> Self {
		self.0.cooldown = cooldown;
		self
	}

	/// Clamped to at least one source.
	pub fn max_sources(mut self, max_sources: usize) -> Self {
		self.0.max_sources = max_sources.max(1);
		self
	}

	pub fn stale_after(mut self, stale_after: Duration) -> Self {
		self.0.stale_after = stale_after;
		self
	}

	pub fn config(&self) -> RateLimiterConfig {
		self.0
	}

	pub fn build(self) -> RateLimiter {
		RateLimiter::new(self.0)
	}
}
impl Default for RateLimiterBuilder {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cooldown {
	Until(Instant),
	/// The configured cooldown reaches past what an `Instant` can hold
	UntilForgotten,
}
impl Cooldown {
	fn starting(now: Instant, cooldown: Duration) -> Self {
		now.checked_add(cooldown).map_or(Self::UntilForgotten, Self::Until)
	}

	#[inline]
	fn is_active(&self, now: Instant) -> bool {
		match self {
			Self::Until(expiry) => *expiry > now,
			Self::UntilForgotten => true,
		}
	}
}

#[derive(Debug)]
struct Entry {
	window_count: u32,
	window_start: Instant,
	last_seen: Instant,
	cooldown: Option<Cooldown>,
	/// Position in `SourceTable::recency`
	tick: u64,
}

#[derive(Debug, Default)]
struct SourceTable {
	entries: HashMap<IpAddr, Entry>,
	/// Sources ordered from least to most recently seen
	recency: BTreeMap<u64, IpAddr>,
	next_tick: u64,
	evictions: u64,
}
impl SourceTable {
	fn touch(&mut self, source: IpAddr, now: Instant, max_sources: usize) -> &mut Entry {
		let tick = self.next_tick;
		self.next_tick += 1;

		if let Some(entry) = self.entries.get(&source) {
			self.recency.remove(&entry.tick);
		} else if self.entries.len() >= max_sources {
			if let Some((_, evicted)) = self.recency.pop_first() {
				self.entries.remove(&evicted);
				self.evictions += 1;
			}
		}
		self.recency.insert(tick, source);

		let entry = self.entries.entry(source).or_insert(Entry {
			window_count: 0,
			window_start: now,
			last_seen: now,
			cooldown: None,
			tick,
		});
		entry.tick = tick;
		entry.last_seen = now;
		entry
	}
}

/// Per-source admission control over a fixed counting window, with a cooldown for sources
/// that exceed it.
///
/// Memory is bounded twice over: once the table holds `max_sources` entries the least
/// recently seen source is evicted to make room, and [`cleanup`](Self::cleanup) drops
/// sources that have gone quiet.
#[derive(Debug)]
pub struct RateLimiter {
	config: RateLimiterConfig,
	table: RwLock<SourceTable>,
}
impl RateLimiter {
	pub fn new(config: RateLimiterConfig) -> Self {
		Self {
			config: RateLimiterConfig {
				max_sources: config.max_sources.max(1),
				..config
			},
			table: RwLock::new(SourceTable::default()),
		}
	}

	#[inline(always)]
	pub fn builder() -> RateLimiterBuilder {
		RateLimiterBuilder::new()
	}

	#[inline(always)]
	pub fn config(&self) -> &RateLimiterConfig {
		&self.config
	}

	/// Records a packet from `source` and decides whether to admit it.
	///
	/// Rejects while the source is cooling down. Otherwise counts the packet against the
	/// current window; the packet that takes the count over the threshold starts a cooldown
	/// and is rejected along with everything else until the cooldown expires.
	pub fn allow(&self, source: IpAddr) -> bool {
		self.allow_at(source, Instant::now())
	}

	fn allow_at(&self, source: IpAddr, now: Instant) -> bool {
		let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
		let entry = table.touch(source, now, self.config.max_sources);

		if let Some(cooldown) = entry.cooldown {
			if cooldown.is_active(now) {
				return false;
			}
			entry.cooldown = None;
			entry.window_start = now;
			entry.window_count = 0;
		}

		if now.saturating_duration_since(entry.window_start) >= self.config.window {
			entry.window_start = now;
			entry.window_count = 0;
		}

		entry.window_count = entry.window_count.saturating_add(1);
		if entry.window_count > self.config.threshold {
			entry.cooldown = Some(Cooldown::starting(now, self.config.cooldown));
			return false;
		}

		true
	}

	/// Drops every source not seen for longer than `stale_after`, returning how many were dropped.
	///
	/// Sources still cooling down are kept until their cooldown has expired.
	pub fn cleanup(&self) -> usize {
		self.cleanup_at(Instant::now())
	}

	fn cleanup_at(&self, now: Instant) -> usize {
		let stale_after = self.config.stale_after;
		let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
		let SourceTable { entries, recency, .. } = &mut *table;

		let before = entries.len();
		entries.retain(|_, entry| {
			let stale = now.saturating_duration_since(entry.last_seen) > stale_after;
			let cooling_down = entry.cooldown.map_or(false, |cooldown| cooldown.is_active(now));
			if stale && !cooling_down {
				recency.remove(&entry.tick);
				false
			} else {
				true
			}
		});

		before - entries.len()
	}

	fn cooldown(&self, source: IpAddr) -> Option<Cooldown> {
		self.table
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.entries
			.get(&source)
			.and_then(|entry| entry.cooldown)
	}

	/// Whether `source` is currently rejected because of a cooldown.
	pub fn is_cooling_down(&self, source: IpAddr) -> bool {
		self.cooldown(source).map_or(false, |cooldown| cooldown.is_active(Instant::now()))
	}

	/// When `source`'s cooldown ends, if it has one.
	///
	/// A cooldown too long to represent as an [`Instant`] has no expiry: it lasts until the
	/// source is evicted, and this returns `None` even though
	/// [`is_cooling_down`](Self::is_cooling_down) is `true`.
	pub fn cooldown_expiry(&self, source: IpAddr) -> Option<Instant> {
		match self.cooldown(source)? {
			Cooldown::Until(expiry) => Some(expiry),
			Cooldown::UntilForgotten => None,
		}
	}

	/// Number of sources currently tracked.
	pub fn tracked_sources(&self) -> usize {
		self.table.read().unwrap_or_else(PoisonError::into_inner).entries.len()
	}

	/// Number of sources evicted to make room for new ones since the limiter was created.
	pub fn evictions(&self) -> u64 {
		self.table.read().unwrap_or_else(PoisonError::into_inner).evictions
	}
}
impl Default for RateLimiter {
	fn default() -> Self {
		Self::new(RateLimiterConfig::default())
	}
}

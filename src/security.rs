//! Receive-path guards.
//!
//! Anyone on the local network can send us datagrams, so every packet goes through a
//! [`SourceFilter`] and a [`RateLimiter`] before it gets anywhere near the parser.

mod filter;
pub use filter::SourceFilter;

mod ratelimit;
pub use ratelimit::{RateLimiter, RateLimiterBuilder, RateLimiterConfig};

//! The protocol-facing core of an mDNS / DNS-SD stack.
//!
//! * [`name`] and [`message`]: the DNS wire format, including name compression.
//! * [`transport`]: the multicast socket, configured to share port 5353 with the other resolvers on the host.
//! * [`security`]: source filtering and per-source rate limiting for everything we receive.
//! * [`listener`]: the receive pipeline (transport → filter → rate limiter → parser) on a background thread.
//!
//! Only IPv4 is supported for now.

#![cfg_attr(docsrs, feature(doc_cfg))]

use std::net::{Ipv4Addr, Ipv6Addr};

#[macro_use]
extern crate thiserror;

mod util;

pub mod context;
pub mod errors;
pub mod message;
pub mod name;
pub mod net;
pub mod pool;
pub mod security;
pub mod socket;
pub mod transport;

#[cfg(feature = "listener")]
#[cfg_attr(docsrs, doc(cfg(feature = "listener")))]
pub mod listener;

pub const MDNS_PORT: u16 = 5353;
pub const MDNS_V4_IP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
/// Reserved for IPv6 support; nothing in this crate uses it yet.
pub const MDNS_V6_IP: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);

/// mDNS packets are sent with the maximum IP TTL (RFC 6762 §11).
pub const MULTICAST_TTL: u32 = 255;

pub use context::Context;
pub use errors::Error;
pub use message::{build_query, build_response, parse_message, Message};
pub use name::{decode_name, encode_name};
pub use pool::RECV_BUFFER_SIZE;
pub use transport::{Transport, TransportBuilder};

//! Network interfaces and subnets
//!
//! Deciding *which* interfaces to use (skipping VPN tunnels, container bridges and so on) is up to
//! the caller: [`interfaces`] lists everything the host has, and the caller hands whatever subset it
//! likes to [`TransportBuilder::interfaces`](crate::transport::TransportBuilder::interfaces).

use std::net::Ipv4Addr;

/// The [`if_addrs`](https://crates.io/crates/if_addrs) crate is used to discover network interfaces on the system.
///
/// Here is a re-export for your convenience.
pub use if_addrs;

/// The IPv4 link-local block, 169.254.0.0/16 (RFC 3927).
pub const LINK_LOCAL_V4: Subnet = Subnet {
	network: Ipv4Addr::new(169, 254, 0, 0),
	prefix_len: 16,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// An IPv4 network in CIDR form.
pub struct Subnet {
	network: Ipv4Addr,
	prefix_len: u8,
}
impl Subnet {
	/// Creates a subnet from any address inside it; host bits are cleared.
	///
	/// `prefix_len` is clamped to 32.
	pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Self {
		let prefix_len = prefix_len.min(32);
		Self {
			network: Ipv4Addr::from(u32::from(addr) & mask(prefix_len)),
			prefix_len,
		}
	}

	/// Creates a subnet from an address and its dotted netmask.
	pub fn from_netmask(addr: Ipv4Addr, netmask: Ipv4Addr) -> Self {
		Self::new(addr, u32::from(netmask).leading_ones() as u8)
	}

	#[inline(always)]
	pub fn network(&self) -> Ipv4Addr {
		self.network
	}

	#[inline(always)]
	pub fn prefix_len(&self) -> u8 {
		self.prefix_len
	}

	#[inline]
	pub fn contains(&self, addr: Ipv4Addr) -> bool {
		u32::from(addr) & mask(self.prefix_len) == u32::from(self.network)
	}
}
impl std::fmt::Display for Subnet {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}/{}", self.network, self.prefix_len)
	}
}

#[inline]
fn mask(prefix_len: u8) -> u32 {
	u32::MAX.checked_shl(32 - u32::from(prefix_len)).unwrap_or(0)
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// An IPv4 address bound to a network interface, with the flags the transport cares about.
pub struct Interface {
	pub name: String,
	pub addr: Ipv4Addr,
	pub netmask: Ipv4Addr,
	/// Administratively up
	pub up: bool,
	/// Supports multicast
	pub multicast: bool,
	pub loopback: bool,
}
impl Interface {
	/// The subnet this address belongs to.
	#[inline]
	pub fn subnet(&self) -> Subnet {
		Subnet::from_netmask(self.addr, self.netmask)
	}

	/// Whether the multicast group can be joined on this interface: up, multicast-capable and not loopback.
	#[inline]
	pub fn is_multicast_candidate(&self) -> bool {
		self.up && self.multicast && !self.loopback
	}
}

/// Lists every IPv4 address on the host, one [`Interface`] per address.
///
/// An interface with several IPv4 addresses appears several times, once per address.
pub fn interfaces() -> Result<Vec<Interface>, std::io::Error> {
	Ok(if_addrs::get_if_addrs()?
		.into_iter()
		.filter_map(|iface| {
			let loopback = iface.is_loopback();
			match iface.addr {
				if_addrs::IfAddr::V4(addr) => {
					let flags = crate::util::iface_flags(&iface.name);
					Some(Interface {
						up: flags.up,
						multicast: flags.multicast,
						loopback: loopback || flags.loopback,
						addr: addr.ip,
						netmask: addr.netmask,
						name: iface.name,
					})
				}
				if_addrs::IfAddr::V6(_) => None,
			}
		})
		.collect())
}

use crate::net::{Interface, Subnet, LINK_LOCAL_V4};
use std::{
	net::IpAddr,
	sync::{PoisonError, RwLock},
};

/// Decides whether a packet's source address is plausible for one interface.
///
/// mDNS is link-local, so only link-local sources and sources on one of the interface's own
/// subnets are accepted. The subnets are captured when the filter is built so that checking a
/// packet never needs a system call.
#[derive(Debug)]
pub struct SourceFilter {
	interface: String,
	subnets: RwLock<Vec<Subnet>>,
}
impl SourceFilter {
	/// A filter for the subnet of a single interface address.
	pub fn new(iface: &Interface) -> Self {
		Self::from_subnets(iface.name.clone(), vec![iface.subnet()])
	}

	pub fn from_subnets(interface: impl Into<String>, subnets: Vec<Subnet>) -> Self {
		Self {
			interface: interface.into(),
			subnets: RwLock::new(subnets),
		}
	}

	/// A filter covering every IPv4 subnet currently bound to the interface called `name`.
	pub fn for_interface_name(name: &str) -> Result<Self, std::io::Error> {
		let subnets = crate::net::interfaces()?
			.into_iter()
			.filter(|iface| iface.name == name)
			.map(|iface| iface.subnet())
			.collect();

		Ok(Self::from_subnets(name, subnets))
	}

	/// The interface this filter was built for.
	#[inline(always)]
	pub fn interface(&self) -> &str {
		&self.interface
	}

	pub fn subnets(&self) -> Vec<Subnet> {
		self.subnets.read().unwrap_or_else(PoisonError::into_inner).clone()
	}

	/// Replaces the cached subnets, for when the interface's addresses change.
	pub fn refresh(&self, subnets: Vec<Subnet>) {
		*self.subnets.write().unwrap_or_else(PoisonError::into_inner) = subnets;
	}

	/// Accepts link-local IPv4 sources from anywhere and other IPv4 sources only from this interface's subnets.
	///
	/// IPv6 sources are always rejected.
	pub fn is_valid(&self, source: IpAddr) -> bool {
		let source = match source {
			IpAddr::V4(source) => source,
			IpAddr::V6(_) => return false,
		};

		if LINK_LOCAL_V4.contains(source) {
			return true;
		}

		self.subnets
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.iter()
			.any(|subnet| subnet.contains(source))
	}
}

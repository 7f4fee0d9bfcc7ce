//! Platform-specific socket configuration.
//!
//! Other resolvers (Avahi, mDNSResponder, browsers...) usually already hold UDP 5353, so the
//! socket has to be made shareable before it is bound. How that is done differs per platform, and
//! each platform gets its own [`SocketConfigurator`].

use crate::{net::Interface, MDNS_V4_IP, MULTICAST_TTL};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Applies the port-sharing options a platform needs before `bind`.
pub trait SocketConfigurator: Send + Sync {
	fn configure_socket(&self, socket: &socket2::Socket) -> Result<(), std::io::Error>;
}

/// Linux only load-balances `SO_REUSEPORT` sockets from 3.9 onwards; older kernels reject the option.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub struct LinuxConfigurator {
	pub kernel: Option<(u32, u32)>,
}
#[cfg(any(target_os = "linux", target_os = "android"))]
impl LinuxConfigurator {
	pub const MIN_REUSE_PORT_KERNEL: (u32, u32) = (3, 9);

	pub fn detect() -> Self {
		Self {
			kernel: crate::util::kernel_version(),
		}
	}

	#[inline]
	pub fn supports_reuse_port(&self) -> bool {
		matches!(self.kernel, Some(kernel) if kernel >= Self::MIN_REUSE_PORT_KERNEL)
	}
}
#[cfg(any(target_os = "linux", target_os = "android"))]
impl SocketConfigurator for LinuxConfigurator {
	fn configure_socket(&self, socket: &socket2::Socket) -> Result<(), std::io::Error> {
		socket.set_reuse_address(true)?;
		if self.supports_reuse_port() {
			socket.set_reuse_port(true)?;
		}
		Ok(())
	}
}

/// The BSD family (macOS included) has always had `SO_REUSEPORT`, and mDNSResponder expects it.
#[cfg(all(unix, not(any(target_os = "linux", target_os = "android", target_os = "solaris", target_os = "illumos"))))]
pub struct BsdConfigurator;
#[cfg(all(unix, not(any(target_os = "linux", target_os = "android", target_os = "solaris", target_os = "illumos"))))]
impl SocketConfigurator for BsdConfigurator {
	fn configure_socket(&self, socket: &socket2::Socket) -> Result<(), std::io::Error> {
		socket.set_reuse_address(true)?;
		socket.set_reuse_port(true)?;
		Ok(())
	}
}

/// No `SO_REUSEPORT` here: `SO_REUSEADDR` alone already allows sharing the port.
#[cfg(any(windows, target_os = "solaris", target_os = "illumos"))]
pub struct ReuseAddrConfigurator;
#[cfg(any(windows, target_os = "solaris", target_os = "illumos"))]
impl SocketConfigurator for ReuseAddrConfigurator {
	fn configure_socket(&self, socket: &socket2::Socket) -> Result<(), std::io::Error> {
		socket.set_reuse_address(true)
	}
}

/// The configurator for the platform we were built for.
pub fn platform_configurator() -> Box<dyn SocketConfigurator> {
	#[cfg(any(target_os = "linux", target_os = "android"))]
	{
		Box::new(LinuxConfigurator::detect())
	}

	#[cfg(all(unix, not(any(target_os = "linux", target_os = "android", target_os = "solaris", target_os = "illumos"))))]
	{
		Box::new(BsdConfigurator)
	}

	#[cfg(any(windows, target_os = "solaris", target_os = "illumos"))]
	{
		Box::new(ReuseAddrConfigurator)
	}
}

/// Creates, configures and binds the IPv4 multicast socket, then joins the group on every candidate interface.
///
/// Returns the socket together with the interfaces the group was joined on, which may be empty.
pub(crate) fn bind_multicast_v4(
	configurator: &dyn SocketConfigurator,
	port: u16,
	interfaces: &[Interface],
) -> Result<(std::net::UdpSocket, Vec<Interface>), std::io::Error> {
	let socket = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::DGRAM, Some(socket2::Protocol::UDP))?;

	configurator.configure_socket(&socket)?;

	socket.bind(&socket2::SockAddr::from(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))))?;

	let mut joined: Vec<Interface> = Vec::new();
	for iface in interfaces.iter().filter(|iface| iface.is_multicast_candidate()) {
		// An interface with several addresses only needs to join once
		if joined.iter().any(|other| other.addr == iface.addr) {
			continue;
		}

		match socket.join_multicast_v4(&MDNS_V4_IP, &iface.addr) {
			Ok(()) => joined.push(iface.clone()),
			Err(err) => log::debug!("Failed to join {MDNS_V4_IP} on {} ({}): {err}", iface.name, iface.addr),
		}
	}

	socket.set_multicast_ttl_v4(MULTICAST_TTL)?;
	socket.set_multicast_loop_v4(true)?;

	Ok((socket.into(), joined))
}

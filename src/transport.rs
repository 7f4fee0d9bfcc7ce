//! The multicast transport: owns the mDNS socket and its receive buffers.

use crate::{
	context::Context,
	errors::NetworkError,
	net::Interface,
	pool::{BufferPool, RECV_BUFFER_SIZE},
	socket::{bind_multicast_v4, platform_configurator, SocketConfigurator},
	MDNS_PORT, MDNS_V4_IP,
};
use std::{
	net::{Shutdown, SocketAddr, SocketAddrV4, UdpSocket},
	sync::{Arc, PoisonError, RwLock},
	time::{Duration, Instant},
};

/// How long `close` waits for in-flight calls to let go of the socket.
const CLOSE_WAIT: Duration = Duration::from_secs(1);

/// Configures and opens a [`Transport`].
pub struct TransportBuilder {
	port: u16,
	interfaces: Option<Vec<Interface>>,
	configurator: Option<Box<dyn SocketConfigurator>>,
	prealloc_buffers: usize,
}
impl TransportBuilder {
	pub fn new() -> Self {
		Self {
			port: MDNS_PORT,
			interfaces: None,
			configurator: None,
			prealloc_buffers: 1,
		}
	}

	/// The UDP port to bind. Defaults to 5353; `0` picks an ephemeral port, which is handy in tests.
	pub fn port(mut self, port: u16) -> Self {
		self.port = port;
		self
	}

	/// The candidate interfaces to join the multicast group on.
	///
	/// Interfaces that are down, not multicast-capable or loopback are skipped. Without this,
	/// every interface reported by [`net::interfaces`](crate::net::interfaces) is a candidate.
	pub fn interfaces(mut self, interfaces: Vec<Interface>) -> Self {
		self.interfaces = Some(interfaces);
		self
	}

	/// Overrides the platform's [`SocketConfigurator`].
	pub fn configurator(mut self, configurator: Box<dyn SocketConfigurator>) -> Self {
		self.configurator = Some(configurator);
		self
	}

	/// How many receive buffers to allocate up front.
	pub fn prealloc_buffers(mut self, count: usize) -> Self {
		self.prealloc_buffers = count;
		self
	}

	/// Creates the socket, makes it shareable, binds it and joins the mDNS group.
	///
	/// Fails with [`NetworkError::NoInterfacesJoined`] if the group could not be joined on any interface.
	pub fn open(self) -> Result<Transport, NetworkError> {
		let TransportBuilder {
			port,
			interfaces,
			configurator,
			prealloc_buffers,
		} = self;

		let interfaces = match interfaces {
			Some(interfaces) => interfaces,
			None => crate::net::interfaces().map_err(NetworkError::Socket)?,
		};
		let configurator = configurator.unwrap_or_else(platform_configurator);

		let (socket, joined) = bind_multicast_v4(&*configurator, port, &interfaces).map_err(NetworkError::Socket)?;
		if joined.is_empty() {
			return Err(NetworkError::NoInterfacesJoined);
		}

		log::debug!(
			"Joined {MDNS_V4_IP} on {}",
			joined.iter().map(|iface| format!("{} ({})", iface.name, iface.addr)).collect::<Vec<_>>().join(", ")
		);

		Ok(Transport {
			socket: RwLock::new(Some(Arc::new(socket))),
			joined,
			pool: BufferPool::new(prealloc_buffers),
			group: SocketAddr::V4(SocketAddrV4::new(MDNS_V4_IP, MDNS_PORT)),
		})
	}
}
impl Default for TransportBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// An open mDNS multicast socket.
///
/// `send` may be called from any number of threads at once; every call is a single datagram
/// write, so concurrent packets never interleave (though their order is unspecified).
/// `receive` expects a single reader: concurrent readers race on the socket's read timeout.
pub struct Transport {
	socket: RwLock<Option<Arc<UdpSocket>>>,
	joined: Vec<Interface>,
	pool: BufferPool,
	group: SocketAddr,
}
impl Transport {
	#[inline(always)]
	pub fn builder() -> TransportBuilder {
		TransportBuilder::new()
	}

	/// The interfaces the multicast group was joined on.
	#[inline(always)]
	pub fn joined_interfaces(&self) -> &[Interface] {
		&self.joined
	}

	/// The mDNS group address, `224.0.0.251:5353`.
	#[inline(always)]
	pub fn group(&self) -> SocketAddr {
		self.group
	}

	pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
		self.socket()?.local_addr().map_err(NetworkError::Socket)
	}

	fn socket(&self) -> Result<Arc<UdpSocket>, NetworkError> {
		self.socket
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.as_ref()
			.cloned()
			.ok_or(NetworkError::Closed)
	}

	/// Sends `packet` to `dest` as a single datagram.
	///
	/// A canceled or expired `ctx` fails before anything is written. A partial write is an error.
	pub fn send(&self, ctx: &Context, packet: &[u8], dest: SocketAddr) -> Result<(), NetworkError> {
		ctx.check()?;

		let socket = self.socket()?;
		let written = socket.send_to(packet, dest).map_err(NetworkError::Send)?;
		if written != packet.len() {
			return Err(NetworkError::ShortWrite {
				written,
				expected: packet.len(),
			});
		}

		Ok(())
	}

	/// Sends `packet` to the mDNS multicast group.
	#[inline]
	pub fn send_multicast(&self, ctx: &Context, packet: &[u8]) -> Result<(), NetworkError> {
		self.send(ctx, packet, self.group)
	}

	fn is_closed(&self) -> bool {
		self.socket.read().unwrap_or_else(PoisonError::into_inner).is_none()
	}

	/// Waits for one datagram and returns a copy of it together with its source address.
	///
	/// The context deadline becomes the socket read timeout; without a deadline the read
	/// blocks until a datagram arrives or the transport is closed. An elapsed read timeout is
	/// [`NetworkError::Timeout`]. A datagram that does not fit in [`RECV_BUFFER_SIZE`] is
	/// discarded with [`NetworkError::PacketTooLarge`].
	pub fn receive(&self, ctx: &Context) -> Result<(Vec<u8>, SocketAddr), NetworkError> {
		let remaining = ctx.check()?;

		let socket = self.socket()?;
		socket.set_read_timeout(remaining).map_err(NetworkError::Receive)?;

		let mut buf = self.pool.acquire();
		let res = socket.recv_from(&mut buf[..]);
		drop(socket);

		if self.is_closed() {
			return Err(NetworkError::Closed);
		}

		match res {
			// mDNS payloads are always smaller than the buffer, so a full one was cut short
			Ok((len, _)) if len >= RECV_BUFFER_SIZE => Err(NetworkError::PacketTooLarge),
			Ok((len, source)) => Ok((buf[..len].to_vec(), source)),
			Err(err) if matches!(err.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => Err(NetworkError::Timeout),
			Err(err) if is_message_too_large(&err) => Err(NetworkError::PacketTooLarge),
			Err(err) => Err(NetworkError::Receive(err)),
		}
	}

	/// Closes the socket, reporting any error from the OS.
	///
	/// Closing twice returns [`NetworkError::Closed`], as does any send or receive afterwards.
	/// A receive blocked on another thread is woken up and returns [`NetworkError::Closed`];
	/// `close` waits for it to let go of the socket before closing the descriptor. If some
	/// call still holds the socket after a second, [`NetworkError::CloseInFlight`] is returned
	/// and the descriptor is closed when that call returns.
	pub fn close(&self) -> Result<(), NetworkError> {
		let socket = self
			.socket
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.take()
			.ok_or(NetworkError::Closed)?;

		let mut socket = match Arc::try_unwrap(socket) {
			Ok(socket) => return close_socket(socket).map_err(NetworkError::Close),
			Err(in_flight) => in_flight,
		};

		// Unconnected UDP sockets report ENOTCONN here, but blocked readers are still woken
		socket2::SockRef::from(&*socket).shutdown(Shutdown::Both).ok();

		let deadline = Instant::now() + CLOSE_WAIT;
		loop {
			std::thread::sleep(Duration::from_millis(1));

			socket = match Arc::try_unwrap(socket) {
				Ok(socket) => return close_socket(socket).map_err(NetworkError::Close),
				Err(in_flight) => in_flight,
			};

			if Instant::now() >= deadline {
				return Err(NetworkError::CloseInFlight);
			}
		}
	}
}

#[cfg(unix)]
fn is_message_too_large(err: &std::io::Error) -> bool {
	err.raw_os_error() == Some(libc::EMSGSIZE)
}

#[cfg(windows)]
fn is_message_too_large(err: &std::io::Error) -> bool {
	err.raw_os_error() == Some(winapi::shared::winerror::WSAEMSGSIZE as i32)
}

/// Closes the descriptor explicitly; dropping a `UdpSocket` would discard the error.
#[cfg(unix)]
fn close_socket(socket: UdpSocket) -> Result<(), std::io::Error> {
	use std::os::unix::io::IntoRawFd;

	let fd = socket.into_raw_fd();
	if unsafe { libc::close(fd) } == 0 {
		Ok(())
	} else {
		Err(std::io::Error::last_os_error())
	}
}

#[cfg(windows)]
fn close_socket(socket: UdpSocket) -> Result<(), std::io::Error> {
	use std::os::windows::io::IntoRawSocket;

	let raw = socket.into_raw_socket();
	if unsafe { winapi::um::winsock2::closesocket(raw as winapi::um::winsock2::SOCKET) } == 0 {
		Ok(())
	} else {
		Err(std::io::Error::last_os_error())
	}
}

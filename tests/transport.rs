use lanbeam::{
	context::Context,
	errors::NetworkError,
	message::{rtype, Question},
	build_query, parse_message, Transport,
};
use std::{
	net::{Ipv4Addr, SocketAddr, UdpSocket},
	sync::Arc,
	time::{Duration, Instant},
};

/// Opens a transport on an ephemeral port, or `None` if this machine has no multicast-capable interface.
fn open() -> Option<Transport> {
	match Transport::builder().port(0).open() {
		Ok(transport) => Some(transport),
		Err(err) => {
			println!("Skipping: {err}");
			None
		}
	}
}

fn loopback_dest(transport: &Transport) -> SocketAddr {
	SocketAddr::from((Ipv4Addr::LOCALHOST, transport.local_addr().unwrap().port()))
}

#[test]
fn receives_unicast_datagrams() {
	let Some(transport) = open() else { return };

	let query = build_query(&[Question::new("helloworld.local", rtype::A)]).unwrap();
	let peer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
	peer.send_to(&query, loopback_dest(&transport)).unwrap();

	let (packet, source) = transport.receive(&Context::background().timeout(Duration::from_secs(5))).unwrap();
	assert_eq!(packet, query);
	assert_eq!(source, peer.local_addr().unwrap());

	let message = parse_message(&packet).unwrap();
	assert_eq!(message.questions[0].name, "helloworld.local");
}

#[test]
fn sends_unicast_datagrams() {
	let Some(transport) = open() else { return };

	let peer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
	peer.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

	let query = build_query(&[Question::new("_http._tcp.local", rtype::PTR)]).unwrap();
	transport.send(&Context::background(), &query, peer.local_addr().unwrap()).unwrap();

	let mut buf = [0u8; 512];
	let (len, _) = peer.recv_from(&mut buf).unwrap();
	assert_eq!(&buf[..len], &query[..]);
}

#[test]
fn concurrent_senders_never_interleave() {
	let Some(transport) = open() else { return };
	let transport = Arc::new(transport);

	let peer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
	peer.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
	let dest = peer.local_addr().unwrap();

	let threads = (0..4u8)
		.map(|n| {
			let transport = transport.clone();
			std::thread::spawn(move || {
				let packet = vec![n; 200];
				for _ in 0..10 {
					transport.send(&Context::background(), &packet, dest).unwrap();
				}
			})
		})
		.collect::<Vec<_>>();

	for thread in threads {
		thread.join().unwrap();
	}

	let mut buf = [0u8; 512];
	for _ in 0..40 {
		let (len, _) = peer.recv_from(&mut buf).unwrap();
		assert_eq!(len, 200);
		assert!(buf[..len].iter().all(|b| *b == buf[0]));
	}
}

#[test]
fn canceled_context_fails_without_io() {
	let Some(transport) = open() else { return };

	let ctx = Context::background();
	ctx.cancel();

	assert!(matches!(transport.receive(&ctx), Err(NetworkError::Canceled)));
	assert!(matches!(transport.send_multicast(&ctx, &[0; 12]), Err(NetworkError::Canceled)));
}

#[test]
fn deadlines_and_timeouts() {
	let Some(transport) = open() else { return };

	let expired = Context::background().deadline(Instant::now());
	assert!(matches!(transport.receive(&expired), Err(NetworkError::DeadlineExceeded)));

	let started = Instant::now();
	let res = transport.receive(&Context::background().timeout(Duration::from_millis(100)));
	assert!(matches!(res, Err(NetworkError::Timeout)), "{res:?}");
	assert!(res.unwrap_err().is_timeout());
	assert!(started.elapsed() >= Duration::from_millis(90));
}

#[test]
fn close() {
	let Some(transport) = open() else { return };

	transport.close().unwrap();
	assert!(matches!(transport.close(), Err(NetworkError::Closed)));

	let ctx = Context::background().timeout(Duration::from_millis(100));
	assert!(matches!(transport.receive(&ctx), Err(NetworkError::Closed)));
	assert!(matches!(transport.send_multicast(&ctx, &[0; 12]), Err(NetworkError::Closed)));
	assert!(matches!(transport.local_addr(), Err(NetworkError::Closed)));
}

#[test]
fn joined_interfaces_are_multicast_candidates() {
	let Some(transport) = open() else { return };

	assert!(!transport.joined_interfaces().is_empty());
	assert!(transport.joined_interfaces().iter().all(|iface| iface.is_multicast_candidate()));
	assert_eq!(transport.group(), SocketAddr::from((lanbeam::MDNS_V4_IP, lanbeam::MDNS_PORT)));
}

#[test]
fn close_waits_for_a_receive_with_a_deadline() {
	let Some(transport) = open() else { return };
	let transport = Arc::new(transport);
	let port = transport.local_addr().unwrap().port();

	let reader = {
		let transport = transport.clone();
		std::thread::spawn(move || transport.receive(&Context::background().timeout(Duration::from_millis(300))))
	};
	std::thread::sleep(Duration::from_millis(50));

	transport.close().unwrap();
	assert!(matches!(reader.join().unwrap(), Err(NetworkError::Closed)));

	// The descriptor is really gone, so the port is free again
	UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).unwrap();
}

#[cfg(target_os = "linux")]
#[test]
fn close_wakes_a_blocked_receive() {
	let Some(transport) = open() else { return };
	let transport = Arc::new(transport);
	let dest = loopback_dest(&transport);

	let reader = {
		let transport = transport.clone();
		std::thread::spawn(move || transport.receive(&Context::background()))
	};
	std::thread::sleep(Duration::from_millis(100));

	let started = Instant::now();
	transport.close().unwrap();
	assert!(started.elapsed() < Duration::from_secs(1));
	assert!(matches!(reader.join().unwrap(), Err(NetworkError::Closed)));

	// Nothing is delivered after close
	let peer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
	peer.send_to(b"after close", dest).ok();
	assert!(matches!(
		transport.receive(&Context::background().timeout(Duration::from_millis(100))),
		Err(NetworkError::Closed)
	));
}

#[test]
fn oversized_datagrams_are_per_packet_errors() {
	let Some(transport) = open() else { return };
	let dest = loopback_dest(&transport);
	let peer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();

	peer.send_to(&vec![0u8; lanbeam::RECV_BUFFER_SIZE + 100], dest).unwrap();
	let err = transport.receive(&Context::background().timeout(Duration::from_secs(5))).unwrap_err();
	assert!(matches!(err, NetworkError::PacketTooLarge), "{err:?}");
	assert!(err.is_per_packet());
}

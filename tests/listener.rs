use lanbeam::{
	build_query, build_response,
	listener::{Listener, ListenerEvent},
	message::{rtype, Question, ResourceRecord},
	net::Subnet,
	security::{RateLimiterBuilder, SourceFilter},
	Transport,
};
use std::{
	net::{Ipv4Addr, SocketAddr, UdpSocket},
	sync::{mpsc, Arc},
	time::{Duration, Instant},
};

fn open() -> Option<Arc<Transport>> {
	match Transport::builder().port(0).open() {
		Ok(transport) => Some(Arc::new(transport)),
		Err(err) => {
			println!("Skipping: {err}");
			None
		}
	}
}

fn loopback_filter() -> SourceFilter {
	SourceFilter::from_subnets("lo", vec![Subnet::new(Ipv4Addr::new(127, 0, 0, 0), 8)])
}

#[test]
fn listener_delivers_queries_and_responses() {
	simple_logger::SimpleLogger::new().init().ok();

	let Some(transport) = open() else { return };
	let dest = SocketAddr::from((Ipv4Addr::LOCALHOST, transport.local_addr().unwrap().port()));

	let (tx, rx) = mpsc::channel();
	let listener = Listener::builder()
		.filters(vec![loopback_filter()])
		.poll_interval(Duration::from_millis(50))
		.build(transport.clone());

	let handle = listener
		.run_in_background(move |event| {
			tx.send(event).ok();
		})
		.unwrap();

	let peer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();

	let query = build_query(&[Question::new("helloworld.local", rtype::A)]).unwrap();
	peer.send_to(&query, dest).unwrap();

	// Garbage in between is dropped without stopping the listener
	peer.send_to(&[0xFF; 7], dest).unwrap();

	let response = build_response(&[ResourceRecord::a("helloworld.local", Ipv4Addr::new(192, 168, 1, 69), 120)]).unwrap();
	peer.send_to(&response, dest).unwrap();

	match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
		ListenerEvent::Query(inbound) => {
			assert_eq!(inbound.source, peer.local_addr().unwrap());
			assert_eq!(inbound.message.questions[0].name, "helloworld.local");
		}
		event => panic!("expected a query, got {event:?}"),
	}

	match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
		ListenerEvent::Response(inbound) => assert_eq!(inbound.message.answers[0].data(), &[192, 168, 1, 69]),
		event => panic!("expected a response, got {event:?}"),
	}

	let stats = handle.stats().unwrap();
	assert_eq!(stats.accepted(), 2);
	assert_eq!(stats.malformed(), 1);

	assert!(!handle.is_finished());
	handle.shutdown().unwrap();
}

#[test]
fn listener_drops_filtered_and_rate_limited_sources() {
	let Some(transport) = open() else { return };
	let dest = SocketAddr::from((Ipv4Addr::LOCALHOST, transport.local_addr().unwrap().port()));

	let (tx, rx) = mpsc::channel();
	let listener = Listener::builder()
		.filters(vec![loopback_filter()])
		.rate_limiter(RateLimiterBuilder::new().threshold(3).config())
		.poll_interval(Duration::from_millis(50))
		.build(transport.clone());
	let stats = listener.stats();

	let handle = listener
		.run_in_background(move |event| {
			tx.send(event).ok();
		})
		.unwrap();

	let peer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
	let query = build_query(&[Question::new("helloworld.local", rtype::A)]).unwrap();
	for _ in 0..10 {
		peer.send_to(&query, dest).unwrap();
	}

	for _ in 0..3 {
		rx.recv_timeout(Duration::from_secs(5)).unwrap();
	}
	assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());

	assert_eq!(stats.accepted(), 3);
	assert_eq!(stats.rate_limited(), 7);

	handle.shutdown().unwrap();
}

#[test]
fn listener_stops_when_the_transport_is_closed() {
	let Some(transport) = open() else { return };

	let handle = Listener::builder()
		.poll_interval(Duration::from_millis(50))
		.build(transport.clone())
		.run_in_background(|_| {})
		.unwrap();

	transport.close().unwrap();

	let mut waited = Duration::ZERO;
	while !handle.is_finished() && waited < Duration::from_secs(5) {
		std::thread::sleep(Duration::from_millis(10));
		waited += Duration::from_millis(10);
	}
	assert!(handle.is_finished());
	assert!(handle.shutdown().is_err());
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
	let started = Instant::now();
	while started.elapsed() < timeout {
		if condition() {
			return true;
		}
		std::thread::sleep(Duration::from_millis(10));
	}
	condition()
}

#[test]
fn oversized_datagrams_do_not_stop_the_listener() {
	let Some(transport) = open() else { return };
	let dest = SocketAddr::from((Ipv4Addr::LOCALHOST, transport.local_addr().unwrap().port()));

	let (tx, rx) = mpsc::channel();
	let handle = Listener::builder()
		.filters(vec![loopback_filter()])
		.poll_interval(Duration::from_millis(50))
		.build(transport.clone())
		.run_in_background(move |event| {
			tx.send(event).ok();
		})
		.unwrap();

	let peer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
	peer.send_to(&vec![0u8; lanbeam::RECV_BUFFER_SIZE + 100], dest).unwrap();
	peer.send_to(&build_query(&[Question::new("helloworld.local", rtype::A)]).unwrap(), dest).unwrap();

	assert!(matches!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), ListenerEvent::Query(_)));

	let stats = handle.stats().unwrap();
	assert_eq!(stats.receive_errors(), 1);
	assert!(!handle.is_finished());
	handle.shutdown().unwrap();
}

#[test]
fn slow_handlers_do_not_stall_reception() {
	let Some(transport) = open() else { return };
	let dest = SocketAddr::from((Ipv4Addr::LOCALHOST, transport.local_addr().unwrap().port()));

	let listener = Listener::builder()
		.filters(vec![loopback_filter()])
		.poll_interval(Duration::from_millis(50))
		.build(transport.clone());
	let stats = listener.stats();

	let (tx, rx) = mpsc::channel();
	let handle = listener
		.run_in_background(move |event| {
			std::thread::sleep(Duration::from_secs(1));
			tx.send(event).ok();
		})
		.unwrap();

	let peer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
	let query = build_query(&[Question::new("helloworld.local", rtype::A)]).unwrap();
	for _ in 0..5 {
		peer.send_to(&query, dest).unwrap();
	}

	// Every packet is read while the handler is still busy with the first one
	assert!(wait_until(Duration::from_millis(800), || stats.accepted() == 5));
	assert!(rx.try_recv().is_err());

	rx.recv_timeout(Duration::from_secs(5)).unwrap();
	handle.shutdown().unwrap();
}

#[test]
fn full_queue_drops_and_counts() {
	let Some(transport) = open() else { return };
	let dest = SocketAddr::from((Ipv4Addr::LOCALHOST, transport.local_addr().unwrap().port()));

	let listener = Listener::builder()
		.filters(vec![loopback_filter()])
		.queue_len(1)
		.poll_interval(Duration::from_millis(50))
		.build(transport.clone());
	let stats = listener.stats();

	let handle = listener
		.run_in_background(|_| std::thread::sleep(Duration::from_secs(1)))
		.unwrap();

	let peer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
	let query = build_query(&[Question::new("helloworld.local", rtype::A)]).unwrap();
	for _ in 0..5 {
		peer.send_to(&query, dest).unwrap();
	}

	assert!(wait_until(Duration::from_secs(2), || stats.accepted() == 5));
	// One is being handled, one is queued
	assert!(wait_until(Duration::from_millis(500), || stats.overflowed() >= 3));

	handle.shutdown().unwrap();
}

#[test]
fn shutdown_does_not_wait_for_the_poll_interval() {
	let Some(transport) = open() else { return };

	let handle = Listener::builder()
		.poll_interval(Duration::from_secs(30))
		.build(transport.clone())
		.run_in_background(|_| {})
		.unwrap();
	std::thread::sleep(Duration::from_millis(50));

	let started = Instant::now();
	handle.shutdown().unwrap();
	assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn huge_intervals_do_not_panic() {
	let Some(transport) = open() else { return };
	let dest = SocketAddr::from((Ipv4Addr::LOCALHOST, transport.local_addr().unwrap().port()));

	let (tx, rx) = mpsc::channel();
	let handle = Listener::builder()
		.filters(vec![loopback_filter()])
		.rate_limiter(RateLimiterBuilder::new().threshold(1).cooldown(Duration::MAX).config())
		.cleanup_interval(Duration::MAX)
		.poll_interval(Duration::MAX)
		.build(transport.clone())
		.run_in_background(move |event| {
			tx.send(event).ok();
		})
		.unwrap();

	let peer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
	let query = build_query(&[Question::new("helloworld.local", rtype::A)]).unwrap();
	for _ in 0..3 {
		peer.send_to(&query, dest).unwrap();
	}

	rx.recv_timeout(Duration::from_secs(5)).unwrap();
	let stats = handle.stats().unwrap();
	assert!(wait_until(Duration::from_secs(2), || stats.rate_limited() == 2));
	assert!(!handle.is_finished());

	handle.shutdown().unwrap();
}

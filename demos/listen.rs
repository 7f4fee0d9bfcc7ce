use lanbeam::{
	build_query,
	context::Context,
	listener::{Listener, ListenerEvent},
	message::{rtype, Question},
	Transport,
};
use std::{sync::Arc, time::Duration};

fn main() {
	simple_logger::SimpleLogger::new().with_level(log::LevelFilter::Debug).init().unwrap();

	let transport = Arc::new(Transport::builder().open().expect("Failed to open the mDNS transport"));

	for iface in transport.joined_interfaces() {
		println!("Listening on {} ({}/{})", iface.name, iface.addr, iface.subnet().prefix_len());
	}

	let listener = Listener::builder().build(transport.clone());
	let stats = listener.stats();

	let handle = listener
		.run_in_background(|event| match event {
			ListenerEvent::Query(inbound) => {
				for question in &inbound.message.questions {
					println!("{} asked for {} (type {})", inbound.source, question.name, question.qtype);
				}
			}
			ListenerEvent::Response(inbound) => {
				for record in inbound.message.answers.iter().chain(&inbound.message.additional) {
					println!("{} answered {} (type {}, ttl {})", inbound.source, record.name(), record.rtype(), record.ttl());
				}
			}
		})
		.unwrap();

	let query = build_query(&[Question::new("_services._dns-sd._udp.local", rtype::PTR)]).unwrap();
	transport.send_multicast(&Context::background(), &query).unwrap();

	std::thread::sleep(Duration::from_secs(10));

	println!(
		"accepted {}, filtered {}, rate limited {}, malformed {}",
		stats.accepted(),
		stats.filtered(),
		stats.rate_limited(),
		stats.malformed()
	);

	handle.shutdown().unwrap();
	transport.close().unwrap();
}

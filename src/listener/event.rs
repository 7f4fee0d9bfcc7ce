use crate::message::Message;
use std::{net::SocketAddr, sync::Arc, time::Instant};

pub type EventHandler = Arc<dyn Fn(ListenerEvent) + Send + Sync + 'static>;

#[derive(Debug, Clone)]
/// A message that made it through the receive pipeline.
pub struct Inbound {
	pub source: SocketAddr,
	pub message: Message,
	pub received: Instant,
}

#[derive(Debug, Clone)]
pub enum ListenerEvent {
	Query(Arc<Inbound>),
	Response(Arc<Inbound>),
}
impl ListenerEvent {
	pub(super) fn from_message(source: SocketAddr, message: Message) -> Self {
		let is_response = message.is_response();
		let inbound = Arc::new(Inbound {
			source,
			message,
			received: Instant::now(),
		});

		if is_response {
			Self::Response(inbound)
		} else {
			Self::Query(inbound)
		}
	}

	#[inline]
	pub fn inbound(&self) -> &Arc<Inbound> {
		match self {
			Self::Query(inbound) | Self::Response(inbound) => inbound,
		}
	}
}

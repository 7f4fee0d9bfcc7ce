use crate::{errors::ValidationError, name::encode_name};
use std::net::Ipv4Addr;

/// Resource record and query types used by mDNS and DNS-SD.
pub mod rtype {
	pub const A: u16 = 1;
	pub const PTR: u16 = 12;
	pub const TXT: u16 = 16;
	pub const AAAA: u16 = 28;
	pub const SRV: u16 = 33;
	pub const NSEC: u16 = 47;
	pub const ANY: u16 = 255;
}

/// The Internet class.
pub const CLASS_IN: u16 = 1;

/// Top bit of the class field: cache-flush on records, unicast-response on questions.
pub(crate) const CLASS_TOP_BIT: u16 = 0x8000;

#[derive(Debug, Clone, PartialEq, Eq)]
/// An entry in the question section.
pub struct Question {
	pub name: String,
	pub qtype: u16,
	pub qclass: u16,
	/// The mDNS "QU" bit: the querier would like a unicast reply
	pub unicast_response: bool,
}
impl Question {
	/// A multicast-response question in the Internet class.
	pub fn new(name: impl Into<String>, qtype: u16) -> Self {
		Self {
			name: name.into(),
			qtype,
			qclass: CLASS_IN,
			unicast_response: false,
		}
	}

	pub fn unicast(mut self) -> Self {
		self.unicast_response = true;
		self
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// A resource record: a typed, timed piece of data attached to a name.
///
/// The cache-flush flag travels as the top bit of the class field on the wire;
/// [`class`](Self::class) never includes it.
pub struct ResourceRecord {
	name: String,
	rtype: u16,
	class: u16,
	cache_flush: bool,
	ttl: u32,
	data: Vec<u8>,
}
impl ResourceRecord {
	pub fn new(name: impl Into<String>, rtype: u16, class: u16, cache_flush: bool, ttl: u32, data: Vec<u8>) -> Self {
		Self {
			name: name.into(),
			rtype,
			class: class & !CLASS_TOP_BIT,
			cache_flush,
			ttl,
			data,
		}
	}

	/// An `A` record. Address records are unique to their host, so cache-flush is set.
	pub fn a(name: impl Into<String>, addr: Ipv4Addr, ttl: u32) -> Self {
		Self::new(name, rtype::A, CLASS_IN, true, ttl, addr.octets().to_vec())
	}

	/// A `PTR` record pointing at `target`. Shared records never set cache-flush.
	pub fn ptr(name: impl Into<String>, target: &str, ttl: u32) -> Result<Self, ValidationError> {
		Ok(Self::new(name, rtype::PTR, CLASS_IN, false, ttl, encode_name(target)?))
	}

	/// An `SRV` record locating a service instance at `target:port`.
	pub fn srv(name: impl Into<String>, priority: u16, weight: u16, port: u16, target: &str, ttl: u32) -> Result<Self, ValidationError> {
		let target = encode_name(target)?;

		let mut data = Vec::with_capacity(6 + target.len());
		data.extend_from_slice(&priority.to_be_bytes());
		data.extend_from_slice(&weight.to_be_bytes());
		data.extend_from_slice(&port.to_be_bytes());
		data.extend_from_slice(&target);

		Ok(Self::new(name, rtype::SRV, CLASS_IN, true, ttl, data))
	}

	/// A `TXT` record made of character-strings, each at most 255 bytes.
	///
	/// An empty set of strings encodes as a single empty string, as RFC 6763 §6.1 requires.
	pub fn txt<T: AsRef<[u8]>>(name: impl Into<String>, strings: &[T], ttl: u32) -> Result<Self, ValidationError> {
		let mut data = Vec::new();
		for string in strings.iter().map(AsRef::as_ref) {
			if string.len() > 255 {
				return Err(ValidationError::TxtStringTooLong { len: string.len() });
			}
			data.push(string.len() as u8);
			data.extend_from_slice(string);
		}
		if data.is_empty() {
			data.push(0);
		}

		Ok(Self::new(name, rtype::TXT, CLASS_IN, true, ttl, data))
	}

	#[inline(always)]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[inline(always)]
	pub fn rtype(&self) -> u16 {
		self.rtype
	}

	#[inline(always)]
	pub fn class(&self) -> u16 {
		self.class
	}

	#[inline(always)]
	pub fn cache_flush(&self) -> bool {
		self.cache_flush
	}

	#[inline(always)]
	pub fn ttl(&self) -> u32 {
		self.ttl
	}

	#[inline(always)]
	/// Raw record data, exactly as it appeared on the wire.
	///
	/// Names inside the data of parsed records may contain compression pointers into the original message.
	pub fn data(&self) -> &[u8] {
		&self.data
	}

	/// The wire class field, with the cache-flush bit folded in.
	pub(crate) fn wire_class(&self) -> u16 {
		if self.cache_flush {
			self.class | CLASS_TOP_BIT
		} else {
			self.class
		}
	}
}

use crate::errors::WireFormatError;

/// Length of the fixed message header.
pub const HEADER_LEN: usize = 12;

const QR: u16 = 1 << 15;
const AA: u16 = 1 << 10;
const TC: u16 = 1 << 9;
const RD: u16 = 1 << 8;
const RA: u16 = 1 << 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// The fixed 12-byte message header.
///
/// When a [`Message`](super::Message) is encoded the four counts are always taken from the
/// section lengths; the count fields here only report what was read off the wire.
pub struct Header {
	pub id: u16,
	/// QR: `true` for responses
	pub response: bool,
	pub opcode: u8,
	/// AA
	pub authoritative: bool,
	/// TC
	pub truncated: bool,
	/// RD
	pub recursion_desired: bool,
	/// RA
	pub recursion_available: bool,
	pub rcode: u8,
	pub qdcount: u16,
	pub ancount: u16,
	pub nscount: u16,
	pub arcount: u16,
}
impl Header {
	/// Header of an mDNS query: every flag clear.
	pub fn query() -> Self {
		Self::default()
	}

	/// Header of an mDNS response: QR and AA set, opcode and rcode zero.
	pub fn response() -> Self {
		Self {
			response: true,
			authoritative: true,
			..Self::default()
		}
	}

	pub fn flags(&self) -> u16 {
		let mut flags = (u16::from(self.opcode & 0x0F) << 11) | u16::from(self.rcode & 0x0F);
		for (set, bit) in [
			(self.response, QR),
			(self.authoritative, AA),
			(self.truncated, TC),
			(self.recursion_desired, RD),
			(self.recursion_available, RA),
		] {
			if set {
				flags |= bit;
			}
		}
		flags
	}

	pub(crate) fn write(&self, out: &mut Vec<u8>, counts: [u16; 4]) {
		out.extend_from_slice(&self.id.to_be_bytes());
		out.extend_from_slice(&self.flags().to_be_bytes());
		for count in counts {
			out.extend_from_slice(&count.to_be_bytes());
		}
	}

	pub(crate) fn read(buf: &[u8]) -> Result<Self, WireFormatError> {
		let buf: &[u8; HEADER_LEN] = buf
			.get(..HEADER_LEN)
			.and_then(|header| header.try_into().ok())
			.ok_or(WireFormatError::TruncatedHeader)?;

		let word = |i: usize| u16::from_be_bytes([buf[i], buf[i + 1]]);
		let flags = word(2);

		Ok(Self {
			id: word(0),
			response: flags & QR != 0,
			opcode: ((flags >> 11) & 0x0F) as u8,
			authoritative: flags & AA != 0,
			truncated: flags & TC != 0,
			recursion_desired: flags & RD != 0,
			recursion_available: flags & RA != 0,
			rcode: (flags & 0x0F) as u8,
			qdcount: word(4),
			ancount: word(6),
			nscount: word(8),
			arcount: word(10),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn response_flags() {
		assert_eq!(Header::response().flags(), 0x8400);
		assert_eq!(Header::query().flags(), 0);
	}

	#[test]
	fn reads_back_written_header() {
		let header = Header {
			id: 0xBEEF,
			truncated: true,
			recursion_desired: true,
			..Header::response()
		};

		let mut out = Vec::new();
		header.write(&mut out, [1, 2, 3, 4]);
		assert_eq!(out.len(), HEADER_LEN);

		let read = Header::read(&out).unwrap();
		assert_eq!(
			read,
			Header {
				qdcount: 1,
				ancount: 2,
				nscount: 3,
				arcount: 4,
				..header
			}
		);
	}

	#[test]
	fn short_header() {
		assert_eq!(Header::read(&[0; 11]), Err(WireFormatError::TruncatedHeader));
	}
}

//! The mDNS message codec.
//!
//! [`build_response`] and [`build_query`] produce the bytes handed to
//! [`Transport::send`](crate::transport::Transport::send), and [`parse_message`] turns
//! received datagrams back into a [`Message`]. Parsing is all-or-nothing: any malformed
//! field fails the whole message.

use crate::{
	errors::{ValidationError, WireFormatError},
	name::{decode_name, encode_name, NameCompressor},
};

mod header;
pub use header::{Header, HEADER_LEN};

mod record;
use record::CLASS_TOP_BIT;
pub use record::{rtype, Question, ResourceRecord, CLASS_IN};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// A complete mDNS message.
pub struct Message {
	pub header: Header,
	pub questions: Vec<Question>,
	pub answers: Vec<ResourceRecord>,
	pub authority: Vec<ResourceRecord>,
	pub additional: Vec<ResourceRecord>,
}
impl Message {
	pub fn query(questions: Vec<Question>) -> Self {
		Self {
			header: Header::query(),
			questions,
			..Self::default()
		}
	}

	pub fn response(answers: Vec<ResourceRecord>) -> Self {
		Self {
			header: Header::response(),
			answers,
			..Self::default()
		}
	}

	#[inline(always)]
	pub fn is_response(&self) -> bool {
		self.header.response
	}

	/// Serializes the message, taking the header counts from the section lengths.
	///
	/// With `compress` set, owner names are written with compression pointers to
	/// earlier occurrences. Record data is always written as-is.
	pub fn encode(&self, compress: bool) -> Result<Vec<u8>, ValidationError> {
		let counts = [
			section_count(self.questions.len())?,
			section_count(self.answers.len())?,
			section_count(self.authority.len())?,
			section_count(self.additional.len())?,
		];

		let mut out = Vec::with_capacity(512);
		self.header.write(&mut out, counts);

		let mut names = if compress { NameWriter::Compressed(NameCompressor::new()) } else { NameWriter::Plain };

		for question in self.questions.iter() {
			names.write(&mut out, &question.name)?;
			out.extend_from_slice(&question.qtype.to_be_bytes());
			let qclass = if question.unicast_response {
				question.qclass | CLASS_TOP_BIT
			} else {
				question.qclass
			};
			out.extend_from_slice(&qclass.to_be_bytes());
		}

		for record in self.answers.iter().chain(self.authority.iter()).chain(self.additional.iter()) {
			write_record(&mut out, &mut names, record)?;
		}

		Ok(out)
	}
}

enum NameWriter {
	Plain,
	Compressed(NameCompressor),
}
impl NameWriter {
	fn write(&mut self, out: &mut Vec<u8>, name: &str) -> Result<(), ValidationError> {
		match self {
			Self::Plain => out.extend_from_slice(&encode_name(name)?),
			Self::Compressed(compressor) => compressor.write_name(out, name)?,
		}
		Ok(())
	}
}

fn section_count(len: usize) -> Result<u16, ValidationError> {
	u16::try_from(len).map_err(|_| ValidationError::TooManyRecords)
}

fn write_record(out: &mut Vec<u8>, names: &mut NameWriter, record: &ResourceRecord) -> Result<(), ValidationError> {
	let rdlength = u16::try_from(record.data().len()).map_err(|_| ValidationError::RdataTooLong { len: record.data().len() })?;

	names.write(out, record.name())?;
	out.extend_from_slice(&record.rtype().to_be_bytes());
	out.extend_from_slice(&record.wire_class().to_be_bytes());
	out.extend_from_slice(&record.ttl().to_be_bytes());
	out.extend_from_slice(&rdlength.to_be_bytes());
	out.extend_from_slice(record.data());

	Ok(())
}

/// Builds an authoritative response carrying `answers`.
///
/// The header has QR and AA set, opcode and rcode zero, and ANCOUNT equal to the
/// number of answers. Names are written uncompressed.
pub fn build_response(answers: &[ResourceRecord]) -> Result<Vec<u8>, ValidationError> {
	let mut out = Vec::with_capacity(HEADER_LEN + answers.iter().map(|answer| answer.name().len() + 12 + answer.data().len()).sum::<usize>());
	Header::response().write(&mut out, [0, section_count(answers.len())?, 0, 0]);

	let mut names = NameWriter::Plain;
	for answer in answers {
		write_record(&mut out, &mut names, answer)?;
	}

	Ok(out)
}

/// Builds a query for `questions`, with a zero message ID as RFC 6762 §18.1 recommends.
pub fn build_query(questions: &[Question]) -> Result<Vec<u8>, ValidationError> {
	Message::query(questions.to_vec()).encode(true)
}

/// Parses a complete message.
///
/// Messages with a non-zero opcode or rcode are rejected (RFC 6762 §18.3, §18.11).
pub fn parse_message(buf: &[u8]) -> Result<Message, WireFormatError> {
	let header = Header::read(buf)?;

	if header.opcode != 0 {
		return Err(WireFormatError::UnsupportedOpcode(header.opcode));
	}
	if header.rcode != 0 {
		return Err(WireFormatError::UnsupportedRcode(header.rcode));
	}

	let mut reader = Reader { buf, pos: HEADER_LEN };

	// Every entry takes at least 5 bytes, so don't trust the counts for preallocation
	let capacity = |count: u16| usize::from(count).min(buf.len() / 5);

	let mut questions = Vec::with_capacity(capacity(header.qdcount));
	for _ in 0..header.qdcount {
		let name = reader.name()?;
		let qtype = reader.u16("question type")?;
		let qclass = reader.u16("question class")?;
		questions.push(Question {
			name,
			qtype,
			qclass: qclass & !CLASS_TOP_BIT,
			unicast_response: qclass & CLASS_TOP_BIT != 0,
		});
	}

	let mut sections = [
		Vec::with_capacity(capacity(header.ancount)),
		Vec::with_capacity(capacity(header.nscount)),
		Vec::with_capacity(capacity(header.arcount)),
	];
	for (section, count) in sections.iter_mut().zip([header.ancount, header.nscount, header.arcount]) {
		for _ in 0..count {
			section.push(reader.record()?);
		}
	}
	let [answers, authority, additional] = sections;

	Ok(Message {
		header,
		questions,
		answers,
		authority,
		additional,
	})
}

struct Reader<'a> {
	buf: &'a [u8],
	pos: usize,
}
impl<'a> Reader<'a> {
	fn bytes(&mut self, len: usize, context: &'static str) -> Result<&'a [u8], WireFormatError> {
		let bytes = self
			.pos
			.checked_add(len)
			.and_then(|end| self.buf.get(self.pos..end))
			.ok_or(WireFormatError::Truncated { context })?;
		self.pos += len;
		Ok(bytes)
	}

	fn u16(&mut self, context: &'static str) -> Result<u16, WireFormatError> {
		let bytes = self.bytes(2, context)?;
		Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
	}

	fn u32(&mut self, context: &'static str) -> Result<u32, WireFormatError> {
		let bytes = self.bytes(4, context)?;
		Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
	}

	fn name(&mut self) -> Result<String, WireFormatError> {
		if self.pos >= self.buf.len() {
			return Err(WireFormatError::Truncated { context: "name" });
		}
		let (name, next) = decode_name(self.buf, self.pos)?;
		self.pos = next;
		Ok(name)
	}

	fn record(&mut self) -> Result<ResourceRecord, WireFormatError> {
		let name = self.name()?;
		let rtype = self.u16("record type")?;
		let class = self.u16("record class")?;
		let ttl = self.u32("record ttl")?;
		let rdlength = self.u16("record data length")?;
		let data = self.bytes(usize::from(rdlength), "record data")?;

		Ok(ResourceRecord::new(name, rtype, class, class & CLASS_TOP_BIT != 0, ttl, data.to_vec()))
	}
}

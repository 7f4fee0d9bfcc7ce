//! Domain name encoding and decoding, including RFC 1035 §4.1.4 message compression.

use crate::errors::{ValidationError, WireFormatError};
use std::collections::{BTreeSet, HashMap};

/// Maximum length of a single label.
pub const MAX_LABEL_LEN: usize = 63;

/// Maximum length of an encoded name, including length bytes and the root label.
pub const MAX_NAME_LEN: usize = 255;

const POINTER_MASK: u8 = 0xC0;

/// Compression pointers only have 14 bits to address a prior name.
const MAX_POINTER_TARGET: usize = 0x3FFF;

fn validate_label(label: &str) -> Result<(), ValidationError> {
	if label.is_empty() {
		return Err(ValidationError::EmptyLabel);
	}

	if label.len() > MAX_LABEL_LEN {
		return Err(ValidationError::LabelTooLong {
			label: label.to_owned(),
			len: label.len(),
		});
	}

	if let Some(ch) = label.chars().find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')) {
		return Err(ValidationError::InvalidCharacter { label: label.to_owned(), ch });
	}

	if label.starts_with('-') || label.ends_with('-') {
		return Err(ValidationError::InvalidHyphen { label: label.to_owned() });
	}

	Ok(())
}

/// Splits a name into validated labels, stripping one trailing separator.
fn labels(name: &str) -> Result<Vec<&str>, ValidationError> {
	let name = name.strip_suffix('.').unwrap_or(name);
	if name.is_empty() {
		return Ok(Vec::new());
	}

	let labels = name.split('.').collect::<Vec<_>>();
	for label in labels.iter() {
		validate_label(label)?;
	}

	let len = labels.iter().map(|label| label.len() + 1).sum::<usize>() + 1;
	if len > MAX_NAME_LEN {
		return Err(ValidationError::NameTooLong { len });
	}

	Ok(labels)
}

/// Encodes `name` as a sequence of length-prefixed labels terminated by the root label.
///
/// A single trailing `.` is accepted and ignored, so `"host.local"` and `"host.local."`
/// encode identically. The root name (`""` or `"."`) encodes to a single zero byte.
pub fn encode_name(name: &str) -> Result<Vec<u8>, ValidationError> {
	let labels = labels(name)?;

	let mut out = Vec::with_capacity(labels.iter().map(|label| label.len() + 1).sum::<usize>() + 1);
	for label in labels {
		out.push(label.len() as u8);
		out.extend_from_slice(label.as_bytes());
	}
	out.push(0);

	Ok(out)
}

/// Decodes the name starting at `offset` in `buf`, following compression pointers.
///
/// Returns the name without a trailing dot (the root name decodes to `""`) and the
/// offset just past the name in the original stream: past the terminating zero byte,
/// or past the first compression pointer if the name was compressed.
pub fn decode_name(buf: &[u8], offset: usize) -> Result<(String, usize), WireFormatError> {
	if offset >= buf.len() {
		return Err(WireFormatError::OffsetOutOfBounds { offset, len: buf.len() });
	}

	let mut name = String::new();
	let mut encoded_len = 1;
	let mut pos = offset;
	let mut next_offset = None;
	let mut visited = BTreeSet::new();

	loop {
		if !visited.insert(pos) {
			// Can only happen after a jump
			return Err(WireFormatError::InvalidCompressionPointer { offset: pos, target: pos });
		}

		let len = *buf.get(pos).ok_or(WireFormatError::TruncatedLabel { offset: pos })?;

		match len & POINTER_MASK {
			0x00 => {}

			POINTER_MASK => {
				let low = *buf.get(pos + 1).ok_or(WireFormatError::TruncatedPointer { offset: pos })?;
				let target = (usize::from(len & !POINTER_MASK) << 8) | usize::from(low);

				if target >= pos || visited.contains(&target) {
					return Err(WireFormatError::InvalidCompressionPointer { offset: pos, target });
				}

				next_offset.get_or_insert(pos + 2);
				pos = target;
				continue;
			}

			// Also catches every length byte above 63
			_ => return Err(WireFormatError::UnsupportedLabelType(len)),
		}

		if len == 0 {
			let next_offset = next_offset.unwrap_or(pos + 1);
			return Ok((name, next_offset));
		}

		// The `00` prefix already caps the length at 63
		let len = usize::from(len);
		encoded_len += len + 1;
		if encoded_len > MAX_NAME_LEN {
			return Err(WireFormatError::NameTooLong);
		}

		let label = buf.get(pos + 1..pos + 1 + len).ok_or(WireFormatError::TruncatedLabel { offset: pos })?;
		let label = std::str::from_utf8(label).map_err(|_| WireFormatError::InvalidLabelEncoding { offset: pos })?;

		if !name.is_empty() {
			name.push('.');
		}
		name.push_str(label);

		pos += 1 + len;
	}
}

/// Writes names into a message buffer, replacing repeated suffixes with compression pointers.
///
/// Suffixes are matched case-insensitively, as DNS names are.
#[derive(Debug, Default)]
pub struct NameCompressor {
	suffixes: HashMap<String, u16>,
}
impl NameCompressor {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `name` to `out`, compressing against every name previously written through this compressor.
	///
	/// `out` must be the whole message buffer, since pointers are offsets from its start.
	pub fn write_name(&mut self, out: &mut Vec<u8>, name: &str) -> Result<(), ValidationError> {
		let labels = labels(name)?;

		for i in 0..labels.len() {
			let suffix = labels[i..].join(".").to_ascii_lowercase();

			if let Some(&target) = self.suffixes.get(&suffix) {
				out.extend_from_slice(&(target | 0xC000).to_be_bytes());
				return Ok(());
			}

			if out.len() <= MAX_POINTER_TARGET {
				self.suffixes.insert(suffix, out.len() as u16);
			}

			out.push(labels[i].len() as u8);
			out.extend_from_slice(labels[i].as_bytes());
		}

		out.push(0);
		Ok(())
	}
}

//! Error types returned by the codec, transport and listener.
//!
//! Errors fall into three categories, mirrored by [`Error`]:
//!
//! * [`ValidationError`]: something we were asked to *build* breaks the naming or record rules.
//! * [`WireFormatError`]: bytes received from the network break the wire format.
//! * [`NetworkError`]: the socket could not be set up, written, read or closed.

#[derive(Debug, Error)]
/// Any error produced by this crate.
pub enum Error {
	#[error("{0}")]
	/// A name or record failed construction-time rules
	Validation(#[from] ValidationError),

	#[error("{0}")]
	/// Bytes received from the network are malformed
	WireFormat(#[from] WireFormatError),

	#[error("{0}")]
	/// A socket operation failed
	Network(#[from] NetworkError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// A name or record could not be built.
pub enum ValidationError {
	#[error("Label {label:?} is {len} bytes long (max 63)")]
	/// A label is longer than 63 bytes
	LabelTooLong { label: String, len: usize },

	#[error("Name encodes to {len} bytes (max 255)")]
	/// The encoded name is longer than 255 bytes
	NameTooLong { len: usize },

	#[error("Name contains an empty label")]
	/// Two separators in a row, or a leading separator
	EmptyLabel,

	#[error("Label {label:?} contains invalid character {ch:?}")]
	/// A label contains something other than ASCII alphanumerics, `-` or `_`
	InvalidCharacter { label: String, ch: char },

	#[error("Label {label:?} starts or ends with a hyphen")]
	/// A label starts or ends with `-`
	InvalidHyphen { label: String },

	#[error("Record data is {len} bytes long (max 65535)")]
	/// Record data does not fit in the 16-bit RDLENGTH field
	RdataTooLong { len: usize },

	#[error("TXT string is {len} bytes long (max 255)")]
	/// A single TXT character-string is longer than 255 bytes
	TxtStringTooLong { len: usize },

	#[error("Too many records in one section (max 65535)")]
	/// A message section does not fit in its 16-bit count field
	TooManyRecords,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Bytes received from the network violate the wire format.
pub enum WireFormatError {
	#[error("Offset {offset} is outside the {len} byte message")]
	/// Decoding was asked to start outside the buffer
	OffsetOutOfBounds { offset: usize, len: usize },

	#[error("Truncated label at offset {offset}")]
	/// A label's length byte promises more bytes than the buffer holds
	TruncatedLabel { offset: usize },

	#[error("Truncated compression pointer at offset {offset}")]
	/// Only the first byte of a 2-byte compression pointer is present
	TruncatedPointer { offset: usize },

	#[error("Invalid compression pointer at offset {offset} (target {target})")]
	/// A compression pointer loops, points forwards or points outside the message
	InvalidCompressionPointer { offset: usize, target: usize },

	#[error("Decoded name exceeds 255 bytes")]
	/// The decoded name would encode to more than 255 bytes
	NameTooLong,

	#[error("Unsupported label type 0x{0:02x}")]
	/// The length byte uses the reserved `01` or `10` prefix
	///
	/// Every length byte from 64 to 191 has one of these prefixes, so this is also how an
	/// oversized label shows up.
	UnsupportedLabelType(u8),

	#[error("Label at offset {offset} is not valid UTF-8")]
	/// A label's bytes are not UTF-8
	InvalidLabelEncoding { offset: usize },

	#[error("Message is shorter than the 12 byte header")]
	/// The buffer cannot hold a message header
	TruncatedHeader,

	#[error("Message truncated while reading {context}")]
	/// A fixed-width field or record data runs past the end of the message
	Truncated { context: &'static str },

	#[error("Unsupported opcode {0}")]
	/// mDNS only carries standard queries (opcode 0)
	UnsupportedOpcode(u8),

	#[error("Unsupported response code {0}")]
	/// mDNS messages always carry RCODE 0
	UnsupportedRcode(u8),
}

#[derive(Debug, Error)]
/// A socket lifecycle, send, receive or close failure.
pub enum NetworkError {
	#[error("Operation canceled")]
	/// The context was canceled before the operation started
	Canceled,

	#[error("Deadline exceeded")]
	/// The context deadline passed before the operation started
	DeadlineExceeded,

	#[error("Receive timed out")]
	/// The socket read deadline elapsed
	Timeout,

	#[error("Datagram larger than the {} byte receive buffer", crate::RECV_BUFFER_SIZE)]
	/// A datagram did not fit in the receive buffer and was discarded
	PacketTooLarge,

	#[error("Receive failed: {0}")]
	/// The OS reported an error while reading
	Receive(#[source] std::io::Error),

	#[error("Send failed: {0}")]
	/// The OS reported an error while writing
	Send(#[source] std::io::Error),

	#[error("Short write: {written} of {expected} bytes sent")]
	/// Fewer bytes were written than supplied
	ShortWrite { written: usize, expected: usize },

	#[error("Socket setup failed: {0}")]
	/// The socket could not be created, configured or bound
	Socket(#[source] std::io::Error),

	#[error("Could not join the multicast group on any interface")]
	/// No candidate interface accepted the multicast membership
	NoInterfacesJoined,

	#[error("Close failed: {0}")]
	/// The OS reported an error while closing the socket
	Close(#[source] std::io::Error),

	#[error("Transport is closed")]
	/// The transport has already been closed
	Closed,

	#[error("Socket is still in use by another call; it will be closed when that call returns")]
	/// A send or receive on another thread kept hold of the socket while closing
	CloseInFlight,

	#[error("Failed to start the listener runtime: {0}")]
	/// The listener's async runtime could not be built
	Runtime(#[source] std::io::Error),
}

impl NetworkError {
	#[inline]
	/// Whether this error is a read deadline elapsing rather than a real failure.
	pub fn is_timeout(&self) -> bool {
		matches!(self, NetworkError::Timeout)
	}

	/// Whether this error only concerns a single inbound datagram, leaving the socket usable.
	///
	/// Oversized datagrams and ICMP errors reported on the next read (port or host unreachable)
	/// fall in this category.
	pub fn is_per_packet(&self) -> bool {
		match self {
			NetworkError::PacketTooLarge => true,
			NetworkError::Receive(err) => matches!(
				err.kind(),
				std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionRefused
			),
			_ => false,
		}
	}
}

#[derive(Debug, Error)]
/// An error occurred while shutting down a background listener
pub enum ShutdownError {
	#[error("{0}")]
	/// The listener loop stopped because of a network error
	Network(#[from] NetworkError),

	#[error("Listener thread panicked")]
	/// The listener thread panicked
	ThreadJoinError(Box<dyn std::any::Any + Send + 'static>),
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::{Error as IoError, ErrorKind};

	#[test]
	fn per_packet_receive_errors() {
		assert!(NetworkError::PacketTooLarge.is_per_packet());
		assert!(NetworkError::Receive(IoError::from(ErrorKind::ConnectionReset)).is_per_packet());
		assert!(NetworkError::Receive(IoError::from(ErrorKind::ConnectionRefused)).is_per_packet());

		assert!(!NetworkError::Receive(IoError::from(ErrorKind::PermissionDenied)).is_per_packet());
		assert!(!NetworkError::Closed.is_per_packet());
		assert!(!NetworkError::Timeout.is_per_packet());
	}
}

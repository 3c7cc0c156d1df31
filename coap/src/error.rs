use std::fmt;

/// Why a confirmable exchange or session ultimately failed to complete.
///
/// Surfaced to the application through [`crate::handler::EventHandler::on_nack`];
/// never produced for decode failures, which are absorbed at the dispatch
/// boundary and only ever observed as a log line.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Reason {
	/// `MAX_RETRANSMIT` was exceeded without an ACK.
	Timeout,
	/// The peer replied with a Reset.
	Rst,
	/// The security layer reported a handshake or record failure.
	TlsFailure,
	/// The transport reported an unreachable peer via ICMP.
	Icmp,
	/// The exchange was cancelled by the application before completion.
	Cancelled,
}

impl fmt::Display for Reason {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match self {
			Self::Timeout => "exchange timed out",
			Self::Rst => "peer reset the message",
			Self::TlsFailure => "TLS/DTLS handshake or record failure",
			Self::Icmp => "peer unreachable (ICMP)",
			Self::Cancelled => "exchange cancelled",
		})
	}
}

impl std::error::Error for Reason {}

/// Why a PDU could not be decoded or enqueued.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CodecError {
	/// The datagram or stream frame is too short, has a bad version, or an invalid token length.
	FormatError,
	/// An option failed to parse, or a critical option was unrecognized.
	BadOption,
	/// The underlying transport could not send or receive.
	TransportError,
	/// CSM negotiation with the peer did not complete in time.
	HandshakeFailed,
	/// The send queue is at capacity.
	QueueFull,
}

impl fmt::Display for CodecError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match self {
			Self::FormatError => "malformed PDU",
			Self::BadOption => "unrecognized critical option",
			Self::TransportError => "transport error",
			Self::HandshakeFailed => "CSM handshake failed",
			Self::QueueFull => "send queue full",
		})
	}
}

impl std::error::Error for CodecError {}

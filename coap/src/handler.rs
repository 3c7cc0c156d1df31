use crate::error::Reason;
use crate::pdu::Pdu;
use crate::session::Session;

/// Outcome of [`EventHandler::on_response`] for a response that arrived as
/// its own CON (not piggybacked on the original ACK): whether to ACK or RST it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HandlerResult {
	Ok,
	Fail,
}

/// Application callbacks for events the endpoint core can observe but can't
/// resolve on its own. Every method is a no-op by default — register only
/// the ones an application needs, the way [`crate::transport::Transport::push_inbound`]
/// defaults to doing nothing.
pub trait EventHandler {
	/// A response PDU was matched to an outstanding request by token.
	/// Returning `Fail` for a separately-received CON response sends RST
	/// instead of ACK; a piggybacked ACK needs no reply either way.
	fn on_response(&mut self, _session: &Session, _response: &Pdu) -> HandlerResult {
		HandlerResult::Ok
	}

	/// An outstanding exchange failed to complete: retransmission exhausted,
	/// the peer reset it, the transport/security layer failed, or the
	/// application cancelled it.
	fn on_nack(&mut self, _session: &Session, _request: &Pdu, _reason: Reason) {}

	/// A keepalive Ping was received (unreliable empty CON or reliable
	/// Signaling PING); the matching Pong has already been sent.
	fn on_ping(&mut self, _session: &Session) {}

	/// A keepalive Pong arrived, resolving an outstanding Ping.
	fn on_pong(&mut self, _session: &Session) {}
}

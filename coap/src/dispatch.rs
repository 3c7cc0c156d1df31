use runtime::time::Ticks;

use crate::options::KnownOptions;
use crate::pdu::{option, Code, Kind, Opt, Pdu};
use crate::session::Session;

/// Outcome handed back to the context after a single PDU has been dispatched.
pub enum Outcome {
	/// A reply must be sent back to the same session.
	Reply(Pdu),
	/// A response PDU was matched to an outstanding request by token.
	Delivered(Pdu),
	/// Nothing to do — duplicate already answered, empty ACK, stray RST, etc.
	Nothing,
}

/// Anything the application registers to answer non-signaling requests.
pub trait ResourceHandler {
	fn handle(&mut self, request: &Pdu) -> Pdu;
}

fn unknown_criticals(options: &[Opt], known: &KnownOptions) -> Vec<u16> {
	options.iter().map(|o| o.number).filter(|&n| option::is_critical(n) && !known.is_known(n)).collect()
}

/// Build the diagnostic 4.02 Bad Option response listing the offending
/// option numbers as a plain-text payload (RFC 7252 doesn't mandate a format).
fn bad_option_response(req: &Pdu, offending: &[u16]) -> Pdu {
	let ack_kind = if req.kind == Kind::Con { Kind::Ack } else { Kind::Non };
	let mut resp = Pdu::empty(ack_kind, req.mid);
	resp.code = Code::BAD_OPTION;
	resp.token = req.token.clone();

	let text = offending.iter().map(u16::to_string).collect::<Vec<_>>().join(",");
	resp.payload = text.as_bytes().into();

	resp
}

fn piggyback_ack(req: &Pdu, response: Pdu) -> Pdu {
	let mut resp = response;
	resp.kind = if req.kind == Kind::Con { Kind::Ack } else { Kind::Non };
	resp.mid = req.mid;
	resp.token = req.token.clone();
	resp
}

/// Apply the five dispatch rules (in order) to a single decoded PDU.
///
/// 1. Duplicate CON — replay the cached reply if one exists, else drop.
/// 2. Response PDU (class 2/4/5) — match against the session's pending
///    request table by token; deliver or silently drop if unmatched.
/// 3. Non-empty request — validate critical options, then hand off to the
///    resource handler or reject with 4.02.
/// 4. Empty CON (ping) — answer with an empty ACK (pong).
/// 5. Empty ACK/RST with no correlated exchange — drop.
pub fn dispatch(
	session: &mut Session,
	pdu: Pdu,
	now: Ticks,
	exchange_lifetime: Ticks,
	known: &KnownOptions,
	handler: &mut dyn ResourceHandler,
) -> Outcome {
	if pdu.kind == Kind::Con && session.dedup.observe(pdu.mid, now, exchange_lifetime) {
		return match session.dedup.cached_response(pdu.mid) {
			Some(cached) => Outcome::Reply(cached.clone()),
			None => Outcome::Nothing,
		};
	}

	if pdu.code.is_response() {
		let matched = session.take_request(&pdu.token).is_some();
		return if matched { Outcome::Delivered(pdu) } else { Outcome::Nothing };
	}

	if pdu.code.is_request() {
		let offending = unknown_criticals(&pdu.options, known);

		let reply = if !offending.is_empty() {
			bad_option_response(&pdu, &offending)
		} else {
			let response = handler.handle(&pdu);
			piggyback_ack(&pdu, response)
		};

		if pdu.kind == Kind::Con {
			session.dedup.cache_response(pdu.mid, reply.clone());
		}

		return Outcome::Reply(reply);
	}

	if pdu.code.is_empty() {
		return match pdu.kind {
			Kind::Con => Outcome::Reply(Pdu::empty(Kind::Ack, pdu.mid)),
			Kind::Ack | Kind::Rst => Outcome::Nothing,
			Kind::Non => Outcome::Nothing,
		};
	}

	Outcome::Nothing
}

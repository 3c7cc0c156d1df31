use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use coap::dispatch::{dispatch, Outcome, ResourceHandler};
use coap::options::KnownOptions;
use coap::pdu::{option, Code, Kind, Opt, Pdu};
use coap::session::{Session, Variant};
use collections::bytes::Store;

fn known() -> KnownOptions {
	KnownOptions::default()
}

fn peer() -> SocketAddr {
	SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5683)
}

struct Echo;

impl ResourceHandler for Echo {
	fn handle(&mut self, request: &Pdu) -> Pdu {
		let mut resp = Pdu::empty(Kind::Con, 0);
		resp.code = if request.code == Code::GET { Code::CONTENT } else { Code::CHANGED };
		resp
	}
}

const EXCHANGE_LIFETIME: u64 = 247_000;

#[test]
fn request_gets_a_piggybacked_ack() {
	let mut session = Session::new(peer(), Variant::Udp, 0);
	let mut req = Pdu::request(Code::GET, Store::from(&[1][..]));
	req.mid = 10;

	let outcome = dispatch(&mut session, req, 0, EXCHANGE_LIFETIME, &known(), &mut Echo);

	match outcome {
		Outcome::Reply(reply) => {
			assert_eq!(reply.kind, Kind::Ack);
			assert_eq!(reply.mid, 10);
			assert_eq!(reply.code, Code::CONTENT);
			assert_eq!(&reply.token[..], &[1]);
		}
		_ => panic!("expected a piggybacked ACK"),
	}
}

#[test]
fn duplicate_con_replays_the_cached_ack() {
	let mut session = Session::new(peer(), Variant::Udp, 0);
	let mut req = Pdu::request(Code::GET, Store::from(&[1][..]));
	req.mid = 11;

	let first = dispatch(&mut session, req.clone(), 0, EXCHANGE_LIFETIME, &known(), &mut Echo);
	let Outcome::Reply(first_reply) = first else { panic!("expected a reply") };

	let second = dispatch(&mut session, req, 100, EXCHANGE_LIFETIME, &known(), &mut Echo);

	match second {
		Outcome::Reply(reply) => {
			assert_eq!(reply.mid, first_reply.mid);
			assert_eq!(reply.code, first_reply.code);
		}
		_ => panic!("expected the cached reply to be replayed"),
	}
}

#[test]
fn unknown_critical_option_forces_bad_option() {
	let mut session = Session::new(peer(), Variant::Udp, 0);
	let mut req = Pdu::request(Code::GET, Store::from(&[2][..]));
	req.mid = 12;
	req.options.push(Opt::new(21, b"unknown-critical")); // odd => critical, not in the known set

	let outcome = dispatch(&mut session, req, 0, EXCHANGE_LIFETIME, &known(), &mut Echo);

	match outcome {
		Outcome::Reply(reply) => {
			assert_eq!(reply.code, Code::BAD_OPTION);
			assert_eq!(&reply.payload[..], b"21");
		}
		_ => panic!("expected a 4.02"),
	}
}

#[test]
fn known_critical_option_is_accepted() {
	let mut session = Session::new(peer(), Variant::Udp, 0);
	let mut req = Pdu::request(Code::GET, Store::from(&[3][..]));
	req.mid = 13;
	req.options.push(Opt::new(option::URI_PATH, b"known-critical"));

	let outcome = dispatch(&mut session, req, 0, EXCHANGE_LIFETIME, &known(), &mut Echo);

	assert!(matches!(outcome, Outcome::Reply(reply) if reply.code == Code::CONTENT));
}

#[test]
fn response_matched_by_token_is_delivered() {
	let mut session = Session::new(peer(), Variant::Udp, 0);
	let token = Store::from(&[9, 9][..]);
	session.track_request(token.clone(), 20);

	let mut resp = Pdu::request(Code::CONTENT, token);
	resp.kind = Kind::Ack;
	resp.mid = 20;

	let outcome = dispatch(&mut session, resp, 0, EXCHANGE_LIFETIME, &known(), &mut Echo);

	assert!(matches!(outcome, Outcome::Delivered(resp) if resp.code == Code::CONTENT));
	assert!(!session.has_outstanding_requests());
}

#[test]
fn unmatched_response_is_silently_dropped() {
	let mut session = Session::new(peer(), Variant::Udp, 0);

	let mut resp = Pdu::request(Code::CONTENT, Store::from(&[][..]));
	resp.kind = Kind::Ack;
	resp.mid = 99;

	let outcome = dispatch(&mut session, resp, 0, EXCHANGE_LIFETIME, &known(), &mut Echo);

	assert!(matches!(outcome, Outcome::Nothing));
}

#[test]
fn empty_con_gets_an_empty_ack_pong() {
	let mut session = Session::new(peer(), Variant::Udp, 0);
	let ping = Pdu::empty(Kind::Con, 55);

	let outcome = dispatch(&mut session, ping, 0, EXCHANGE_LIFETIME, &known(), &mut Echo);

	match outcome {
		Outcome::Reply(reply) => {
			assert_eq!(reply.kind, Kind::Ack);
			assert_eq!(reply.mid, 55);
			assert!(reply.code.is_empty());
		}
		_ => panic!("expected an empty ACK"),
	}
}

#[test]
fn stray_empty_ack_is_dropped() {
	let mut session = Session::new(peer(), Variant::Udp, 0);
	let ack = Pdu::empty(Kind::Ack, 77);

	let outcome = dispatch(&mut session, ack, 0, EXCHANGE_LIFETIME, &known(), &mut Echo);

	assert!(matches!(outcome, Outcome::Nothing));
}

use coap::pdu::{decode_datagram, decode_stream, encode_datagram, encode_stream, option, stream_frame_len, Code, Kind, Opt, Pdu};
use collections::bytes::{Slice, Store};

fn slice_of(bytes: &[u8]) -> Slice {
	let mut slice = Slice::new(bytes.len());
	slice.copy_from_slice(bytes);
	slice
}

#[test]
fn datagram_get_roundtrips() {
	let mut req = Pdu::request(Code::GET, Store::from(&[1, 2, 3, 4][..]));
	req.mid = 0xBEEF;
	req.options.push(Opt::new(option::URI_PATH, b"sensors"));
	req.options.push(Opt::new(option::URI_PATH, b"temperature"));
	req.payload = Store::from(&b"ignored on GET"[..]);

	let bytes = encode_datagram(&req);
	let decoded = decode_datagram(&slice_of(&bytes)).expect("valid datagram");

	assert_eq!(decoded.kind, Kind::Con);
	assert_eq!(decoded.code, Code::GET);
	assert_eq!(decoded.mid, 0xBEEF);
	assert_eq!(&decoded.token[..], &[1, 2, 3, 4]);
	assert_eq!(decoded.options.len(), 2);
	assert_eq!(&decoded.options[0].value[..], b"sensors");
	assert_eq!(&decoded.options[1].value[..], b"temperature");
}

#[test]
fn token_length_zero_and_eight() {
	for tkl in [0, 8] {
		let token = Store::from(&vec![0xAB; tkl][..]);
		let req = Pdu::request(Code::GET, token);
		let bytes = encode_datagram(&req);
		let decoded = decode_datagram(&slice_of(&bytes)).expect("valid datagram");
		assert_eq!(decoded.token.len(), tkl);
	}
}

#[test]
fn option_delta_and_length_extension_ranges() {
	// Delta 0 -> 12 is a single nibble; 13 is the 1-byte extended form; 269+
	// needs the 2-byte extended form. Exercise both boundaries at once via
	// option numbers chosen to land on each side.
	let mut req = Pdu::request(Code::GET, Store::from(&[][..]));
	req.options.push(Opt::new(12, b"a")); // single nibble delta
	req.options.push(Opt::new(300, vec![0u8; 300])); // delta 288 > 269, length 300 > 269

	let bytes = encode_datagram(&req);
	let decoded = decode_datagram(&slice_of(&bytes)).expect("valid datagram");

	assert_eq!(decoded.options[0].number, 12);
	assert_eq!(decoded.options[1].number, 300);
	assert_eq!(decoded.options[1].value.len(), 300);
}

#[test]
fn option_number_65535_is_reachable_via_deltas() {
	let mut req = Pdu::request(Code::GET, Store::from(&[][..]));
	req.options.push(Opt::new(65535, b""));

	let bytes = encode_datagram(&req);
	let decoded = decode_datagram(&slice_of(&bytes)).expect("valid datagram");

	assert_eq!(decoded.options[0].number, 65535);
}

#[test]
fn payload_marker_with_no_payload_is_a_format_error() {
	// Version 1, CON, TKL 0; code GET; mid 0; then a bare 0xFF marker with
	// nothing following it.
	let bytes = [0x40, 0x01, 0x00, 0x00, 0xFF];

	assert!(decode_datagram(&slice_of(&bytes)).is_err());
}

#[test]
fn truncated_header_is_a_format_error() {
	assert!(decode_datagram(&slice_of(&[0x40, 0x01])).is_err());
}

#[test]
fn stream_frame_len_covers_extended_ranges() {
	// nibble 0..12: length encoded directly.
	let short = Pdu::empty(Kind::Con, 0);
	let bytes = encode_stream(&short);
	assert_eq!(stream_frame_len(&bytes), Some(bytes.len()));

	// nibble 13: length 13..268, one extension byte.
	let mut medium = Pdu::request(Code::GET, Store::from(&[][..]));
	medium.payload = Store::from(&vec![0u8; 200][..]);
	let bytes = encode_stream(&medium);
	assert_eq!(stream_frame_len(&bytes), Some(bytes.len()));

	// nibble 14: length 269..65804, two extension bytes.
	let mut large = Pdu::request(Code::GET, Store::from(&[][..]));
	large.payload = Store::from(&vec![0u8; 5000][..]);
	let bytes = encode_stream(&large);
	assert_eq!(stream_frame_len(&bytes), Some(bytes.len()));
}

#[test]
fn stream_frame_len_reports_none_on_partial_header() {
	assert_eq!(stream_frame_len(&[]), None);
	assert_eq!(stream_frame_len(&[0xD0]), None); // nibble 13, missing extension byte
}

#[test]
fn stream_roundtrip_has_no_message_id_or_type() {
	let mut req = Pdu::request(Code::POST, Store::from(&[9, 9][..]));
	req.options.push(Opt::new(option::CONTENT_FORMAT, [0u8]));
	req.payload = Store::from(&b"hello"[..]);

	let bytes = encode_stream(&req);
	let decoded = decode_stream(&slice_of(&bytes)).expect("valid frame");

	assert_eq!(decoded.kind, Kind::Con);
	assert_eq!(decoded.code, Code::POST);
	assert_eq!(&decoded.payload[..], b"hello");
}

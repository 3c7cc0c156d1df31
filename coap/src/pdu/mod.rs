mod wire;

use collections::bytes::{Slice, Store};

use crate::error::CodecError;

pub use wire::DatagramHeader;

/// RFC 7252 message type. Stream transports never carry this on the wire;
/// every stream PDU is represented as `Kind::Con` for dispatch purposes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Kind {
	Con,
	Non,
	Ack,
	Rst,
}

impl Kind {
	fn from_bits(bits: u8) -> Option<Self> {
		Some(match bits {
			0 => Self::Con,
			1 => Self::Non,
			2 => Self::Ack,
			3 => Self::Rst,
			_ => return None,
		})
	}

	fn bits(self) -> u8 {
		match self {
			Self::Con => 0,
			Self::Non => 1,
			Self::Ack => 2,
			Self::Rst => 3,
		}
	}
}

/// An 8-bit request/response/signaling code, `class.detail`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Code(pub u8);

impl Code {
	pub const fn new(class: u8, detail: u8) -> Self {
		Self((class << 5) | detail)
	}

	pub fn class(self) -> u8 {
		self.0 >> 5
	}

	pub fn detail(self) -> u8 {
		self.0 & 0b1_1111
	}

	pub fn is_empty(self) -> bool {
		self.0 == 0
	}

	pub fn is_request(self) -> bool {
		self.class() == 0 && !self.is_empty()
	}

	pub fn is_response(self) -> bool {
		matches!(self.class(), 2 | 4 | 5)
	}

	pub fn is_signaling(self) -> bool {
		self.class() == 7
	}

	pub const EMPTY: Self = Self::new(0, 0);

	pub const GET: Self = Self::new(0, 1);
	pub const POST: Self = Self::new(0, 2);
	pub const PUT: Self = Self::new(0, 3);
	pub const DELETE: Self = Self::new(0, 4);
	pub const FETCH: Self = Self::new(0, 5);
	pub const PATCH: Self = Self::new(0, 6);
	pub const IPATCH: Self = Self::new(0, 7);

	pub const CONTENT: Self = Self::new(2, 5);
	pub const CHANGED: Self = Self::new(2, 4);

	pub const BAD_OPTION: Self = Self::new(4, 2);
	pub const NOT_FOUND: Self = Self::new(4, 4);

	pub const INTERNAL_SERVER_ERROR: Self = Self::new(5, 0);

	/// Capabilities and Settings Message (RFC 8323 §5.3).
	pub const CSM: Self = Self::new(7, 1);
	pub const PING: Self = Self::new(7, 2);
	pub const PONG: Self = Self::new(7, 3);
	pub const RELEASE: Self = Self::new(7, 4);
	pub const ABORT: Self = Self::new(7, 5);
}

/// Well-known option numbers used by the context and dispatch layer.
pub mod option {
	pub const URI_HOST: u16 = 3;
	pub const ETAG: u16 = 4;
	pub const OBSERVE: u16 = 6;
	pub const URI_PORT: u16 = 7;
	pub const LOCATION_PATH: u16 = 8;
	pub const URI_PATH: u16 = 11;
	pub const CONTENT_FORMAT: u16 = 12;
	pub const MAX_AGE: u16 = 14;
	pub const URI_QUERY: u16 = 15;
	pub const ACCEPT: u16 = 17;
	pub const LOCATION_QUERY: u16 = 20;
	pub const BLOCK2: u16 = 23;
	pub const BLOCK1: u16 = 27;
	pub const SIZE2: u16 = 28;
	pub const PROXY_URI: u16 = 35;
	pub const PROXY_SCHEME: u16 = 39;
	pub const SIZE1: u16 = 60;

	/// Signaling options (RFC 8323 §5).
	pub const MAX_MESSAGE_SIZE: u16 = 2;
	pub const BLOCK_WISE_TRANSFER: u16 = 4;
	pub const CUSTODY: u16 = 2;
	pub const ALTERNATIVE_ADDRESS: u16 = 2;
	pub const HOLD_OFF: u16 = 4;
	pub const BAD_CSM_OPTION: u16 = 2;

	/// Odd option numbers must be understood by a peer that doesn't recognize
	/// them, or the message is rejected (RFC 7252 §5.4.6).
	pub fn is_critical(number: u16) -> bool {
		number & 1 == 1
	}

	pub fn is_unsafe(number: u16) -> bool {
		number & 2 == 2
	}

	pub fn is_nocachekey(number: u16) -> bool {
		number & 0x1e == 0x1c
	}
}

#[derive(Clone)]
pub struct Opt {
	pub number: u16,
	pub value: Store,
}

impl Opt {
	pub fn new(number: u16, value: impl AsRef<[u8]>) -> Self {
		Self { number, value: Store::from(value.as_ref()) }
	}
}

/// An in-memory CoAP message, independent of which wire framing produced it.
#[derive(Clone, Debug)]
pub struct Pdu {
	pub kind: Kind,
	pub code: Code,
	/// Ignored (always 0) on stream transports, which carry no message-ID.
	pub mid: u16,
	pub token: Store,
	pub options: Vec<Opt>,
	/// Empty store means "no payload" — CoAP never distinguishes the two.
	pub payload: Store,
}

impl Pdu {
	pub fn request(code: Code, token: Store) -> Self {
		Self { kind: Kind::Con, code, mid: 0, token, options: Vec::new(), payload: Store::from(&[][..]) }
	}

	pub fn empty(kind: Kind, mid: u16) -> Self {
		Self {
			kind,
			code: Code::EMPTY,
			mid,
			token: Store::from(&[][..]),
			options: Vec::new(),
			payload: Store::from(&[][..]),
		}
	}

	pub fn find(&self, number: u16) -> Option<&Opt> {
		self.options.iter().find(|o| o.number == number)
	}
}

impl std::fmt::Debug for Opt {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("Opt").field("number", &self.number).field("value", &&*self.value).finish()
	}
}

fn decode_ext(nibble: u8, buf: &Slice) -> Result<u16, CodecError> {
	match nibble {
		13 => {
			if buf.is_empty() {
				return Err(CodecError::FormatError);
			}

			Ok(buf.split_bytes(1)[0] as u16 + 13)
		}
		14 => {
			if buf.len() < 2 {
				return Err(CodecError::FormatError);
			}

			let b = buf.split_bytes(2);
			Ok(u16::from_be_bytes([b[0], b[1]]) + 269)
		}
		n => Ok(n as u16),
	}
}

fn decode_options_and_payload(buf: &Slice) -> Result<(Vec<Opt>, Store), CodecError> {
	let mut options = Vec::new();
	let mut running = 0u16;

	loop {
		if buf.is_empty() {
			return Ok((options, Store::from(&[][..])));
		}

		let first = buf.split_bytes(1)[0];

		if first == 0xFF {
			if buf.is_empty() {
				return Err(CodecError::FormatError);
			}

			return Ok((options, Store::from(&buf[..])));
		}

		let delta_nibble = first >> 4;
		let length_nibble = first & 0x0F;

		if delta_nibble == 15 || length_nibble == 15 {
			return Err(CodecError::FormatError);
		}

		let delta = decode_ext(delta_nibble, buf)?;
		let length = decode_ext(length_nibble, buf)?;

		running = running.checked_add(delta).ok_or(CodecError::FormatError)?;

		if buf.len() < length as usize {
			return Err(CodecError::FormatError);
		}

		options.push(Opt { number: running, value: Store::from(buf.split_bytes(length as usize)) });
	}
}

fn encode_ext(value: u16) -> (u8, [u8; 2], usize) {
	if value < 13 {
		(value as u8, [0; 2], 0)
	} else if value < 269 {
		(13, [(value - 13) as u8, 0], 1)
	} else {
		let bytes = (value - 269).to_be_bytes();
		(14, bytes, 2)
	}
}

fn encode_options(out: &mut Vec<u8>, options: &[Opt]) {
	let mut sorted: Vec<&Opt> = options.iter().collect();
	sorted.sort_by_key(|o| o.number);

	let mut running = 0u16;

	for opt in sorted {
		let delta = opt.number - running;
		running = opt.number;
		let length = opt.value.len() as u16;

		let (delta_nibble, delta_ext, delta_ext_len) = encode_ext(delta);
		let (length_nibble, length_ext, length_ext_len) = encode_ext(length);

		out.push((delta_nibble << 4) | length_nibble);
		out.extend_from_slice(&delta_ext[..delta_ext_len]);
		out.extend_from_slice(&length_ext[..length_ext_len]);
		out.extend_from_slice(&opt.value);
	}
}

/// Decode a single UDP/DTLS datagram. `buf` must contain exactly one message.
pub fn decode_datagram(buf: &Slice) -> Result<Pdu, CodecError> {
	if buf.len() < 4 {
		return Err(CodecError::FormatError);
	}

	let header: &DatagramHeader = buf.split();

	if header.version() != DatagramHeader::VERSION {
		return Err(CodecError::FormatError);
	}

	let tkl = header.tkl();

	if tkl > 8 || buf.len() < tkl as usize {
		return Err(CodecError::FormatError);
	}

	let token = Store::from(buf.split_bytes(tkl as usize));
	let kind = Kind::from_bits(header.kind()).ok_or(CodecError::FormatError)?;
	let code = Code(header.code);
	let mid = header.mid();

	let (options, payload) = decode_options_and_payload(buf)?;

	Ok(Pdu { kind, code, mid, token, options, payload })
}

/// Encode a message as a UDP/DTLS datagram.
pub fn encode_datagram(pdu: &Pdu) -> Vec<u8> {
	let mut out = Vec::with_capacity(4 + pdu.token.len() + pdu.payload.len() + 16);

	let header = DatagramHeader::pack(pdu.kind.bits(), pdu.token.len() as u8, pdu.code.0, pdu.mid);
	out.extend_from_slice(utils::bytes::as_slice(&header));
	out.extend_from_slice(&pdu.token);

	encode_options(&mut out, &pdu.options);

	if !pdu.payload.is_empty() {
		out.push(0xFF);
		out.extend_from_slice(&pdu.payload);
	}

	out
}

/// Inspects a TCP/TLS byte stream for a complete frame. Returns the total
/// frame length (header through payload) once enough bytes are buffered to
/// know it, or `None` if more data must be read first.
pub fn stream_frame_len(buf: &[u8]) -> Option<usize> {
	let first = *buf.first()?;
	let len_nibble = first >> 4;
	let tkl = (first & 0x0F) as usize;

	let (len, ext_len) = match len_nibble {
		13 => (*buf.get(1)? as u32 + 13, 1),
		14 => {
			let b0 = *buf.get(1)?;
			let b1 = *buf.get(2)?;
			(u16::from_be_bytes([b0, b1]) as u32 + 269, 2)
		}
		15 => {
			let b = buf.get(1..5)?;
			(u32::from_be_bytes([b[0], b[1], b[2], b[3]]) + 65805, 4)
		}
		n => (n as u32, 0),
	};

	Some(1 + ext_len + 1 + tkl + len as usize)
}

/// Decode exactly one RFC 8323 stream frame. `buf` must contain exactly the
/// bytes `stream_frame_len` reported.
pub fn decode_stream(buf: &Slice) -> Result<Pdu, CodecError> {
	if buf.is_empty() {
		return Err(CodecError::FormatError);
	}

	let first = buf.split_bytes(1)[0];
	let len_nibble = first >> 4;
	let tkl = first & 0x0F;

	if tkl > 8 {
		return Err(CodecError::FormatError);
	}

	match len_nibble {
		13 => {
			if buf.is_empty() {
				return Err(CodecError::FormatError);
			}
			buf.split_bytes(1);
		}
		14 => {
			if buf.len() < 2 {
				return Err(CodecError::FormatError);
			}
			buf.split_bytes(2);
		}
		15 => {
			if buf.len() < 4 {
				return Err(CodecError::FormatError);
			}
			buf.split_bytes(4);
		}
		_ => {}
	}

	if buf.is_empty() {
		return Err(CodecError::FormatError);
	}

	let code = Code(buf.split_bytes(1)[0]);

	if buf.len() < tkl as usize {
		return Err(CodecError::FormatError);
	}

	let token = Store::from(buf.split_bytes(tkl as usize));
	let (options, payload) = decode_options_and_payload(buf)?;

	Ok(Pdu { kind: Kind::Con, code, mid: 0, token, options, payload })
}

fn encode_len_ext(len: u32) -> (u8, [u8; 4], usize) {
	if len < 13 {
		(len as u8, [0; 4], 0)
	} else if len < 269 {
		let mut b = [0; 4];
		b[0] = (len - 13) as u8;
		(13, b, 1)
	} else if len < 65805 {
		let v = (len - 269) as u16;
		let bytes = v.to_be_bytes();
		let mut b = [0; 4];
		b[..2].copy_from_slice(&bytes);
		(14, b, 2)
	} else {
		let bytes = (len - 65805).to_be_bytes();
		(15, bytes, 4)
	}
}

/// Encode a message as an RFC 8323 stream frame.
pub fn encode_stream(pdu: &Pdu) -> Vec<u8> {
	let mut body = Vec::new();
	encode_options(&mut body, &pdu.options);

	if !pdu.payload.is_empty() {
		body.push(0xFF);
		body.extend_from_slice(&pdu.payload);
	}

	let len = body.len() as u32;
	let tkl = pdu.token.len() as u8;

	let (len_nibble, len_ext, len_ext_len) = encode_len_ext(len);

	let mut out = Vec::with_capacity(2 + len_ext_len + tkl as usize + body.len());
	out.push((len_nibble << 4) | tkl);
	out.extend_from_slice(&len_ext[..len_ext_len]);
	out.push(pdu.code.0);
	out.extend_from_slice(&pdu.token);
	out.extend_from_slice(&body);

	out
}

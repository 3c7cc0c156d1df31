use crate::pdu::option;

const WORDS: usize = 1024;

/// Bitset over the 16-bit option-number space: a fast membership test for
/// "does this endpoint understand this critical option" (RFC 7252 §5.4.6).
/// Extensible at runtime via [`register`](Self::register), mirroring
/// libcoap's `coap_register_option`/`ctx->known_options`.
pub struct KnownOptions {
	bits: Box<[u64; WORDS]>,
}

impl KnownOptions {
	pub fn register(&mut self, number: u16) {
		self.bits[(number / 64) as usize] |= 1 << (number % 64);
	}

	pub fn unregister(&mut self, number: u16) {
		self.bits[(number / 64) as usize] &= !(1 << (number % 64));
	}

	pub fn is_known(&self, number: u16) -> bool {
		self.bits[(number / 64) as usize] & (1 << (number % 64)) != 0
	}
}

/// Option numbers this endpoint understands out of the box.
const DEFAULTS: &[u16] = &[
	option::URI_HOST,
	option::ETAG,
	option::OBSERVE,
	option::URI_PORT,
	option::LOCATION_PATH,
	option::URI_PATH,
	option::CONTENT_FORMAT,
	option::MAX_AGE,
	option::URI_QUERY,
	option::ACCEPT,
	option::LOCATION_QUERY,
	option::BLOCK2,
	option::BLOCK1,
	option::SIZE2,
	option::SIZE1,
	option::PROXY_URI,
	option::PROXY_SCHEME,
];

impl Default for KnownOptions {
	fn default() -> Self {
		let mut known = Self { bits: Box::new([0; WORDS]) };

		for &number in DEFAULTS {
			known.register(number);
		}

		known
	}
}

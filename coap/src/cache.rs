use std::hash::{Hash, Hasher};

use ahash::AHasher;

use crate::pdu::{option, Code, Opt};

/// A deterministic digest of the parts of a request that make two requests
/// cache-equivalent: code, `Uri-Host`, `Uri-Port`, `Uri-Path` segments in
/// order, `Uri-Query` segments sorted, and `Content-Format` — minus whatever
/// the context's ignore list excludes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CacheKey(u64);

impl CacheKey {
	pub fn compute(code: Code, options: &[Opt], ignore: &[u16]) -> Self {
		let mut hasher = AHasher::default();
		code.0.hash(&mut hasher);

		let relevant = |number: u16| !ignore.contains(&number);

		for opt in options.iter().filter(|o| relevant(o.number) && matches!(o.number, option::URI_HOST | option::URI_PORT | option::URI_PATH)) {
			opt.number.hash(&mut hasher);
			(&opt.value[..]).hash(&mut hasher);
		}

		if relevant(option::URI_QUERY) {
			let mut queries: Vec<&[u8]> = options.iter().filter(|o| o.number == option::URI_QUERY).map(|o| &o.value[..]).collect();
			queries.sort_unstable();

			for q in queries {
				option::URI_QUERY.hash(&mut hasher);
				q.hash(&mut hasher);
			}
		}

		if relevant(option::CONTENT_FORMAT) {
			for opt in options.iter().filter(|o| o.number == option::CONTENT_FORMAT) {
				opt.number.hash(&mut hasher);
				(&opt.value[..]).hash(&mut hasher);
			}
		}

		Self(hasher.finish())
	}
}

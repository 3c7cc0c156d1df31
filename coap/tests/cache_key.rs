use coap::pdu::{option, Code, Opt};
use coap::CacheKey;

#[test]
fn query_order_does_not_affect_the_key() {
	let a = vec![Opt::new(option::URI_QUERY, b"b=2"), Opt::new(option::URI_QUERY, b"a=1")];
	let b = vec![Opt::new(option::URI_QUERY, b"a=1"), Opt::new(option::URI_QUERY, b"b=2")];

	assert_eq!(CacheKey::compute(Code::GET, &a, &[]), CacheKey::compute(Code::GET, &b, &[]));
}

#[test]
fn different_path_changes_the_key() {
	let a = vec![Opt::new(option::URI_PATH, b"foo")];
	let b = vec![Opt::new(option::URI_PATH, b"bar")];

	assert_ne!(CacheKey::compute(Code::GET, &a, &[]), CacheKey::compute(Code::GET, &b, &[]));
}

#[test]
fn ignored_option_does_not_affect_the_key() {
	let a = vec![Opt::new(option::URI_PATH, b"foo"), Opt::new(option::ETAG, b"v1")];
	let b = vec![Opt::new(option::URI_PATH, b"foo"), Opt::new(option::ETAG, b"v2")];

	assert_eq!(CacheKey::compute(Code::GET, &a, &[]), CacheKey::compute(Code::GET, &b, &[]));
	assert_eq!(CacheKey::compute(Code::GET, &a, &[option::ETAG]), CacheKey::compute(Code::GET, &b, &[option::ETAG]));
}

#[test]
fn ignoring_uri_path_collapses_otherwise_distinct_requests() {
	let a = vec![Opt::new(option::URI_PATH, b"foo")];
	let b = vec![Opt::new(option::URI_PATH, b"bar")];

	assert_ne!(CacheKey::compute(Code::GET, &a, &[]), CacheKey::compute(Code::GET, &b, &[]));
	assert_eq!(CacheKey::compute(Code::GET, &a, &[option::URI_PATH]), CacheKey::compute(Code::GET, &b, &[option::URI_PATH]));
}

#[test]
fn different_code_changes_the_key() {
	let opts = vec![Opt::new(option::URI_PATH, b"foo")];

	assert_ne!(CacheKey::compute(Code::GET, &opts, &[]), CacheKey::compute(Code::POST, &opts, &[]));
}

use coap::options::KnownOptions;
use coap::pdu::option;

#[test]
fn well_known_options_are_known_by_default() {
	let known = KnownOptions::default();

	assert!(known.is_known(option::URI_PATH));
	assert!(known.is_known(option::BLOCK2));
	assert!(known.is_known(option::PROXY_SCHEME));
}

#[test]
fn unregistered_option_is_unknown() {
	let known = KnownOptions::default();

	assert!(!known.is_known(21));
	assert!(!known.is_known(65535));
}

#[test]
fn register_extends_the_known_set() {
	let mut known = KnownOptions::default();

	assert!(!known.is_known(21));
	known.register(21);
	assert!(known.is_known(21));
}

#[test]
fn unregister_removes_a_default() {
	let mut known = KnownOptions::default();

	known.unregister(option::URI_PATH);
	assert!(!known.is_known(option::URI_PATH));
}

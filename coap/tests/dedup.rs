use coap::dedup::{Dedup, WINDOW};
use coap::pdu::{Code, Kind, Pdu};

#[test]
fn distinct_mids_never_collide() {
	let mut dedup = Dedup::default();

	assert!(!dedup.observe(1, 0, 1000));
	assert!(!dedup.observe(2, 0, 1000));
	assert!(!dedup.observe(1, 10, 1000)); // still a duplicate of mid 1
}

#[test]
fn duplicate_within_exchange_lifetime_is_flagged() {
	let mut dedup = Dedup::default();

	assert!(!dedup.observe(42, 0, 1000));
	assert!(dedup.observe(42, 500, 1000));
}

#[test]
fn entry_expires_after_exchange_lifetime() {
	let mut dedup = Dedup::default();

	assert!(!dedup.observe(42, 0, 1000));
	assert!(!dedup.observe(42, 1000, 1000)); // exactly at the boundary, no longer a duplicate
}

#[test]
fn cached_response_is_replayed_for_a_duplicate() {
	let mut dedup = Dedup::default();
	dedup.observe(7, 0, 1000);

	let mut response = Pdu::empty(Kind::Ack, 7);
	response.code = Code::CONTENT;
	dedup.cache_response(7, response);

	assert!(dedup.observe(7, 100, 1000));
	let cached = dedup.cached_response(7).expect("cached response present");
	assert_eq!(cached.code, Code::CONTENT);
}

#[test]
fn window_evicts_oldest_entry_once_full() {
	let mut dedup = Dedup::default();

	for mid in 0..WINDOW as u16 {
		assert!(!dedup.observe(mid, 0, 1000));
	}

	// One more insert evicts mid 0; it's no longer tracked as a duplicate.
	assert!(!dedup.observe(WINDOW as u16, 0, 1000));
	assert!(!dedup.observe(0, 10, 1000));
}

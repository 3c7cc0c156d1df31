use coap::config::Config;
use coap::pdu::{Code, Pdu};
use coap::transmission::{backoff, initial_timeout, Queue, QueueEntry};
use collections::bytes::Store;

fn entry(session: usize, mid: u16, fire_tick: u64) -> QueueEntry {
	QueueEntry { fire_tick, retransmit_count: 0, timeout: 2000, session, mid, pdu: Pdu::request(Code::GET, Store::from(&[][..])) }
}

#[test]
fn pop_ready_returns_entries_in_fire_order() {
	let mut queue = Queue::default();
	queue.push(entry(0, 1, 5000));
	queue.push(entry(0, 2, 1000));
	queue.push(entry(0, 3, 3000));

	assert_eq!(queue.pop_ready(10_000).unwrap().mid, 2);
	assert_eq!(queue.pop_ready(10_000).unwrap().mid, 3);
	assert_eq!(queue.pop_ready(10_000).unwrap().mid, 1);
	assert!(queue.is_empty());
}

#[test]
fn pop_ready_respects_the_deadline() {
	let mut queue = Queue::default();
	queue.push(entry(0, 1, 5000));

	assert!(queue.pop_ready(4000).is_none());
	assert!(queue.pop_ready(5000).is_some());
}

#[test]
fn next_fire_reports_time_remaining() {
	let mut queue = Queue::default();
	queue.push(entry(0, 1, 5000));

	assert_eq!(queue.next_fire(2000), Some(3000));
}

#[test]
fn cancel_removes_only_the_matching_session_and_mid() {
	let mut queue = Queue::default();
	queue.push(entry(0, 1, 1000));
	queue.push(entry(1, 1, 1000));

	assert!(queue.cancel(0, 1));
	assert!(!queue.cancel(0, 1)); // already gone

	let remaining = queue.pop_ready(10_000).expect("session 1's entry survives");
	assert_eq!(remaining.session, 1);
}

#[test]
fn cancel_session_drops_every_entry_for_that_session() {
	let mut queue = Queue::default();
	queue.push(entry(0, 1, 1000));
	queue.push(entry(0, 2, 2000));
	queue.push(entry(1, 1, 1000));

	queue.cancel_session(0);

	assert_eq!(queue.pop_ready(10_000).unwrap().session, 1);
	assert!(queue.is_empty());
}

#[test]
fn backoff_doubles_the_timeout() {
	assert_eq!(backoff(2000), 4000);
	assert_eq!(backoff(4000), 8000);
}

#[test]
fn initial_timeout_is_bounded_by_ack_random_factor() {
	let cfg = Config::default();
	let lo = (cfg.ack_timeout.as_secs_f64() * 1000.0) as u64;
	let hi = (cfg.ack_timeout.as_secs_f64() * cfg.ack_random_factor * 1000.0) as u64;

	for _ in 0..100 {
		let t = initial_timeout(&cfg);
		assert!(t >= lo && t <= hi, "{t} not in [{lo}, {hi}]");
	}
}

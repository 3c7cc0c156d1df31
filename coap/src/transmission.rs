use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rand::Rng;
use runtime::time::{Ticks, TICKS_PER_SECOND};

use crate::config::Config;
use crate::pdu::Pdu;

/// A confirmable message waiting for either an ACK or its next retransmit.
///
/// Ownership note: once pushed, the entry is exclusively owned by the queue
/// until it's popped for delivery or cancelled by message-ID.
pub struct QueueEntry {
	pub fire_tick: Ticks,
	pub retransmit_count: u8,
	pub timeout: Ticks,
	pub session: usize,
	pub mid: u16,
	pub pdu: Pdu,
}

impl PartialEq for QueueEntry {
	fn eq(&self, other: &Self) -> bool {
		self.fire_tick == other.fire_tick
	}
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for QueueEntry {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.fire_tick.cmp(&other.fire_tick)
	}
}

/// Retransmission send queue, ordered by next-fire time.
///
/// The original intrusive per-session linked list is replaced with a binary
/// heap: O(log n) insert, O(1) peek of the next deadline, and no per-session
/// list bookkeeping.
#[derive(Default)]
pub struct Queue {
	heap: BinaryHeap<Reverse<QueueEntry>>,
}

impl Queue {
	pub fn push(&mut self, entry: QueueEntry) {
		self.heap.push(Reverse(entry));
	}

	pub fn is_empty(&self) -> bool {
		self.heap.is_empty()
	}

	/// Ticks until the next entry must fire, or `None` if the queue is empty.
	pub fn next_fire(&self, now: Ticks) -> Option<Ticks> {
		self.heap.peek().map(|Reverse(e)| e.fire_tick.saturating_sub(now))
	}

	/// Pop the next entry if its deadline has passed.
	pub fn pop_ready(&mut self, now: Ticks) -> Option<QueueEntry> {
		match self.heap.peek() {
			Some(Reverse(e)) if e.fire_tick <= now => self.heap.pop().map(|Reverse(e)| e),
			_ => None,
		}
	}

	/// Cancel every outstanding entry for `mid` within `session` (an ACK or
	/// RST arrived). Returns whether anything was removed.
	pub fn cancel(&mut self, session: usize, mid: u16) -> bool {
		self.take(session, mid).is_some()
	}

	/// Like [`cancel`](Self::cancel), but returns the removed entry instead
	/// of discarding it — used when the caller still needs the original
	/// request PDU (e.g. to nack it).
	pub fn take(&mut self, session: usize, mid: u16) -> Option<QueueEntry> {
		let mut found = None;

		let remaining: BinaryHeap<Reverse<QueueEntry>> = self
			.heap
			.drain()
			.filter_map(|Reverse(e)| {
				if found.is_none() && e.session == session && e.mid == mid {
					found = Some(e);
					None
				} else {
					Some(Reverse(e))
				}
			})
			.collect();

		self.heap = remaining;
		found
	}

	/// Number of outstanding confirmable exchanges for `session` (RFC 7252
	/// `NSTART`'s per-destination cap).
	pub fn count_for_session(&self, session: usize) -> usize {
		self.heap.iter().filter(|Reverse(e)| e.session == session).count()
	}

	/// Drop every outstanding entry belonging to `session` (the session closed).
	pub fn cancel_session(&mut self, session: usize) {
		let remaining: BinaryHeap<Reverse<QueueEntry>> = self.heap.drain().filter(|Reverse(e)| e.session != session).collect();
		self.heap = remaining;
	}
}

/// `ACK_TIMEOUT * random(1, ACK_RANDOM_FACTOR)`, in ticks.
pub fn initial_timeout(cfg: &Config) -> Ticks {
	let factor = rand::thread_rng().gen_range(1.0..=cfg.ack_random_factor);
	(cfg.ack_timeout.as_secs_f64() * factor * TICKS_PER_SECOND as f64) as Ticks
}

/// Exponential backoff applied on each retransmit.
pub fn backoff(timeout: Ticks) -> Ticks {
	timeout * 2
}

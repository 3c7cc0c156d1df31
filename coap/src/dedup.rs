use runtime::time::Ticks;

use crate::pdu::Pdu;

/// Window size for the per-session duplicate guard. Resolves the "dedup
/// window size is implicit" open question with an explicit bounded FIFO,
/// sized well above `NSTART`'s default of 1 outstanding exchange.
pub const WINDOW: usize = 16;

struct Entry {
	mid: u16,
	seen: Ticks,
	response: Option<Pdu>,
}

/// Per-session duplicate-message-ID guard (RFC 7252 §4.5, §4.8.2). A fixed
/// FIFO of `WINDOW` entries, each valid until `EXCHANGE_LIFETIME` ticks
/// after it was recorded.
#[derive(Default)]
pub struct Dedup {
	entries: Vec<Entry>,
	next: usize,
}

impl Dedup {
	/// Record that `mid` was seen on ingress at `now`. Returns `true` if this
	/// is a duplicate of an entry still within `exchange_lifetime`.
	pub fn observe(&mut self, mid: u16, now: Ticks, exchange_lifetime: Ticks) -> bool {
		if self.entries.iter().any(|e| e.mid == mid && now.saturating_sub(e.seen) < exchange_lifetime) {
			return true;
		}

		let entry = Entry { mid, seen: now, response: None };

		if self.entries.len() < WINDOW {
			self.entries.push(entry);
		} else {
			self.entries[self.next] = entry;
			self.next = (self.next + 1) % WINDOW;
		}

		false
	}

	/// Cache the response sent for `mid`, so a retransmitted duplicate can be
	/// answered without re-running the handler.
	pub fn cache_response(&mut self, mid: u16, response: Pdu) {
		if let Some(e) = self.entries.iter_mut().find(|e| e.mid == mid) {
			e.response = Some(response);
		}
	}

	pub fn cached_response(&self, mid: u16) -> Option<&Pdu> {
		self.entries.iter().find(|e| e.mid == mid).and_then(|e| e.response.as_ref())
	}
}

use std::net::SocketAddr;

use collections::bytes::Store;
use collections::map::{Key, Map};
use collections::sparse::Ring;
use rand::Rng;
use runtime::time::Ticks;

use crate::dedup::Dedup;
use crate::error::CodecError;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionState {
	None,
	Connecting,
	Handshake,
	Established,
	Closing,
	Closed,
}

/// Which transport/security combination a session runs over.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Variant {
	Udp,
	Dtls,
	Tcp,
	Tls,
}

impl Variant {
	pub fn is_reliable(self) -> bool {
		matches!(self, Self::Tcp | Self::Tls)
	}

	pub fn is_secure(self) -> bool {
		matches!(self, Self::Dtls | Self::Tls)
	}
}

/// Peer capabilities negotiated via CSM (RFC 8323 §5.3). Only meaningful on
/// reliable transports.
#[derive(Clone, Copy, Debug)]
pub struct PeerCsm {
	pub max_message_size: u32,
	pub block_wise_transfer: bool,
}

impl Default for PeerCsm {
	fn default() -> Self {
		Self { max_message_size: 1152, block_wise_transfer: false }
	}
}

struct PendingRequest {
	token: Store,
	mid: u16,
}

impl Key for PendingRequest {
	type Type = Store;

	fn key(&self) -> &Store {
		&self.token
	}
}

const MAX_REQUESTS: usize = 256;
const PENDING_WRITES: usize = 32;

/// Per-peer state: (local endpoint, remote address, protocol variant)
/// identifies a session uniquely within an endpoint's session table.
pub struct Session {
	pub addr: SocketAddr,
	pub variant: Variant,
	pub state: SessionState,
	pub last_rx: Ticks,
	pub last_tx: Ticks,
	tx_mid: u16,
	pub peer_csm: PeerCsm,
	pub mtu: u32,
	requests: Map<PendingRequest, MAX_REQUESTS>,
	request_count: usize,
	pub dedup: Dedup,
	pending_writes: Ring<Box<[u8]>, PENDING_WRITES>,
	pending_count: usize,
	/// `(mid, sent_tick)` of an outstanding reliable-transport keepalive Ping.
	pub ping_outstanding: Option<(u16, Ticks)>,
	/// Deadline by which the peer's CSM must arrive on a reliable transport.
	pub csm_deadline: Option<Ticks>,
}

impl Session {
	pub fn new(addr: SocketAddr, variant: Variant, now: Ticks) -> Self {
		Self {
			addr,
			variant,
			state: SessionState::None,
			last_rx: now,
			last_tx: now,
			tx_mid: rand::thread_rng().gen(),
			peer_csm: PeerCsm::default(),
			mtu: 1152,
			requests: Map::default(),
			request_count: 0,
			dedup: Dedup::default(),
			pending_writes: Ring::default(),
			pending_count: 0,
			ping_outstanding: None,
			csm_deadline: None,
		}
	}

	/// Allocate the next outgoing message-ID. Pre-incremented, wrapping mod 2^16.
	pub fn next_mid(&mut self) -> u16 {
		self.tx_mid = self.tx_mid.wrapping_add(1);
		self.tx_mid
	}

	pub fn has_outstanding_requests(&self) -> bool {
		self.request_count > 0
	}

	pub fn track_request(&mut self, token: Store, mid: u16) {
		let slot = self.requests.insert_unique(&token);
		slot.insert(PendingRequest { token, mid });
		self.request_count += 1;
	}

	/// Remove and return the message-ID of a tracked request matching `token`.
	pub fn take_request(&mut self, token: &Store) -> Option<u16> {
		let removed = self.requests.find_entry(token).remove();

		if removed.is_some() {
			self.request_count -= 1;
		}

		removed.map(|r| r.mid)
	}

	pub fn cancel_request(&mut self, token: &Store) -> bool {
		self.take_request(token).is_some()
	}

	/// Buffer a datagram that couldn't be sent immediately due to WOULDBLOCK.
	pub fn queue_pending_write(&mut self, buf: Box<[u8]>) -> Result<(), CodecError> {
		if self.pending_count >= PENDING_WRITES {
			return Err(CodecError::QueueFull);
		}

		self.pending_writes.insert(self.pending_count, buf);
		self.pending_count += 1;

		Ok(())
	}

	pub fn drain_pending_writes(&mut self) -> Vec<Box<[u8]>> {
		let mut out = Vec::with_capacity(self.pending_count);

		for i in 0..self.pending_count {
			if let Some(buf) = self.pending_writes.remove(i) {
				out.push(buf);
			}
		}

		self.pending_count = 0;
		out
	}

	pub fn is_idle(&self, now: Ticks, session_timeout: Ticks) -> bool {
		session_timeout != 0
			&& !self.has_outstanding_requests()
			&& now.saturating_sub(self.last_rx.max(self.last_tx)) >= session_timeout
	}
}

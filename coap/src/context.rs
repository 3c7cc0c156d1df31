use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, warn};
use runtime::time::{Clock, Ticks};

use crate::config::Config;
use crate::dispatch::{self, Outcome, ResourceHandler};
use crate::error::Reason;
use crate::handler::{EventHandler, HandlerResult};
use crate::options::KnownOptions;
use crate::pdu::{decode_datagram, decode_stream, encode_datagram, encode_stream, stream_frame_len, Code, Kind, Pdu};
use crate::session::{Session, SessionState, Variant};
use crate::transmission::{self, Queue, QueueEntry};
use crate::transport::{TcpListenerTransport, TcpTransport, Transport, UdpEndpoint};

fn ticks(d: Duration) -> Ticks {
	d.as_millis() as Ticks
}

fn encode(variant: Variant, pdu: &Pdu) -> Vec<u8> {
	if variant.is_reliable() {
		encode_stream(pdu)
	} else {
		encode_datagram(pdu)
	}
}

struct SessionSlot {
	session: Session,
	transport: Box<dyn Transport>,
	/// Stream transports accumulate partial frames here between polls.
	stream_buf: Vec<u8>,
}

/// Owns every session on one local endpoint and drives the CoAP event loop:
/// poll for readiness, drain and dispatch inbound PDUs, fire due
/// retransmissions and keepalives. Single-threaded and non-reentrant — call
/// `process` from one place only.
///
/// Sessions live in a slab (`Vec<Option<SessionSlot>>`) rather than a plain
/// `Vec`, so a session's index stays valid — and usable as
/// `QueueEntry::session` — across the removal of other sessions.
pub struct Context {
	clock: Clock,
	config: Config,
	sessions: Vec<Option<SessionSlot>>,
	queue: Queue,
	cache_ignore: Vec<u16>,
	known_options: KnownOptions,
	event_handler: Option<Box<dyn EventHandler>>,
	udp: Option<UdpEndpoint>,
	tcp: Option<TcpListenerTransport>,
}

impl Context {
	pub fn new(config: Config) -> Self {
		Self {
			clock: Clock::new(),
			config,
			sessions: Vec::new(),
			queue: Queue::default(),
			cache_ignore: Vec::new(),
			known_options: KnownOptions::default(),
			event_handler: None,
			udp: None,
			tcp: None,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Options excluded from the cache key regardless of criticality.
	pub fn set_cache_ignore(&mut self, options: Vec<u16>) {
		self.cache_ignore = options;
	}

	pub fn cache_ignore(&self) -> &[u16] {
		&self.cache_ignore
	}

	/// Extend the set of critical options this endpoint accepts on inbound
	/// requests without rejecting them with 4.02, mirroring libcoap's
	/// `coap_register_option`.
	pub fn register_option(&mut self, number: u16) {
		self.known_options.register(number);
	}

	pub fn unregister_option(&mut self, number: u16) {
		self.known_options.unregister(number);
	}

	/// Register the callback for response/nack/ping/pong events. Replaces
	/// any previously registered handler.
	pub fn set_event_handler(&mut self, handler: Box<dyn EventHandler>) {
		self.event_handler = Some(handler);
	}

	pub fn listen_udp(&mut self, local: SocketAddr) -> std::io::Result<()> {
		self.udp = Some(UdpEndpoint::bind(local)?);
		Ok(())
	}

	pub fn listen_tcp(&mut self, local: SocketAddr) -> std::io::Result<()> {
		self.tcp = Some(TcpListenerTransport::bind(local)?);
		Ok(())
	}

	/// Originate a UDP session toward `peer`. Requires `listen_udp` to have
	/// been called first, since all UDP sessions share one local socket.
	pub fn connect_udp(&mut self, peer: SocketAddr) -> std::io::Result<usize> {
		let transport = self.udp.as_ref().expect("listen_udp must be called before connect_udp").new_transport(peer)?;

		Ok(self.add_session(peer, Variant::Udp, Box::new(transport)))
	}

	pub fn connect_tcp(&mut self, peer: SocketAddr) -> std::io::Result<usize> {
		let transport = TcpTransport::connect(peer)?;
		Ok(self.add_session(peer, Variant::Tcp, Box::new(transport)))
	}

	fn add_session(&mut self, addr: SocketAddr, variant: Variant, transport: Box<dyn Transport>) -> usize {
		let now = self.clock.now();
		let mut session = Session::new(addr, variant, now);

		if variant.is_reliable() {
			session.state = SessionState::Connecting;
			session.csm_deadline = Some(now + ticks(self.config.csm_timeout));
		} else {
			session.state = SessionState::Established;
		}

		let slot = SessionSlot { session, transport, stream_buf: Vec::new() };

		let idx = if let Some(idx) = self.sessions.iter().position(Option::is_none) {
			self.sessions[idx] = Some(slot);
			idx
		} else {
			self.sessions.push(Some(slot));
			self.sessions.len() - 1
		};

		if variant.is_reliable() {
			self.enforce_session_cap(self.config.max_handshake_sessions, |s| matches!(s.state, SessionState::Connecting | SessionState::Handshake));
		}

		idx
	}

	fn slot(&self, idx: usize) -> &SessionSlot {
		self.sessions[idx].as_ref().expect("session index no longer valid")
	}

	fn slot_mut(&mut self, idx: usize) -> &mut SessionSlot {
		self.sessions[idx].as_mut().expect("session index no longer valid")
	}

	pub fn session(&self, idx: usize) -> &Session {
		&self.slot(idx).session
	}

	pub fn session_mut(&mut self, idx: usize) -> &mut Session {
		&mut self.slot_mut(idx).session
	}

	fn find_session(&self, addr: SocketAddr) -> Option<usize> {
		self.sessions.iter().position(|s| matches!(s, Some(s) if s.session.addr == addr))
	}

	/// Encode and send `pdu` on `session_idx`'s transport. On WOULDBLOCK, a
	/// NON message is buffered on the session's pending-write ring for the
	/// next `process` pass to retry; a CON is left to the retransmission
	/// queue, which will resend it regardless.
	fn send_pdu(&mut self, idx: usize, pdu: &Pdu, now: Ticks) -> utils::error::Result<()> {
		let variant = self.slot(idx).session.variant;
		let bytes = encode(variant, pdu);

		if self.slot_mut(idx).transport.send(&bytes)? {
			self.slot_mut(idx).session.last_tx = now;
		} else if pdu.kind != Kind::Con && self.slot_mut(idx).session.queue_pending_write(bytes.into_boxed_slice()).is_err() {
			warn!("pending write queue full for {}", self.slot(idx).session.addr);
		}

		Ok(())
	}

	/// Retry every session's buffered WOULDBLOCK writes, in order. Stops at
	/// the first datagram that blocks again and re-queues it along with
	/// everything behind it.
	fn flush_pending_writes(&mut self, now: Ticks) {
		for idx in 0..self.sessions.len() {
			if self.sessions[idx].is_none() {
				continue;
			}

			let pending = self.slot_mut(idx).session.drain_pending_writes();

			if pending.is_empty() {
				continue;
			}

			let mut iter = pending.into_iter();

			for buf in iter.by_ref() {
				match self.slot_mut(idx).transport.send(&buf) {
					Ok(true) => self.slot_mut(idx).session.last_tx = now,
					Ok(false) => {
						let _ = self.slot_mut(idx).session.queue_pending_write(buf);

						for rest in iter {
							let _ = self.slot_mut(idx).session.queue_pending_write(rest);
						}

						break;
					}
					Err(()) => break,
				}
			}
		}
	}

	fn invoke_response(&mut self, idx: usize, response: &Pdu) -> HandlerResult {
		let Some(handler) = &mut self.event_handler else { return HandlerResult::Ok };
		let session = &self.sessions[idx].as_ref().expect("session index no longer valid").session;
		handler.on_response(session, response)
	}

	fn invoke_nack(&mut self, idx: usize, request: &Pdu, reason: Reason) {
		let Some(handler) = &mut self.event_handler else { return };
		let session = &self.sessions[idx].as_ref().expect("session index no longer valid").session;
		handler.on_nack(session, request, reason);
	}

	fn invoke_ping(&mut self, idx: usize) {
		let Some(handler) = &mut self.event_handler else { return };
		let session = &self.sessions[idx].as_ref().expect("session index no longer valid").session;
		handler.on_ping(session);
	}

	fn invoke_pong(&mut self, idx: usize) {
		let Some(handler) = &mut self.event_handler else { return };
		let session = &self.sessions[idx].as_ref().expect("session index no longer valid").session;
		handler.on_pong(session);
	}

	/// Evict the least-recently-active session matching `predicate` until at
	/// most `cap` remain (`cap == 0` means unlimited). Used for both
	/// `max_idle_sessions` and `max_handshake_sessions`: a linear scan over a
	/// capacity-bounded session table, the same approach libcoap itself uses.
	fn enforce_session_cap(&mut self, cap: u32, predicate: impl Fn(&Session) -> bool) {
		if cap == 0 {
			return;
		}

		let cap = cap as usize;

		let mut matching: Vec<(usize, Ticks)> = self
			.sessions
			.iter()
			.enumerate()
			.filter_map(|(idx, slot)| {
				let slot = slot.as_ref()?;
				predicate(&slot.session).then(|| (idx, slot.session.last_rx.max(slot.session.last_tx)))
			})
			.collect();

		if matching.len() <= cap {
			return;
		}

		matching.sort_by_key(|&(_, last)| last);

		for &(idx, _) in &matching[..matching.len() - cap] {
			self.queue.cancel_session(idx);
			self.sessions[idx] = None;
		}
	}

	/// Send a new confirmable or non-confirmable request, tracking
	/// confirmables for retransmission and every request for response
	/// correlation. Rejected with an error if `NSTART` outstanding
	/// confirmables are already in flight to this session.
	pub fn request(&mut self, session_idx: usize, mut pdu: Pdu) -> utils::error::Result<()> {
		let now = self.clock.now();

		if pdu.kind == Kind::Con && self.queue.count_for_session(session_idx) >= self.config.nstart as usize {
			warn!("NSTART ({}) exceeded for session {session_idx}, dropping request", self.config.nstart);
			return Err(());
		}

		let mid = self.slot_mut(session_idx).session.next_mid();
		pdu.mid = mid;
		self.slot_mut(session_idx).session.track_request(pdu.token.clone(), mid);

		self.send_pdu(session_idx, &pdu, now)?;

		if pdu.kind == Kind::Con {
			let timeout = transmission::initial_timeout(&self.config);

			self.queue.push(QueueEntry { fire_tick: now + timeout, retransmit_count: 0, timeout, session: session_idx, mid, pdu });
		}

		Ok(())
	}

	/// Cancel a tracked request by token: drop it from both the session's
	/// pending table and the retransmission queue, and nack it.
	pub fn cancel_request(&mut self, session_idx: usize, token: &collections::bytes::Store) {
		let Some(mid) = self.slot_mut(session_idx).session.take_request(token) else { return };

		let request = match self.queue.take(session_idx, mid) {
			Some(entry) => entry.pdu,
			None => Pdu::request(Code::EMPTY, token.clone()),
		};

		self.invoke_nack(session_idx, &request, Reason::Cancelled);
	}

	/// Run one prepare/wait/do cycle. `budget` caps how long to block if
	/// nothing else is due sooner; `None` blocks until something happens.
	/// Returns elapsed wall-clock milliseconds, or a negative value if an
	/// unrecoverable I/O error interrupted the cycle.
	pub fn process(&mut self, budget: Option<Duration>, handler: &mut dyn ResourceHandler) -> i64 {
		let start = self.clock.now();
		let next_fire = self.next_deadline(start);

		let wait = match (budget, next_fire) {
			(Some(b), Some(f)) => Some(b.min(self.clock.duration(f))),
			(Some(b), None) => Some(b),
			(None, Some(f)) => Some(self.clock.duration(f)),
			(None, None) => None,
		};

		if runtime::is_io() {
			if runtime::poll(wait).is_err() {
				return -1;
			}
		} else if let Some(w) = wait {
			std::thread::sleep(w);
		}

		if self.accept_new_sessions().is_err() {
			return -1;
		}

		let now = self.clock.now();

		for idx in 0..self.sessions.len() {
			if self.sessions[idx].is_some() && self.drain_session(idx, now, handler).is_err() {
				return -1;
			}
		}

		self.flush_pending_writes(now);
		self.fire_retransmissions(now);
		self.fire_keepalives(now);
		self.sweep_idle_sessions(now);
		self.enforce_session_cap(self.config.max_idle_sessions, |s| !s.has_outstanding_requests());

		(self.clock.now() - start) as i64
	}

	fn next_deadline(&self, now: Ticks) -> Option<Ticks> {
		let mut next = self.queue.next_fire(now);

		for slot in self.sessions.iter().flatten() {
			if let Some((_, sent)) = slot.session.ping_outstanding {
				let deadline = sent + ticks(self.config.ping_timeout);
				next = Some(next.map_or(deadline, |n| n.min(deadline)));
			}

			if let Some(deadline) = slot.session.csm_deadline {
				next = Some(next.map_or(deadline, |n| n.min(deadline)));
			}
		}

		next.map(|n| n.saturating_sub(now))
	}

	fn accept_new_sessions(&mut self) -> std::io::Result<()> {
		if self.udp.is_some() {
			loop {
				let next = self.udp.as_ref().unwrap().try_recv()?;

				let Some((addr, datagram)) = next else { break };

				let idx = match self.find_session(addr) {
					Some(idx) => idx,
					None => {
						let transport = self.udp.as_ref().unwrap().new_transport(addr)?;
						self.add_session(addr, Variant::Udp, Box::new(transport))
					}
				};

				self.slot_mut(idx).transport.push_inbound(datagram);
			}
		}

		if let Some(tcp) = &self.tcp {
			while let Some(transport) = tcp.try_accept()? {
				let addr = transport.peer();
				self.add_session(addr, Variant::Tcp, Box::new(transport));
			}
		}

		Ok(())
	}

	fn drain_session(&mut self, idx: usize, now: Ticks, handler: &mut dyn ResourceHandler) -> utils::error::Result<usize> {
		let exchange_lifetime = ticks(self.config.exchange_lifetime());
		let variant = self.slot(idx).session.variant;
		let frames = self.slot_mut(idx).transport.recv();
		let mut count = 0;

		if variant.is_reliable() {
			for frame in frames {
				self.slot_mut(idx).stream_buf.extend_from_slice(&frame);
			}

			loop {
				let Some(len) = stream_frame_len(&self.slot(idx).stream_buf) else { break };

				if self.slot(idx).stream_buf.len() < len {
					break;
				}

				let frame_bytes: Vec<u8> = self.slot_mut(idx).stream_buf.drain(..len).collect();
				let slice = crate::transport::slice_from(&frame_bytes);

				match decode_stream(&slice) {
					Ok(pdu) => {
						count += 1;
						self.handle_pdu(idx, pdu, now, exchange_lifetime, handler)?;
					}
					Err(e) => warn!("dropping unparseable stream frame from {}: {e}", self.slot(idx).session.addr),
				}
			}
		} else {
			for datagram in frames {
				match decode_datagram(&datagram) {
					Ok(pdu) => {
						count += 1;
						self.handle_pdu(idx, pdu, now, exchange_lifetime, handler)?;
					}
					Err(e) => warn!("dropping unparseable datagram from {}: {e}", self.slot(idx).session.addr),
				}
			}
		}

		Ok(count)
	}

	fn handle_pdu(&mut self, idx: usize, pdu: Pdu, now: Ticks, exchange_lifetime: Ticks, handler: &mut dyn ResourceHandler) -> utils::error::Result<()> {
		self.slot_mut(idx).session.last_rx = now;

		if pdu.code.is_signaling() {
			self.handle_signaling(idx, pdu, now);
			return Ok(());
		}

		if pdu.kind == Kind::Ack && self.slot(idx).session.ping_outstanding.map(|(mid, _)| mid) == Some(pdu.mid) {
			self.slot_mut(idx).session.ping_outstanding = None;
			self.invoke_pong(idx);
			return Ok(());
		}

		let is_ping = pdu.kind == Kind::Con && pdu.code.is_empty();

		// RFC 7252 §4.2: any ACK or RST stops retransmission of the CON it
		// matches by message-ID, independent of dispatch's token-based
		// response correlation below.
		if matches!(pdu.kind, Kind::Ack | Kind::Rst) {
			if let Some(entry) = self.queue.take(idx, pdu.mid) {
				if pdu.kind == Kind::Rst {
					self.slot_mut(idx).session.cancel_request(&entry.pdu.token);
					self.invoke_nack(idx, &entry.pdu, Reason::Rst);
				}
			}
		}

		let outcome = {
			let session = &mut self.sessions[idx].as_mut().expect("session index no longer valid").session;
			dispatch::dispatch(session, pdu, now, exchange_lifetime, &self.known_options, handler)
		};

		match outcome {
			Outcome::Reply(reply) => self.send_pdu(idx, &reply, now)?,
			Outcome::Delivered(response) => {
				let result = self.invoke_response(idx, &response);

				if response.kind == Kind::Con {
					let kind = if result == HandlerResult::Ok { Kind::Ack } else { Kind::Rst };
					self.send_pdu(idx, &Pdu::empty(kind, response.mid), now)?;
				}
			}
			Outcome::Nothing => {}
		}

		if is_ping {
			self.invoke_ping(idx);
		}

		Ok(())
	}

	/// CSM/Ping/Pong/Release/Abort (RFC 8323 §5) never go through the
	/// request/response dispatch rules — they govern the session itself.
	fn handle_signaling(&mut self, idx: usize, pdu: Pdu, now: Ticks) {
		match pdu.code {
			Code::CSM => {
				let slot = &mut self.slot_mut(idx).session;
				slot.csm_deadline = None;

				if slot.state == SessionState::Connecting {
					slot.state = SessionState::Established;
				}

				if let Some(opt) = pdu.find(crate::pdu::option::MAX_MESSAGE_SIZE) {
					if let Ok(bytes) = <[u8; 4]>::try_from(&opt.value[..]) {
						slot.peer_csm.max_message_size = u32::from_be_bytes(bytes);
					}
				}

				if pdu.find(crate::pdu::option::BLOCK_WISE_TRANSFER).is_some() {
					slot.peer_csm.block_wise_transfer = true;
				}
			}
			Code::PING => {
				let mut pong = Pdu::empty(Kind::Con, 0);
				pong.code = Code::PONG;

				let _ = self.send_pdu(idx, &pong, now);
				self.invoke_ping(idx);
			}
			Code::PONG => {
				self.slot_mut(idx).session.ping_outstanding = None;
				self.invoke_pong(idx);
			}
			Code::RELEASE | Code::ABORT => {
				self.slot_mut(idx).session.state = SessionState::Closing;
			}
			code => debug!("unrecognized signaling code {code:?} from {}", self.slot(idx).session.addr),
		}
	}

	fn fire_retransmissions(&mut self, now: Ticks) {
		while let Some(mut entry) = self.queue.pop_ready(now) {
			if self.sessions.get(entry.session).map(Option::is_none).unwrap_or(true) {
				continue;
			}

			if entry.retransmit_count >= self.config.max_retransmit {
				let addr = self.slot(entry.session).session.addr;
				warn!("exchange {} to {} timed out after {} retransmits", entry.mid, addr, entry.retransmit_count);
				self.slot_mut(entry.session).session.take_request(&entry.pdu.token);
				self.invoke_nack(entry.session, &entry.pdu, Reason::Timeout);
				continue;
			}

			let _ = self.send_pdu(entry.session, &entry.pdu, now);

			entry.retransmit_count += 1;
			entry.timeout = transmission::backoff(entry.timeout);
			entry.fire_tick = now + entry.timeout;

			self.queue.push(entry);
		}
	}

	fn fire_keepalives(&mut self, now: Ticks) {
		for idx in 0..self.sessions.len() {
			let Some(slot) = &mut self.sessions[idx] else { continue };

			if !slot.session.variant.is_reliable() {
				continue;
			}

			if let Some(deadline) = slot.session.csm_deadline {
				if now >= deadline {
					warn!("peer {} never sent CSM in time, aborting", slot.session.addr);
					slot.session.state = SessionState::Closing;
					continue;
				}
			}

			if let Some((_, sent)) = slot.session.ping_outstanding {
				if now.saturating_sub(sent) >= ticks(self.config.ping_timeout) {
					warn!("peer {} did not answer Ping, closing session", slot.session.addr);
					slot.session.state = SessionState::Closing;
					slot.session.ping_outstanding = None;
				}
			}
		}
	}

	fn sweep_idle_sessions(&mut self, now: Ticks) {
		let timeout = ticks(self.config.session_timeout);

		for idx in 0..self.sessions.len() {
			let remove = match &self.sessions[idx] {
				Some(slot) => slot.session.state == SessionState::Closing || slot.session.is_idle(now, timeout),
				None => false,
			};

			if remove {
				self.queue.cancel_session(idx);
				self.sessions[idx] = None;
			}
		}
	}
}

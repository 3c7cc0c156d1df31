use std::time::Duration;

/// Tunable parameters for a [`crate::context::Context`].
///
/// Field names and the `0 = disabled` convention for the session-lifecycle
/// fields follow `coap_context_t` in libcoap's `net.h`.
pub struct Config {
	/// RFC 7252 `ACK_TIMEOUT`: initial retransmission timeout for a CON message.
	pub ack_timeout: Duration,
	/// RFC 7252 `ACK_RANDOM_FACTOR`: jitter multiplier applied to `ack_timeout`.
	pub ack_random_factor: f64,
	/// RFC 7252 `MAX_RETRANSMIT`: number of retransmissions attempted before giving up.
	pub max_retransmit: u8,
	/// RFC 7252 `NSTART`: outstanding interactions permitted per destination at once.
	pub nstart: u8,

	/// Seconds of inactivity before an established session is considered idle.
	/// `0` disables idle tracking.
	pub session_timeout: Duration,
	/// Maximum number of idle sessions kept per endpoint before the oldest is evicted.
	/// `0` means unlimited.
	pub max_idle_sessions: u32,
	/// Maximum number of sessions allowed to sit in the handshake state at once.
	/// `0` means unlimited.
	pub max_handshake_sessions: u32,
	/// How long to wait for a Pong after sending a Ping before declaring the session dead.
	pub ping_timeout: Duration,
	/// How long to wait for a peer's CSM after a stream session connects.
	pub csm_timeout: Duration,
	/// Block-wise transfer mode bits, passed through to an external Block1/Block2 handler.
	pub block_mode: u32,
}

impl Config {
	pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(2);
	pub const DEFAULT_ACK_RANDOM_FACTOR: f64 = 1.5;
	pub const DEFAULT_MAX_RETRANSMIT: u8 = 4;
	pub const DEFAULT_NSTART: u8 = 1;

	/// `ACK_TIMEOUT * (2^MAX_RETRANSMIT - 1) * ACK_RANDOM_FACTOR`, rounded up.
	pub fn exchange_lifetime(&self) -> Duration {
		let factor = (1u32 << self.max_retransmit as u32) as f64 - 1.0;
		self.ack_timeout.mul_f64(factor * self.ack_random_factor)
	}
}

impl Default for Config {
	fn default() -> Self {
		Self {
			ack_timeout: Self::DEFAULT_ACK_TIMEOUT,
			ack_random_factor: Self::DEFAULT_ACK_RANDOM_FACTOR,
			max_retransmit: Self::DEFAULT_MAX_RETRANSMIT,
			nstart: Self::DEFAULT_NSTART,

			session_timeout: Duration::from_secs(300),
			max_idle_sessions: 0,
			max_handshake_sessions: 0,
			ping_timeout: Duration::from_secs(30),
			csm_timeout: Duration::from_secs(30),
			block_mode: 0,
		}
	}
}

use std::time::{Duration, Instant, SystemTime};

/// Monotonic tick count, `TICKS_PER_SECOND` per second.
pub type Ticks = u64;

pub const TICKS_PER_SECOND: u64 = 1000;

/// Monotonic clock with a simulated wall-clock origin, used in place of
/// repeated `SystemTime::now()` calls so that a whole `process()` pass
/// observes a single consistent instant.
pub struct Clock {
	start: Instant,
	start_sys: SystemTime,
}

impl Clock {
	pub fn new() -> Self {
		Self { start: Instant::now(), start_sys: SystemTime::now() }
	}

	/// Ticks elapsed since the clock was created.
	pub fn now(&self) -> Ticks {
		self.start.elapsed().as_millis() as Ticks
	}

	pub fn duration(&self, ticks: Ticks) -> Duration {
		Duration::from_millis(ticks)
	}

	/// Simulated system time, derived from the monotonic clock rather than
	/// read fresh, so it can't run backwards within a single pass.
	pub fn system_time(&self) -> SystemTime {
		self.start_sys + self.start.elapsed()
	}

	/// UNIX time in seconds.
	pub fn unix(&self) -> u32 {
		self.system_time()
			.duration_since(SystemTime::UNIX_EPOCH)
			.expect("current time should be after the UNIX epoch")
			.as_secs()
			.try_into()
			.expect("32-bit UNIX time should not overflow")
	}
}

impl Default for Clock {
	fn default() -> Self {
		Self::new()
	}
}

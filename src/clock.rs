//! Injectable time source.
//!
//! Request expiry must be computed as `now + fixed window`, and tests need
//! that computation to be reproducible, so every signing path reads time
//! through a [`Clock`] rather than the ambient system clock.

use chrono::{DateTime, TimeZone, Utc};

/// Window between signing time and request expiry.
pub const EXPIRES_IN_SECS: u64 = 300;

/// Time source threaded into the signing paths.
pub trait Clock: Send + Sync {
    /// Current unix time in whole seconds.
    fn now_unix(&self) -> u64;

    /// Current instant as a UTC datetime.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        // Pre-epoch wall clocks are clamped rather than wrapped.
        Utc::now().timestamp().max(0) as u64
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Pin the clock to a unix timestamp in seconds.
    pub fn at_unix(secs: i64) -> Self {
        Self(Utc.timestamp_opt(secs, 0).single().unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now_unix(&self) -> u64 {
        self.0.timestamp().max(0) as u64
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

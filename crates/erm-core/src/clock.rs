//! Injectable time source.
//!
//! Calendar-day semantics (today, yesterday, the snapshot date key) follow the
//! offset carried by `now()`, so a clock doubles as the local-timezone provider.

use chrono::{DateTime, FixedOffset, Local};

pub trait Clock {
    /// Current instant in the caller's local offset.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in the machine's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self(now)
    }

    /// Parse an RFC 3339 instant, keeping its offset.
    pub fn parse(rfc3339: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(rfc3339).map(Self)
    }

    /// Move the clock forward (or back, for negative durations).
    pub fn advance(&mut self, by: chrono::Duration) {
        self.0 += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<FixedOffset> {
        (**self).now()
    }
}

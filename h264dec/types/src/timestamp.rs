/*!
    Reference time, the filter graph's unit of media time.
*/

use std::ops::{Add, Sub};
use std::time::Duration;

/**
    Media time in 100 nanosecond ticks.

    Used both for points in time (sample start/stop) and for durations
    (average time per frame). [`RefTime::UNKNOWN`] marks a stop time the
    upstream filter did not set.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefTime(pub i64);

impl RefTime {
    /// Sentinel for "no stop time".
    pub const UNKNOWN: Self = Self(i64::MIN);

    /// Ticks per second.
    pub const TICKS_PER_SECOND: i64 = 10_000_000;

    /**
        Returns true if this is the unknown sentinel.
    */
    #[inline]
    pub const fn is_unknown(self) -> bool {
        self.0 == i64::MIN
    }

    /**
        Convert to a Duration.

        Negative values (and the unknown sentinel) are clamped to zero.
    */
    #[inline]
    pub fn to_duration(self) -> Duration {
        if self.0 <= 0 {
            return Duration::ZERO;
        }
        let ticks = self.0 as u64;
        Duration::new(
            ticks / Self::TICKS_PER_SECOND as u64,
            ((ticks % Self::TICKS_PER_SECOND as u64) * 100) as u32,
        )
    }

    /**
        Create from a Duration, truncating below 100 ns.
    */
    #[inline]
    pub fn from_duration(duration: Duration) -> Self {
        let ticks = duration.as_nanos() / 100;
        Self(i64::try_from(ticks).unwrap_or(i64::MAX))
    }

    /**
        Frame rate in frames per second, treating self as a frame duration.
    */
    pub fn frames_per_second(self) -> Option<f64> {
        (self.0 > 0).then(|| Self::TICKS_PER_SECOND as f64 / self.0 as f64)
    }
}

impl Add for RefTime {
    type Output = RefTime;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for RefTime {
    type Output = RefTime;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl From<i64> for RefTime {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<RefTime> for i64 {
    fn from(time: RefTime) -> Self {
        time.0
    }
}

/**
    Returns the stop time to use for a sample.

    A stop that is not strictly after start (and is not [`RefTime::UNKNOWN`])
    is replaced by `start + avg_frame_duration`.
*/
pub fn complete_stop(start: RefTime, stop: RefTime, avg_frame_duration: RefTime) -> RefTime {
    if stop <= start && !stop.is_unknown() {
        start + avg_frame_duration
    } else {
        stop
    }
}

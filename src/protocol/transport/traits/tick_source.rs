//! Monotonic millisecond tick abstraction providing the timing primitive
//! required by the enumeration timers and the transmit watchdog.
use embassy_time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Millisecond tick counter value. Wraps at `u32::MAX`.
pub struct Tick(pub u32);

impl Tick {
    /// Milliseconds from `earlier` to `self`, correct across one wraparound.
    pub fn since(self, earlier: Tick) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// True once strictly more than `timeout` has elapsed since `start`.
    pub fn has_expired(self, start: Tick, timeout: Duration) -> bool {
        let limit = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        self.since(start) > limit
    }
}

/// Source of the current tick; must be callable from interrupt context.
pub trait TickSource {
    /// Read the free-running millisecond counter.
    fn now(&self) -> Tick;
}

impl<T: TickSource> TickSource for &T {
    fn now(&self) -> Tick {
        (**self).now()
    }
}

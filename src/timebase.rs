//! Millisecond timebase advanced from the periodic timer interrupt.
//!
//! The counter is the sole time source for the task scheduler. It is a
//! single atomic word, so foreground reads never observe a torn value even
//! on cores where a plain multi-byte counter would need a re-read loop.
//! All consumers compare times with [`Timebase::ticks_since`], which is
//! wraparound-safe.

use portable_atomic::{AtomicU32, Ordering};

/// Free-running millisecond tick counter.
///
/// The timer ISR is the only writer ([`isr_tick`](Timebase::isr_tick));
/// everything else treats the counter as read-only.
pub struct Timebase {
    ticks: AtomicU32,
}

impl Timebase {
    /// Create a counter starting at tick zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU32::new(0),
        }
    }

    /// Advance the counter by one tick. Call from the timer interrupt only.
    pub fn isr_tick(&self) {
        // Single writer; wrapping on overflow is part of the contract.
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Current tick count. Wraps after `u32::MAX` ticks (~49.7 days).
    #[must_use]
    pub fn now(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Ticks elapsed from `earlier` to `now`, tolerating counter wraparound.
    #[must_use]
    pub const fn ticks_since(now: u32, earlier: u32) -> u32 {
        now.wrapping_sub(earlier)
    }
}

impl Default for Timebase {
    fn default() -> Self {
        Self::new()
    }
}

//! European daylight-saving-time tracking.
//!
//! DST starts at 2:00 on the last Sunday of March (clock jumps to 3:00)
//! and ends at 3:00 on the last Sunday of October (clock falls back to
//! 2:00, once). The tracker is called every minute with the current time
//! and the DST flag persisted in the settings; it answers with the active
//! flag, an optional RTC time adjustment, and an optional update of the
//! persisted flag. It is pure apart from its own small state, so the
//! once-only fall-back and the power-loss reconciliation are unit-tested
//! without an RTC.

use crate::datetime::{DateTime, last_sunday};

/// Per-transition state: armed, adjusting, or holding off re-triggering.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    /// Watching for the transition minute.
    Watching,
    /// Transition minute seen; adjust the clock on this call.
    Adjust,
    /// Adjustment done; wait until the trigger window has passed.
    Cooldown,
}

/// What the caller must do after a tracker step.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct DstStep {
    /// Whether DST is active after this step.
    pub dst_active: bool,
    /// Set the RTC time of day to this (hour, min, sec).
    pub set_time: Option<(u8, u8, u8)>,
    /// Persist this as the new stored DST flag.
    pub store_dst: Option<bool>,
}

/// Tracks the two yearly transitions and reconciles state after a power
/// cycle that straddled one.
pub struct DstTracker {
    advance: Phase,
    revert: Phase,
    dst_active: bool,
}

impl DstTracker {
    /// Create a tracker that has seen no transition yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            advance: Phase::Watching,
            revert: Phase::Watching,
            dst_active: false,
        }
    }

    /// Whether DST was active at the last step.
    #[must_use]
    pub const fn dst_active(&self) -> bool {
        self.dst_active
    }

    /// Run one tracking step. Call once per minute (and after setting the
    /// clock). `stored_dst` is the persisted flag from the settings.
    pub fn step(&mut self, now: &DateTime, stored_dst: bool) -> DstStep {
        let mut step = DstStep::default();
        let mut stored = stored_dst;

        if now.mon == 3 {
            let change_day = last_sunday(3, now.year);
            match self.advance {
                Phase::Watching => {
                    if now.day == change_day && now.hour == 2 && now.min == 0 {
                        self.advance = Phase::Adjust;
                    } else if now.day < change_day {
                        self.dst_active = false;
                    } else if now.day > change_day {
                        self.dst_active = true;
                    } else if now.hour < 2 {
                        self.dst_active = false;
                    }
                }
                Phase::Adjust => {
                    // Advance 2:00 to 3:00, once; seconds carry over.
                    step.set_time = Some((3, 0, now.sec));
                    step.store_dst = Some(true);
                    stored = true;
                    self.advance = Phase::Cooldown;
                    self.dst_active = true;
                }
                Phase::Cooldown => {
                    if now.min > 0 {
                        self.advance = Phase::Watching;
                    }
                    self.dst_active = true;
                }
            }
        } else if now.mon == 10 {
            let change_day = last_sunday(10, now.year);
            match self.revert {
                Phase::Watching => {
                    if now.day == change_day && now.hour == 3 && now.min == 0 {
                        self.revert = Phase::Adjust;
                    } else if now.day > change_day {
                        self.dst_active = false;
                    } else if now.day < change_day {
                        self.dst_active = true;
                    } else if now.hour < 3 {
                        self.dst_active = true;
                    }
                }
                Phase::Adjust => {
                    // Fall back 3:00 to 2:00 exactly once.
                    step.set_time = Some((2, 0, now.sec));
                    step.store_dst = Some(false);
                    stored = false;
                    self.revert = Phase::Cooldown;
                    self.dst_active = false;
                }
                Phase::Cooldown => {
                    // Stay here until past 3 AM so the fall-back cannot
                    // re-trigger inside the repeated 2:00-3:00 hour.
                    if now.hour > 3 {
                        self.revert = Phase::Watching;
                    }
                    self.dst_active = false;
                }
            }
        } else if now.mon < 3 || now.mon > 10 {
            self.dst_active = false;
        } else {
            self.dst_active = true;
        }

        // The clock may have been powered off across a transition; if the
        // persisted flag disagrees with the computed one, the RTC still
        // carries the old offset. Shift it and update the flag.
        if self.dst_active && !stored {
            let hour = if now.hour >= 23 { 0 } else { now.hour + 1 };
            step.set_time = Some((hour, now.min, now.sec));
            step.store_dst = Some(true);
        } else if !self.dst_active && stored {
            let hour = if now.hour > 0 { now.hour - 1 } else { 23 };
            step.set_time = Some((hour, now.min, now.sec));
            step.store_dst = Some(false);
        }

        step.dst_active = self.dst_active;
        step
    }
}

impl Default for DstTracker {
    fn default() -> Self {
        Self::new()
    }
}

//! Edge capture for the infrared receiver.
//!
//! The receiver demodulates the 38 kHz carrier and drives its output low
//! during a mark, so every pin edge marks the end of a mark or a space.
//! The pin-change interrupt timestamps each edge against a free-running
//! 32 µs counter and records the elapsed ticks in a raw buffer. A gap
//! longer than [`LONG_GAP_TICKS`] (or a full buffer) ends the frame: the
//! machine parks in `Stop` and raises the ready flag, and stays parked
//! until the foreground decoder has taken the buffer. Production halting
//! before the flag is raised is what makes the handoff safe: the buffer
//! is never written concurrently with its consumption.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Vec;
use portable_atomic::{AtomicBool, Ordering};

/// Capacity of the raw timing buffer. A full NEC data frame needs 68
/// entries; the rest is headroom for bounce and repeat tails.
pub const RAW_BUFFER_CAPACITY: usize = 99;

/// End-of-transmission gap in counter ticks: 20 ms at 32 µs per tick.
pub const LONG_GAP_TICKS: u16 = 625;

/// A level change on the receiver pin.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Output went low: a mark begins.
    Falling,
    /// Output went high: a mark ends.
    Rising,
}

/// Capture machine state. Only pin edges drive transitions; only the
/// foreground consumer resets `Stop` back to `Idle`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureState {
    /// Waiting for the first falling edge of a transmission.
    Idle,
    /// Inside a mark, waiting for the rising edge that ends it.
    Mark,
    /// Inside a space, waiting for the falling edge that ends it.
    Space,
    /// Frame complete (or buffer full); edges are ignored.
    Stop,
}

/// The raw timing buffer plus the capture state machine.
///
/// Pure state: `on_edge` is an ordinary function of (state, edge, ticks),
/// so the machine is unit-testable without interrupts. In the firmware it
/// is owned by [`IrReceiver`] and mutated from the pin-change ISR only.
pub struct EdgeCapture {
    state: CaptureState,
    raw: Vec<u16, RAW_BUFFER_CAPACITY>,
    prev_ticks: u16,
}

impl EdgeCapture {
    /// Create an idle capture machine.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            raw: Vec::new(),
            prev_ticks: 0,
        }
    }

    /// Feed one pin edge timestamped with the free-running counter value.
    /// Returns `true` when the frame is complete and ready for decoding.
    pub fn on_edge(&mut self, edge: Edge, ticks: u16) -> bool {
        let diff = ticks.wrapping_sub(self.prev_ticks);
        self.prev_ticks = ticks;
        let mut ready = false;
        match self.state {
            CaptureState::Idle => {
                if edge == Edge::Falling {
                    // First entry is the absolute counter value; the
                    // decoder skips it.
                    self.raw.clear();
                    let _ = self.raw.push(ticks);
                    self.state = CaptureState::Mark;
                }
            }
            CaptureState::Mark => {
                if edge == Edge::Rising {
                    if self.raw.push(diff).is_ok() {
                        self.state = CaptureState::Space;
                    } else {
                        ready = true;
                        self.state = CaptureState::Stop;
                    }
                }
            }
            CaptureState::Space => {
                if edge == Edge::Falling {
                    if diff > LONG_GAP_TICKS {
                        // Gap between transmissions: frame is complete.
                        ready = true;
                        self.state = CaptureState::Stop;
                    } else if self.raw.push(diff).is_ok() {
                        self.state = CaptureState::Mark;
                    } else {
                        ready = true;
                        self.state = CaptureState::Stop;
                    }
                }
            }
            CaptureState::Stop => {
                // Parked until the consumer resets the machine.
            }
        }
        ready
    }

    /// The captured durations, oldest first.
    #[must_use]
    pub fn raw(&self) -> &[u16] {
        &self.raw
    }

    /// Current state, for tests and diagnostics.
    #[must_use]
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Clear the buffer and return to `Idle` for the next transmission.
    pub fn reset(&mut self) {
        self.raw.clear();
        self.state = CaptureState::Idle;
    }
}

impl Default for EdgeCapture {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared home of the capture machine: written by the pin-change ISR,
/// drained by the foreground IR task.
///
/// The ready flag is the one-way handoff. The ISR raises it exactly when
/// the machine parks in `Stop`, and from then on ignores edges; the
/// consumer clears it only after it has copied the buffer out and reset
/// the machine.
pub struct IrReceiver {
    capture: Mutex<RefCell<EdgeCapture>>,
    ready: AtomicBool,
}

impl IrReceiver {
    /// Create an idle receiver. Intended for a `static`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            capture: Mutex::new(RefCell::new(EdgeCapture::new())),
            ready: AtomicBool::new(false),
        }
    }

    /// Record one pin edge. Call from the pin-change interrupt only.
    pub fn on_edge(&self, edge: Edge, ticks: u16) {
        let ready = critical_section::with(|cs| {
            self.capture.borrow_ref_mut(cs).on_edge(edge, ticks)
        });
        if ready {
            self.ready.store(true, Ordering::Release);
        }
    }

    /// `true` when a complete frame is waiting to be taken.
    #[must_use]
    pub fn frame_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Copy a completed frame out and re-arm the receiver.
    ///
    /// Returns the number of durations written into `out`, or `None` when
    /// no frame is ready. Foreground only.
    pub fn take_frame(&self, out: &mut [u16; RAW_BUFFER_CAPACITY]) -> Option<usize> {
        if !self.ready.load(Ordering::Acquire) {
            return None;
        }
        let len = critical_section::with(|cs| {
            let mut capture = self.capture.borrow_ref_mut(cs);
            let raw = capture.raw();
            let len = raw.len();
            out[..len].copy_from_slice(raw);
            capture.reset();
            len
        });
        self.ready.store(false, Ordering::Release);
        Some(len)
    }
}

impl Default for IrReceiver {
    fn default() -> Self {
        Self::new()
    }
}

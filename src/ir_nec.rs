//! NEC frame decoding over raw edge timings.
//!
//! The capture buffer holds durations in ticks of the 32 µs free-running
//! counter. A data frame is header mark + header space + 32 bit pairs +
//! stop mark; a repeat frame is header mark + repeat space + stop mark.
//! Every duration must fall inside a tolerance window around its nominal
//! value or the whole frame is rejected - no partial result is ever used.
//! Bits are accumulated MSB-first, matching the common receiver-library
//! code representation.

use derive_more::derive::{Display, Error};

use crate::shared_constants::IR_TICK_US;

/// Tolerance window in counter ticks: `(lo, hi)`, inclusive.
type Window = (u16, u16);

const fn window(nominal_us: u32, tolerance_pct: u32) -> Window {
    let lo = nominal_us * (100 - tolerance_pct) / (100 * IR_TICK_US);
    let hi = nominal_us * (100 + tolerance_pct) / (100 * IR_TICK_US);
    (lo as u16, hi as u16)
}

/// Header tolerance. The 9 ms leader is long enough that receiver AGC
/// distortion is proportionally small.
pub const HEADER_TOLERANCE_PCT: u32 = 7;
/// Bit-level tolerance. Single-unit pulses come out of the demodulator
/// with much more relative distortion than the leader.
pub const BIT_TOLERANCE_PCT: u32 = 25;
/// Repeat-space tolerance.
pub const REPEAT_TOLERANCE_PCT: u32 = 15;

/// 9 ms header mark (16 protocol units).
pub const HEADER_MARK: Window = window(9_000, HEADER_TOLERANCE_PCT);
/// 4.5 ms header space of a data frame.
pub const HEADER_SPACE: Window = window(4_500, HEADER_TOLERANCE_PCT);
/// 2.25 ms header space of a repeat frame.
pub const REPEAT_SPACE: Window = window(2_250, REPEAT_TOLERANCE_PCT);
/// 562.5 µs bit mark (one protocol unit).
pub const BIT_MARK: Window = window(562, BIT_TOLERANCE_PCT);
/// 562.5 µs space encoding a logic 0.
pub const ZERO_SPACE: Window = window(562, BIT_TOLERANCE_PCT);
/// 1687.5 µs space encoding a logic 1.
pub const ONE_SPACE: Window = window(1_687, BIT_TOLERANCE_PCT);

/// Samples in a full data frame: leading counter snapshot, header mark
/// and space, 32 bit pairs, stop mark.
pub const DATA_FRAME_LEN: usize = 68;
/// Samples in a repeat frame.
pub const REPEAT_FRAME_LEN: usize = 4;

/// A successfully decoded frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NecFrame {
    /// A 32-bit command code.
    Code(u32),
    /// The key is still held down; the previous code repeats.
    Repeat,
}

/// Why a frame was rejected. Timing failures are expected in normal
/// operation (ambient light, other remotes) and never fatal: the caller
/// discards the buffer and re-arms the receiver.
#[derive(Copy, Clone, Debug, Display, Error, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NecError {
    /// Sample count matches neither a data nor a repeat frame.
    #[display("frame length {_0} not decodable")]
    Length(#[error(not(source))] usize),

    /// Header mark outside its window.
    #[display("header mark out of tolerance")]
    HeaderMark,

    /// Header space of a data frame outside its window.
    #[display("header space out of tolerance")]
    HeaderSpace,

    /// Repeat frame whose space or stop mark is out of window.
    #[display("repeat header out of tolerance")]
    RepeatHeader,

    /// Bit mark at `_0` outside its window.
    #[display("bit mark at sample {_0} out of tolerance")]
    Mark(#[error(not(source))] usize),

    /// Bit space at `_0` classified as neither one nor zero.
    #[display("bit space at sample {_0} out of tolerance")]
    Space(#[error(not(source))] usize),
}

const fn in_window(ticks: u16, window: Window) -> bool {
    ticks >= window.0 && ticks <= window.1
}

/// Decode a captured frame.
///
/// `raw[0]` is the absolute counter snapshot taken at the first edge and
/// carries no timing information; decoding starts at `raw[1]`.
///
/// # Errors
/// A [`NecError`] naming the first sample that fell outside its window,
/// or [`NecError::Length`] when the sample count fits no frame type.
pub fn decode(raw: &[u16]) -> Result<NecFrame, NecError> {
    if raw.len() < DATA_FRAME_LEN && raw.len() != REPEAT_FRAME_LEN {
        return Err(NecError::Length(raw.len()));
    }

    if !in_window(raw[1], HEADER_MARK) {
        return Err(NecError::HeaderMark);
    }

    if raw.len() == REPEAT_FRAME_LEN {
        if in_window(raw[2], REPEAT_SPACE) && in_window(raw[3], BIT_MARK) {
            return Ok(NecFrame::Repeat);
        }
        return Err(NecError::RepeatHeader);
    }

    if !in_window(raw[2], HEADER_SPACE) {
        return Err(NecError::HeaderSpace);
    }

    let mut code: u32 = 0;
    let mut offset = 3;
    // The final stop mark is deliberately left unconsumed.
    while offset + 1 < raw.len() {
        if !in_window(raw[offset], BIT_MARK) {
            return Err(NecError::Mark(offset));
        }
        let space = raw[offset + 1];
        if in_window(space, ONE_SPACE) {
            code = (code << 1) | 1;
        } else if in_window(space, ZERO_SPACE) {
            code <<= 1;
        } else {
            return Err(NecError::Space(offset + 1));
        }
        offset += 2;
    }
    Ok(NecFrame::Code(code))
}

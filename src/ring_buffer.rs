//! Lock-free single-producer single-consumer byte queue.
//!
//! Decouples the byte-oriented UART hardware from buffered reads and
//! writes. One side of each queue runs in interrupt context, the other in
//! the foreground, so the indices are atomics and one slot is reserved to
//! tell a full buffer from an empty one. A push into a full buffer is
//! rejected; existing contents are never overwritten.

use portable_atomic::{AtomicU8, AtomicUsize, Ordering};

/// Fixed-capacity circular byte buffer.
///
/// `head` is the next write position and belongs to the producer; `tail`
/// is the next read position and belongs to the consumer. Usable capacity
/// is `N - 1`.
pub struct RingBuffer<const N: usize> {
    buffer: [AtomicU8; N],
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl<const N: usize> RingBuffer<N> {
    /// Create an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [const { AtomicU8::new(0) }; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Append a byte. Returns `false` (and drops the byte) when full.
    pub fn push(&self, byte: u8) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let next = Self::step(head);
        if next == tail {
            return false;
        }
        self.buffer[head].store(byte, Ordering::Relaxed);
        self.head.store(next, Ordering::Release);
        true
    }

    /// Remove and return the oldest byte, or `None` when empty.
    pub fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let byte = self.buffer[tail].load(Ordering::Relaxed);
        self.tail.store(Self::step(tail), Ordering::Release);
        Some(byte)
    }

    /// `true` when no bytes are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed) == self.tail.load(Ordering::Relaxed)
    }

    /// `true` when another push would be rejected.
    #[must_use]
    pub fn is_full(&self) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        Self::step(head) == tail
    }

    /// Number of queued bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        if head >= tail { head - tail } else { N - tail + head }
    }

    /// Usable capacity (one slot is reserved).
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    const fn step(index: usize) -> usize {
        (index + 1) % N
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::RingBuffer;

    #[test]
    fn fifo_order() {
        let ring = RingBuffer::<8>::new();
        for byte in 0..5u8 {
            assert!(ring.push(byte));
        }
        for byte in 0..5u8 {
            assert_eq!(ring.pop(), Some(byte));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn full_push_is_rejected_without_corruption() {
        let ring = RingBuffer::<4>::new();
        assert!(ring.push(1));
        assert!(ring.push(2));
        assert!(ring.push(3));
        assert!(ring.is_full());
        assert!(!ring.push(4));
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.pop(), Some(1));
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.pop(), Some(3));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn wraparound_preserves_order() {
        let ring = RingBuffer::<4>::new();
        for round in 0..10u8 {
            for i in 0..3 {
                assert!(ring.push(round * 3 + i));
            }
            for i in 0..3 {
                assert_eq!(ring.pop(), Some(round * 3 + i));
            }
        }
    }

    #[test]
    fn capacity_reserves_one_slot() {
        let ring = RingBuffer::<16>::new();
        assert_eq!(ring.capacity(), 15);
    }
}

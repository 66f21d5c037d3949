//! Interrupt-driven UART with ring-buffered transmit and receive.
//!
//! The hardware side is two operations behind the [`UartHw`] trait:
//! writing the data register and gating the "transmit register empty"
//! interrupt. Everything else - the queues, the backpressure, the
//! overflow policy - lives here and is testable on the host.
//!
//! Transmit: the foreground enqueues; the TX ISR drains one byte per
//! interrupt and switches its own interrupt off when the queue empties.
//! Receive: the RX ISR enqueues; on a full queue the byte is dropped and
//! an overflow flag raised, because an ISR must never block.

use embedded_hal::delay::DelayNs;
use portable_atomic::{AtomicBool, Ordering};

use crate::ring_buffer::RingBuffer;

/// The two register-level operations the driver needs from the UART.
pub trait UartHw {
    /// Write one byte to the transmit data register.
    fn write_data(&mut self, byte: u8);
    /// Enable or disable the transmit-register-empty interrupt.
    fn set_tx_interrupt(&mut self, enable: bool);
}

/// Buffered UART endpoint. Lives in a `static`; every method takes
/// `&self`.
pub struct Uart<const TX_N: usize = 64, const RX_N: usize = 32> {
    tx: RingBuffer<TX_N>,
    rx: RingBuffer<RX_N>,
    rx_overflow: AtomicBool,
}

impl<const TX_N: usize, const RX_N: usize> Uart<TX_N, RX_N> {
    /// Create an idle UART with empty queues.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tx: RingBuffer::new(),
            rx: RingBuffer::new(),
            rx_overflow: AtomicBool::new(false),
        }
    }

    /// Queue one byte for transmission, waiting while the queue is full.
    ///
    /// The wait is a bounded spin: one queue slot drains per TX interrupt,
    /// at most a character time apart. The critical section covers the
    /// empty-check plus enqueue so the TX ISR cannot disable its interrupt
    /// between our check and the push.
    pub fn putc<H: UartHw, D: DelayNs>(&self, hw: &mut H, delay: &mut D, byte: u8) {
        while self.tx.is_full() {
            delay.delay_ms(1);
        }
        critical_section::with(|_cs| {
            if self.tx.is_empty() {
                // First byte in: the TX-empty interrupt starts the drain.
                hw.set_tx_interrupt(true);
            }
            let pushed = self.tx.push(byte);
            // The ISR only removes bytes, so the slot observed above is
            // still free.
            debug_assert!(pushed);
        });
    }

    /// Send a string, expanding `\n` to `\r\n` for terminals.
    pub fn write_str<H: UartHw, D: DelayNs>(&self, hw: &mut H, delay: &mut D, text: &str) {
        for &byte in text.as_bytes() {
            if byte == b'\n' {
                self.putc(hw, delay, b'\r');
            }
            self.putc(hw, delay, byte);
        }
    }

    /// TX-register-empty interrupt body: feed the hardware one byte, or
    /// switch the interrupt off when there is nothing left.
    pub fn tx_isr<H: UartHw>(&self, hw: &mut H) {
        match self.tx.pop() {
            Some(byte) => hw.write_data(byte),
            None => hw.set_tx_interrupt(false),
        }
    }

    /// Receive interrupt body: queue the byte, or drop it and flag the
    /// overflow when the queue is full.
    pub fn rx_isr(&self, byte: u8) {
        if self.rx.push(byte) {
            self.rx_overflow.store(false, Ordering::Relaxed);
        } else {
            self.rx_overflow.store(true, Ordering::Relaxed);
        }
    }

    /// Whether a received byte is waiting.
    #[must_use]
    pub fn kbhit(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Take the oldest received byte.
    pub fn getc(&self) -> Option<u8> {
        self.rx.pop()
    }

    /// Whether the receiver has dropped a byte since the last successful
    /// enqueue.
    #[must_use]
    pub fn rx_overflowed(&self) -> bool {
        self.rx_overflow.load(Ordering::Relaxed)
    }
}

impl<const TX_N: usize, const RX_N: usize> Default for Uart<TX_N, RX_N> {
    fn default() -> Self {
        Self::new()
    }
}

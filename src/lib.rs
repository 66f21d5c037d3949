//! Core firmware library for a multi-board 7-segment WS2812 LED clock.
//!
//! The hard parts of the firmware - the cooperative scheduler, the IR
//! edge capture and NEC decoding, the bit-banged I2C master with bus
//! recovery, and the interrupt-safe UART queues - are implemented here
//! against small hardware traits ([`I2cPins`], [`UartHw`],
//! `embedded_hal::delay::DelayNs`), so the whole crate builds and tests
//! on the host. A board crate supplies the trait implementations, the
//! interrupt vectors that call the `*_isr` entry points, and the WS2812
//! transmitter (any [`smart_leds::SmartLedsWrite`] sink for
//! [`display::Frame`]).
//!
//! Interrupt/foreground ownership is part of the API: types whose ISR
//! methods take `&self` ([`SchedulerTick`], [`IrReceiver`], [`Uart`],
//! [`Timebase`]) are meant for `static`s shared with interrupt handlers;
//! foreground-owned tables ([`Scheduler`], [`ClockApp`]) are `&mut` and
//! never touched from an ISR.
#![no_std]

#[cfg(test)]
extern crate std;

pub mod app;
pub mod console;
pub mod datetime;
pub mod display;
pub mod ds3231;
pub mod dst;
mod error;
pub mod i2c_bb;
pub mod ir_capture;
pub mod ir_mapping;
pub mod ir_nec;
pub mod ring_buffer;
pub mod scheduler;
pub mod settings;
pub mod shared_constants;
pub mod timebase;
pub mod uart;

// Re-export commonly used items
pub use app::{ClockApp, IrCommand, IrMode};
pub use console::{Command, Console, ConsoleEvent};
pub use datetime::DateTime;
pub use display::Frame;
pub use ds3231::Ds3231;
pub use dst::DstTracker;
pub use error::{Error, Result};
pub use i2c_bb::{Ack, BusFault, I2cBitBang, I2cPins};
pub use ir_capture::{Edge, EdgeCapture, IrReceiver};
pub use ir_mapping::Key;
pub use ir_nec::{NecError, NecFrame};
pub use ring_buffer::RingBuffer;
pub use scheduler::{Scheduler, SchedulerTick};
pub use settings::{Eeprom, Settings, TimeOfDay};
pub use shared_constants::*;
pub use timebase::Timebase;
pub use uart::{Uart, UartHw};

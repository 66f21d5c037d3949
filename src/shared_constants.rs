//! Constants shared across the clock modules.

/// Scheduler tick rate: one tick per millisecond.
pub const SCHEDULER_HZ: u32 = 1_000;

/// Period of the free-running IR capture counter in microseconds
/// (31.25 kHz).
pub const IR_TICK_US: u32 = 32;

/// Number of chained display boards. One board per digit:
/// seconds, tens of seconds, minutes, tens of minutes, hours, tens of hours.
pub const BOARD_COUNT: usize = 6;

/// WS2812 devices per board: 7 segments of 4 LEDs plus a decimal point.
pub const LEDS_PER_BOARD: usize = 29;

/// Total length of the LED chain.
pub const LED_COUNT: usize = BOARD_COUNT * LEDS_PER_BOARD;

/// Power-on LED intensity, used until the stored settings are loaded.
pub const DEFAULT_INTENSITY: u8 = 0x10;

/// Version string reported by the `s0` console command.
pub const VERSION: &str = "Clock SSD v0.41";

use derive_more::derive::{Display, Error};

use crate::i2c_bb::BusFault;

/// A specialized `Result` where the error is this crate's `Error` type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Define a unified error type for this crate.
#[derive(Debug, Display, Error, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The fixed-capacity task table cannot take another entry.
    #[display("task table is full")]
    TaskTableFull,

    /// A task was registered with a zero period or a phase offset that is
    /// not smaller than its period.
    #[display("task period must be non-zero and greater than its phase offset")]
    InvalidTaskPeriod,

    /// The addressed I2C device did not acknowledge.
    #[display("no acknowledge from I2C device")]
    I2cNack,

    /// The I2C bus could not be recovered.
    #[display("I2C bus fault: {_0}")]
    I2cBus(BusFault),

    /// A time or date value was outside its valid range.
    #[display("time or date field out of range")]
    InvalidTimeField,

    /// The serialized settings image exceeds its reserved EEPROM area.
    #[display("settings image does not fit its EEPROM area")]
    SettingsTooLarge,

    /// The console line did not start with a known command letter.
    #[display("unrecognized console command")]
    UnknownCommand,

    /// A console command carried a malformed or missing argument.
    #[display("malformed console command argument")]
    InvalidArgument,

    /// Formatting into a fixed-capacity buffer failed.
    #[display("format error")]
    FormatError,
}

impl From<core::fmt::Error> for Error {
    fn from(_: core::fmt::Error) -> Self {
        Self::FormatError
    }
}

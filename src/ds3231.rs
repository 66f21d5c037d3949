//! DS3231 real-time clock over the bit-banged I2C bus.
//!
//! Register transactions only: the calendar logic lives in
//! [`crate::datetime`] and [`crate::dst`]. All times on the chip are kept
//! in 24-hour BCD.

use embedded_hal::delay::DelayNs;

use crate::datetime::{DateTime, day_of_week};
use crate::i2c_bb::{Ack, I2cBitBang, I2cPins};
use crate::{Error, Result};

/// 8-bit bus address (write form).
pub const DS3231_ADDR: u8 = 0xD0;

const I2C_WRITE: u8 = 0x00;
const I2C_READ: u8 = 0x01;

/// Register map.
pub mod reg {
    pub const SECONDS: u8 = 0x00;
    pub const MINUTES: u8 = 0x01;
    pub const HOURS: u8 = 0x02;
    pub const DOW: u8 = 0x03;
    pub const DATE: u8 = 0x04;
    pub const MONTH: u8 = 0x05;
    pub const YEAR: u8 = 0x06;
    pub const CONTROL: u8 = 0x0E;
    pub const STATUS: u8 = 0x0F;
    pub const AGING: u8 = 0x10;
    pub const TEMP_MSB: u8 = 0x11;
    pub const TEMP_LSB: u8 = 0x12;
}

fn bcd_decode(value: u8) -> u8 {
    let value = value & 0x7F;
    (value & 0x0F) + 10 * (value >> 4)
}

fn bcd_decode_hours(value: u8) -> u8 {
    if value & 0x40 != 0 {
        // 12-hour mode: bit 5 is the 10-hour digit, AM/PM is ignored
        // because the chip is always programmed in 24-hour mode here.
        (value & 0x0F) + if value & 0x20 != 0 { 10 } else { 0 }
    } else {
        (value & 0x0F) + 10 * ((value & 0x30) >> 4)
    }
}

fn bcd_encode(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// DS3231 driver. Owns the bus: the RTC is the only device on it.
pub struct Ds3231<P, D> {
    i2c: I2cBitBang<P, D>,
}

impl<P: I2cPins, D: DelayNs> Ds3231<P, D> {
    /// Wrap an initialized bus.
    pub const fn new(i2c: I2cBitBang<P, D>) -> Self {
        Self { i2c }
    }

    /// Borrow the underlying bus, e.g. for the `s2` console bus scan.
    pub fn bus_mut(&mut self) -> &mut I2cBitBang<P, D> {
        &mut self.i2c
    }

    /// Read a single register.
    ///
    /// # Errors
    /// [`Error::I2cNack`] when the chip does not answer.
    pub fn read_register(&mut self, register: u8) -> Result<u8> {
        let selected = self.i2c.start(DS3231_ADDR | I2C_WRITE);
        let value = if selected.is_ack() {
            self.i2c.write(register);
            self.i2c.rep_start(DS3231_ADDR | I2C_READ);
            Some(self.i2c.read(Ack::Nack))
        } else {
            None
        };
        self.i2c.stop();
        value.ok_or(Error::I2cNack)
    }

    /// Write a single register.
    ///
    /// # Errors
    /// [`Error::I2cNack`] when the chip does not answer.
    pub fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        let selected = self.i2c.start(DS3231_ADDR | I2C_WRITE);
        if selected.is_ack() {
            self.i2c.write(register);
            self.i2c.write(value);
        }
        self.i2c.stop();
        if selected.is_ack() {
            Ok(())
        } else {
            Err(Error::I2cNack)
        }
    }

    /// Burst-read the seven timekeeping registers.
    ///
    /// # Errors
    /// [`Error::I2cNack`] when the chip does not answer.
    pub fn get_time(&mut self) -> Result<DateTime> {
        let selected = self.i2c.start(DS3231_ADDR | I2C_WRITE);
        let time = if selected.is_ack() {
            self.i2c.write(reg::SECONDS);
            self.i2c.rep_start(DS3231_ADDR | I2C_READ);
            let sec = bcd_decode(self.i2c.read(Ack::Ack));
            let min = bcd_decode(self.i2c.read(Ack::Ack));
            let hour = bcd_decode_hours(self.i2c.read(Ack::Ack));
            let dow = self.i2c.read(Ack::Ack);
            let day = bcd_decode(self.i2c.read(Ack::Ack));
            let mon = bcd_decode(self.i2c.read(Ack::Ack) & 0x1F);
            let year = 2_000 + u16::from(bcd_decode(self.i2c.read(Ack::Nack)));
            Some(DateTime {
                year,
                mon,
                day,
                dow,
                hour,
                min,
                sec,
            })
        } else {
            None
        };
        self.i2c.stop();
        time.ok_or(Error::I2cNack)
    }

    /// Set the time of day. The date registers are left untouched.
    ///
    /// # Errors
    /// [`Error::InvalidTimeField`] for out-of-range fields,
    /// [`Error::I2cNack`] when the chip does not answer.
    pub fn set_time(&mut self, hour: u8, min: u8, sec: u8) -> Result<()> {
        if hour >= 24 || min >= 60 || sec >= 60 {
            return Err(Error::InvalidTimeField);
        }
        self.write_register(reg::HOURS, bcd_encode(hour))?;
        self.write_register(reg::MINUTES, bcd_encode(min))?;
        self.write_register(reg::SECONDS, bcd_encode(sec))
    }

    /// Set the date; the day-of-week register is derived from the date.
    ///
    /// # Errors
    /// [`Error::InvalidTimeField`] for out-of-range fields,
    /// [`Error::I2cNack`] when the chip does not answer.
    pub fn set_date(&mut self, day: u8, mon: u8, year: u16) -> Result<()> {
        if day == 0 || day > 31 || mon == 0 || mon > 12 || !(2_000..3_000).contains(&year) {
            return Err(Error::InvalidTimeField);
        }
        self.write_register(reg::DOW, day_of_week(day, mon, year))?;
        self.write_register(reg::YEAR, bcd_encode((year - 2_000) as u8))?;
        self.write_register(reg::MONTH, bcd_encode(mon))?;
        self.write_register(reg::DATE, bcd_encode(day))
    }

    /// Set the day-of-week register, 1 = Monday ... 7 = Sunday.
    ///
    /// # Errors
    /// [`Error::InvalidTimeField`] or [`Error::I2cNack`].
    pub fn set_dow(&mut self, dow: u8) -> Result<()> {
        if dow == 0 || dow > 7 {
            return Err(Error::InvalidTimeField);
        }
        self.write_register(reg::DOW, dow)
    }

    /// Die temperature in quarter degrees Celsius (Q8.2).
    ///
    /// # Errors
    /// [`Error::I2cNack`] when the chip does not answer.
    pub fn temperature(&mut self) -> Result<i16> {
        let msb = self.read_register(reg::TEMP_MSB)?;
        let lsb = self.read_register(reg::TEMP_LSB)?;
        Ok((i16::from(msb as i8) << 2) | i16::from(lsb >> 6))
    }
}

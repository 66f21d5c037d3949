//! Serial console: line accumulation and the command grammar.
//!
//! One letter selects the command family, an immediately following number
//! the sub-command, and date/time arguments follow after a space,
//! separated by `:`, `-` or `.`:
//!
//! ```text
//! d0 14-3-2021    set date
//! d1 12:34:56     set time
//! d2              print date, time and blanking window
//! d3              print RTC temperature
//! d4 23:30        set blanking start
//! d5 8:30         set blanking end
//! i40             set LED intensity (1-255)
//! s0              firmware version
//! s1              list scheduler tasks
//! s2              scan the I2C bus
//! w0 / w1         test pattern off / on
//! ```
//!
//! Parsing is pure and separate from execution (which needs the RTC, the
//! EEPROM and the scheduler - see the application layer), so the grammar
//! is tested without hardware.

use heapless::String;

use crate::settings::TimeOfDay;
use crate::{Error, Result};

/// Maximum command line length, terminator excluded.
pub const LINE_CAPACITY: usize = 32;

/// A parsed console command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// `d0 dd-mm-yyyy`
    SetDate { day: u8, mon: u8, year: u16 },
    /// `d1 hh:mm:ss`
    SetTime { hour: u8, min: u8, sec: u8 },
    /// `d2`
    ShowDateTime,
    /// `d3`
    ShowTemperature,
    /// `d4 hh:mm`
    SetBlankBegin(TimeOfDay),
    /// `d5 hh:mm`
    SetBlankEnd(TimeOfDay),
    /// `i<n>`
    SetIntensity(u8),
    /// `s0`
    ShowVersion,
    /// `s1`
    ListTasks,
    /// `s2`
    ScanBus,
    /// `w<0|1>`
    TestPattern(bool),
}

/// What one received byte produced.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// Nothing to do.
    Idle,
    /// Echo this byte back to the terminal.
    Echo(u8),
    /// A full line was terminated; echo a newline and act on the result.
    Line(Result<Command>),
}

/// Accumulates terminal input into lines and parses them.
#[derive(Default)]
pub struct Console {
    line: String<LINE_CAPACITY>,
}

impl Console {
    /// An empty console.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            line: String::new(),
        }
    }

    /// Feed one received byte.
    pub fn feed(&mut self, byte: u8) -> ConsoleEvent {
        match byte {
            b'\n' => ConsoleEvent::Idle,
            b'\r' => {
                let command = parse(&self.line);
                self.line.clear();
                ConsoleEvent::Line(command)
            }
            _ => {
                let ch = byte.to_ascii_lowercase();
                if self.line.push(ch as char).is_ok() {
                    ConsoleEvent::Echo(ch)
                } else {
                    // Line overrun: start over, like any tiny terminal.
                    self.line.clear();
                    ConsoleEvent::Idle
                }
            }
        }
    }
}

/// Parse one complete line.
///
/// # Errors
/// [`Error::UnknownCommand`] for an unknown command letter or
/// sub-command, [`Error::InvalidArgument`] for malformed numbers.
pub fn parse(line: &str) -> Result<Command> {
    let mut chars = line.chars();
    let letter = chars.next().ok_or(Error::UnknownCommand)?;
    let rest = chars.as_str();
    let number = leading_number(rest)?;

    match letter {
        'd' => parse_date_command(number, line),
        'i' => {
            if number == 0 || number > 255 {
                return Err(Error::InvalidArgument);
            }
            Ok(Command::SetIntensity(number as u8))
        }
        's' => match number {
            0 => Ok(Command::ShowVersion),
            1 => Ok(Command::ListTasks),
            2 => Ok(Command::ScanBus),
            _ => Err(Error::UnknownCommand),
        },
        'w' => Ok(Command::TestPattern(number != 0)),
        _ => Err(Error::UnknownCommand),
    }
}

fn parse_date_command(number: u16, line: &str) -> Result<Command> {
    // Arguments start after "dN ".
    let args = line.get(3..).unwrap_or("");
    match number {
        0 => {
            let [day, mon, year] = fields::<3>(args)?;
            Ok(Command::SetDate {
                day: narrow(day)?,
                mon: narrow(mon)?,
                year,
            })
        }
        1 => {
            let [hour, min, sec] = fields::<3>(args)?;
            Ok(Command::SetTime {
                hour: narrow(hour)?,
                min: narrow(min)?,
                sec: narrow(sec)?,
            })
        }
        2 => Ok(Command::ShowDateTime),
        3 => Ok(Command::ShowTemperature),
        4 => {
            let time = blanking_time(args)?;
            Ok(Command::SetBlankBegin(time))
        }
        5 => {
            let time = blanking_time(args)?;
            Ok(Command::SetBlankEnd(time))
        }
        _ => Err(Error::UnknownCommand),
    }
}

fn blanking_time(args: &str) -> Result<TimeOfDay> {
    let [hour, min] = fields::<2>(args)?;
    if hour >= 24 || min >= 60 {
        return Err(Error::InvalidArgument);
    }
    Ok(TimeOfDay::new(narrow(hour)?, narrow(min)?))
}

/// Digits immediately after the command letter; absent digits read as 0.
fn leading_number(text: &str) -> Result<u16> {
    let digits: &str = {
        let end = text
            .char_indices()
            .find(|(_, ch)| !ch.is_ascii_digit())
            .map_or(text.len(), |(index, _)| index);
        &text[..end]
    };
    if digits.is_empty() {
        return Ok(0);
    }
    digits.parse().map_err(|_| Error::InvalidArgument)
}

/// Split `N` numeric fields on `:`, `-` or `.` separators.
fn fields<const N: usize>(args: &str) -> Result<[u16; N]> {
    let mut out = [0u16; N];
    let mut parts = args.split([':', '-', '.']);
    for slot in &mut out {
        let part = parts.next().ok_or(Error::InvalidArgument)?;
        *slot = part.trim().parse().map_err(|_| Error::InvalidArgument)?;
    }
    Ok(out)
}

fn narrow(value: u16) -> Result<u8> {
    u8::try_from(value).map_err(|_| Error::InvalidArgument)
}

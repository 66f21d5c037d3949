//! Persisted clock settings.
//!
//! The settings live in external byte-addressed EEPROM behind the
//! [`Eeprom`] trait. The image is a magic/version header, a postcard
//! payload, and a CRC32 over version, length and payload; anything that
//! does not check out (fresh chip, interrupted write, version bump) falls
//! back to the defaults.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::datetime::minutes_of_day;
use crate::{Error, Result};

/// Byte-addressed non-volatile storage.
///
/// On the clock hardware this is the MCU's data EEPROM; reads and writes
/// are memory-mapped and cannot fail, so the trait is infallible. Tests
/// implement it over an array.
pub trait Eeprom {
    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    fn read(&mut self, offset: usize, buf: &mut [u8]);
    /// Write `data` starting at `offset`.
    fn write(&mut self, offset: usize, data: &[u8]);
}

/// "CLKS"
const MAGIC: u32 = 0x434C_4B53;
const VERSION: u16 = 1;

const MAGIC_END: usize = 4;
const VERSION_END: usize = 6;
const LEN_END: usize = 8;
const PAYLOAD_START: usize = 8;

/// Reserved EEPROM area for the settings image.
pub const SETTINGS_IMAGE_SIZE: usize = 32;

const PAYLOAD_MAX: usize = SETTINGS_IMAGE_SIZE - PAYLOAD_START - 4;

/// A wall-clock instant within one day.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeOfDay {
    pub hour: u8,
    pub min: u8,
}

impl TimeOfDay {
    /// Construct, without range checking (the console layer validates).
    #[must_use]
    pub const fn new(hour: u8, min: u8) -> Self {
        Self { hour, min }
    }
}

/// User-adjustable state that survives a power cycle.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    /// WS2812 PWM value used for lit segments, 1-255.
    pub intensity: u8,
    /// Whether the RTC currently carries the DST offset.
    pub dst_active: bool,
    /// Start of the nightly blanking window.
    pub blank_begin: TimeOfDay,
    /// End of the nightly blanking window.
    pub blank_end: TimeOfDay,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            intensity: crate::shared_constants::DEFAULT_INTENSITY,
            dst_active: false,
            blank_begin: TimeOfDay::new(23, 30),
            blank_end: TimeOfDay::new(8, 30),
        }
    }
}

impl Settings {
    /// Whether the display is blanked at the given time of day.
    ///
    /// The window may wrap midnight: 23:30-08:30 blanks the night,
    /// 02:30-05:30 only the small hours.
    #[must_use]
    pub fn blanking_active(&self, hour: u8, min: u8) -> bool {
        let x = minutes_of_day(hour, min);
        let b = minutes_of_day(self.blank_begin.hour, self.blank_begin.min);
        let e = minutes_of_day(self.blank_end.hour, self.blank_end.min);
        (b >= e && (x >= b || x <= e)) || (x >= b && x < e)
    }

    /// Load the stored settings, falling back to defaults when the image
    /// is missing or damaged.
    pub fn load<E: Eeprom>(eeprom: &mut E) -> Self {
        let mut image = [0u8; SETTINGS_IMAGE_SIZE];
        eeprom.read(0, &mut image);

        if u32::from_le_bytes(image[..MAGIC_END].try_into().unwrap()) != MAGIC {
            return Self::default();
        }
        if u16::from_le_bytes(image[MAGIC_END..VERSION_END].try_into().unwrap()) != VERSION {
            return Self::default();
        }
        let len = usize::from(u16::from_le_bytes(
            image[VERSION_END..LEN_END].try_into().unwrap(),
        ));
        if len > PAYLOAD_MAX {
            return Self::default();
        }
        let payload_end = PAYLOAD_START + len;
        let crc_stored =
            u32::from_le_bytes(image[payload_end..payload_end + 4].try_into().unwrap());
        if compute_crc(&image[MAGIC_END..payload_end]) != crc_stored {
            return Self::default();
        }
        postcard::from_bytes(&image[PAYLOAD_START..payload_end]).unwrap_or_default()
    }

    /// Persist the settings.
    ///
    /// # Errors
    /// [`Error::SettingsTooLarge`] if the serialized payload does not fit
    /// the reserved area (a programming error, not a runtime condition).
    pub fn save<E: Eeprom>(&self, eeprom: &mut E) -> Result<()> {
        let mut image = [0xFFu8; SETTINGS_IMAGE_SIZE];
        image[..MAGIC_END].copy_from_slice(&MAGIC.to_le_bytes());
        image[MAGIC_END..VERSION_END].copy_from_slice(&VERSION.to_le_bytes());

        let len = {
            let payload = &mut image[PAYLOAD_START..PAYLOAD_START + PAYLOAD_MAX];
            postcard::to_slice(self, payload)
                .map_err(|_| Error::SettingsTooLarge)?
                .len()
        };
        image[VERSION_END..LEN_END].copy_from_slice(&(len as u16).to_le_bytes());

        let payload_end = PAYLOAD_START + len;
        let crc = compute_crc(&image[MAGIC_END..payload_end]);
        image[payload_end..payload_end + 4].copy_from_slice(&crc.to_le_bytes());

        eeprom.write(0, &image);
        Ok(())
    }
}

fn compute_crc(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

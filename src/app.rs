//! Application layer: the task bodies behind the scheduler entries.
//!
//! The canonical task set, registered at start-up:
//!
//! ```text
//! add_task(pattern_task, "PTRN",   0,  100);
//! add_task(led_task,     "WS2812", 25, 500);
//! add_task(ir_task,      "IR",     50, 100);
//! add_task(clock_task,   "CLK",    75, 1000);
//! ```
//!
//! The board crate owns the statics ([`crate::IrReceiver`],
//! [`crate::Uart`], the scheduler halves) and wraps these methods in
//! niladic task functions; everything stateful lives in [`ClockApp`] so
//! the behaviour is testable without hardware.

use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use heapless::String;

use crate::console::Command;
use crate::datetime::{DateTime, day_name, day_of_week};
use crate::display::{Frame, TestPattern};
use crate::ds3231::Ds3231;
use crate::dst::DstTracker;
use crate::i2c_bb::I2cPins;
use crate::ir_capture::{IrReceiver, RAW_BUFFER_CAPACITY};
use crate::ir_mapping::Key;
use crate::ir_nec::decode;
use crate::scheduler::Scheduler;
use crate::settings::{Eeprom, Settings};
use crate::shared_constants::VERSION;
use crate::{Error, Result};

/// IR command-mode timeout: 10 s of no keypresses at the 100 ms IR task
/// period drops back to idle.
const IR_MODE_TIMEOUT_STEPS: u8 = 100;

/// Remote-control command mode, armed by a digit key.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrMode {
    Idle,
    /// Digit 0 pressed; display commands.
    DisplayMenu,
    /// Digit 1 pressed; time commands.
    TimeMenu,
}

/// Key-driven mode machine, stepped once per IR task period.
pub struct IrCommand {
    mode: IrMode,
    idle_steps: u8,
}

impl IrCommand {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: IrMode::Idle,
            idle_steps: 0,
        }
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> IrMode {
        self.mode
    }

    /// Feed the key seen this period ([`Key::None`] if none).
    pub fn step(&mut self, key: Key) {
        if key == Key::None {
            self.idle_steps = self.idle_steps.saturating_add(1);
            if self.idle_steps > IR_MODE_TIMEOUT_STEPS {
                self.mode = IrMode::Idle;
                return;
            }
        } else {
            self.idle_steps = 0;
        }

        if self.mode == IrMode::Idle {
            match key {
                Key::Digit(0) => self.mode = IrMode::DisplayMenu,
                Key::Digit(1) => self.mode = IrMode::TimeMenu,
                _ => {}
            }
        }
    }
}

impl Default for IrCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// All mutable application state.
pub struct ClockApp {
    /// Current time, refreshed once per second by the clock task.
    pub now: DateTime,
    /// User settings, loaded at start-up.
    pub settings: Settings,
    /// The LED frame the WS2812 task transmits.
    pub frame: Frame,
    /// Key-driven remote command state.
    pub ir_command: IrCommand,
    dst: DstTracker,
    test_pattern_enabled: bool,
    pattern: TestPattern,
    powerup: bool,
}

impl ClockApp {
    /// Fresh application state: power-on time, test pattern running.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            now: DateTime::POWER_ON,
            settings,
            frame: Frame::new(),
            ir_command: IrCommand::new(),
            dst: DstTracker::new(),
            test_pattern_enabled: true,
            pattern: TestPattern::new(),
            powerup: true,
        }
    }

    /// Whether the power-up test pattern is still active.
    #[must_use]
    pub const fn test_pattern_enabled(&self) -> bool {
        self.test_pattern_enabled
    }

    /// 100 ms pattern task: refresh the LED frame.
    ///
    /// Until the RTC has answered once (or `w0` disabled the pattern) the
    /// chain shows the cycling test pattern; during the blanking window
    /// the frame is dark.
    pub fn pattern_task(&mut self) {
        if self.test_pattern_enabled {
            self.pattern.step(&mut self.frame, self.settings.intensity);
            return;
        }
        if self.powerup || self.settings.blanking_active(self.now.hour, self.now.min) {
            self.frame.clear();
            return;
        }
        self.frame.render_time(&self.now, self.settings.intensity);
    }

    /// 1 s clock task: refresh the time from the RTC and run the DST
    /// tracker at the top of each minute.
    pub fn clock_task<P: I2cPins, D: DelayNs, E: Eeprom>(
        &mut self,
        rtc: &mut Ds3231<P, D>,
        eeprom: &mut E,
    ) {
        if let Ok(now) = rtc.get_time() {
            self.now = now;
            self.powerup = false;
        }
        if self.now.sec == 0 {
            self.dst_housekeeping(rtc, eeprom);
        }
    }

    fn dst_housekeeping<P: I2cPins, D: DelayNs, E: Eeprom>(
        &mut self,
        rtc: &mut Ds3231<P, D>,
        eeprom: &mut E,
    ) {
        let step = self.dst.step(&self.now, self.settings.dst_active);
        if let Some((hour, min, sec)) = step.set_time {
            let _ = rtc.set_time(hour, min, sec);
        }
        if let Some(active) = step.store_dst {
            self.settings.dst_active = active;
            let _ = self.settings.save(eeprom);
        }
    }

    /// 100 ms IR task: decode a pending frame into a key and feed the
    /// command machine. Returns the key seen this period.
    pub fn ir_task(&mut self, receiver: &IrReceiver) -> Key {
        let mut key = Key::None;
        let mut raw = [0u16; RAW_BUFFER_CAPACITY];
        if let Some(len) = receiver.take_frame(&mut raw) {
            match decode(&raw[..len]) {
                Ok(frame) => {
                    key = Key::from_frame(frame);
                    #[cfg(feature = "defmt")]
                    defmt::info!("IR[{}]", key.as_char() as u8);
                }
                Err(_error) => {
                    // Out-of-window frames are routine; drop and re-arm.
                    #[cfg(feature = "defmt")]
                    defmt::debug!("IR decode: {}", _error);
                }
            }
        }
        self.ir_command.step(key);
        key
    }

    /// Execute a parsed console command, writing output to `out`.
    ///
    /// # Errors
    /// RTC errors surface as [`Error::I2cNack`]; field validation as
    /// [`Error::InvalidTimeField`]; formatting as [`Error::FormatError`].
    pub fn execute<W, P, D, E, const MAX_TASKS: usize>(
        &mut self,
        command: Command,
        out: &mut W,
        rtc: &mut Ds3231<P, D>,
        eeprom: &mut E,
        scheduler: &Scheduler<MAX_TASKS>,
    ) -> Result<()>
    where
        W: core::fmt::Write,
        P: I2cPins,
        D: DelayNs,
        E: Eeprom,
    {
        match command {
            Command::SetDate { day, mon, year } => {
                rtc.set_date(day, mon, year)?;
                let dow = day_of_week(day, mon, year);
                writeln!(out, "Date: {} {day}-{mon}-{year}", day_name(dow))?;
            }
            Command::SetTime { hour, min, sec } => {
                rtc.set_time(hour, min, sec)?;
                writeln!(out, "Time: {hour}:{min}:{sec}")?;
            }
            Command::ShowDateTime => {
                self.dst_housekeeping(rtc, eeprom);
                let now = &self.now;
                writeln!(
                    out,
                    " {}-{}-{}, {}:{}.{} dow:{}, dst:{}, blanking:{}",
                    now.day,
                    now.mon,
                    now.year,
                    now.hour,
                    now.min,
                    now.sec,
                    now.dow,
                    u8::from(self.settings.dst_active),
                    u8::from(self.settings.blanking_active(now.hour, now.min)),
                )?;
                let begin = self.settings.blank_begin;
                let end = self.settings.blank_end;
                writeln!(
                    out,
                    "Blanking: {}:{} - {}:{}",
                    begin.hour, begin.min, end.hour, end.min
                )?;
            }
            Command::ShowTemperature => {
                let quarters = rtc.temperature()?;
                writeln!(out, "DS3231: {}.{:02} C", quarters >> 2, (quarters & 0x03) * 25)?;
            }
            Command::SetBlankBegin(time) => {
                self.settings.blank_begin = time;
                self.settings.save(eeprom)?;
            }
            Command::SetBlankEnd(time) => {
                self.settings.blank_end = time;
                self.settings.save(eeprom)?;
            }
            Command::SetIntensity(intensity) => {
                self.settings.intensity = intensity;
                self.settings.save(eeprom)?;
            }
            Command::ShowVersion => {
                writeln!(out, "{VERSION}")?;
            }
            Command::ListTasks => {
                for task in scheduler.tasks() {
                    writeln!(
                        out,
                        "{} phase:{} period:{} next:{}",
                        task.name, task.phase, task.period, task.next_due
                    )?;
                }
            }
            Command::ScanBus => {
                write!(out, "I2C-scan:")?;
                let bus = rtc.bus_mut();
                for address in (0x02..=0xFEu8).step_by(2) {
                    if bus.start(address).is_ack() {
                        write!(out, " 0x{address:02x}")?;
                    }
                    bus.stop();
                }
                writeln!(out)?;
            }
            Command::TestPattern(enable) => {
                self.test_pattern_enabled = enable;
                if !enable {
                    self.frame.clear();
                }
            }
        }
        Ok(())
    }
}

/// Format one line of console output into a fixed buffer, for callers
/// without a `core::fmt::Write` sink at hand.
///
/// # Errors
/// [`Error::FormatError`] if the text does not fit `N`.
pub fn format_line<const N: usize>(args: core::fmt::Arguments<'_>) -> Result<String<N>> {
    let mut line = String::new();
    line.write_fmt(args).map_err(Error::from)?;
    Ok(line)
}

#[cfg(test)]
mod tests {
    use embedded_hal::delay::DelayNs;
    use heapless::String;

    use super::{ClockApp, IrCommand, IrMode};
    use crate::console::Command;
    use crate::datetime::DateTime;
    use crate::ds3231::Ds3231;
    use crate::i2c_bb::{I2cBitBang, I2cPins};
    use crate::ir_mapping::Key;
    use crate::scheduler::Scheduler;
    use crate::settings::{Eeprom, Settings};
    use crate::{Error, shared_constants};

    /// Empty bus: every line read follows the master, so every address
    /// byte comes back NACKed.
    struct EmptyBus {
        scl: bool,
        sda: bool,
    }

    impl EmptyBus {
        fn new() -> Self {
            Self {
                scl: true,
                sda: true,
            }
        }
    }

    impl I2cPins for EmptyBus {
        fn set_scl(&mut self, high: bool) {
            self.scl = high;
        }
        fn set_sda(&mut self, high: bool) {
            self.sda = high;
        }
        fn scl_is_high(&mut self) -> bool {
            self.scl
        }
        fn sda_is_high(&mut self) -> bool {
            self.sda
        }
    }

    struct NoDelay;
    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    struct RamEeprom {
        cells: [u8; 64],
    }

    impl Default for RamEeprom {
        fn default() -> Self {
            Self { cells: [0; 64] }
        }
    }

    impl Eeprom for RamEeprom {
        fn read(&mut self, offset: usize, buf: &mut [u8]) {
            buf.copy_from_slice(&self.cells[offset..offset + buf.len()]);
        }
        fn write(&mut self, offset: usize, data: &[u8]) {
            self.cells[offset..offset + data.len()].copy_from_slice(data);
        }
    }

    fn fixture() -> (ClockApp, Ds3231<EmptyBus, NoDelay>, RamEeprom, Scheduler<8>) {
        let app = ClockApp::new(Settings::default());
        let rtc = Ds3231::new(I2cBitBang::new(EmptyBus::new(), NoDelay));
        (app, rtc, RamEeprom::default(), Scheduler::new())
    }

    #[test]
    fn digit_keys_arm_command_modes() {
        let mut command = IrCommand::new();
        command.step(Key::None);
        assert_eq!(command.mode(), IrMode::Idle);
        command.step(Key::Digit(1));
        assert_eq!(command.mode(), IrMode::TimeMenu);
        // Further digits do not re-arm a non-idle machine.
        command.step(Key::Digit(0));
        assert_eq!(command.mode(), IrMode::TimeMenu);
    }

    #[test]
    fn command_mode_times_out_after_ten_seconds() {
        let mut command = IrCommand::new();
        command.step(Key::Digit(0));
        assert_eq!(command.mode(), IrMode::DisplayMenu);
        for _ in 0..100 {
            command.step(Key::None);
        }
        assert_eq!(command.mode(), IrMode::DisplayMenu);
        command.step(Key::None);
        assert_eq!(command.mode(), IrMode::Idle);
    }

    #[test]
    fn keys_reset_the_timeout() {
        let mut command = IrCommand::new();
        command.step(Key::Digit(0));
        for _ in 0..90 {
            command.step(Key::None);
        }
        command.step(Key::Ok);
        for _ in 0..90 {
            command.step(Key::None);
        }
        assert_eq!(command.mode(), IrMode::DisplayMenu);
    }

    #[test]
    fn pattern_task_blanks_until_first_rtc_read() {
        let mut app = ClockApp::new(Settings::default());
        // Pattern enabled: frame shows the test pattern, not the time.
        assert!(app.test_pattern_enabled());
        app.pattern_task();

        // With the pattern off but no RTC read yet, the frame stays dark.
        app.test_pattern_enabled = false;
        app.now = DateTime {
            hour: 12,
            ..DateTime::POWER_ON
        };
        app.pattern_task();
        assert!(app.frame.iter().all(|led| led == (0, 0, 0).into()));
    }

    #[test]
    fn pattern_task_renders_time_outside_blanking() {
        let mut app = ClockApp::new(Settings::default());
        app.test_pattern_enabled = false;
        app.powerup = false;
        app.now = DateTime {
            hour: 12,
            min: 30,
            sec: 45,
            ..DateTime::POWER_ON
        };
        app.pattern_task();
        assert!(app.frame.iter().any(|led| led.r > 0));

        // Inside the default 23:30-08:30 window the frame is dark.
        app.now.hour = 23;
        app.now.min = 45;
        app.pattern_task();
        assert!(app.frame.iter().all(|led| led == (0, 0, 0).into()));
    }

    #[test]
    fn show_version_writes_the_banner() {
        let (mut app, mut rtc, mut eeprom, scheduler) = fixture();
        let mut out: String<128> = String::new();
        app.execute(Command::ShowVersion, &mut out, &mut rtc, &mut eeprom, &scheduler)
            .unwrap();
        assert_eq!(out.trim_end(), shared_constants::VERSION);
    }

    #[test]
    fn set_intensity_persists_to_eeprom() {
        let (mut app, mut rtc, mut eeprom, scheduler) = fixture();
        let mut out: String<16> = String::new();
        app.execute(
            Command::SetIntensity(0x33),
            &mut out,
            &mut rtc,
            &mut eeprom,
            &scheduler,
        )
        .unwrap();
        assert_eq!(app.settings.intensity, 0x33);
        assert_eq!(Settings::load(&mut eeprom).intensity, 0x33);
    }

    #[test]
    fn set_time_surfaces_a_missing_rtc() {
        let (mut app, mut rtc, mut eeprom, scheduler) = fixture();
        let mut out: String<64> = String::new();
        let result = app.execute(
            Command::SetTime {
                hour: 12,
                min: 0,
                sec: 0,
            },
            &mut out,
            &mut rtc,
            &mut eeprom,
            &scheduler,
        );
        assert_eq!(result, Err(Error::I2cNack));
    }

    #[test]
    fn bus_scan_on_an_empty_bus_lists_nothing() {
        let (mut app, mut rtc, mut eeprom, scheduler) = fixture();
        let mut out: String<64> = String::new();
        app.execute(Command::ScanBus, &mut out, &mut rtc, &mut eeprom, &scheduler)
            .unwrap();
        assert_eq!(out.as_str(), "I2C-scan:\n");
    }

    #[test]
    fn disabling_the_test_pattern_clears_the_frame() {
        let (mut app, mut rtc, mut eeprom, scheduler) = fixture();
        let mut out: String<16> = String::new();
        app.execute(
            Command::TestPattern(false),
            &mut out,
            &mut rtc,
            &mut eeprom,
            &scheduler,
        )
        .unwrap();
        assert!(!app.test_pattern_enabled());
        assert!(app.frame.iter().all(|led| led == (0, 0, 0).into()));
    }
}

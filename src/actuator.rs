//! Actuator ownership: one real output pin for the light, a stub for the fan.

use esp_idf_svc::hal::gpio::{Gpio13, Output, PinDriver};
use log::{info, warn};

use crate::command::Command;

/// Something a command can switch on or off.
///
/// The seam between command routing and hardware, so routing is testable
/// without GPIO.
pub trait Switch: Send {
    fn set(&mut self, on: bool);
}

/// The light output on GPIO 13. Owns its pin for the process lifetime.
pub struct Light {
    pin: PinDriver<'static, Gpio13, Output>,
}

impl Light {
    pub fn new(pin: PinDriver<'static, Gpio13, Output>) -> Self {
        Self { pin }
    }
}

impl Switch for Light {
    fn set(&mut self, on: bool) {
        info!("LIGHT {}", if on { "ON" } else { "OFF" });
        let res = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if let Err(e) = res {
            warn!("light pin write failed: {e}");
        }
    }
}

/// Fan commands are recognized but no fan output is wired yet. The command
/// path stays intact; swap this for a pin-backed switch once the hardware
/// exists.
pub struct Fan;

impl Switch for Fan {
    fn set(&mut self, on: bool) {
        info!("FAN {} (no output wired)", if on { "ON" } else { "OFF" });
    }
}

/// Route a decoded command to its actuator. `Unknown` changes nothing; the
/// caller has already logged it.
pub fn apply(cmd: Command, light: &mut dyn Switch, fan: &mut dyn Switch) {
    match cmd {
        Command::LightOn => light.set(true),
        Command::LightOff => light.set(false),
        Command::FanOn => fan.set(true),
        Command::FanOff => fan.set(false),
        Command::Unknown => {}
    }
}

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use log::debug;
use rppal::gpio::{Gpio, Level, OutputPin};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// GPIO pin control, BCM channel numbering.
///
/// Two backends exist: `RppalGpio` for real hardware and `NoopGpio` as the
/// stand-in when no GPIO controller is present.
pub trait GpioBackend {
    fn set_direction(&mut self, channel: u8, direction: Direction) -> Result<(), Error>;
    fn read(&mut self, channel: u8) -> Result<u8, Error>;
    fn write(&mut self, channel: u8, level: bool) -> Result<(), Error>;
    fn toggle(&mut self, channel: u8) -> Result<(), Error>;
    /// Start software PWM; `duty_cycle` is a 0.0-1.0 fraction.
    fn start_pwm(&mut self, channel: u8, frequency_hz: f64, duty_cycle: f64) -> Result<(), Error>;
    fn stop_pwm(&mut self, channel: u8) -> Result<(), Error>;
    /// Reset the listed channels back to inputs.
    fn cleanup(&mut self, channels: &[u8]) -> Result<(), Error>;
}

pub struct RppalGpio {
    gpio: Gpio,
    // Output pins are held so PWM keeps running and toggles stay cheap.
    outputs: HashMap<u8, OutputPin>,
}

impl RppalGpio {
    pub fn open() -> Result<Self, Error> {
        Ok(RppalGpio {
            gpio: Gpio::new()?,
            outputs: HashMap::new(),
        })
    }

    fn output(&mut self, channel: u8) -> Result<&mut OutputPin, Error> {
        match self.outputs.entry(channel) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let mut pin = self.gpio.get(channel)?.into_output();
                // Levels set from the CLI should survive process exit.
                pin.set_reset_on_drop(false);
                Ok(entry.insert(pin))
            }
        }
    }
}

impl GpioBackend for RppalGpio {
    fn set_direction(&mut self, channel: u8, direction: Direction) -> Result<(), Error> {
        match direction {
            Direction::Input => {
                self.outputs.remove(&channel);
                let mut pin = self.gpio.get(channel)?.into_input();
                pin.set_reset_on_drop(false);
            }
            Direction::Output => {
                self.output(channel)?;
            }
        }
        Ok(())
    }

    fn read(&mut self, channel: u8) -> Result<u8, Error> {
        let mut pin = self.gpio.get(channel)?.into_input();
        pin.set_reset_on_drop(false);
        Ok(match pin.read() {
            Level::High => 1,
            Level::Low => 0,
        })
    }

    fn write(&mut self, channel: u8, level: bool) -> Result<(), Error> {
        let pin = self.output(channel)?;
        if level {
            pin.set_high();
        } else {
            pin.set_low();
        }
        Ok(())
    }

    fn toggle(&mut self, channel: u8) -> Result<(), Error> {
        self.output(channel)?.toggle();
        Ok(())
    }

    fn start_pwm(&mut self, channel: u8, frequency_hz: f64, duty_cycle: f64) -> Result<(), Error> {
        self.output(channel)?
            .set_pwm_frequency(frequency_hz, duty_cycle)?;
        Ok(())
    }

    fn stop_pwm(&mut self, channel: u8) -> Result<(), Error> {
        if let Some(pin) = self.outputs.get_mut(&channel) {
            pin.clear_pwm()?;
            pin.set_low();
        }
        Ok(())
    }

    fn cleanup(&mut self, channels: &[u8]) -> Result<(), Error> {
        for &channel in channels {
            self.outputs.remove(&channel);
            let mut pin = self.gpio.get(channel)?.into_input();
            pin.set_reset_on_drop(false);
            debug!("Reset channel {} to input", channel);
        }
        Ok(())
    }
}

/// Stand-in backend used when no GPIO hardware is present. Writes are
/// dropped with a debug log and reads report low.
#[derive(Debug, Default)]
pub struct NoopGpio;

impl GpioBackend for NoopGpio {
    fn set_direction(&mut self, channel: u8, direction: Direction) -> Result<(), Error> {
        debug!(
            "GPIO unavailable, ignoring direction {:?} on channel {}",
            direction, channel
        );
        Ok(())
    }

    fn read(&mut self, channel: u8) -> Result<u8, Error> {
        debug!("GPIO unavailable, channel {} reads low", channel);
        Ok(0)
    }

    fn write(&mut self, channel: u8, level: bool) -> Result<(), Error> {
        debug!(
            "GPIO unavailable, ignoring write of {} to channel {}",
            level as u8, channel
        );
        Ok(())
    }

    fn toggle(&mut self, channel: u8) -> Result<(), Error> {
        debug!("GPIO unavailable, ignoring toggle on channel {}", channel);
        Ok(())
    }

    fn start_pwm(&mut self, channel: u8, frequency_hz: f64, duty_cycle: f64) -> Result<(), Error> {
        debug!(
            "GPIO unavailable, ignoring PWM {} Hz at {:.0}% on channel {}",
            frequency_hz,
            duty_cycle * 100.0,
            channel
        );
        Ok(())
    }

    fn stop_pwm(&mut self, _channel: u8) -> Result<(), Error> {
        Ok(())
    }

    fn cleanup(&mut self, _channels: &[u8]) -> Result<(), Error> {
        Ok(())
    }
}

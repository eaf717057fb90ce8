use std::sync::Mutex;

use anyhow::{anyhow, ensure, Context};
use rppal::gpio::{Gpio, OutputPin};

/// Software PWM carrier for the comms LEDs. Matches gpiozero's PWMLED default.
pub const PWM_FREQUENCY_HZ: f64 = 100.0;

/// A single dimmable output.
///
/// Written from pulse worker threads, so implementations must be shareable.
pub trait Channel: Send + Sync {
    fn set_brightness(&self, value: f64) -> anyhow::Result<()>;
}

/// An on/off lamp next to a button.
pub trait Indicator: Send {
    fn set_lit(&mut self, lit: bool) -> anyhow::Result<()>;
    fn is_lit(&self) -> bool;
}

/// LED on a GPIO pin dimmed with rppal's software PWM.
pub struct PwmLed {
    pin_number: u8,
    frequency: f64,
    pin: Mutex<OutputPin>,
}

impl PwmLed {
    pub fn connect(gpio: &Gpio, pin_number: u8, frequency: f64) -> anyhow::Result<Self> {
        let pin = gpio
            .get(pin_number)
            .with_context(|| format!("claiming LED pin {pin_number}"))?
            .into_output_low();
        Ok(Self {
            pin_number,
            frequency,
            pin: Mutex::new(pin),
        })
    }

    pub fn pin_number(&self) -> u8 {
        self.pin_number
    }
}

impl Channel for PwmLed {
    fn set_brightness(&self, value: f64) -> anyhow::Result<()> {
        ensure!(
            (0.0..=1.0).contains(&value),
            "brightness {value} out of range for pin {}",
            self.pin_number
        );
        let mut pin = self
            .pin
            .lock()
            .map_err(|_| anyhow!("pin {} lock poisoned", self.pin_number))?;
        if value <= 0.0 {
            pin.clear_pwm()?;
            pin.set_low();
        } else if value >= 1.0 {
            pin.clear_pwm()?;
            pin.set_high();
        } else {
            pin.set_pwm_frequency(self.frequency, value)?;
        }
        Ok(())
    }
}

/// Plain digital LED.
pub struct Led {
    pin: OutputPin,
}

impl Led {
    pub fn connect(gpio: &Gpio, pin_number: u8, initially_lit: bool) -> anyhow::Result<Self> {
        let pin = gpio
            .get(pin_number)
            .with_context(|| format!("claiming indicator pin {pin_number}"))?;
        let pin = if initially_lit {
            pin.into_output_high()
        } else {
            pin.into_output_low()
        };
        Ok(Self { pin })
    }
}

impl Indicator for Led {
    fn set_lit(&mut self, lit: bool) -> anyhow::Result<()> {
        if lit {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }

    fn is_lit(&self) -> bool {
        self.pin.is_set_high()
    }
}

/// Drive the RS-485 line driver enable pin high.
///
/// The board pulls it up already; holding it explicitly keeps DMX output
/// alive until the device tree does it. The line stays high after the
/// returned pin is dropped.
pub fn enable_line_driver(gpio: &Gpio, pin_number: u8) -> anyhow::Result<OutputPin> {
    let mut pin = gpio
        .get(pin_number)
        .with_context(|| format!("claiming line driver pin {pin_number}"))?
        .into_output_high();
    pin.set_reset_on_drop(false);
    Ok(pin)
}

//! Bench check for the comms LEDs: fixed levels, a slow wave, then a fast one.

use std::thread;
use std::time::Duration;

use amp2_control::{board, logging, Amp2Config};
use anyhow::Context;
use log::info;
use rppal::gpio::Gpio;

const LEVELS: [f64; 3] = [0.01, 1.0, 0.1];

fn main() -> anyhow::Result<()> {
    logging::init();
    let config = Amp2Config::load(Amp2Config::ledboard())?;
    let ledboard = config
        .ledboard
        .as_ref()
        .context("config has no LED board")?;

    let gpio = Gpio::new().context("opening GPIO")?;
    let animator = board::open_ledboard(&gpio, &ledboard.pins, ledboard.pwm_frequency_hz)?
        .with_exponent(config.pulse.exponent)
        .with_interval(config.pulse.step_interval());

    let levels: Vec<f64> = LEVELS.iter().copied().cycle().take(ledboard.pins.len()).collect();
    info!("levels {levels:?}");
    animator.set_levels(&levels)?;
    thread::sleep(Duration::from_secs(1));

    animator.pulse(config.pulse.idle_cycle())?;
    thread::sleep(Duration::from_secs(10));
    animator.pulse(config.pulse.busy_cycle())?;

    loop {
        thread::park();
    }
}

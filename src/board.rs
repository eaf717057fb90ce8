use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use anyhow::Context;
use log::{debug, info};
use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};

use crate::animator::PulseAnimator;
use crate::config::{Amp2Config, ButtonConfig};
use crate::device::{enable_line_driver, Channel, Led, PwmLed};
use crate::dispatcher::{ButtonEvent, Dispatcher};
use crate::scene::{ScenePlayer, SystemLauncher};

/// The claimed pins of one controller process and the dispatcher driving them.
pub struct Board {
    dispatcher: Dispatcher<SystemLauncher>,
    events: Receiver<ButtonEvent>,
    // Interrupts stop when the pins drop.
    _buttons: Vec<InputPin>,
    _line_driver: Option<OutputPin>,
}

impl Board {
    pub fn open(config: &Amp2Config) -> anyhow::Result<Self> {
        let gpio = Gpio::new().context("opening GPIO")?;

        let line_driver = config
            .line_driver_pin
            .map(|pin| enable_line_driver(&gpio, pin))
            .transpose()?;

        let player = ScenePlayer::new(
            SystemLauncher,
            config.scenes.program.clone(),
            config.scenes.iterations,
        );
        let mut dispatcher =
            Dispatcher::new(player).with_power_off(config.power_off_command.clone());

        if let Some(board) = &config.ledboard {
            let animator = open_ledboard(&gpio, &board.pins, board.pwm_frequency_hz)?
                .with_exponent(config.pulse.exponent)
                .with_interval(config.pulse.step_interval());
            dispatcher = dispatcher.with_animator(
                animator,
                config.pulse.idle_cycle(),
                config.pulse.busy_cycle(),
            );
        }
        if let Some(indicator) = &config.indicator {
            let led = Led::connect(&gpio, indicator.pin, indicator.initially_lit)?;
            dispatcher = dispatcher.with_indicator(Box::new(led));
        }

        let (tx, events) = mpsc::channel();
        let buttons = config
            .buttons
            .iter()
            .map(|button| watch_button(&gpio, button, tx.clone()))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            dispatcher,
            events,
            _buttons: buttons,
            _line_driver: line_driver,
        })
    }

    pub fn start(&mut self, config: &Amp2Config) -> anyhow::Result<()> {
        self.dispatcher
            .start(config.startup_scene.as_deref(), config.startup_delay())
    }

    /// Serve button presses. Only returns if every button pin is released.
    pub fn run(mut self) {
        self.dispatcher.run(self.events);
    }
}

/// Open the board for `defaults` (or the config file overriding it), play the
/// startup sequence and serve presses until killed.
pub fn serve(defaults: Amp2Config) -> anyhow::Result<()> {
    let config = Amp2Config::load(defaults)?;
    let mut board = Board::open(&config)?;
    board.start(&config)?;
    board.run();
    Ok(())
}

/// Claim the comms LEDs as PWM channels, in wave order.
pub fn open_ledboard(gpio: &Gpio, pins: &[u8], frequency: f64) -> anyhow::Result<PulseAnimator> {
    let channels = pins
        .iter()
        .map(|&pin| {
            let led = PwmLed::connect(gpio, pin, frequency)?;
            Ok(Arc::new(led) as Arc<dyn Channel>)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    info!("LED board on pins {pins:?}");
    Ok(PulseAnimator::new(channels))
}

/// Forward debounced presses of `button` to `events`.
pub fn watch_button(
    gpio: &Gpio,
    button: &ButtonConfig,
    events: Sender<ButtonEvent>,
) -> anyhow::Result<InputPin> {
    let pin = gpio
        .get(button.pin)
        .with_context(|| format!("claiming {} button pin {}", button.name, button.pin))?;
    // Pulled-up buttons short to ground when pressed.
    let (mut pin, trigger) = if button.pull_up {
        (pin.into_input_pullup(), Trigger::FallingEdge)
    } else {
        (pin.into_input_pulldown(), Trigger::RisingEdge)
    };

    let event = ButtonEvent::new(button.name.clone(), button.action.clone());
    pin.set_async_interrupt(trigger, Some(button.debounce()), move |_| {
        // The receiver only goes away at shutdown.
        let _ = events.send(event.clone());
    })
    .with_context(|| format!("watching {} button", button.name))?;
    debug!(
        "{} button on pin {}, {:?} debounce",
        button.name,
        button.pin,
        button.debounce()
    );
    Ok(pin)
}

use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use log::{error, info, warn};

use crate::animator::PulseAnimator;
use crate::config::Action;
use crate::device::Indicator;
use crate::scene::{Launcher, ScenePlayer};

/// A debounced press on a named button.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: String,
    pub action: Action,
}

impl ButtonEvent {
    pub fn new(button: impl Into<String>, action: Action) -> Self {
        Self {
            button: button.into(),
            action,
        }
    }
}

/// What handling a press ended up doing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The press asked for the state we are already in.
    Unchanged,
    SceneDone,
    /// The scene tool failed; already logged.
    SceneFailed,
    PowerOff,
    /// The power-off command failed; already logged.
    PowerOffFailed,
}

/// Owns the outputs and turns button presses into actions, one at a time.
pub struct Dispatcher<L> {
    player: ScenePlayer<L>,
    animator: Option<PulseAnimator>,
    indicator: Option<Box<dyn Indicator>>,
    idle_cycle: Duration,
    busy_cycle: Duration,
    power_off_command: Vec<String>,
}

impl<L: Launcher> Dispatcher<L> {
    pub fn new(player: ScenePlayer<L>) -> Self {
        Self {
            player,
            animator: None,
            indicator: None,
            idle_cycle: Duration::from_secs(4),
            busy_cycle: Duration::from_secs(1),
            power_off_command: vec!["sudo".to_string(), "poweroff".to_string()],
        }
    }

    /// Comms LEDs breathe with `idle` while waiting and `busy` during scenes.
    pub fn with_animator(mut self, animator: PulseAnimator, idle: Duration, busy: Duration) -> Self {
        self.animator = Some(animator);
        self.idle_cycle = idle;
        self.busy_cycle = busy;
        self
    }

    pub fn with_indicator(mut self, indicator: Box<dyn Indicator>) -> Self {
        self.indicator = Some(indicator);
        self
    }

    pub fn with_power_off(mut self, argv: Vec<String>) -> Self {
        self.power_off_command = argv;
        self
    }

    pub fn animator(&self) -> Option<&PulseAnimator> {
        self.animator.as_ref()
    }

    /// Start the idle pulse, give the DMX daemon `delay` to come up, then play
    /// the opening scene.
    pub fn start(&mut self, startup_scene: Option<&str>, delay: Duration) -> anyhow::Result<()> {
        if let Some(animator) = &self.animator {
            animator.pulse(self.idle_cycle).context("starting idle pulse")?;
        }
        if let Some(scene) = startup_scene {
            thread::sleep(delay);
            self.play(scene);
        }
        Ok(())
    }

    /// Handle presses until every sender is gone.
    pub fn run(&mut self, events: Receiver<ButtonEvent>) {
        info!("waiting for button presses");
        for event in events {
            if let Err(e) = self.handle(&event) {
                error!("{} press failed: {e:#}", event.button);
            }
        }
        warn!("all buttons released, dispatcher stopping");
    }

    pub fn handle(&mut self, event: &ButtonEvent) -> anyhow::Result<Outcome> {
        info!("{} pressed", event.button);
        match &event.action {
            Action::LightsOn { scene } => self.switch_lights(true, scene),
            Action::LightsOff { scene } => self.switch_lights(false, scene),
            Action::PlayScene { scene } => self.play_with_feedback(scene),
            Action::PowerOff => self.power_off(),
        }
    }

    fn switch_lights(&mut self, on: bool, scene: &str) -> anyhow::Result<Outcome> {
        if let Some(indicator) = self.indicator.as_mut() {
            if indicator.is_lit() == on {
                return Ok(Outcome::Unchanged);
            }
            indicator.set_lit(on).context("updating indicator")?;
        }
        Ok(self.play(scene))
    }

    fn play_with_feedback(&mut self, scene: &str) -> anyhow::Result<Outcome> {
        if let Some(animator) = &self.animator {
            animator.pulse(self.busy_cycle).context("starting busy pulse")?;
        }
        let outcome = self.play(scene);
        if let Some(animator) = &self.animator {
            animator.pulse(self.idle_cycle).context("returning to idle pulse")?;
        }
        Ok(outcome)
    }

    fn power_off(&mut self) -> anyhow::Result<Outcome> {
        if let Some(indicator) = self.indicator.as_mut() {
            indicator.set_lit(false).context("switching off power LED")?;
        }
        info!("shutting down");
        match self.player.launcher().run(&self.power_off_command) {
            Ok(()) => Ok(Outcome::PowerOff),
            Err(e) => {
                error!("power off failed: {e}");
                Ok(Outcome::PowerOffFailed)
            }
        }
    }

    fn play(&self, scene: &str) -> Outcome {
        match self.player.play_scene(scene) {
            Ok(()) => Outcome::SceneDone,
            Err(e) => {
                error!("scene {scene}: {e}");
                Outcome::SceneFailed
            }
        }
    }
}

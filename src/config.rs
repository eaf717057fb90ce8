use std::collections::HashSet;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::curve::DEFAULT_EXPONENT;
use crate::device::PWM_FREQUENCY_HZ;
use crate::error::ConfigError;
use crate::scene::OLA_RECORDER;

pub const CONFIG_FILE: &str = "amp2.json";
pub const CONFIG_ENV: &str = "AMP2_CONFIG";

/// RS-485 direction control on the AMP2 board.
pub const LINE_DRIVER_PIN: u8 = 17;
pub const OK_BUTTON_PIN: u8 = 34;
pub const F1_BUTTON_PIN: u8 = 33;
pub const POWER_BUTTON_PIN: u8 = 32;
pub const POWER_LED_PIN: u8 = 35;
pub const OK_LED_PIN: u8 = 36;
/// Comms LEDs in wave order.
pub const COMMS_LED_PINS: [u8; 4] = [39, 38, 37, 36];

/// What a button press does.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Light the indicator and play `scene`, unless already lit.
    LightsOn { scene: String },
    /// Darken the indicator and play `scene`, unless already dark.
    LightsOff { scene: String },
    /// Pulse fast while `scene` plays, then return to the idle pulse.
    PlayScene { scene: String },
    /// Darken the indicator and shut the host down.
    PowerOff,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ButtonConfig {
    pub name: String,
    pub pin: u8,
    #[serde(default = "default_pull_up")]
    pub pull_up: bool,
    pub debounce_ms: u64,
    #[serde(flatten)]
    pub action: Action,
}

impl ButtonConfig {
    pub fn new(name: &str, pin: u8, debounce_ms: u64, action: Action) -> Self {
        Self {
            name: name.to_string(),
            pin,
            pull_up: true,
            debounce_ms,
            action,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_pull_up() -> bool {
    true
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LedBoardConfig {
    pub pins: Vec<u8>,
    pub pwm_frequency_hz: f64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndicatorConfig {
    pub pin: u8,
    pub initially_lit: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PulseConfig {
    /// Full cycle while nothing is happening.
    pub idle_cycle_ms: u64,
    /// Full cycle while a scene is playing.
    pub busy_cycle_ms: u64,
    pub step_ms: u64,
    pub exponent: f64,
}

impl PulseConfig {
    pub fn idle_cycle(&self) -> Duration {
        Duration::from_millis(self.idle_cycle_ms)
    }

    pub fn busy_cycle(&self) -> Duration {
        Duration::from_millis(self.busy_cycle_ms)
    }

    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            idle_cycle_ms: 4000,
            busy_cycle_ms: 1000,
            step_ms: 20,
            exponent: DEFAULT_EXPONENT,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SceneConfig {
    pub program: String,
    pub iterations: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            program: OLA_RECORDER.to_string(),
            iterations: 1,
        }
    }
}

/// Everything one controller process needs to know about the board.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Amp2Config {
    pub ledboard: Option<LedBoardConfig>,
    pub line_driver_pin: Option<u8>,
    pub indicator: Option<IndicatorConfig>,
    pub buttons: Vec<ButtonConfig>,
    pub pulse: PulseConfig,
    pub scenes: SceneConfig,
    pub startup_scene: Option<String>,
    /// Wait before the startup scene so `olad` has come up.
    pub startup_delay_ms: u64,
    pub power_off_command: Vec<String>,
}

impl Amp2Config {
    fn base() -> Self {
        Self {
            ledboard: None,
            line_driver_pin: None,
            indicator: None,
            buttons: Vec::new(),
            pulse: PulseConfig::default(),
            scenes: SceneConfig::default(),
            startup_scene: None,
            startup_delay_ms: 0,
            power_off_command: vec!["sudo".to_string(), "poweroff".to_string()],
        }
    }

    /// Comms LEDs breathing, OK and F1 each play their own scene.
    pub fn lights() -> Self {
        Self {
            ledboard: Some(LedBoardConfig {
                pins: COMMS_LED_PINS.to_vec(),
                pwm_frequency_hz: PWM_FREQUENCY_HZ,
            }),
            line_driver_pin: Some(LINE_DRIVER_PIN),
            buttons: vec![
                ButtonConfig::new(
                    "OK",
                    OK_BUTTON_PIN,
                    200,
                    Action::PlayScene {
                        scene: "OK.olar".to_string(),
                    },
                ),
                ButtonConfig::new(
                    "F1",
                    F1_BUTTON_PIN,
                    200,
                    Action::PlayScene {
                        scene: "F1.olar".to_string(),
                    },
                ),
            ],
            startup_scene: Some("startup.olar".to_string()),
            startup_delay_ms: 2000,
            ..Self::base()
        }
    }

    /// OK switches the stage lights on, F1 switches them off.
    pub fn switch() -> Self {
        Self {
            line_driver_pin: Some(LINE_DRIVER_PIN),
            indicator: Some(IndicatorConfig {
                pin: OK_LED_PIN,
                initially_lit: false,
            }),
            buttons: vec![
                ButtonConfig::new(
                    "OK",
                    OK_BUTTON_PIN,
                    200,
                    Action::LightsOn {
                        scene: "on.olar".to_string(),
                    },
                ),
                ButtonConfig::new(
                    "F1",
                    F1_BUTTON_PIN,
                    200,
                    Action::LightsOff {
                        scene: "off.olar".to_string(),
                    },
                ),
            ],
            startup_scene: Some("startup.olar".to_string()),
            ..Self::base()
        }
    }

    /// Local button powers the host off. Its LED is lit while we are up.
    pub fn power() -> Self {
        Self {
            indicator: Some(IndicatorConfig {
                pin: POWER_LED_PIN,
                initially_lit: true,
            }),
            buttons: vec![ButtonConfig::new(
                "Local",
                POWER_BUTTON_PIN,
                2000,
                Action::PowerOff,
            )],
            ..Self::base()
        }
    }

    /// Comms LED board alone, for bench checks.
    pub fn ledboard() -> Self {
        Self {
            ledboard: Some(LedBoardConfig {
                pins: COMMS_LED_PINS[..3].to_vec(),
                pwm_frequency_hz: PWM_FREQUENCY_HZ,
            }),
            ..Self::base()
        }
    }

    /// Load from `$AMP2_CONFIG`, else `./amp2.json` if it exists, else use
    /// `defaults` as is.
    pub fn load(defaults: Self) -> anyhow::Result<Self> {
        match env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_from(&PathBuf::from(path), defaults),
            None => {
                let path = Path::new(CONFIG_FILE);
                match Self::load_from(path, defaults.clone()) {
                    Err(e) if is_not_found(&e) => {
                        info!("no {CONFIG_FILE}, using built-in settings");
                        defaults.validate()?;
                        Ok(defaults)
                    }
                    other => other,
                }
            }
        }
    }

    /// Read a config file. Top-level keys present in the file replace those
    /// of `defaults`; missing keys keep the default value.
    pub fn load_from(path: &Path, defaults: Self) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_json(&content, defaults)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(content: &str, defaults: Self) -> anyhow::Result<Self> {
        let overrides: Value = serde_json::from_str(content)?;
        let Value::Object(overrides) = overrides else {
            return Err(ConfigError::Invalid("top level must be an object".to_string()).into());
        };
        let mut merged = serde_json::to_value(defaults)?;
        if let Value::Object(fields) = &mut merged {
            fields.extend(overrides);
        }
        let config: Self = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.pulse.idle_cycle_ms == 0 || self.pulse.busy_cycle_ms == 0 {
            return Err(ConfigError::ZeroCycle);
        }
        if self.pulse.step_ms == 0 {
            return Err(ConfigError::StepInterval(Duration::ZERO));
        }
        if !(self.pulse.exponent.is_finite() && self.pulse.exponent > 0.0) {
            return Err(ConfigError::Exponent(self.pulse.exponent));
        }
        if self.scenes.program.is_empty() {
            return invalid("scene program is empty".to_string());
        }
        if self.scenes.iterations == 0 {
            return invalid("scene iterations must be at least 1".to_string());
        }

        let mut pins = HashSet::new();
        let mut claim = |pin: u8, what: &str| {
            if pins.insert(pin) {
                Ok(())
            } else {
                invalid(format!("pin {pin} used twice ({what})"))
            }
        };
        if let Some(board) = &self.ledboard {
            if board.pins.is_empty() {
                return Err(ConfigError::EmptyBoard);
            }
            if !(board.pwm_frequency_hz.is_finite() && board.pwm_frequency_hz > 0.0) {
                return invalid(format!("PWM frequency {} Hz", board.pwm_frequency_hz));
            }
            for &pin in &board.pins {
                claim(pin, "LED board")?;
            }
        }
        if let Some(indicator) = &self.indicator {
            claim(indicator.pin, "indicator")?;
        }
        if let Some(pin) = self.line_driver_pin {
            claim(pin, "line driver")?;
        }
        for button in &self.buttons {
            if button.name.is_empty() {
                return invalid(format!("button on pin {} has no name", button.pin));
            }
            claim(button.pin, &button.name)?;
            match &button.action {
                Action::LightsOn { scene } | Action::LightsOff { scene } => {
                    if self.indicator.is_none() {
                        return invalid(format!(
                            "{} toggles lights but no indicator is set",
                            button.name
                        ));
                    }
                    if scene.is_empty() {
                        return invalid(format!("{} has an empty scene", button.name));
                    }
                }
                Action::PlayScene { scene } => {
                    if self.ledboard.is_none() {
                        return invalid(format!(
                            "{} pulses LEDs but no LED board is set",
                            button.name
                        ));
                    }
                    if scene.is_empty() {
                        return invalid(format!("{} has an empty scene", button.name));
                    }
                }
                Action::PowerOff => {
                    if self.power_off_command.is_empty() {
                        return invalid("power off command is empty".to_string());
                    }
                }
            }
        }
        if let Some(scene) = &self.startup_scene {
            if scene.is_empty() {
                return invalid("startup scene is empty".to_string());
            }
        }
        Ok(())
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<io::Error>())
        .any(|e| e.kind() == io::ErrorKind::NotFound)
}

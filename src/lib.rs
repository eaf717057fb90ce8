//! Controllers for the AMP2 rig: comms LED breathing, stage-light buttons
//! that hand scenes to `ola_recorder`, and the power button.

pub mod animator;
pub mod board;
pub mod config;
pub mod curve;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod memory;
pub mod pulse;
pub mod scene;

pub use animator::PulseAnimator;
pub use config::{Action, Amp2Config};
pub use device::{Channel, Indicator};
pub use dispatcher::{ButtonEvent, Dispatcher, Outcome};
pub use error::{CommandError, ConfigError};
pub use pulse::{PulseSpec, PulseWorker};
pub use scene::{Launcher, ScenePlayer, SystemLauncher};

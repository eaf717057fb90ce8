use std::fmt;
use std::io;
use std::time::Duration;

/// Rejected configuration or animator request.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Pulse cycle must be a positive duration.
    ZeroCycle,
    /// An LED board was configured without any pins.
    EmptyBoard,
    /// Brightness outside [0, 1] or not a number.
    Brightness(f64),
    /// Curve exponent must be finite and positive.
    Exponent(f64),
    /// Step interval must be positive.
    StepInterval(Duration),
    /// 1-based LED index past the end of the board.
    LedIndex { index: usize, count: usize },
    /// One level per LED is required.
    LevelCount { expected: usize, got: usize },
    /// Anything else found while validating a config file.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroCycle => write!(f, "pulse cycle must be longer than zero"),
            ConfigError::EmptyBoard => write!(f, "LED board has no pins"),
            ConfigError::Brightness(v) => write!(f, "brightness {v} is outside 0.0..=1.0"),
            ConfigError::Exponent(e) => write!(f, "curve exponent {e} must be positive"),
            ConfigError::StepInterval(d) => write!(f, "step interval {d:?} must be positive"),
            ConfigError::LedIndex { index, count } => {
                write!(f, "LED {index} does not exist, board has {count}")
            }
            ConfigError::LevelCount { expected, got } => {
                write!(f, "expected {expected} brightness levels, got {got}")
            }
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure running an external program.
#[derive(Debug)]
pub enum CommandError {
    /// Empty argv.
    Empty,
    /// The program could not be started.
    Spawn { program: String, source: io::Error },
    /// The program ran and exited unsuccessfully. `None` when killed by a signal.
    Status { program: String, code: Option<i32> },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => write!(f, "no command given"),
            CommandError::Spawn { program, source } => {
                write!(f, "failed to start {program}: {source}")
            }
            CommandError::Status {
                program,
                code: Some(code),
            } => write!(f, "{program} failed with exit status {code}"),
            CommandError::Status { program, code: None } => {
                write!(f, "{program} was terminated by a signal")
            }
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

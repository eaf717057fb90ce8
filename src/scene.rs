use std::process::Command;

use log::{debug, info};

use crate::error::CommandError;

pub const OLA_RECORDER: &str = "ola_recorder";

/// Runs external programs to completion.
pub trait Launcher: Send + Sync {
    fn run(&self, argv: &[String]) -> Result<(), CommandError>;
}

/// Launcher backed by `std::process::Command`. Output goes to our own stdio.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn run(&self, argv: &[String]) -> Result<(), CommandError> {
        let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;
        debug!("running {argv:?}");
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| CommandError::Spawn {
                program: program.clone(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(CommandError::Status {
                program: program.clone(),
                code: status.code(),
            })
        }
    }
}

/// Argument list that plays `scene` through `program` `iterations` times.
pub fn playback_args(program: &str, iterations: u32, scene: &str) -> Vec<String> {
    vec![
        program.to_string(),
        "--iterations".to_string(),
        iterations.to_string(),
        "--playback".to_string(),
        scene.to_string(),
    ]
}

/// Plays recorded lighting scenes through an external recorder tool.
pub struct ScenePlayer<L> {
    launcher: L,
    program: String,
    iterations: u32,
}

impl<L: Launcher> ScenePlayer<L> {
    pub fn new(launcher: L, program: impl Into<String>, iterations: u32) -> Self {
        Self {
            launcher,
            program: program.into(),
            iterations,
        }
    }

    /// Play `scene` and wait for the tool to finish.
    pub fn play_scene(&self, scene: &str) -> Result<(), CommandError> {
        info!("playing scene {scene}");
        let argv = playback_args(&self.program, self.iterations, scene);
        self.launcher.run(&argv)?;
        info!("scene {scene} completed");
        Ok(())
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }
}

pub mod launch;
pub mod notice;
pub mod power;
pub mod sound;
#[cfg(test)]
pub(crate) mod testing;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::alarm::model::{PlaybackMode, SoundSource};

#[derive(Debug, Error)]
pub enum EffectError {
    #[error("sound file not found: {}", .0.display())]
    MissingSound(PathBuf),
    #[error("failed to read sound file {}: {source}", .path.display())]
    ReadSound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("conversion error for {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("audio output unavailable: {0}")]
    Output(String),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with status {status}")]
    Failed { program: String, status: String },
    #[error("notification failed: {0}")]
    Notice(String),
}

pub trait SoundBackend {
    fn play(&self, source: &SoundSource, mode: PlaybackMode) -> Result<(), EffectError>;
    /// Short single tone used for the pre-alarm countdown.
    fn attention_tone(&self);
}

pub trait Launcher {
    fn open_with_default_handler(&self, path: &Path) -> Result<(), EffectError>;
    /// Runs `command` through the platform shell and waits for it. Returns
    /// the exit code, or `None` when the process was killed by a signal.
    fn run_and_wait(&self, command: &str) -> Result<Option<i32>, EffectError>;
}

pub trait Notifier {
    fn show_notice(&self, title: &str, message: &str) -> Result<(), EffectError>;
}

/// The set of side-effect backends handed to the alarm dispatcher.
pub struct Effectors<'a> {
    pub sound: &'a dyn SoundBackend,
    pub launcher: &'a dyn Launcher,
    pub notifier: &'a dyn Notifier,
}

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

use crate::alarm::model::{PlaybackMode, SoundSource};
use crate::effects::{EffectError, Launcher, Notifier, SoundBackend};

#[derive(Default)]
pub(crate) struct FakeSound {
    pub(crate) plays: RefCell<Vec<(SoundSource, PlaybackMode)>>,
    pub(crate) attention_tones: Cell<u32>,
    pub(crate) fail: bool,
}

impl SoundBackend for FakeSound {
    fn play(&self, source: &SoundSource, mode: PlaybackMode) -> Result<(), EffectError> {
        self.plays.borrow_mut().push((source.clone(), mode));
        if self.fail {
            return Err(EffectError::MissingSound(PathBuf::from("gone.wav")));
        }
        Ok(())
    }

    fn attention_tone(&self) {
        self.attention_tones.set(self.attention_tones.get() + 1);
    }
}

#[derive(Default)]
pub(crate) struct FakeLauncher {
    pub(crate) opened: RefCell<Vec<PathBuf>>,
    pub(crate) commands: RefCell<Vec<String>>,
    pub(crate) exit_code: Option<i32>,
}

impl Launcher for FakeLauncher {
    fn open_with_default_handler(&self, path: &Path) -> Result<(), EffectError> {
        self.opened.borrow_mut().push(path.to_path_buf());
        Ok(())
    }

    fn run_and_wait(&self, command: &str) -> Result<Option<i32>, EffectError> {
        self.commands.borrow_mut().push(command.to_string());
        Ok(self.exit_code)
    }
}

#[derive(Default)]
pub(crate) struct FakeNotifier {
    pub(crate) notices: RefCell<Vec<(String, String)>>,
    pub(crate) fail: bool,
}

impl Notifier for FakeNotifier {
    fn show_notice(&self, title: &str, message: &str) -> Result<(), EffectError> {
        if self.fail {
            return Err(EffectError::Notice("no notification daemon".into()));
        }
        self.notices
            .borrow_mut()
            .push((title.to_string(), message.to_string()));
        Ok(())
    }
}

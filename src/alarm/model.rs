use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

pub const DEFAULT_ALARM_REPEAT: u32 = 1;
pub const DEFAULT_ALARM_INTERVAL_SECS: u64 = 2;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PlaybackMode {
    Blocking,
    Detached,
}

/// What happens once the alarm sound is done.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum PostAction {
    #[default]
    None,
    OpenFile(PathBuf),
    RunCommand(String),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SoundSource {
    Builtin,
    File(PathBuf),
}

/// Everything that happens at expiry. Fixed for the whole run.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AlarmPlan {
    pub mute: bool,
    repeat: u32,
    interval: Duration,
    pub playback: PlaybackMode,
    pub sound: Option<PathBuf>,
    pub post_action: PostAction,
    pub notify: bool,
    pub pre_alarm_secs: u64,
}

impl Default for AlarmPlan {
    fn default() -> Self {
        Self {
            mute: false,
            repeat: DEFAULT_ALARM_REPEAT,
            interval: Duration::from_secs(DEFAULT_ALARM_INTERVAL_SECS),
            playback: PlaybackMode::Blocking,
            sound: None,
            post_action: PostAction::None,
            notify: true,
            pre_alarm_secs: 0,
        }
    }
}

impl AlarmPlan {
    /// Repeat count, at least one.
    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat.max(1);
        self
    }

    /// Pause between repeats, at least one second.
    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval = Duration::from_secs(secs.max(1));
        self
    }

    pub fn repeat(&self) -> u32 {
        self.repeat
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn sound_source(&self) -> SoundSource {
        match &self.sound {
            Some(path) => SoundSource::File(path.clone()),
            None => SoundSource::Builtin,
        }
    }
}

/// Defaults read from an optional settings file; command-line flags win.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Settings {
    pub mute: Option<bool>,
    pub alarm_repeat: Option<u32>,
    pub alarm_interval_secs: Option<u64>,
    pub async_sound: Option<bool>,
    pub sound: Option<PathBuf>,
    pub notify: Option<bool>,
    pub prealarm_secs: Option<u64>,
    pub no_sleep: Option<bool>,
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read settings file {}", path.display()))?;
    parse_settings_text(&content)
}

pub fn parse_settings_text(content: &str) -> Result<Settings> {
    let raw = serde_json::from_str::<SettingsFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    if raw.version != 1 {
        bail!(
            "unsupported settings version {}; expected version 1",
            raw.version
        );
    }
    if raw.settings.alarm_repeat == Some(0) {
        bail!("alarm_repeat must be at least 1");
    }
    if raw.settings.alarm_interval_secs == Some(0) {
        bail!("alarm_interval_secs must be at least 1");
    }
    if raw
        .settings
        .sound
        .as_ref()
        .is_some_and(|sound| sound.as_os_str().is_empty())
    {
        bail!("sound must not be an empty path");
    }

    let settings = raw.settings;
    Ok(Settings {
        mute: settings.mute,
        alarm_repeat: settings.alarm_repeat,
        alarm_interval_secs: settings.alarm_interval_secs,
        async_sound: settings.async_sound,
        sound: settings.sound,
        notify: settings.notify,
        prealarm_secs: settings.prealarm_secs,
        no_sleep: settings.no_sleep,
    })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    version: u32,
    #[serde(default)]
    settings: SettingsBody,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SettingsBody {
    #[serde(default)]
    mute: Option<bool>,
    #[serde(default)]
    alarm_repeat: Option<u32>,
    #[serde(default)]
    alarm_interval_secs: Option<u64>,
    #[serde(default)]
    async_sound: Option<bool>,
    #[serde(default)]
    sound: Option<PathBuf>,
    #[serde(default)]
    notify: Option<bool>,
    #[serde(default)]
    prealarm_secs: Option<u64>,
    #[serde(default)]
    no_sleep: Option<bool>,
}

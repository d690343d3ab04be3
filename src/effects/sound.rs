use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rodio::source::{Amplify, Delay, SineWave, TakeDuration};
use rodio::{Decoder, OutputStream, Sink, Source};
use tracing::{debug, warn};

use crate::alarm::model::{PlaybackMode, SoundSource};
use crate::effects::{EffectError, SoundBackend};

/// Pause before every built-in tone after the first.
pub const TONE_GAP: Duration = Duration::from_millis(200);

/// Built-in alarm: A5, B5, then a longer C6.
pub const ALARM_TONES: [Tone; 3] = [
    Tone::new(880.0, 300),
    Tone::new(988.0, 300),
    Tone::new(1047.0, 500),
];

/// Short high blip for each pre-alarm second.
pub const ATTENTION_TONE: Tone = Tone::new(1200.0, 80);

const TONE_VOLUME: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: f32,
    pub length: Duration,
}

impl Tone {
    pub const fn new(frequency: f32, length_ms: u64) -> Self {
        Self {
            frequency,
            length: Duration::from_millis(length_ms),
        }
    }
}

pub type ToneSource = Delay<Amplify<TakeDuration<SineWave>>>;

/// Sine sources for `tones`, each one delayed by `TONE_GAP` except the first.
pub fn tone_sequence(tones: &[Tone]) -> Vec<ToneSource> {
    tones
        .iter()
        .enumerate()
        .map(|(index, tone)| {
            let gap = if index == 0 { Duration::ZERO } else { TONE_GAP };
            SineWave::new(tone.frequency)
                .take_duration(tone.length)
                .amplify(TONE_VOLUME)
                .delay(gap)
        })
        .collect()
}

/// An alarm file read fully into memory, so decoding never touches the disk
/// again once playback starts.
#[derive(Debug, Clone)]
pub struct AlarmSound(Arc<[u8]>);

impl AsRef<[u8]> for AlarmSound {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AlarmSound {
    pub fn load(path: &Path) -> Result<Self, EffectError> {
        if !path.is_file() {
            return Err(EffectError::MissingSound(path.to_path_buf()));
        }
        let read = |source: io::Error| EffectError::ReadSound {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(read)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(read)?;
        Ok(Self(Arc::from(buf)))
    }

    pub fn decoder(&self, path: &Path) -> Result<Decoder<Cursor<AlarmSound>>, EffectError> {
        Decoder::new(Cursor::new(self.clone())).map_err(|err| EffectError::Decode {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }
}

/// Plays alarm sounds on the default audio output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSound;

impl SoundBackend for SystemSound {
    fn play(&self, source: &SoundSource, mode: PlaybackMode) -> Result<(), EffectError> {
        let queue = match source {
            SoundSource::Builtin => PlayQueue::Tones(tone_sequence(&ALARM_TONES)),
            SoundSource::File(path) => {
                let decoder = AlarmSound::load(path)?.decoder(path)?;
                debug!(path = %path.display(), "decoded alarm sound");
                PlayQueue::File(decoder)
            }
        };
        match mode {
            PlaybackMode::Blocking => queue.play_to_end(),
            PlaybackMode::Detached => {
                thread::spawn(move || {
                    if let Err(err) = queue.play_to_end() {
                        warn!("{err}");
                    }
                });
                Ok(())
            }
        }
    }

    fn attention_tone(&self) {
        let queue = PlayQueue::Tones(tone_sequence(&[ATTENTION_TONE]));
        thread::spawn(move || {
            if let Err(err) = queue.play_to_end() {
                debug!("attention tone failed: {err}");
            }
        });
    }
}

/// Sources ready to hand to a sink. Built before any output is opened so
/// load and decode failures surface on the caller's thread.
enum PlayQueue {
    Tones(Vec<ToneSource>),
    File(Decoder<Cursor<AlarmSound>>),
}

impl PlayQueue {
    /// Opens the default output and blocks until the queue has drained. The
    /// stream is not `Send`, so it lives on whichever thread plays.
    fn play_to_end(self) -> Result<(), EffectError> {
        let (_stream, handle) =
            OutputStream::try_default().map_err(|err| EffectError::Output(err.to_string()))?;
        let sink = Sink::try_new(&handle).map_err(|err| EffectError::Output(err.to_string()))?;
        match self {
            Self::Tones(tones) => {
                for tone in tones {
                    sink.append(tone);
                }
            }
            Self::File(decoder) => sink.append(decoder),
        }
        sink.sleep_until_end();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    fn samples(source: ToneSource, count: usize) -> Vec<f32> {
        source.take(count).collect()
    }

    #[test]
    fn builtin_alarm_starts_at_once_and_pauses_before_later_tones() {
        let mut tones = tone_sequence(&ALARM_TONES).into_iter();
        let first = tones.next().expect("first tone");
        let rate = first.sample_rate() as usize;
        let gap = rate * TONE_GAP.as_millis() as usize / 1000;

        assert!(samples(first, 200).iter().any(|sample| *sample != 0.0));
        for later in tones.by_ref().take(2) {
            assert!(samples(later, gap - 1).iter().all(|sample| *sample == 0.0));
        }
        assert!(tones.next().is_none());
    }

    #[test]
    fn attention_tone_is_one_undelayed_blip() {
        let tones = tone_sequence(&[ATTENTION_TONE]);
        assert_eq!(tones.len(), 1);
        assert_eq!(ATTENTION_TONE.length, Duration::from_millis(80));
        let head = samples(tones.into_iter().next().expect("tone"), 200);
        assert!(head.iter().any(|sample| *sample != 0.0));
        assert!(head.iter().all(|sample| sample.abs() <= TONE_VOLUME));
    }

    #[test]
    fn missing_sound_file_is_reported_before_any_output_opens() {
        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("nope.wav");
        let err = SystemSound
            .play(&SoundSource::File(missing.clone()), PlaybackMode::Blocking)
            .expect_err("missing file");
        assert!(matches!(err, EffectError::MissingSound(path) if path == missing));
    }

    #[test]
    fn unreadable_audio_is_a_conversion_error() {
        let dir = tempdir().expect("tempdir");
        let junk = dir.path().join("junk.wav");
        fs::write(&junk, b"definitely not a wave file").expect("write junk");

        let err = SystemSound
            .play(&SoundSource::File(junk.clone()), PlaybackMode::Detached)
            .expect_err("junk audio");
        assert!(matches!(&err, EffectError::Decode { path, .. } if *path == junk));
        assert!(err.to_string().starts_with("conversion error for "));
    }

    #[test]
    fn loaded_sound_keeps_file_bytes() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bytes.wav");
        fs::write(&path, b"RIFF").expect("write bytes");
        let sound = AlarmSound::load(&path).expect("load");
        assert_eq!(sound.as_ref(), b"RIFF");
    }
}

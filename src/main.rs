mod alarm;
mod app;
mod countdown;
mod effects;
mod timespec;

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::{env, ffi::OsString};

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::alarm::model::{
    AlarmPlan, DEFAULT_ALARM_INTERVAL_SECS, DEFAULT_ALARM_REPEAT, PlaybackMode, PostAction,
    Settings, load_settings,
};
use crate::app::{Invocation, banner, run_countdown};
use crate::countdown::clock::SystemClock;
use crate::countdown::scheduler::LoopPolicy;
use crate::effects::Effectors;
use crate::effects::launch::SystemLauncher;
use crate::effects::notice::DesktopNotifier;
use crate::effects::power::PowerGuard;
use crate::effects::sound::SystemSound;
use crate::timespec::parser::parse_duration;
use crate::timespec::target::TargetResolver;
use crate::timespec::units::Millis;
use crate::timespec::{TimeSpec, looks_like_date, parse_at, parse_clock};

const LOG_ENV: &str = "TIMEUP_LOG";

const EXAMPLES: &str = "\
Examples:
  timeup 20s
  timeup 1h20m30s alarm.wav
  timeup 5m --loop 3 --alarm-repeat 2
  timeup --at 07:30 --open notes.txt
  timeup --at 2030-01-01 00:00 --cmd \"echo happy new year\"
  timeup 25m --prealarm 5 --nosleep";

#[derive(Parser, Debug)]
#[command(
    name = "timeup",
    version,
    about = "Countdown timer and alarm clock for the terminal",
    after_help = EXAMPLES
)]
struct Cli {
    /// Countdown length (e.g. 90s, 1h20m, 1.5h) and/or an alarm sound file
    #[arg(value_name = "TIME|SOUND")]
    positionals: Vec<String>,

    /// Skip the alarm sound
    #[arg(short = 'm', long, overrides_with = "no_mute")]
    mute: bool,

    /// Play the alarm sound even if the settings file mutes it
    #[arg(long, overrides_with = "mute")]
    no_mute: bool,

    /// Restart after expiry; optionally stop after COUNT runs
    #[arg(
        short = 'l',
        long = "loop",
        value_name = "COUNT",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "0"
    )]
    loop_count: Option<u32>,

    /// How many times the alarm sound plays
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    alarm_repeat: Option<u32>,

    /// Seconds between alarm repeats
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    alarm_interval: Option<u64>,

    /// Play the alarm sound in the background
    #[arg(long = "async", overrides_with = "sync_sound")]
    async_sound: bool,

    /// Wait for the alarm sound to finish before continuing
    #[arg(long = "sync", overrides_with = "async_sound")]
    sync_sound: bool,

    /// Count down to HH:MM[:SS] or YYYY-MM-DD [HH:MM[:SS]] local time
    #[arg(long, value_name = "EXPR", value_parser = parse_at)]
    at: Option<TimeSpec>,

    /// Open a file with its default application at expiry
    #[arg(short = 'o', long, value_name = "PATH", overrides_with = "cmd")]
    open: Option<PathBuf>,

    /// Run a shell command at expiry and wait for it
    #[arg(short = 'c', long, value_name = "COMMAND", overrides_with = "open")]
    cmd: Option<String>,

    /// Keep the system awake while counting down
    #[arg(long, overrides_with = "sleep")]
    nosleep: bool,

    /// Let the system sleep even if the settings file says otherwise
    #[arg(long, overrides_with = "nosleep")]
    sleep: bool,

    /// Beep every second during the last SECS seconds
    #[arg(long, value_name = "SECS")]
    prealarm: Option<u64>,

    /// Do not show a desktop notification at expiry
    #[arg(long)]
    nomsg: bool,

    /// JSON settings file with defaults for the flags above
    #[arg(long, env = "TIMEUP_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log debug details to stderr
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() {
    if let Err(err) = run() {
        if let Some(usage) = err.downcast_ref::<clap::Error>() {
            usage.exit();
        }
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse_from(normalize_legacy_flags(env::args_os()));
    init_tracing(cli.verbose);

    let settings = match &cli.config {
        Some(path) => load_settings(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Settings::default(),
    };

    let invocation = build_invocation(&cli, &settings)?;
    debug!(spec = %invocation.spec, loops = ?invocation.loops, "invocation");

    let resolver = TargetResolver::new();
    let initial = resolver.resolve(&invocation.spec)?;
    println!(
        "{}",
        banner(&invocation.spec, initial, invocation.plan.playback)
    );

    let guard = PowerGuard::acquire(keep_awake(&cli, &settings));
    guard.release_on_interrupt()?;

    let clock = SystemClock;
    let (sound, launcher, notifier) = (SystemSound, SystemLauncher, DesktopNotifier);
    let effectors = Effectors {
        sound: &sound,
        launcher: &launcher,
        notifier: &notifier,
    };
    let (summary, _) = run_countdown(
        &invocation,
        initial,
        &resolver,
        &clock,
        effectors,
        io::stdout(),
    )?;
    debug!(iterations = summary.iterations, "countdown stopped");

    drop(guard);
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("timeup=debug,info")
        } else {
            EnvFilter::new("warn")
        }
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .try_init();
}

fn build_invocation(cli: &Cli, settings: &Settings) -> Result<Invocation> {
    let (time, sound) = classify_positionals(&cli.positionals, cli.at.is_some());

    let spec = match (cli.at, time) {
        (Some(at), _) => at,
        (None, Some(ms)) => TimeSpec::Relative(ms),
        (None, None) => {
            return Err(Cli::command()
                .error(
                    ErrorKind::MissingRequiredArgument,
                    "a countdown time (e.g. 20s, 1h30m) or --at is required",
                )
                .into());
        }
    };

    let post_action = match (&cli.open, &cli.cmd) {
        (Some(path), _) => PostAction::OpenFile(path.clone()),
        (None, Some(command)) => PostAction::RunCommand(command.clone()),
        (None, None) => PostAction::None,
    };

    let mut plan = AlarmPlan::default()
        .with_repeat(
            cli.alarm_repeat
                .or(settings.alarm_repeat)
                .unwrap_or(DEFAULT_ALARM_REPEAT),
        )
        .with_interval_secs(
            cli.alarm_interval
                .or(settings.alarm_interval_secs)
                .unwrap_or(DEFAULT_ALARM_INTERVAL_SECS),
        );
    plan.mute = flag_choice(cli.mute, cli.no_mute)
        .or(settings.mute)
        .unwrap_or(false);
    let detached = flag_choice(cli.async_sound, cli.sync_sound)
        .or(settings.async_sound)
        .unwrap_or(false);
    plan.playback = if detached {
        PlaybackMode::Detached
    } else {
        PlaybackMode::Blocking
    };
    plan.sound = sound.or_else(|| settings.sound.clone());
    plan.post_action = post_action;
    plan.notify = !cli.nomsg && settings.notify.unwrap_or(true);
    plan.pre_alarm_secs = cli.prealarm.or(settings.prealarm_secs).unwrap_or(0);

    Ok(Invocation {
        spec,
        loops: LoopPolicy::from_flag(cli.loop_count.is_some(), cli.loop_count),
        plan,
    })
}

fn keep_awake(cli: &Cli, settings: &Settings) -> bool {
    flag_choice(cli.nosleep, cli.sleep)
        .or(settings.no_sleep)
        .unwrap_or(false)
}

/// Collapses a flag and its negation into an explicit choice. The pair
/// overrides each other, so at most one is set.
fn flag_choice(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Splits positionals into a countdown length and a sound file. A token
/// that parses to a non-zero duration is the time (the last one wins); the
/// first other token is the sound. With `--at` duration tokens are ignored.
/// Anything beyond one sound is ignored with a warning.
fn classify_positionals(
    positionals: &[String],
    has_at: bool,
) -> (Option<Millis>, Option<PathBuf>) {
    let mut time = None;
    let mut sound = None;
    for token in positionals {
        let parsed = parse_duration(token);
        if !parsed.is_zero() {
            if has_at {
                warn!("ignoring countdown {token}: --at sets the target");
            } else {
                time = Some(parsed);
            }
        } else if sound.is_none() {
            sound = Some(PathBuf::from(token));
        } else {
            warn!("ignoring extra argument {token}");
        }
    }
    (time, sound)
}

/// Rewrites the multi-letter single-dash flags and the space-separated
/// forms of `--loop COUNT` and `--at DATE TIME` into what clap expects.
fn normalize_legacy_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter().peekable();
    let mut normalized = Vec::new();

    while let Some(arg) = args.next() {
        let Some(text) = arg.to_str() else {
            normalized.push(arg);
            continue;
        };
        let text = legacy_alias(text).unwrap_or(text);

        if text == "--loop" || text == "-l" {
            let count = args
                .peek()
                .and_then(|next| next.to_str())
                .filter(|next| is_loop_count(next))
                .map(str::to_owned);
            match count {
                Some(count) => {
                    args.next();
                    normalized.push(OsString::from(format!("--loop={count}")));
                }
                None => normalized.push(OsString::from(text)),
            }
            continue;
        }

        let at_value = if text == "--at" {
            match args.next().map(OsString::into_string) {
                Some(Ok(value)) => Some(value),
                Some(Err(raw)) => {
                    normalized.push(OsString::from(text));
                    normalized.push(raw);
                    continue;
                }
                None => {
                    normalized.push(OsString::from(text));
                    continue;
                }
            }
        } else {
            text.strip_prefix("--at=").map(str::to_owned)
        };

        let Some(mut expr) = at_value else {
            normalized.push(OsString::from(text));
            continue;
        };
        if looks_like_date(&expr) {
            let time = args
                .peek()
                .and_then(|next| next.to_str())
                .filter(|next| parse_clock(next).is_some())
                .map(str::to_owned);
            if let Some(time) = time {
                args.next();
                expr = format!("{expr} {time}");
            }
        }
        normalized.push(OsString::from(format!("--at={expr}")));
    }

    normalized
}

fn legacy_alias(text: &str) -> Option<&'static str> {
    [
        ("-ar", "--alarm-repeat"),
        ("-ai", "--alarm-interval"),
        ("-as", "--async"),
        ("-ns", "--nosleep"),
        ("-pa", "--prealarm"),
    ]
    .into_iter()
    .find(|(short, _)| text.eq_ignore_ascii_case(short))
    .map(|(_, long)| long)
}

fn is_loop_count(text: &str) -> bool {
    !text.is_empty()
        && text.bytes().all(|b| b.is_ascii_digit())
        && text.parse::<u32>().is_ok_and(|count| count > 0)
}

use std::io::Write;

use tracing::{debug, warn};

use crate::alarm::model::{AlarmPlan, PostAction};
use crate::countdown::clock::Clock;
use crate::effects::Effectors;

pub const NOTICE_TITLE: &str = "timeup";
pub const NOTICE_MESSAGE: &str = "Time is up!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    NotConfigured,
    Opened,
    CommandFinished(Option<i32>),
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub sounds_played: u32,
    pub sounds_skipped: u32,
    pub interval_waits: u32,
    pub post_action: PostOutcome,
    pub notified: bool,
}

/// Runs the expiry sequence: sound repeats, then the post-action, then the
/// desktop notice. Every effector failure is logged and swallowed.
pub struct AlarmDispatcher<'a> {
    effectors: Effectors<'a>,
    clock: &'a dyn Clock,
}

impl<'a> AlarmDispatcher<'a> {
    pub fn new(effectors: Effectors<'a>, clock: &'a dyn Clock) -> Self {
        Self { effectors, clock }
    }

    /// `out` receives the user-facing confirmation lines.
    pub fn fire(&self, plan: &AlarmPlan, out: &mut dyn Write) -> DispatchReport {
        let mut report = DispatchReport {
            sounds_played: 0,
            sounds_skipped: 0,
            interval_waits: 0,
            post_action: PostOutcome::NotConfigured,
            notified: false,
        };

        if plan.mute {
            debug!("alarm muted");
        } else {
            self.play_repeats(plan, &mut report);
        }

        report.post_action = self.run_post_action(&plan.post_action, out);

        if plan.notify {
            match self
                .effectors
                .notifier
                .show_notice(NOTICE_TITLE, NOTICE_MESSAGE)
            {
                Ok(()) => report.notified = true,
                Err(err) => warn!("{err}"),
            }
        }

        report
    }

    fn play_repeats(&self, plan: &AlarmPlan, report: &mut DispatchReport) {
        let source = plan.sound_source();
        for repeat in 0..plan.repeat() {
            if repeat > 0 {
                self.clock.sleep(plan.interval());
                report.interval_waits += 1;
            }
            match self.effectors.sound.play(&source, plan.playback) {
                Ok(()) => report.sounds_played += 1,
                Err(err) => {
                    warn!("alarm repeat {} skipped: {err}", repeat + 1);
                    report.sounds_skipped += 1;
                }
            }
        }
    }

    fn run_post_action(&self, action: &PostAction, out: &mut dyn Write) -> PostOutcome {
        let (outcome, line) = match action {
            PostAction::None => return PostOutcome::NotConfigured,
            PostAction::OpenFile(path) => {
                if !path.exists() {
                    warn!("cannot open {}: file does not exist", path.display());
                    return PostOutcome::Failed;
                }
                match self.effectors.launcher.open_with_default_handler(path) {
                    Ok(()) => (
                        PostOutcome::Opened,
                        format!("Opened file: {}", path.display()),
                    ),
                    Err(err) => {
                        warn!("cannot open {}: {err}", path.display());
                        return PostOutcome::Failed;
                    }
                }
            }
            PostAction::RunCommand(command) => match self.effectors.launcher.run_and_wait(command)
            {
                Ok(Some(code)) => (
                    PostOutcome::CommandFinished(Some(code)),
                    format!("Command finished (exit code {code}): {command}"),
                ),
                Ok(None) => (
                    PostOutcome::CommandFinished(None),
                    format!("Command terminated by signal: {command}"),
                ),
                Err(err) => {
                    warn!("command failed to start: {err}");
                    return PostOutcome::Failed;
                }
            },
        };

        if let Err(err) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            debug!("unable to write confirmation: {err}");
        }
        outcome
    }
}

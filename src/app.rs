use std::io::Write;

use tracing::debug;

use crate::alarm::dispatcher::AlarmDispatcher;
use crate::alarm::model::{AlarmPlan, PlaybackMode};
use crate::countdown::clock::Clock;
use crate::countdown::progress::{ProgressFrame, ProgressRenderer, format_remaining};
use crate::countdown::scheduler::{CountdownHooks, CountdownScheduler, LoopPolicy, RunSummary};
use crate::effects::{Effectors, SoundBackend};
use crate::timespec::target::{TargetResolver, WallClock};
use crate::timespec::units::Millis;
use crate::timespec::{ResolveError, TimeSpec};

pub const FINISHED_MESSAGE: &str = "Countdown finished.";

/// A fully validated run request.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub spec: TimeSpec,
    pub loops: LoopPolicy,
    pub plan: AlarmPlan,
}

pub fn banner(spec: &TimeSpec, initial: Millis, playback: PlaybackMode) -> String {
    let mut line = match spec.clock_time() {
        Some((hour, minute, second)) => {
            format!("timeup started for {hour:02}:{minute:02}:{second:02}")
        }
        None => format!(
            "timeup started with countdown: {}",
            format_remaining(initial.ceil_secs())
        ),
    };
    if playback == PlaybackMode::Detached {
        line.push_str(" (async sound)");
    }
    line
}

/// Countdown callbacks that draw on a terminal and fire the alarm plan.
pub struct TerminalHooks<'a, W: Write> {
    renderer: ProgressRenderer<W>,
    dispatcher: AlarmDispatcher<'a>,
    sound: &'a dyn SoundBackend,
    plan: &'a AlarmPlan,
}

impl<'a, W: Write> TerminalHooks<'a, W> {
    pub fn new(
        out: W,
        plan: &'a AlarmPlan,
        effectors: Effectors<'a>,
        clock: &'a dyn Clock,
    ) -> Self {
        let sound = effectors.sound;
        Self {
            renderer: ProgressRenderer::new(out),
            dispatcher: AlarmDispatcher::new(effectors, clock),
            sound,
            plan,
        }
    }

    pub fn finish(mut self) -> W {
        if let Err(err) = self.renderer.finish_line() {
            debug!("unable to finish progress line: {err}");
        }
        let mut out = self.renderer;
        if let Err(err) = writeln!(out.get_mut(), "{FINISHED_MESSAGE}") {
            debug!("unable to write completion message: {err}");
        }
        out.into_inner()
    }
}

impl<W: Write> CountdownHooks for TerminalHooks<'_, W> {
    fn render(&mut self, frame: &ProgressFrame) {
        if let Err(err) = self.renderer.draw(frame) {
            debug!("unable to draw progress: {err}");
        }
    }

    fn pre_alarm(&mut self, remaining_secs: u64) {
        debug!(remaining_secs, "pre-alarm");
        self.sound.attention_tone();
    }

    fn expired(&mut self, iteration: u32) {
        if let Err(err) = self.renderer.finish_line() {
            debug!("unable to finish progress line: {err}");
        }
        let report = self.dispatcher.fire(self.plan, self.renderer.get_mut());
        debug!(iteration, ?report, "alarm dispatched");
    }
}

/// Runs the whole countdown, loops included, then prints the completion
/// line. Returns the writer so callers can inspect what was drawn.
pub fn run_countdown<W, C>(
    invocation: &Invocation,
    initial: Millis,
    resolver: &TargetResolver<C>,
    clock: &dyn Clock,
    effectors: Effectors<'_>,
    out: W,
) -> Result<(RunSummary, W), ResolveError>
where
    W: Write,
    C: WallClock,
{
    let mut hooks = TerminalHooks::new(out, &invocation.plan, effectors, clock);
    let mut scheduler = CountdownScheduler::new(
        clock,
        invocation.spec,
        invocation.loops,
        invocation.plan.pre_alarm_secs,
    );
    let summary = scheduler.run(initial, resolver, &mut hooks)?;
    debug!(phase = ?scheduler.phase(), iterations = summary.iterations, "scheduler done");
    Ok((summary, hooks.finish()))
}

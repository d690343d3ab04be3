use std::time::{Duration, Instant};

use tracing::debug;

use crate::countdown::clock::{Clock, deadline_after};
use crate::countdown::progress::ProgressFrame;
use crate::timespec::target::{TargetResolver, WallClock};
use crate::timespec::units::Millis;
use crate::timespec::{ResolveError, TimeSpec};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Phase {
    Running,
    Expired,
    AwaitingNextIteration,
    Stopped,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LoopPolicy {
    Once,
    Repeat { max: Option<u32> },
}

impl LoopPolicy {
    /// `count` of `None` or zero means unbounded; a count of one is a
    /// plain single run.
    pub fn from_flag(enabled: bool, count: Option<u32>) -> Self {
        match (enabled, count) {
            (false, _) | (true, Some(1)) => LoopPolicy::Once,
            (true, None | Some(0)) => LoopPolicy::Repeat { max: None },
            (true, Some(max)) => LoopPolicy::Repeat { max: Some(max) },
        }
    }

    pub fn is_looping(self) -> bool {
        matches!(self, LoopPolicy::Repeat { .. })
    }

    fn allows_another(self, completed: u32) -> bool {
        match self {
            LoopPolicy::Once => false,
            LoopPolicy::Repeat { max: None } => true,
            LoopPolicy::Repeat { max: Some(max) } => completed < max,
        }
    }
}

/// Callbacks the scheduler drives while counting down.
pub trait CountdownHooks {
    fn render(&mut self, frame: &ProgressFrame);
    fn pre_alarm(&mut self, remaining_secs: u64);
    /// Runs the alarm sequence; the scheduler waits for it to return.
    fn expired(&mut self, iteration: u32);
}

/// Per-iteration bookkeeping, discarded when the iteration ends.
#[derive(Debug, Clone, Copy)]
pub struct CountdownState {
    pub start: Instant,
    pub end: Instant,
    pub total: Millis,
    pub last_rendered_secs: Option<u64>,
    pub iteration: u32,
}

impl CountdownState {
    fn begin(now: Instant, total: Millis, iteration: u32) -> Self {
        Self {
            start: now,
            end: deadline_after(now, total.as_duration()),
            total,
            last_rendered_secs: None,
            iteration,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RunSummary {
    pub iterations: u32,
}

pub struct CountdownScheduler<'a> {
    clock: &'a dyn Clock,
    spec: TimeSpec,
    loops: LoopPolicy,
    pre_alarm_secs: u64,
    poll_interval: Duration,
    phase: Phase,
}

impl<'a> CountdownScheduler<'a> {
    pub fn new(
        clock: &'a dyn Clock,
        spec: TimeSpec,
        loops: LoopPolicy,
        pre_alarm_secs: u64,
    ) -> Self {
        Self {
            clock,
            spec,
            loops,
            pre_alarm_secs,
            poll_interval: DEFAULT_POLL_INTERVAL,
            phase: Phase::Running,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_micros(100));
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Counts down `initial`, fires the hooks, and keeps looping as the
    /// policy allows. Wall-clock targets recompute each following length.
    pub fn run<W, H>(
        &mut self,
        initial: Millis,
        resolver: &TargetResolver<W>,
        hooks: &mut H,
    ) -> Result<RunSummary, ResolveError>
    where
        W: WallClock,
        H: CountdownHooks,
    {
        let mut length = initial;
        let mut completed = 0_u32;

        loop {
            completed = completed.saturating_add(1);
            let label = self.loops.is_looping().then_some(completed);

            self.phase = Phase::Running;
            debug!(iteration = completed, length_ms = length.get(), "countdown running");
            let mut state = CountdownState::begin(self.clock.now(), length, completed);
            self.count_down(&mut state, label, hooks);

            self.phase = Phase::Expired;
            debug!(iteration = state.iteration, "countdown expired");
            hooks.render(&ProgressFrame::complete(label));
            hooks.expired(completed);

            if !self.loops.allows_another(completed) {
                self.phase = Phase::Stopped;
                return Ok(RunSummary {
                    iterations: completed,
                });
            }

            if self.spec.is_wall_clock() {
                length = match resolver.next_occurrence(&self.spec) {
                    Ok(next) => next,
                    Err(err) => {
                        self.phase = Phase::Stopped;
                        return Err(err);
                    }
                };
            }
            self.phase = Phase::AwaitingNextIteration;
        }
    }

    fn count_down<H: CountdownHooks>(
        &self,
        state: &mut CountdownState,
        label: Option<u32>,
        hooks: &mut H,
    ) {
        loop {
            let now = self.clock.now();
            if now >= state.end {
                debug!(
                    iteration = state.iteration,
                    elapsed_ms = (now - state.start).as_millis() as u64,
                    "deadline reached"
                );
                return;
            }

            // Always measured against the fixed end instant, never by summing sleeps.
            let left = state.end - now;
            let left_ms = u64::try_from(left.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX);
            let remaining = Millis::new(left_ms);
            let remaining_secs = remaining.ceil_secs();

            if state.last_rendered_secs != Some(remaining_secs) {
                state.last_rendered_secs = Some(remaining_secs);
                if self.pre_alarm_secs > 0 && remaining_secs <= self.pre_alarm_secs {
                    hooks.pre_alarm(remaining_secs);
                }
                hooks.render(&ProgressFrame::running(label, remaining, state.total));
            }

            self.clock.sleep(self.poll_interval.min(left));
        }
    }
}

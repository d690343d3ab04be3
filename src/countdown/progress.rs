use std::fmt::Write as _;
use std::io::{self, Write};

use crate::timespec::units::Millis;

pub const BAR_WIDTH: usize = 30;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;
const SECS_PER_MONTH: u64 = 30 * SECS_PER_DAY;
const SECS_PER_YEAR: u64 = 365 * SECS_PER_DAY;

/// One progress update: what a single line on the terminal shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressFrame {
    /// Loop iteration label, only present when looping.
    pub iteration: Option<u32>,
    pub remaining_secs: u64,
    /// Elapsed share of the countdown in `[0, 1]`.
    pub fraction: f64,
}

impl ProgressFrame {
    pub fn running(iteration: Option<u32>, remaining: Millis, total: Millis) -> Self {
        let remaining = remaining.min(total);
        let elapsed = total.get() - remaining.get();
        let fraction = if total.is_zero() {
            1.0
        } else {
            (elapsed as f64 / total.get() as f64).clamp(0.0, 1.0)
        };
        Self {
            iteration,
            remaining_secs: remaining.ceil_secs(),
            fraction,
        }
    }

    pub fn complete(iteration: Option<u32>) -> Self {
        Self {
            iteration,
            remaining_secs: 0,
            fraction: 1.0,
        }
    }

    pub fn filled_cells(&self) -> usize {
        ((self.fraction * BAR_WIDTH as f64) as usize).min(BAR_WIDTH)
    }
}

/// Compact `1y 2mo 3d 4h 5m 6s` rendering. Leading zero units are dropped;
/// every unit after the first non-zero one is kept.
pub fn format_remaining(total_secs: u64) -> String {
    if total_secs == 0 {
        return "0s".to_string();
    }

    let mut rest = total_secs;
    let mut parts = Vec::with_capacity(6);
    for (size, suffix) in [
        (SECS_PER_YEAR, "y"),
        (SECS_PER_MONTH, "mo"),
        (SECS_PER_DAY, "d"),
        (SECS_PER_HOUR, "h"),
        (SECS_PER_MINUTE, "m"),
        (1, "s"),
    ] {
        let value = rest / size;
        rest %= size;
        if value > 0 || !parts.is_empty() {
            parts.push(format!("{value}{suffix}"));
        }
    }
    parts.join(" ")
}

pub fn render_line(frame: &ProgressFrame) -> String {
    let mut line = String::with_capacity(64 + BAR_WIDTH);
    if let Some(iteration) = frame.iteration {
        let _ = write!(line, "Run {iteration} | ");
    }
    let _ = write!(
        line,
        "Remaining: {} [",
        format_remaining(frame.remaining_secs)
    );
    let filled = frame.filled_cells();
    line.extend(std::iter::repeat_n('#', filled));
    line.extend(std::iter::repeat_n('-', BAR_WIDTH - filled));
    line.push_str("]   ");
    line
}

/// Redraws a single carriage-return line on `out`.
pub struct ProgressRenderer<W: Write> {
    out: W,
    drawn: bool,
}

impl<W: Write> ProgressRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, drawn: false }
    }

    pub fn draw(&mut self, frame: &ProgressFrame) -> io::Result<()> {
        write!(self.out, "\r{}", render_line(frame))?;
        self.drawn = true;
        self.out.flush()
    }

    /// Moves past the progress line so later output starts on a fresh line.
    pub fn finish_line(&mut self) -> io::Result<()> {
        if self.drawn {
            writeln!(self.out)?;
            self.drawn = false;
        }
        self.out.flush()
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

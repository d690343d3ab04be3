use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Upper bound for every countdown length, kept well below what a signed
/// 64-bit millisecond count (and `Instant` arithmetic) can represent.
pub const MAX_MS: u64 = (i64::MAX / 4) as u64;

/// Non-negative millisecond count that saturates at [`MAX_MS`].
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Millis(u64);

impl Millis {
    pub const ZERO: Millis = Millis(0);
    pub const MAX: Millis = Millis(MAX_MS);

    pub fn new(ms: u64) -> Self {
        Self(ms.min(MAX_MS))
    }

    /// Clamps a wide intermediate value: non-positive (or NaN) becomes zero,
    /// anything above the ceiling becomes [`Millis::MAX`], the rest truncates.
    pub fn from_f64(ms: f64) -> Self {
        if !(ms > 0.0) {
            return Self::ZERO;
        }
        if ms >= MAX_MS as f64 {
            return Self::MAX;
        }
        Self::new(ms as u64)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_add(self, other: Millis) -> Millis {
        Self::new(self.0.saturating_add(other.0))
    }

    /// Whole seconds, rounded up.
    pub fn ceil_secs(self) -> u64 {
        self.0.div_ceil(1_000)
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TimeUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    /// 30 days.
    Month,
    /// 365 days.
    Year,
}

impl TimeUnit {
    /// Case-insensitive lookup; an empty token means seconds.
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "ms" => Some(Self::Millisecond),
            "" | "s" | "sec" => Some(Self::Second),
            "m" | "min" => Some(Self::Minute),
            "h" | "hr" | "hour" => Some(Self::Hour),
            "d" | "day" => Some(Self::Day),
            "w" | "wk" | "week" => Some(Self::Week),
            "mo" | "mon" | "month" => Some(Self::Month),
            "y" | "yr" | "year" => Some(Self::Year),
            _ => None,
        }
    }

    pub fn multiplier_ms(self) -> u64 {
        match self {
            Self::Millisecond => 1,
            Self::Second => 1_000,
            Self::Minute => 60_000,
            Self::Hour => 3_600_000,
            Self::Day => 86_400_000,
            Self::Week => 604_800_000,
            Self::Month => 2_592_000_000,
            Self::Year => 31_536_000_000,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("unknown time unit '{0}'")]
pub struct UnknownUnit(pub String);

/// Converts `value` of the unit named by `unit_token` into milliseconds.
///
/// The product is formed in `f64` before clamping so that large values
/// saturate at [`MAX_MS`] instead of overflowing.
pub fn to_milliseconds(value: f64, unit_token: &str) -> Result<Millis, UnknownUnit> {
    let unit = TimeUnit::parse(unit_token).ok_or_else(|| UnknownUnit(unit_token.to_string()))?;
    Ok(Millis::from_f64(value * unit.multiplier_ms() as f64))
}

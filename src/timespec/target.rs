use chrono::{
    DateTime, Days, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone,
};

use crate::timespec::units::Millis;
use crate::timespec::{ResolveError, TimeSpec};

/// Source of "now" for wall-clock targets.
pub trait WallClock {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Turns wall-clock targets into countdown lengths against the local zone.
#[derive(Debug, Clone, Default)]
pub struct TargetResolver<W = SystemWallClock> {
    wall: W,
}

impl TargetResolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<W: WallClock> TargetResolver<W> {
    pub fn with_wall_clock(wall: W) -> Self {
        Self { wall }
    }

    pub fn until_time_of_day(
        &self,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Result<Millis, ResolveError> {
        until_time_of_day_in(&self.wall.now(), &Local, hour, minute, second)
    }

    pub fn until_date_time(
        &self,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Result<Millis, ResolveError> {
        until_date_time_in(
            &self.wall.now(),
            &Local,
            (year, month, day),
            (hour, minute, second),
        )
    }

    /// Length of the first countdown for `spec`.
    pub fn resolve(&self, spec: &TimeSpec) -> Result<Millis, ResolveError> {
        match *spec {
            TimeSpec::Relative(ms) => Ok(ms),
            TimeSpec::TimeOfDay {
                hour,
                minute,
                second,
            } => self.until_time_of_day(hour, minute, second),
            TimeSpec::DateTime {
                year,
                month,
                day,
                hour,
                minute,
                second,
            } => self.until_date_time(year, month, day, hour, minute, second),
        }
    }

    /// Length of the countdown that follows a completed one.
    pub fn next_occurrence(&self, spec: &TimeSpec) -> Result<Millis, ResolveError> {
        match spec.clock_time() {
            Some((hour, minute, second)) => self.until_time_of_day(hour, minute, second),
            None => self.resolve(spec),
        }
    }
}

/// Milliseconds from `now` until the next `hour:minute:second` in `timezone`,
/// rolling over to tomorrow when today's instant is not strictly later.
pub fn until_time_of_day_in<Tz>(
    now: &DateTime<Tz>,
    timezone: &Tz,
    hour: u32,
    minute: u32,
    second: u32,
) -> Result<Millis, ResolveError>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or(ResolveError::InvalidTime {
        hour,
        minute,
        second,
    })?;

    let today = now.date_naive();
    let mut candidate = resolve_on(timezone, today.and_time(time))?;
    if candidate <= *now {
        let tomorrow = today
            .checked_add_days(Days::new(1))
            .ok_or(ResolveError::Unrepresentable(today.and_time(time)))?;
        candidate = resolve_on(timezone, tomorrow.and_time(time))?;
    }

    Ok(millis_between(now, &candidate))
}

/// Milliseconds from `now` until an absolute local date-time. Targets that
/// are not strictly in the future are an error rather than rolled forward.
pub fn until_date_time_in<Tz>(
    now: &DateTime<Tz>,
    timezone: &Tz,
    (year, month, day): (i32, u32, u32),
    (hour, minute, second): (u32, u32, u32),
) -> Result<Millis, ResolveError>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(ResolveError::InvalidDate { year, month, day })?;
    let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or(ResolveError::InvalidTime {
        hour,
        minute,
        second,
    })?;
    let naive = date.and_time(time);

    let target = resolve_on(timezone, naive)?;
    if target <= *now {
        return Err(ResolveError::NotInFuture(naive));
    }
    Ok(millis_between(now, &target))
}

fn resolve_on<Tz>(timezone: &Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>, ResolveError>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    resolve_local_datetime(timezone, naive).ok_or(ResolveError::Unrepresentable(naive))
}

/// Ambiguous local times pick the earlier instant. Times that fall into a
/// daylight-saving gap move forward by one hour.
fn resolve_local_datetime<Tz>(timezone: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(first, _second) => Some(first),
        LocalResult::None => {
            let shifted = naive.checked_add_signed(TimeDelta::hours(1))?;
            timezone.from_local_datetime(&shifted).earliest()
        }
    }
}

/// Whole milliseconds between two instants, rounding a positive
/// sub-millisecond remainder up so a future target never yields zero.
fn millis_between<Tz: TimeZone>(from: &DateTime<Tz>, to: &DateTime<Tz>) -> Millis {
    let delta = to.clone().signed_duration_since(from);
    let whole = delta.num_milliseconds();
    let rounded = if delta > TimeDelta::milliseconds(whole) {
        whole.saturating_add(1)
    } else {
        whole
    };
    Millis::new(u64::try_from(rounded).unwrap_or(0))
}

#[cfg(test)]
pub(crate) struct FixedWallClock(pub DateTime<Local>);

#[cfg(test)]
impl WallClock for FixedWallClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use chrono_tz::America::New_York;

    use super::*;

    const HOUR_MS: u64 = 3_600_000;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("valid utc instant")
    }

    #[test]
    fn later_today_is_used_directly() {
        let now = utc(2026, 6, 15, 10, 0, 0);
        let ms = until_time_of_day_in(&now, &Utc, 12, 0, 0).expect("valid");
        assert_eq!(ms.get(), 2 * HOUR_MS);
    }

    #[test]
    fn passed_or_current_time_rolls_to_tomorrow() {
        let now = utc(2026, 6, 15, 13, 0, 0);
        let passed = until_time_of_day_in(&now, &Utc, 12, 0, 0).expect("valid");
        assert_eq!(passed.get(), 23 * HOUR_MS);

        let exact = until_time_of_day_in(&now, &Utc, 13, 0, 0).expect("valid");
        assert_eq!(exact.get(), 24 * HOUR_MS);
    }

    #[test]
    fn one_hour_later_now_shortens_gap_by_one_hour() {
        let target = (18, 45, 30);
        for start_hour in 0..23 {
            let first_now = utc(2026, 6, 15, start_hour, 10, 0);
            let second_now = utc(2026, 6, 15, start_hour + 1, 10, 0);
            let first =
                until_time_of_day_in(&first_now, &Utc, target.0, target.1, target.2).expect("ok");
            let second =
                until_time_of_day_in(&second_now, &Utc, target.0, target.1, target.2).expect("ok");
            let diff = (first.get() + 24 * HOUR_MS - second.get()) % (24 * HOUR_MS);
            assert_eq!(diff, HOUR_MS, "start hour {start_hour}");
            assert!(first.get() > 0 && second.get() > 0);
        }
    }

    #[test]
    fn rollover_crosses_month_and_year() {
        let now = utc(2026, 12, 31, 23, 30, 0);
        let ms = until_time_of_day_in(&now, &Utc, 0, 15, 0).expect("valid");
        assert_eq!(ms.get(), 45 * 60_000);
    }

    #[test]
    fn sub_millisecond_gap_is_never_zero() {
        let now = utc(2026, 6, 15, 11, 59, 59) + TimeDelta::microseconds(999_500);
        let ms = until_time_of_day_in(&now, &Utc, 12, 0, 0).expect("valid");
        assert_eq!(ms.get(), 1);
    }

    #[test]
    fn invalid_clock_fields_fail() {
        let now = utc(2026, 6, 15, 10, 0, 0);
        assert_eq!(
            until_time_of_day_in(&now, &Utc, 24, 0, 0),
            Err(ResolveError::InvalidTime {
                hour: 24,
                minute: 0,
                second: 0
            })
        );
        assert!(until_time_of_day_in(&now, &Utc, 12, 60, 0).is_err());
        assert!(until_time_of_day_in(&now, &Utc, 12, 0, 60).is_err());
    }

    #[test]
    fn spring_forward_gap_moves_one_hour_later() {
        let now = New_York
            .with_ymd_and_hms(2026, 3, 7, 3, 0, 0)
            .single()
            .expect("valid");
        let ms = until_time_of_day_in(&now, &New_York, 2, 30, 0).expect("resolved");
        // 03:00 EST to 03:30 EDT the next day.
        assert_eq!(ms.get(), 23 * HOUR_MS + HOUR_MS / 2);
    }

    #[test]
    fn fall_back_picks_earlier_instant() {
        let now = New_York
            .with_ymd_and_hms(2026, 10, 31, 1, 30, 0)
            .single()
            .expect("valid");
        let ms = until_time_of_day_in(&now, &New_York, 1, 30, 0).expect("resolved");
        assert_eq!(ms.get(), 24 * HOUR_MS);
    }

    #[test]
    fn future_date_time_returns_exact_gap() {
        let now = utc(2026, 1, 1, 0, 0, 0);
        let ms = until_date_time_in(&now, &Utc, (2026, 1, 2), (0, 0, 1)).expect("future");
        assert_eq!(ms.get(), 24 * HOUR_MS + 1_000);
    }

    #[test]
    fn past_or_present_date_time_fails() {
        let now = utc(2026, 1, 1, 12, 0, 0);
        let past = until_date_time_in(&now, &Utc, (2025, 12, 31), (23, 59, 59));
        assert!(matches!(past, Err(ResolveError::NotInFuture(_))));
        let present = until_date_time_in(&now, &Utc, (2026, 1, 1), (12, 0, 0));
        assert!(matches!(present, Err(ResolveError::NotInFuture(_))));
    }

    #[test]
    fn impossible_calendar_date_fails() {
        let now = utc(2026, 1, 1, 12, 0, 0);
        assert_eq!(
            until_date_time_in(&now, &Utc, (2026, 2, 30), (0, 0, 0)),
            Err(ResolveError::InvalidDate {
                year: 2026,
                month: 2,
                day: 30
            })
        );
    }

    #[test]
    fn resolver_uses_wall_clock_and_recurs_by_time_of_day() {
        let now = Local
            .with_ymd_and_hms(2026, 6, 15, 12, 0, 0)
            .earliest()
            .expect("valid local time");
        let resolver = TargetResolver::with_wall_clock(FixedWallClock(now));

        let relative = TimeSpec::Relative(Millis::new(42));
        assert_eq!(resolver.resolve(&relative), Ok(Millis::new(42)));
        assert_eq!(resolver.next_occurrence(&relative), Ok(Millis::new(42)));

        let date = TimeSpec::DateTime {
            year: 2026,
            month: 6,
            day: 20,
            hour: 12,
            minute: 0,
            second: 5,
        };
        let first = resolver.resolve(&date).expect("future date");
        assert_eq!(first.get(), 5 * 24 * HOUR_MS + 5_000);
        let next = resolver.next_occurrence(&date).expect("time of day");
        assert_eq!(next.get(), 5_000);
    }
}

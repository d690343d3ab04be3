use std::time::{Duration, Instant};

/// Monotonic time source used for every interval the countdown measures.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// `start + length`, shortened until the platform can represent it.
pub fn deadline_after(start: Instant, length: Duration) -> Instant {
    let mut length = length;
    loop {
        if let Some(deadline) = start.checked_add(length) {
            return deadline;
        }
        length /= 2;
    }
}

#[cfg(test)]
pub(crate) use manual::ManualClock;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let first = clock.now();
        clock.sleep(Duration::from_millis(2));
        let second = clock.now();
        assert!(second >= first + Duration::from_millis(2));
    }

    #[test]
    fn deadline_for_huge_length_does_not_panic() {
        let start = Instant::now();
        let deadline = deadline_after(start, Duration::MAX);
        assert!(deadline > start);
        assert_eq!(
            deadline_after(start, Duration::from_secs(5)),
            start + Duration::from_secs(5)
        );
    }

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);
        clock.sleep(Duration::from_millis(250));
        clock.advance(Duration::from_millis(50));
        assert_eq!(clock.now() - start, Duration::from_millis(300));
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(250)]);
        assert_eq!(clock.elapsed(), Duration::from_millis(300));
    }
}

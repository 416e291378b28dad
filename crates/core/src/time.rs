use chrono::{DateTime, Duration, Utc};

/// Source of "now" for sessions, progress expiry and play durations.
///
/// Services take a `Clock` by value so tests can pin time.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Moves a fixed clock forward. Real clocks are left untouched.
    #[cfg(test)]
    pub(crate) fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// Whole seconds elapsed since `since`, clamped to `0..=u32::MAX`.
    #[must_use]
    pub fn elapsed_secs(&self, since: DateTime<Utc>) -> u32 {
        let secs = (self.now() - since).num_seconds().max(0);
        u32::try_from(secs).unwrap_or(u32::MAX)
    }
}

/// Deterministic timestamp for tests (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances_and_reports_elapsed() {
        let start = fixed_now();
        let mut clock = fixed_clock();
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), start + Duration::seconds(90));
        assert_eq!(clock.elapsed_secs(start), 90);
    }

    #[test]
    fn elapsed_never_goes_negative() {
        let clock = fixed_clock();
        assert_eq!(clock.elapsed_secs(fixed_now() + Duration::hours(1)), 0);
    }

    #[test]
    fn default_clock_ignores_advance() {
        let mut clock = Clock::default_clock();
        clock.advance(Duration::days(1));
        assert!(matches!(clock, Clock::Default));
    }
}

/// Result of feeding one second into a [`Countdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Still running with this many seconds left.
    Running { remaining: u32 },
    /// The budget just ran out. Reported once per countdown.
    Expired,
    /// Disabled, stopped or already expired.
    Idle,
}

/// Single countdown shared by the whole session.
///
/// The clock is never reset between questions; it only restarts with a new
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    budget: Option<u32>,
    remaining: u32,
    expired: bool,
    stopped: bool,
}

impl Countdown {
    /// Full countdown for `budget` seconds; `None` builds a disabled countdown.
    #[must_use]
    pub fn new(budget: Option<u32>) -> Self {
        Self {
            budget,
            remaining: budget.unwrap_or(0),
            expired: false,
            stopped: false,
        }
    }

    /// Countdown restored from persisted progress.
    #[must_use]
    pub fn resume(budget: Option<u32>, remaining: u32) -> Self {
        let remaining = budget.map_or(0, |total| remaining.min(total));
        Self {
            budget,
            remaining,
            expired: budget.is_some() && remaining == 0,
            stopped: false,
        }
    }

    #[must_use]
    pub fn budget(&self) -> Option<u32> {
        self.budget
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.budget.is_some()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Silences the countdown; later ticks are `Idle`.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn tick(&mut self) -> Tick {
        if self.budget.is_none() || self.expired || self.stopped {
            return Tick::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expired = true;
            return Tick::Expired;
        }
        Tick::Running {
            remaining: self.remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_and_expires_once() {
        let mut c = Countdown::new(Some(3));
        assert_eq!(c.tick(), Tick::Running { remaining: 2 });
        assert_eq!(c.tick(), Tick::Running { remaining: 1 });
        assert_eq!(c.tick(), Tick::Expired);
        assert!(c.is_expired());
        assert_eq!(c.tick(), Tick::Idle);
        assert_eq!(c.tick(), Tick::Idle);
    }

    #[test]
    fn disabled_countdown_never_ticks() {
        let mut c = Countdown::new(None);
        assert!(!c.is_enabled());
        assert_eq!(c.tick(), Tick::Idle);
        assert!(!c.is_expired());
    }

    #[test]
    fn stopped_countdown_goes_quiet() {
        let mut c = Countdown::new(Some(10));
        c.tick();
        c.stop();
        assert_eq!(c.tick(), Tick::Idle);
        assert_eq!(c.remaining(), 9);
    }

    #[test]
    fn resume_clamps_to_budget() {
        let c = Countdown::resume(Some(60), 500);
        assert_eq!(c.remaining(), 60);

        let done = Countdown::resume(Some(60), 0);
        assert!(done.is_expired());
    }
}

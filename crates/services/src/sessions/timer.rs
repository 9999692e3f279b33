use chrono::{DateTime, Duration, Utc};

/// Wall-clock countdown.
///
/// While running, the countdown keeps an anchor instant and consumes the whole
/// seconds elapsed since it; the sub-second remainder stays on the anchor. A
/// late tick therefore catches up and a burst of early ticks consumes nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    remaining_secs: u64,
    anchor: Option<DateTime<Utc>>,
}

impl Countdown {
    /// A stopped countdown holding `remaining_secs`.
    #[must_use]
    pub fn new(remaining_secs: u64) -> Self {
        Self {
            remaining_secs,
            anchor: None,
        }
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    /// Starts counting from `now`. Restarting a running countdown keeps its anchor.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.anchor.is_none() {
            self.anchor = Some(now);
        }
    }

    /// Reconciles against `now`, then stops.
    pub fn stop(&mut self, now: DateTime<Utc>) -> u64 {
        let remaining = self.reconcile(now);
        self.anchor = None;
        remaining
    }

    /// Consumes elapsed whole seconds and returns the remaining time.
    pub fn reconcile(&mut self, now: DateTime<Utc>) -> u64 {
        let Some(anchor) = self.anchor else {
            return self.remaining_secs;
        };
        let elapsed = elapsed_whole_secs(anchor, now);
        if elapsed > 0 {
            self.remaining_secs = self.remaining_secs.saturating_sub(elapsed);
            self.anchor = Some(anchor + Duration::seconds(i64::try_from(elapsed).unwrap_or(i64::MAX)));
        }
        self.remaining_secs
    }

    /// Remaining time as it would be after reconciling at `now`.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> u64 {
        match self.anchor {
            Some(anchor) => self
                .remaining_secs
                .saturating_sub(elapsed_whole_secs(anchor, now)),
            None => self.remaining_secs,
        }
    }
}

fn elapsed_whole_secs(anchor: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    exam_core::time::whole_secs_between(anchor, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::time::fixed_now;

    #[test]
    fn stopped_countdown_does_not_move() {
        let mut countdown = Countdown::new(10);
        assert_eq!(countdown.reconcile(fixed_now() + Duration::seconds(5)), 10);
    }

    #[test]
    fn delayed_tick_catches_up() {
        let start = fixed_now();
        let mut countdown = Countdown::new(10);
        countdown.start(start);
        assert_eq!(countdown.reconcile(start + Duration::seconds(3)), 7);
    }

    #[test]
    fn sub_second_remainder_is_carried() {
        let start = fixed_now();
        let mut countdown = Countdown::new(10);
        countdown.start(start);
        assert_eq!(countdown.reconcile(start + Duration::milliseconds(1_500)), 9);
        assert_eq!(countdown.reconcile(start + Duration::milliseconds(1_900)), 9);
        assert_eq!(countdown.reconcile(start + Duration::milliseconds(2_000)), 8);
    }

    #[test]
    fn burst_of_ticks_does_not_over_count() {
        let start = fixed_now();
        let mut countdown = Countdown::new(10);
        countdown.start(start);
        for _ in 0..5 {
            countdown.reconcile(start + Duration::milliseconds(400));
        }
        assert_eq!(countdown.remaining_secs(), 10);
    }

    #[test]
    fn never_goes_below_zero() {
        let start = fixed_now();
        let mut countdown = Countdown::new(2);
        countdown.start(start);
        assert_eq!(countdown.reconcile(start + Duration::seconds(30)), 0);
        assert_eq!(countdown.remaining_secs(), 0);
    }

    #[test]
    fn stop_and_restart_preserves_remaining() {
        let start = fixed_now();
        let mut countdown = Countdown::new(60);
        countdown.start(start);
        assert_eq!(countdown.stop(start + Duration::seconds(10)), 50);
        assert_eq!(countdown.remaining_at(start + Duration::seconds(100)), 50);

        countdown.start(start + Duration::seconds(100));
        assert_eq!(countdown.reconcile(start + Duration::seconds(105)), 45);
    }
}

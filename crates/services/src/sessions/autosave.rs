use chrono::{DateTime, Duration, Utc};

/// Tracks when the in-progress session was last written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutosaveSchedule {
    interval: Duration,
    last_saved: DateTime<Utc>,
}

impl AutosaveSchedule {
    /// Starts the schedule at `now`; the first save is due one interval later.
    #[must_use]
    pub fn new(interval: std::time::Duration, now: DateTime<Utc>) -> Self {
        Self {
            interval: Duration::from_std(interval).unwrap_or(Duration::MAX),
            last_saved: now,
        }
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now - self.last_saved >= self.interval
    }

    pub fn mark_saved(&mut self, now: DateTime<Utc>) {
        self.last_saved = now;
    }

    #[must_use]
    pub fn last_saved(&self) -> DateTime<Utc> {
        self.last_saved
    }
}

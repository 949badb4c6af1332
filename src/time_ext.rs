use std::time::Duration as StdDuration;

pub(crate) trait StdDurationExt {
    /// Whole seconds, rounded to the nearest second (half away from zero).
    fn rounded_seconds(self) -> u64;

    /// Saturates at `time::Duration::MAX`.
    fn to_time_duration(self) -> time::Duration;
}

impl StdDurationExt for StdDuration {
    fn rounded_seconds(self) -> u64 {
        let secs = self.as_secs();
        match self.subsec_nanos() >= 500_000_000 {
            true => secs.saturating_add(1),
            false => secs,
        }
    }

    fn to_time_duration(self) -> time::Duration {
        time::Duration::try_from(self).unwrap_or(time::Duration::MAX)
    }
}

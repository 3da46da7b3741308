use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

use super::core::{mad as mad_of, median as median_of};

/// Time-bounded ordered sequence of real-valued observations. `now` is
/// passed explicitly to every operation rather than read from the system
/// clock, so the window can be driven deterministically in tests and by the
/// orchestrator's single cycle-wide `now` (spec.md §9, testability note).
#[derive(Debug, Clone)]
pub struct RollingWindow {
    duration: Duration,
    min_observations: usize,
    observations: VecDeque<(DateTime<Utc>, f64)>,
}

impl RollingWindow {
    pub fn new(duration: Duration, min_observations: usize) -> Self {
        Self {
            duration,
            min_observations,
            observations: VecDeque::new(),
        }
    }

    /// Appends an observation, then evicts everything older than `duration`
    /// relative to `now`. Duplicate timestamps are permitted and preserved
    /// in insertion order. A future-dated observation is accepted as-is; an
    /// observation already older than `duration` is accepted and then
    /// immediately evicted (spec.md §4.1).
    pub fn add(&mut self, value: f64, timestamp: DateTime<Utc>, now: DateTime<Utc>) {
        self.observations.push_back((timestamp, value));
        self.evict(now);
    }

    fn evict(&mut self, now: DateTime<Utc>) {
        while let Some(&(ts, _)) = self.observations.front() {
            if now - ts > self.duration {
                self.observations.pop_front();
            } else {
                break;
            }
        }
    }

    /// Current in-window values in timestamp order, after eviction.
    pub fn values(&mut self, now: DateTime<Utc>) -> Vec<f64> {
        self.evict(now);
        self.observations.iter().map(|&(_, v)| v).collect()
    }

    pub fn median(&mut self, now: DateTime<Utc>) -> Option<f64> {
        median_of(&self.values(now))
    }

    /// `None` if empty, `0` if all values identical.
    pub fn mad(&mut self, now: DateTime<Utc>) -> Option<f64> {
        let values = self.values(now);
        if values.is_empty() {
            None
        } else {
            Some(mad_of(&values))
        }
    }

    pub fn is_valid(&mut self, now: DateTime<Utc>) -> bool {
        self.values(now).len() >= self.min_observations
    }

    pub fn len(&mut self, now: DateTime<Utc>) -> usize {
        self.values(now).len()
    }

    pub fn is_empty(&mut self, now: DateTime<Utc>) -> bool {
        self.len(now) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(offset_secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap()
    }

    #[test]
    fn evicts_observations_older_than_duration() {
        let mut w = RollingWindow::new(Duration::hours(1), 1);
        w.add(1.0, t(0), t(0));
        // well past duration + epsilon
        let now = t(3700);
        assert!(!w.values(now).contains(&1.0));
    }

    #[test]
    fn retains_observations_within_duration() {
        let mut w = RollingWindow::new(Duration::hours(1), 1);
        w.add(1.0, t(0), t(0));
        let now = t(3500);
        assert_eq!(w.values(now), vec![1.0]);
    }

    #[test]
    fn below_min_observations_is_invalid() {
        let mut w = RollingWindow::new(Duration::hours(1), 30);
        for i in 0..10 {
            w.add(i as f64, t(i), t(i));
        }
        assert!(!w.is_valid(t(10)));
    }

    #[test]
    fn at_min_observations_is_valid() {
        let mut w = RollingWindow::new(Duration::hours(1), 3);
        w.add(1.0, t(0), t(0));
        w.add(2.0, t(1), t(1));
        w.add(3.0, t(2), t(2));
        assert!(w.is_valid(t(2)));
    }

    #[test]
    fn future_timestamp_accepted_without_clamping() {
        let mut w = RollingWindow::new(Duration::hours(1), 1);
        w.add(1.0, t(10_000), t(0));
        assert_eq!(w.values(t(0)), vec![1.0]);
    }

    #[test]
    fn stale_on_arrival_observation_is_evicted_immediately() {
        let mut w = RollingWindow::new(Duration::hours(1), 1);
        // added "now" is far past the observation's own timestamp
        w.add(1.0, t(0), t(10_000));
        assert!(w.values(t(10_000)).is_empty());
    }

    #[test]
    fn duplicate_timestamps_preserved_in_insertion_order() {
        let mut w = RollingWindow::new(Duration::hours(1), 1);
        w.add(1.0, t(0), t(0));
        w.add(2.0, t(0), t(0));
        assert_eq!(w.values(t(0)), vec![1.0, 2.0]);
    }

    #[test]
    fn empty_window_stats_are_none() {
        let mut w = RollingWindow::new(Duration::hours(1), 1);
        assert_eq!(w.median(t(0)), None);
        assert_eq!(w.mad(t(0)), None);
    }

    #[test]
    fn long_gap_drains_stale_data_even_without_new_observations() {
        let mut w = RollingWindow::new(Duration::hours(1), 1);
        w.add(5.0, t(0), t(0));
        // no new observations; a read much later must still evict
        assert!(w.values(t(100_000)).is_empty());
    }
}

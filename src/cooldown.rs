use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::types::{Metric, WindowSpan};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CooldownKey {
    pub target_id: String,
    pub metric: Metric,
    pub window: WindowSpan,
}

impl CooldownKey {
    pub fn new(target_id: impl Into<String>, metric: Metric, window: WindowSpan) -> Self {
        Self {
            target_id: target_id.into(),
            metric,
            window,
        }
    }
}

struct CooldownEntry {
    last_alert_time: DateTime<Utc>,
    last_score: f64,
}

/// Suppresses repeated alerts for the same `(target, metric, window)`
/// unless the cooldown has elapsed or the score has escalated by at least
/// `escalation_delta` since the last recorded score (spec.md §4.5).
pub struct CooldownManager {
    cooldown_duration: Duration,
    escalation_delta: f64,
    entries: HashMap<CooldownKey, CooldownEntry>,
}

impl CooldownManager {
    pub fn new(cooldown_duration: Duration, escalation_delta: f64) -> Self {
        Self {
            cooldown_duration,
            escalation_delta,
            entries: HashMap::new(),
        }
    }

    /// Decides whether a candidate alert with `score` should be emitted.
    /// Does not mutate state — callers record the alert explicitly via
    /// `record_alert` after it survives and is actually emitted.
    pub fn should_alert(&self, key: &CooldownKey, score: f64, now: DateTime<Utc>) -> bool {
        if self.cooldown_duration.num_seconds() == 0 {
            return true;
        }
        let Some(entry) = self.entries.get(key) else {
            return true;
        };
        let elapsed = now - entry.last_alert_time;
        if elapsed >= self.cooldown_duration {
            return true;
        }
        score - entry.last_score >= self.escalation_delta
    }

    pub fn record_alert(&mut self, key: CooldownKey, score: f64, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            CooldownEntry {
                last_alert_time: now,
                last_score: score,
            },
        );
    }

    pub fn clear(&mut self, key: &CooldownKey) {
        self.entries.remove(key);
    }

    /// Removes entries older than `2 × cooldown_duration`. Called once per
    /// cycle before detection (spec.md §4.5).
    pub fn cleanup_stale(&mut self, now: DateTime<Utc>) {
        let threshold = self.cooldown_duration * 2;
        self.entries
            .retain(|_, entry| now - entry.last_alert_time <= threshold);
    }
}

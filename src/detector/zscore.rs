use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::cooldown::{CooldownKey, CooldownManager};
use crate::state::MarketStatistics;
use crate::stats::z_score;
use crate::types::{Alert, AlertTarget, Metric, WindowSpan, ZScoreAlert};

/// For each tracked token and each window span, over the volume window
/// only: skips invalid windows, computes the z-score of the latest value,
/// and runs any exceedance through the cooldown manager (spec.md §4.4.4).
pub fn detect(
    stats: &mut HashMap<String, MarketStatistics>,
    cooldown: &mut CooldownManager,
    threshold: f64,
    targets: &HashMap<String, AlertTarget>,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for (token_id, market_stats) in stats.iter_mut() {
        for window in [WindowSpan::OneHour, WindowSpan::FourHour] {
            let w = market_stats.window(Metric::Volume, window);
            if !w.is_valid(now) {
                continue;
            }
            let values = w.values(now);
            let Some(&current) = values.last() else {
                continue;
            };
            let Some(z) = z_score(current, &values) else {
                continue;
            };
            if z.abs() <= threshold {
                continue;
            }

            let key = CooldownKey::new(token_id.clone(), Metric::Volume, window);
            if !cooldown.should_alert(&key, z, now) {
                continue;
            }
            cooldown.record_alert(key, z, now);

            alerts.push(Alert::ZScore(ZScoreAlert {
                token_id: token_id.clone(),
                target: targets.get(token_id).cloned(),
                window,
                z_score: z,
                current,
                detected_at: now,
            }));
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t(offset_secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap()
    }

    fn stats_with_volumes(values: &[f64], now: DateTime<Utc>) -> HashMap<String, MarketStatistics> {
        let mut map = HashMap::new();
        let mut stats = crate::state::MarketState::new();
        stats.apply_token_snapshot(
            "tok-1",
            crate::state::TokenSnapshot {
                price: Some(1.0),
                total_book_size: Some(values[0]),
            },
            t(0),
            now,
        );
        for (i, v) in values.iter().enumerate().skip(1) {
            stats.apply_token_snapshot(
                "tok-1",
                crate::state::TokenSnapshot {
                    price: Some(1.0),
                    total_book_size: Some(*v),
                },
                t(i as i64),
                now,
            );
        }
        map.extend(stats.stats);
        map
    }

    #[test]
    fn skips_invalid_window_below_min_observations() {
        let now = t(5);
        let mut stats = stats_with_volumes(&[1.0, 2.0, 3.0], now);
        let mut cooldown = CooldownManager::new(Duration::minutes(30), 1.0);
        let alerts = detect(&mut stats, &mut cooldown, 3.5, &HashMap::new(), now);
        assert!(alerts.is_empty());
    }

    #[test]
    fn identical_values_never_alert() {
        let now = t(40);
        let values = vec![5.0; 35];
        let mut stats = stats_with_volumes(&values, now);
        let mut cooldown = CooldownManager::new(Duration::minutes(30), 1.0);
        let alerts = detect(&mut stats, &mut cooldown, 3.5, &HashMap::new(), now);
        assert!(alerts.is_empty());
    }

    #[test]
    fn fires_on_exceedance_and_is_gated_by_cooldown() {
        let now = t(40);
        let mut values = vec![5.0; 34];
        values.push(500.0);
        let mut stats = stats_with_volumes(&values, now);
        let mut cooldown = CooldownManager::new(Duration::minutes(30), 1.0);
        let alerts = detect(&mut stats, &mut cooldown, 3.5, &HashMap::new(), now);
        assert_eq!(alerts.len(), 1);

        // immediate repeat at the same score is suppressed by cooldown
        let alerts_again = detect(&mut stats, &mut cooldown, 3.5, &HashMap::new(), now);
        assert!(alerts_again.is_empty());
    }
}

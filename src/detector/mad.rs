use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::cooldown::{CooldownKey, CooldownManager};
use crate::state::MarketStatistics;
use crate::stats::{mad as mad_of, median as median_of};
use crate::types::{Alert, AlertTarget, MadAlert, Metric, Relation, WindowSpan};

/// Same shape as the z-score detector but over the price windows, using
/// multiplier semantics: `|current − median| / mad > multiplier` (requires
/// `mad > 0`). Sign is not carried — `Relation` is derived here from the
/// current value's position relative to the median (spec.md §4.4.5).
pub fn detect(
    stats: &mut HashMap<String, MarketStatistics>,
    cooldown: &mut CooldownManager,
    multiplier_threshold: f64,
    targets: &HashMap<String, AlertTarget>,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for (token_id, market_stats) in stats.iter_mut() {
        for window in [WindowSpan::OneHour, WindowSpan::FourHour] {
            let w = market_stats.window(Metric::Price, window);
            if !w.is_valid(now) {
                continue;
            }
            let values = w.values(now);
            let Some(&current) = values.last() else {
                continue;
            };
            let Some(median) = median_of(&values) else {
                continue;
            };
            let deviation = mad_of(&values);
            if deviation <= 0.0 {
                continue;
            }

            let achieved = (current - median).abs() / deviation;
            if achieved <= multiplier_threshold {
                continue;
            }

            let key = CooldownKey::new(token_id.clone(), Metric::Price, window);
            if !cooldown.should_alert(&key, achieved, now) {
                continue;
            }
            cooldown.record_alert(key, achieved, now);

            let relation = if current >= median {
                Relation::Above
            } else {
                Relation::Below
            };

            alerts.push(Alert::Mad(MadAlert {
                token_id: token_id.clone(),
                target: targets.get(token_id).cloned(),
                window,
                multiplier: achieved,
                current,
                median,
                relation,
                detected_at: now,
            }));
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{MarketState, TokenSnapshot};
    use chrono::Duration;

    fn t(offset_secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap()
    }

    fn stats_with_prices(values: &[f64], now: DateTime<Utc>) -> HashMap<String, MarketStatistics> {
        let mut state = MarketState::new();
        for (i, v) in values.iter().enumerate() {
            state.apply_token_snapshot(
                "tok-1",
                TokenSnapshot {
                    price: Some(*v),
                    total_book_size: Some(1.0),
                },
                t(i as i64),
                now,
            );
        }
        state.stats
    }

    #[test]
    fn mad_outlier_scenario_from_spec() {
        // spec.md §8 scenario 4, re-expressed over the price window.
        let values: Vec<f64> = (0..29).map(|_| 2.0).chain([1.0, 2.0, 3.0, 4.0, 100.0]).collect();
        let now = t(40);
        let mut stats = stats_with_prices(&values, now);
        let mut cooldown = CooldownManager::new(Duration::minutes(30), 1.0);
        let alerts = detect(&mut stats, &mut cooldown, 3.0, &HashMap::new(), now);
        assert!(!alerts.is_empty());
        let Alert::Mad(a) = &alerts[0] else { panic!() };
        assert!(a.multiplier > 3.0);
        assert_eq!(a.relation, Relation::Above);
    }

    #[test]
    fn zero_mad_never_alerts() {
        let values = vec![3.0; 35];
        let now = t(40);
        let mut stats = stats_with_prices(&values, now);
        let mut cooldown = CooldownManager::new(Duration::minutes(30), 1.0);
        let alerts = detect(&mut stats, &mut cooldown, 3.0, &HashMap::new(), now);
        assert!(alerts.is_empty());
    }

    #[test]
    fn below_relation_when_current_under_median() {
        let mut values = vec![10.0; 34];
        values.push(1.0);
        let now = t(40);
        let mut stats = stats_with_prices(&values, now);
        let mut cooldown = CooldownManager::new(Duration::minutes(30), 1.0);
        let alerts = detect(&mut stats, &mut cooldown, 3.0, &HashMap::new(), now);
        let Alert::Mad(a) = &alerts[0] else { panic!() };
        assert_eq!(a.relation, Relation::Below);
    }
}

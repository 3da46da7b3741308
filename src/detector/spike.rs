use chrono::{DateTime, Utc};

use crate::types::{Alert, AlertTarget, Direction, MonitoredEvent, SpikeAlert};

/// Emits one alert per market whose price moved by at least `threshold`
/// percent since the previous poll. Closed markets and first-observation
/// markets (no `previous_price`) never fire (spec.md §4.4.1).
pub fn detect(event: &MonitoredEvent, threshold: f64, now: DateTime<Utc>) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for market in &event.markets {
        if market.is_closed {
            continue;
        }
        let Some(previous) = market.previous_price else {
            continue;
        };
        if previous == 0.0 {
            continue;
        }
        let Some(current) = market.current_price else {
            continue;
        };

        let change_percent = ((current - previous) / previous * 100.0).abs();
        if change_percent < threshold {
            continue;
        }

        let direction = if current > previous {
            Direction::Up
        } else {
            Direction::Down
        };

        alerts.push(Alert::Spike(SpikeAlert {
            target: AlertTarget {
                event_slug: event.slug.clone(),
                event_name: event.name.clone(),
                question: market.question.clone(),
                outcome: market.outcome.clone(),
            },
            direction,
            change_percent,
            price_before: previous,
            price_after: current,
            detected_at: now,
        }));
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MonitoredMarket;

    fn market(previous: Option<f64>, current: Option<f64>, closed: bool) -> MonitoredMarket {
        MonitoredMarket {
            market_id: "m1".to_string(),
            question: "Will it rain?".to_string(),
            outcome: "Yes".to_string(),
            token_id: Some("tok".to_string()),
            current_price: current,
            previous_price: previous,
            is_closed: closed,
            volume_24h: None,
            liquidity: None,
            lvr: None,
        }
    }

    fn event(markets: Vec<MonitoredMarket>) -> MonitoredEvent {
        MonitoredEvent {
            slug: "rain".to_string(),
            name: "Rain event".to_string(),
            markets,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn spike_up_scenario_from_spec() {
        let ev = event(vec![market(Some(0.50), Some(0.60), false)]);
        let now = Utc::now();
        let alerts = detect(&ev, 5.0, now);
        assert_eq!(alerts.len(), 1);
        let Alert::Spike(a) = &alerts[0] else { panic!() };
        assert_eq!(a.direction, Direction::Up);
        assert!((a.change_percent - 20.0).abs() < 1e-9);
        assert_eq!(a.price_before, 0.50);
        assert_eq!(a.price_after, 0.60);
    }

    #[test]
    fn no_previous_price_suppresses_alert() {
        let ev = event(vec![market(None, Some(0.80), false)]);
        assert!(detect(&ev, 5.0, Utc::now()).is_empty());
    }

    #[test]
    fn zero_previous_price_suppresses_alert() {
        let ev = event(vec![market(Some(0.0), Some(0.80), false)]);
        assert!(detect(&ev, 5.0, Utc::now()).is_empty());
    }

    #[test]
    fn closed_market_suppresses_alert() {
        let ev = event(vec![market(Some(0.50), Some(0.90), true)]);
        assert!(detect(&ev, 5.0, Utc::now()).is_empty());
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        // exactly 5% change with threshold 5.0 must fire (>= comparison)
        let ev = event(vec![market(Some(1.00), Some(1.05), false)]);
        assert_eq!(detect(&ev, 5.0, Utc::now()).len(), 1);
    }

    #[test]
    fn direction_down_on_price_decrease() {
        let ev = event(vec![market(Some(0.60), Some(0.50), false)]);
        let alerts = detect(&ev, 5.0, Utc::now());
        let Alert::Spike(a) = &alerts[0] else { panic!() };
        assert_eq!(a.direction, Direction::Down);
    }
}

use chrono::{DateTime, Utc};

use crate::state::MarketState;
use crate::stats::classify_lvr;
use crate::types::{Alert, LiquidityWarningAlert};

/// Gated on spike: for every spike alert produced this cycle, looks up the
/// corresponding market and emits a warning iff its LVR strictly exceeds
/// `lvr_threshold`. A warning never fires without a same-cycle spike
/// (spec.md §4.4.2).
pub fn detect(spikes: &[Alert], state: &MarketState, lvr_threshold: f64, now: DateTime<Utc>) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for spike in spikes {
        let Alert::Spike(spike) = spike else { continue };

        let Some(event) = state.events.get(&spike.target.event_slug) else {
            continue;
        };
        let Some(market) = event
            .markets
            .iter()
            .find(|m| m.question == spike.target.question && m.outcome == spike.target.outcome)
        else {
            continue;
        };

        let Some(lvr) = market.lvr else { continue };
        if lvr <= lvr_threshold {
            continue;
        }

        alerts.push(Alert::LiquidityWarning(LiquidityWarningAlert {
            target: spike.target.clone(),
            direction: spike.direction,
            change_percent: spike.change_percent,
            price_before: spike.price_before,
            price_after: spike.price_after,
            lvr,
            health: classify_lvr(lvr),
            detected_at: now,
        }));
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertTarget, Direction, MonitoredEvent, MonitoredMarket, SpikeAlert};

    fn make_state(lvr: Option<f64>) -> MarketState {
        let mut state = MarketState::new();
        state.events.insert(
            "rain".to_string(),
            MonitoredEvent {
                slug: "rain".to_string(),
                name: "Rain event".to_string(),
                markets: vec![MonitoredMarket {
                    market_id: "m1".to_string(),
                    question: "Will it rain?".to_string(),
                    outcome: "Yes".to_string(),
                    token_id: Some("tok".to_string()),
                    current_price: Some(0.6),
                    previous_price: Some(0.5),
                    is_closed: false,
                    volume_24h: Some(10.0),
                    liquidity: Some(1.0),
                    lvr,
                }],
                last_updated: Utc::now(),
            },
        );
        state
    }

    fn spike_alert() -> Alert {
        Alert::Spike(SpikeAlert {
            target: AlertTarget {
                event_slug: "rain".to_string(),
                event_name: "Rain event".to_string(),
                question: "Will it rain?".to_string(),
                outcome: "Yes".to_string(),
            },
            direction: Direction::Up,
            change_percent: 20.0,
            price_before: 0.5,
            price_after: 0.6,
            detected_at: Utc::now(),
        })
    }

    #[test]
    fn fires_when_lvr_exceeds_threshold() {
        let state = make_state(Some(10.0));
        let alerts = detect(&[spike_alert()], &state, 8.0, Utc::now());
        assert_eq!(alerts.len(), 1);
        let Alert::LiquidityWarning(w) = &alerts[0] else { panic!() };
        assert_eq!(w.lvr, 10.0);
    }

    #[test]
    fn suppressed_when_lvr_below_threshold() {
        let state = make_state(Some(1.0));
        assert!(detect(&[spike_alert()], &state, 8.0, Utc::now()).is_empty());
    }

    #[test]
    fn requires_strict_exceedance_at_boundary() {
        let state = make_state(Some(8.0));
        assert!(detect(&[spike_alert()], &state, 8.0, Utc::now()).is_empty());
    }

    #[test]
    fn never_fires_without_a_spike() {
        let state = make_state(Some(50.0));
        assert!(detect(&[], &state, 8.0, Utc::now()).is_empty());
    }
}

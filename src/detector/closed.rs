use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::parsing::{parse_numeric_field, parse_string_array_field};
use crate::types::{Alert, AlertTarget, ClosedMarketAlert, MonitoredEvent};

/// Result of running the closed-market transition detector for one event.
pub struct ClosedDetection {
    pub alerts: Vec<Alert>,
    /// True iff every market in the new snapshot is closed — the
    /// orchestrator removes the event after detection (spec.md §4.4.3).
    pub remove_event: bool,
}

/// Runs before state mutation: compares each market's new `closed` flag
/// against the prior event, keyed by `(question, outcome)`. Emits exactly
/// on the `false → true` transition.
pub fn detect(prior: Option<&MonitoredEvent>, slug: &str, raw: &Value, now: DateTime<Utc>) -> ClosedDetection {
    let event_name = raw
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let prior_closed: std::collections::HashMap<(String, String), bool> = prior
        .map(|ev| {
            ev.markets
                .iter()
                .map(|m| (m.key(), m.is_closed))
                .collect()
        })
        .unwrap_or_default();
    let prior_current_price: std::collections::HashMap<(String, String), Option<f64>> = prior
        .map(|ev| {
            ev.markets
                .iter()
                .map(|m| (m.key(), m.current_price))
                .collect()
        })
        .unwrap_or_default();

    let mut alerts = Vec::new();
    let mut all_closed = true;
    let mut any_market = false;

    if let Some(raw_markets) = raw.get("markets").and_then(|v| v.as_array()) {
        for market_data in raw_markets {
            let question = market_data
                .get("question")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let outcomes = parse_string_array_field(market_data.get("outcomes"));
            let prices = parse_string_array_field(market_data.get("outcomePrices"));
            let is_closed = market_data
                .get("closed")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

            for outcome in outcomes.iter() {
                any_market = true;
                if !is_closed {
                    all_closed = false;
                }

                let key = (question.clone(), outcome.clone());
                let was_closed = prior_closed.get(&key).copied().unwrap_or(false);

                if is_closed && !was_closed {
                    let current_price_fallback =
                        prior_current_price.get(&key).copied().flatten();
                    let final_price = final_price_for_outcome(outcome, &prices)
                        .or(current_price_fallback);

                    alerts.push(Alert::ClosedMarket(ClosedMarketAlert {
                        target: AlertTarget {
                            event_slug: slug.to_string(),
                            event_name: event_name.clone(),
                            question: question.clone(),
                            outcome: outcome.clone(),
                        },
                        final_price,
                        detected_at: now,
                    }));
                }
            }
        }
    }

    ClosedDetection {
        alerts,
        remove_event: any_market && all_closed,
    }
}

/// `"Yes" → index 0`, `"No" → index 1` (case-insensitive); any other
/// outcome label falls back to the market's prior current price at the
/// call site (SPEC_FULL.md §6, Open Question resolution 2).
fn final_price_for_outcome(outcome: &str, prices: &[String]) -> Option<f64> {
    let idx = if outcome.eq_ignore_ascii_case("yes") {
        0
    } else if outcome.eq_ignore_ascii_case("no") {
        1
    } else {
        return None;
    };
    prices
        .get(idx)
        .and_then(|p| parse_numeric_field(Some(&Value::String(p.clone()))))
}

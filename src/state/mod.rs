use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use tracing::debug;

use crate::config::DEFAULT_MIN_OBSERVATIONS;
use crate::parsing::{parse_numeric_field, parse_string_array_field, sum_book_sizes};
use crate::stats::RollingWindow;
use crate::types::{Metric, MonitoredEvent, MonitoredMarket, WindowSpan};

/// Four rolling windows per tracked token: `{volume, price} × {1h, 4h}`.
/// Lazily created on first observation, never explicitly destroyed
/// (spec.md §3).
pub struct MarketStatistics {
    pub token_id: String,
    pub volume_1h: RollingWindow,
    pub volume_4h: RollingWindow,
    pub price_1h: RollingWindow,
    pub price_4h: RollingWindow,
}

impl MarketStatistics {
    fn new(token_id: String) -> Self {
        Self {
            token_id,
            volume_1h: RollingWindow::new(WindowSpan::OneHour.duration(), DEFAULT_MIN_OBSERVATIONS),
            volume_4h: RollingWindow::new(WindowSpan::FourHour.duration(), DEFAULT_MIN_OBSERVATIONS),
            price_1h: RollingWindow::new(WindowSpan::OneHour.duration(), DEFAULT_MIN_OBSERVATIONS),
            price_4h: RollingWindow::new(WindowSpan::FourHour.duration(), DEFAULT_MIN_OBSERVATIONS),
        }
    }

    pub fn window(&mut self, metric: Metric, span: WindowSpan) -> &mut RollingWindow {
        match (metric, span) {
            (Metric::Volume, WindowSpan::OneHour) => &mut self.volume_1h,
            (Metric::Volume, WindowSpan::FourHour) => &mut self.volume_4h,
            (Metric::Price, WindowSpan::OneHour) => &mut self.price_1h,
            (Metric::Price, WindowSpan::FourHour) => &mut self.price_4h,
        }
    }
}

/// A fetched order-book/midpoint observation for one token, prior to being
/// folded into rolling windows.
#[derive(Debug, Clone, Copy)]
pub struct TokenSnapshot {
    pub price: Option<f64>,
    pub total_book_size: Option<f64>,
}

/// Owns the events mapping and the per-token statistics mapping. The
/// orchestrator is the sole mutator (spec.md §3, §5) — no interior
/// mutability or concurrent map is needed.
pub struct MarketState {
    pub events: HashMap<String, MonitoredEvent>,
    pub stats: HashMap<String, MarketStatistics>,
}

impl MarketState {
    pub fn new() -> Self {
        Self {
            events: HashMap::new(),
            stats: HashMap::new(),
        }
    }

    /// Reconciles a raw Gamma event-snapshot document against existing
    /// state for one slug, matching markets by `(question, outcome)`.
    /// Unmatched new markets get `previous_price = None` (first-observation
    /// rule). Always overwrites the event wholesale; absent slugs are
    /// simply not called here (spec.md §4.3).
    pub fn apply_event_snapshot(&mut self, slug: &str, raw: &Value, now: DateTime<Utc>) {
        let new_event = parse_event_document(slug, raw, now);

        let previous_prices: HashMap<(String, String), Option<f64>> = self
            .events
            .get(slug)
            .map(|ev| {
                ev.markets
                    .iter()
                    .map(|m| (m.key(), m.current_price))
                    .collect()
            })
            .unwrap_or_default();

        let mut markets = new_event.markets;
        for market in &mut markets {
            market.previous_price = previous_prices.get(&market.key()).copied().flatten();
        }

        self.events.insert(
            slug.to_string(),
            MonitoredEvent {
                slug: new_event.slug,
                name: new_event.name,
                markets,
                last_updated: now,
            },
        );
    }

    /// Removes an event from the map entirely (closed-market transition,
    /// spec.md §4.4.3 / §4.6 step 3).
    pub fn remove_event(&mut self, slug: &str) {
        self.events.remove(slug);
    }

    /// Folds a token snapshot into that token's four rolling windows.
    /// Entries with a missing price or book size are skipped entirely —
    /// the spec requires *both* components present (spec.md §4.3).
    pub fn apply_token_snapshot(
        &mut self,
        token_id: &str,
        snapshot: TokenSnapshot,
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        let (Some(price), Some(total_book_size)) = (snapshot.price, snapshot.total_book_size)
        else {
            return;
        };

        let stats = self
            .stats
            .entry(token_id.to_string())
            .or_insert_with(|| MarketStatistics::new(token_id.to_string()));

        stats.volume_1h.add(total_book_size, timestamp, now);
        stats.volume_4h.add(total_book_size, timestamp, now);
        stats.price_1h.add(price, timestamp, now);
        stats.price_4h.add(price, timestamp, now);
    }

    /// Every non-closed market's token id across all tracked events,
    /// deduplicated. Used when `clob_token_ids` is not overridden in
    /// configuration (spec.md §4.6 step 6).
    pub fn active_token_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .events
            .values()
            .flat_map(|ev| ev.markets.iter())
            .filter(|m| !m.is_closed)
            .filter_map(|m| m.token_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

impl Default for MarketState {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a raw Gamma event-snapshot document into a `MonitoredEvent`,
/// creating one `MonitoredMarket` row per outcome (mirrors the original
/// `parse_event_response`, which does the same regardless of outcome
/// cardinality — see SPEC_FULL.md §6, Open Question 2).
pub fn parse_event_document(slug: &str, raw: &Value, now: DateTime<Utc>) -> MonitoredEvent {
    let name = raw
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let mut markets = Vec::new();

    if let Some(raw_markets) = raw.get("markets").and_then(|v| v.as_array()) {
        for market_data in raw_markets {
            let outcomes = parse_string_array_field(market_data.get("outcomes"));
            let prices = parse_string_array_field(market_data.get("outcomePrices"));
            let clob_token_ids = parse_string_array_field(market_data.get("clobTokenIds"));

            let volume_24h = parse_numeric_field(market_data.get("volume24hr"));
            let liquidity = parse_numeric_field(market_data.get("liquidityNum"));
            let is_closed = market_data
                .get("closed")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let market_id = market_data
                .get("conditionId")
                .or_else(|| market_data.get("id"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let question = market_data
                .get("question")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            for (i, outcome) in outcomes.into_iter().enumerate() {
                let price = prices.get(i).and_then(|p| p.trim().parse::<f64>().ok());
                let token_id = clob_token_ids
                    .get(i)
                    .filter(|t| !t.is_empty())
                    .cloned();

                let lvr = crate::stats::lvr(volume_24h, liquidity);
                if let Some(lvr) = lvr {
                    debug!("recomputed lvr for {question}/{outcome}: {lvr:.4}");
                }

                markets.push(MonitoredMarket {
                    market_id: market_id.clone(),
                    question: question.clone(),
                    outcome,
                    token_id,
                    current_price: price,
                    previous_price: None,
                    is_closed,
                    volume_24h,
                    liquidity,
                    lvr,
                });
            }
        }
    }

    MonitoredEvent {
        slug: slug.to_string(),
        name,
        markets,
        last_updated: now,
    }
}

/// Extracts a token snapshot from raw midpoint/book JSON responses.
pub fn parse_token_snapshot(midpoint: Option<&Value>, book: Option<&Value>) -> TokenSnapshot {
    let price = midpoint.and_then(|v| parse_numeric_field(v.get("mid")));
    let total_book_size = book.map(|v| {
        sum_book_sizes(v.get("bids")) + sum_book_sizes(v.get("asks"))
    });
    TokenSnapshot {
        price,
        total_book_size,
    }
}

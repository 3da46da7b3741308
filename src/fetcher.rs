use std::collections::HashMap;
use std::time::Duration as StdDuration;

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::{Config, MAX_RETRIES, REQUEST_TIMEOUT_SECS, RETRY_BASE_DELAY_MS};

/// Outcome of fetching one slug/token: present data, a confirmed-permanent
/// miss (404), or a transient failure that exhausted its retries (spec.md
/// §7, taxonomy).
#[derive(Debug)]
pub enum FetchOutcome {
    Found(Value),
    NotFound,
    Failed,
}

pub fn build_client() -> crate::error::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(StdDuration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?)
}

/// Fetches one Gamma event by slug with bounded retry. 404 is a permanent
/// miss returned immediately; 429 backs off exponentially
/// (`base × 2^attempt`); 5xx and transport errors retry with a fixed delay
/// (spec.md §6, §7).
pub async fn fetch_event_by_slug(client: &reqwest::Client, base_url: &str, slug: &str) -> FetchOutcome {
    let url = format!("{base_url}/events/slug/{slug}");
    fetch_with_retry(client, &url, slug).await
}

async fn fetch_with_retry(client: &reqwest::Client, url: &str, label: &str) -> FetchOutcome {
    for attempt in 0..MAX_RETRIES {
        let response = match client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("request error fetching {label}, attempt {}/{MAX_RETRIES}: {e}", attempt + 1);
                tokio::time::sleep(StdDuration::from_millis(RETRY_BASE_DELAY_MS)).await;
                continue;
            }
        };

        match response.status().as_u16() {
            404 => {
                warn!("not found: {label}");
                return FetchOutcome::NotFound;
            }
            429 => {
                let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt);
                warn!("rate limited fetching {label}, attempt {}/{MAX_RETRIES}, backing off {delay}ms", attempt + 1);
                tokio::time::sleep(StdDuration::from_millis(delay)).await;
                continue;
            }
            status if status >= 500 => {
                warn!("upstream error {status} fetching {label}, attempt {}/{MAX_RETRIES}", attempt + 1);
                tokio::time::sleep(StdDuration::from_millis(RETRY_BASE_DELAY_MS)).await;
                continue;
            }
            status if status >= 400 => {
                error!("client error {status} fetching {label}");
                return FetchOutcome::Failed;
            }
            _ => match response.json::<Value>().await {
                Ok(v) => return FetchOutcome::Found(v),
                Err(e) => {
                    error!("JSON parse error for {label}: {e}");
                    return FetchOutcome::Failed;
                }
            },
        }
    }

    error!("failed to fetch {label} after {MAX_RETRIES} attempts");
    FetchOutcome::Failed
}

/// Probes every configured slug once at startup; slugs that 404 are
/// dropped with a warning and never retried (supplemented from
/// `original_source/src/poller.py::validate_slugs`, SPEC_FULL.md §5).
pub async fn validate_slugs(client: &reqwest::Client, cfg: &Config) -> Vec<String> {
    let mut valid = Vec::new();
    for slug in &cfg.slugs {
        match fetch_event_by_slug(client, &cfg.gamma_api_url, slug).await {
            FetchOutcome::Found(data) => {
                let title = data.get("title").and_then(|t| t.as_str()).unwrap_or("unknown");
                tracing::info!("valid slug: {slug} ({title})");
                valid.push(slug.clone());
            }
            FetchOutcome::NotFound => warn!("invalid slug, dropping: {slug}"),
            FetchOutcome::Failed => warn!("could not validate slug (transient failure), dropping: {slug}"),
        }
    }
    valid
}

/// Fetches the event snapshot for every tracked slug concurrently
/// (snapshot-then-apply: all results collected before any state mutation
/// begins, spec.md §5).
pub async fn fetch_all_event_snapshots(
    client: &reqwest::Client,
    base_url: &str,
    slugs: &[String],
) -> HashMap<String, Value> {
    let fetches = slugs.iter().map(|slug| async move {
        let outcome = fetch_event_by_slug(client, base_url, slug).await;
        (slug.clone(), outcome)
    });

    let results = join_all(fetches).await;
    let mut snapshots = HashMap::new();
    for (slug, outcome) in results {
        match outcome {
            FetchOutcome::Found(data) => {
                snapshots.insert(slug, data);
            }
            FetchOutcome::NotFound => error!("event slug disappeared after startup validation: {slug}"),
            FetchOutcome::Failed => error!("failed to poll event: {slug}"),
        }
    }
    snapshots
}

/// Fetches midpoint and order book for one CLOB token.
pub async fn fetch_token_snapshot_raw(
    client: &reqwest::Client,
    base_url: &str,
    token_id: &str,
) -> (Option<Value>, Option<Value>) {
    let midpoint_url = format!("{base_url}/midpoint?token_id={token_id}");
    let book_url = format!("{base_url}/book?token_id={token_id}");

    let (midpoint, book) = tokio::join!(
        fetch_with_retry(client, &midpoint_url, &format!("midpoint:{token_id}")),
        fetch_with_retry(client, &book_url, &format!("book:{token_id}")),
    );

    let midpoint = match midpoint {
        FetchOutcome::Found(v) => Some(v),
        FetchOutcome::NotFound => {
            debug!("no midpoint for token {token_id}");
            None
        }
        FetchOutcome::Failed => None,
    };
    let book = match book {
        FetchOutcome::Found(v) => Some(v),
        FetchOutcome::NotFound => {
            debug!("no book for token {token_id}");
            None
        }
        FetchOutcome::Failed => None,
    };

    (midpoint, book)
}

/// Fetches midpoint+book for every active token concurrently.
pub async fn fetch_all_token_snapshots(
    client: &reqwest::Client,
    base_url: &str,
    token_ids: &[String],
) -> HashMap<String, (Option<Value>, Option<Value>)> {
    let fetches = token_ids.iter().map(|token_id| async move {
        let raw = fetch_token_snapshot_raw(client, base_url, token_id).await;
        (token_id.clone(), raw)
    });

    join_all(fetches).await.into_iter().collect()
}

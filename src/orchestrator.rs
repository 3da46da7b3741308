use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::{Config, Detector};
use crate::cooldown::CooldownManager;
use crate::detector::{closed, liquidity, mad, spike, zscore};
use crate::fetcher;
use crate::state::{parse_token_snapshot, MarketState};
use crate::types::{Alert, AlertTarget};

/// Owns the detection pipeline's mutable state and drives one cycle at a
/// time. The orchestrator is the sole mutator of `state` and `cooldown`
/// (spec.md §3, §4.6).
pub struct Orchestrator {
    pub config: Config,
    pub state: MarketState,
    pub cooldown: CooldownManager,
    /// Slugs validated at startup (or still pending first successful
    /// fetch). Shrinks as events fully close, so a closed event's slug is
    /// never polled again within this process lifetime (spec.md §8,
    /// scenario 7).
    tracked_slugs: Vec<String>,
    gamma_client: reqwest::Client,
    clob_client: reqwest::Client,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        tracked_slugs: Vec<String>,
        gamma_client: reqwest::Client,
        clob_client: reqwest::Client,
    ) -> Self {
        let cooldown = CooldownManager::new(config.cooldown_duration(), config.escalation_threshold);
        Self {
            config,
            state: MarketState::new(),
            cooldown,
            tracked_slugs,
            gamma_client,
            clob_client,
        }
    }

    fn enabled(&self, detector: Detector) -> bool {
        self.config.detectors.contains(&detector)
    }

    /// Implements spec.md §4.6's nine steps. Returns the surviving alerts
    /// for this cycle; callers are responsible for handing them to the
    /// notification boundary.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Vec<Alert> {
        let mut alerts = Vec::new();

        // 1. cooldown cleanup
        self.cooldown.cleanup_stale(now);

        // 2. fetch event snapshot for all tracked slugs
        let snapshots = fetcher::fetch_all_event_snapshots(
            &self.gamma_client,
            &self.config.gamma_api_url,
            &self.tracked_slugs,
        )
        .await;

        // 3. closed-market detection against prior state, before mutation
        let mut events_to_remove = Vec::new();
        if self.enabled(Detector::Closed) {
            for (slug, raw) in &snapshots {
                let prior = self.state.events.get(slug);
                let detection = closed::detect(prior, slug, raw, now);
                alerts.extend(detection.alerts);
                if detection.remove_event {
                    events_to_remove.push(slug.clone());
                }
            }
        }
        for slug in &events_to_remove {
            self.state.remove_event(slug);
            self.tracked_slugs.retain(|s| s != slug);
        }

        // 4. apply event snapshot to state (skip removed events)
        for (slug, raw) in &snapshots {
            if events_to_remove.contains(slug) {
                continue;
            }
            self.state.apply_event_snapshot(slug, raw, now);
        }

        // 5. spike + gated liquidity warning
        if self.enabled(Detector::Spike) {
            let mut cycle_spikes = Vec::new();
            for event in self.state.events.values() {
                cycle_spikes.extend(spike::detect(event, self.config.spike_threshold, now));
            }

            if self.enabled(Detector::Lvr) && !cycle_spikes.is_empty() {
                let warnings = liquidity::detect(&cycle_spikes, &self.state, self.config.lvr_threshold, now);
                alerts.extend(warnings);
            }

            alerts.extend(cycle_spikes);
        }

        // 6. determine active token ids
        let token_ids = if !self.config.clob_token_ids.is_empty() {
            self.config.clob_token_ids.clone()
        } else {
            self.state.active_token_ids()
        };

        // 7. fetch token snapshot, fold into windows
        if !token_ids.is_empty() {
            let raw_snapshots =
                fetcher::fetch_all_token_snapshots(&self.clob_client, &self.config.clob_api_url, &token_ids).await;
            for (token_id, (midpoint, book)) in raw_snapshots {
                let snapshot = parse_token_snapshot(midpoint.as_ref(), book.as_ref());
                self.state.apply_token_snapshot(&token_id, snapshot, now, now);
            }
        }

        let targets = self.build_target_index();

        // 8. z-score detector
        if self.enabled(Detector::ZScore) {
            alerts.extend(zscore::detect(
                &mut self.state.stats,
                &mut self.cooldown,
                self.config.zscore_threshold,
                &targets,
                now,
            ));
        }

        // 9. MAD detector
        if self.enabled(Detector::Mad) {
            alerts.extend(mad::detect(
                &mut self.state.stats,
                &mut self.cooldown,
                self.config.mad_multiplier,
                &targets,
                now,
            ));
        }

        alerts
    }

    /// Maps every tracked token id back to its `(event, question, outcome)`
    /// identity, for use by the z-score/MAD alert formatter.
    fn build_target_index(&self) -> HashMap<String, AlertTarget> {
        let mut index = HashMap::new();
        for event in self.state.events.values() {
            for market in &event.markets {
                if let Some(token_id) = &market.token_id {
                    index.insert(
                        token_id.clone(),
                        AlertTarget {
                            event_slug: event.slug.clone(),
                            event_name: event.name.clone(),
                            question: market.question.clone(),
                            outcome: market.outcome.clone(),
                        },
                    );
                }
            }
        }
        index
    }
}

/// Runs cycles forever at `poll_interval` cadence, sleeping in 1-second
/// slices so `shutdown` is observed promptly (spec.md §5). Each cycle's
/// body is wrapped so a failure is logged and the loop continues
/// (spec.md §7, propagation policy).
pub async fn run_forever(
    mut orchestrator: Orchestrator,
    notify_client: reqwest::Client,
    shutdown: std::sync::Arc<std::sync::atomic::AtomicBool>,
) {
    use std::sync::atomic::Ordering;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let now = Utc::now();
        info!("starting cycle for {} tracked events", orchestrator.state.events.len());
        let alerts = orchestrator.run_cycle(now).await;
        if !alerts.is_empty() {
            info!("cycle produced {} alert(s)", alerts.len());
            crate::alerter::dispatch(
                &notify_client,
                &orchestrator.config.telegram_bot_token,
                &orchestrator.config.telegram_chat_id,
                &alerts,
            )
            .await;
        }

        let mut slept = 0u64;
        while slept < orchestrator.config.poll_interval_secs {
            if shutdown.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_secs(
                crate::config::SHUTDOWN_POLL_SLICE_SECS,
            ))
            .await;
            slept += crate::config::SHUTDOWN_POLL_SLICE_SECS;
        }
    }
}

#[cfg(test)]
mod orchestrator_cycle_note {
    // Full end-to-end cycle tests (fetch -> detect -> alert) require a
    // mock HTTP boundary; the individual stages (state, each detector,
    // cooldown, fetcher retry logic) carry their own unit tests in their
    // own modules instead of duplicating coverage here.
}

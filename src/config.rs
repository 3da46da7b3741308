use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, Result};

pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";
pub const CLOB_API_URL: &str = "https://clob.polymarket.com";

/// Default minimum observations a rolling window needs before it is valid.
pub const DEFAULT_MIN_OBSERVATIONS: usize = 30;

/// Per-request timeout for upstream HTTP calls (§5).
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Bounded retry count for upstream HTTP calls (§5).
pub const MAX_RETRIES: u32 = 3;

/// Base delay for 429 exponential backoff (`base * 2^n`).
pub const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Granularity of the inter-cycle sleep, so a shutdown signal is observed
/// within this many seconds (§5).
pub const SHUTDOWN_POLL_SLICE_SECS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Detector {
    Spike,
    Lvr,
    ZScore,
    Mad,
    Closed,
}

impl Detector {
    const ALL: [Detector; 5] = [
        Detector::Spike,
        Detector::Lvr,
        Detector::ZScore,
        Detector::Mad,
        Detector::Closed,
    ];

    fn from_name(s: &str) -> Option<Detector> {
        match s.trim().to_lowercase().as_str() {
            "spike" => Some(Detector::Spike),
            "lvr" => Some(Detector::Lvr),
            "zscore" | "z_score" | "z-score" => Some(Detector::ZScore),
            "mad" => Some(Detector::Mad),
            "closed" => Some(Detector::Closed),
            _ => None,
        }
    }
}

/// Parses the `detectors` configuration value: `"all"`, `"none"`, or a
/// comma-separated subset of the five detector names. Unknown names are
/// warned and dropped, never fatal (spec.md §6).
pub fn parse_detector_set(raw: &str) -> HashSet<Detector> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("all") {
        return Detector::ALL.into_iter().collect();
    }
    if trimmed.eq_ignore_ascii_case("none") || trimmed.is_empty() {
        return HashSet::new();
    }

    let mut set = HashSet::new();
    for part in trimmed.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match Detector::from_name(part) {
            Some(d) => {
                set.insert(d);
            }
            None => tracing::warn!("unknown detector name '{part}', dropping"),
        }
    }
    set
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gamma_api_url: String,
    pub clob_api_url: String,
    pub log_level: String,

    pub slugs: Vec<String>,
    pub poll_interval_secs: u64,
    pub spike_threshold: f64,
    pub lvr_threshold: f64,
    pub zscore_threshold: f64,
    pub mad_multiplier: f64,
    pub detectors: HashSet<Detector>,
    pub cooldown_minutes: u64,
    pub escalation_threshold: f64,
    pub clob_token_ids: Vec<String>,

    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
}

/// Mirrors the TOML shape accepted from a config file. Every field is
/// optional here — absent fields fall back to defaults or to environment
/// variables, per the env > file precedence rule (spec.md §6).
#[derive(Debug, Default, Deserialize)]
struct RawFileConfig {
    slugs: Option<Vec<String>>,
    poll_interval: Option<u64>,
    spike_threshold: Option<f64>,
    lvr_threshold: Option<f64>,
    zscore_threshold: Option<f64>,
    mad_multiplier: Option<f64>,
    detectors: Option<String>,
    cooldown_minutes: Option<u64>,
    escalation_threshold: Option<f64>,
    clob_token_ids: Option<Vec<String>>,
    gamma_api_url: Option<String>,
    clob_api_url: Option<String>,
    log_level: Option<String>,
    telegram: Option<RawTelegramConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTelegramConfig {
    bot_token: Option<String>,
    chat_id: Option<String>,
}

impl Config {
    /// Loads configuration from an optional TOML file, then lets
    /// environment variables override every field that was set (env >
    /// file precedence, spec.md §6). `${VAR}` references inside string
    /// values are substituted from the environment before anything else;
    /// an unresolved reference is left literal.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let raw = match config_path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path)?;
                let substituted = substitute_env_vars(&text);
                toml::from_str(&substituted)?
            }
            _ => RawFileConfig::default(),
        };

        let slugs = env_var("SLUGS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| raw.slugs.clone().unwrap_or_default());

        let poll_interval_secs = env_parse("POLL_INTERVAL")
            .unwrap_or_else(|| raw.poll_interval.unwrap_or(60));

        let spike_threshold =
            env_parse("SPIKE_THRESHOLD").unwrap_or_else(|| raw.spike_threshold.unwrap_or(5.0));

        let lvr_threshold =
            env_parse("LVR_THRESHOLD").unwrap_or_else(|| raw.lvr_threshold.unwrap_or(8.0));

        let zscore_threshold =
            env_parse("ZSCORE_THRESHOLD").unwrap_or_else(|| raw.zscore_threshold.unwrap_or(3.5));

        let mad_multiplier =
            env_parse("MAD_MULTIPLIER").unwrap_or_else(|| raw.mad_multiplier.unwrap_or(3.0));

        let detectors_raw = env_var("DETECTORS")
            .unwrap_or_else(|| raw.detectors.clone().unwrap_or_else(|| "all".to_string()));
        let detectors = parse_detector_set(&detectors_raw);

        let cooldown_minutes =
            env_parse("COOLDOWN_MINUTES").unwrap_or_else(|| raw.cooldown_minutes.unwrap_or(30));

        let escalation_threshold = env_parse("ESCALATION_THRESHOLD")
            .unwrap_or_else(|| raw.escalation_threshold.unwrap_or(1.0));

        let clob_token_ids = env_var("CLOB_TOKEN_IDS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| raw.clob_token_ids.clone().unwrap_or_default());

        let gamma_api_url = env_var("GAMMA_API_URL")
            .unwrap_or_else(|| raw.gamma_api_url.clone().unwrap_or_else(|| GAMMA_API_URL.to_string()));

        let clob_api_url = env_var("CLOB_API_URL")
            .unwrap_or_else(|| raw.clob_api_url.clone().unwrap_or_else(|| CLOB_API_URL.to_string()));

        let log_level = env_var("LOG_LEVEL")
            .unwrap_or_else(|| raw.log_level.clone().unwrap_or_else(|| "info".to_string()));

        let telegram_bot_token = env_var("TELEGRAM_BOT_TOKEN").unwrap_or_else(|| {
            raw.telegram
                .as_ref()
                .and_then(|t| t.bot_token.clone())
                .unwrap_or_default()
        });

        let telegram_chat_id = env_var("TELEGRAM_CHAT_ID").unwrap_or_else(|| {
            raw.telegram
                .as_ref()
                .and_then(|t| t.chat_id.clone())
                .unwrap_or_default()
        });

        let cfg = Config {
            gamma_api_url,
            clob_api_url,
            log_level,
            slugs,
            poll_interval_secs,
            spike_threshold,
            lvr_threshold,
            zscore_threshold,
            mad_multiplier,
            detectors,
            cooldown_minutes,
            escalation_threshold,
            clob_token_ids,
            telegram_bot_token,
            telegram_chat_id,
        };

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.slugs.is_empty() {
            errors.push("slugs: must be a non-empty list".to_string());
        }
        if self.poll_interval_secs < 10 {
            errors.push("poll_interval: must be >= 10".to_string());
        }
        if !(0.1..=100.0).contains(&self.spike_threshold) {
            errors.push("spike_threshold: must be between 0.1 and 100.0".to_string());
        }
        if !(0.1..=100.0).contains(&self.lvr_threshold) {
            errors.push("lvr_threshold: must be between 0.1 and 100.0".to_string());
        }
        if self.zscore_threshold <= 0.0 {
            errors.push("zscore_threshold: must be positive".to_string());
        }
        if self.mad_multiplier <= 0.0 {
            errors.push("mad_multiplier: must be positive".to_string());
        }
        if self.escalation_threshold <= 0.0 {
            errors.push("escalation_threshold: must be positive".to_string());
        }
        if self.telegram_bot_token.is_empty() {
            errors.push("telegram.bot_token: must be a non-empty string".to_string());
        }
        if self.telegram_chat_id.is_empty() {
            errors.push("telegram.chat_id: must be a non-empty string".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Config(format!(
                "configuration validation failed:\n{}",
                errors
                    .iter()
                    .map(|e| format!("  - {e}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            )))
        }
    }

    pub fn cooldown_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cooldown_minutes as i64)
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|v| v.parse().ok())
}

/// Replaces `${VAR}` references with the value of the environment variable
/// `VAR`. A reference to an unset variable is left literal, matching the
/// original implementation's `_substitute_env_vars`.
pub fn substitute_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some(end) = input[i + 2..].find('}') {
                let var_name = &input[i + 2..i + 2 + end];
                match std::env::var(var_name) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => out.push_str(&input[i..i + 2 + end + 1]),
                }
                i += 2 + end + 1;
                continue;
            }
        }
        let ch = input[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

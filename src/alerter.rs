use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{error, info, warn};

use crate::types::{Alert, Direction};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Escapes Telegram MarkdownV2 special characters: `_ * [ ] ( ) ~ \` > # +
/// - = | { } . !` (spec.md §6).
pub fn escape_markdown(text: &str) -> String {
    const SPECIAL: &[char] = &[
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    ];
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if SPECIAL.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn direction_emoji(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "\u{2191}",
        Direction::Down => "\u{2193}",
    }
}

fn direction_sign(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "+",
        Direction::Down => "-",
    }
}

/// Renders one alert into its Telegram Markdown message body. Each of the
/// five templates carries the event name, market question, outcome, the
/// kind-specific metric(s), a direction indicator, and a detection
/// timestamp (spec.md §6).
pub fn format_message(alert: &Alert) -> String {
    match alert {
        Alert::Spike(a) => format!(
            "\u{1F6A8} *Price Spike Detected*\n\n\
             *Event*: {}\n\
             *Market*: {}\n\
             *Outcome*: {}\n\
             *Price*: {:.4} {} {:.4} ({}{:.1}%)\n\
             *Time*: {} UTC",
            escape_markdown(&a.target.event_name),
            escape_markdown(&a.target.question),
            a.target.outcome,
            a.price_before,
            direction_emoji(a.direction),
            a.price_after,
            direction_sign(a.direction),
            a.change_percent,
            format_timestamp(a.detected_at),
        ),
        Alert::LiquidityWarning(a) => format!(
            "\u{26A0}\u{FE0F} *Liquidity Warning*\n\n\
             *Event*: {}\n\
             *Market*: {}\n\
             *Outcome*: {}\n\
             *Price*: {:.4} {} {:.4} ({}{:.1}%)\n\
             *LVR*: {:.1} ({})\n\
             *Time*: {} UTC",
            escape_markdown(&a.target.event_name),
            escape_markdown(&a.target.question),
            a.target.outcome,
            a.price_before,
            direction_emoji(a.direction),
            a.price_after,
            direction_sign(a.direction),
            a.change_percent,
            a.lvr,
            a.health,
            format_timestamp(a.detected_at),
        ),
        Alert::ZScore(a) => {
            let (event_name, question, outcome) = target_fields(a.target.as_ref());
            format!(
                "\u{1F4CA} *Z-Score Anomaly*\n\n\
                 *Event*: {event_name}\n\
                 *Market*: {question}\n\
                 *Outcome*: {outcome}\n\
                 *Token*: {}\n\
                 *Window*: {}\n\
                 *Z-score*: {:.2}\n\
                 *Current*: {:.4}\n\
                 *Time*: {} UTC",
                a.token_id,
                a.window,
                a.z_score,
                a.current,
                format_timestamp(a.detected_at),
            )
        }
        Alert::Mad(a) => {
            let (event_name, question, outcome) = target_fields(a.target.as_ref());
            format!(
                "\u{1F4C9} *MAD Outlier Detected*\n\n\
                 *Event*: {event_name}\n\
                 *Market*: {question}\n\
                 *Outcome*: {outcome}\n\
                 *Token*: {}\n\
                 *Window*: {}\n\
                 *Current*: {:.4} ({} median {:.4})\n\
                 *Multiplier*: {:.1}x\n\
                 *Time*: {} UTC",
                a.token_id,
                a.window,
                a.current,
                a.relation,
                a.median,
                a.multiplier,
                format_timestamp(a.detected_at),
            )
        }
        Alert::ClosedMarket(a) => format!(
            "\u{1F512} *Market Closed*\n\n\
             *Event*: {}\n\
             *Market*: {}\n\
             *Outcome*: {}\n\
             *Final price*: {}\n\
             *Time*: {} UTC",
            escape_markdown(&a.target.event_name),
            escape_markdown(&a.target.question),
            a.target.outcome,
            a.final_price
                .map(|p| format!("{p:.4}"))
                .unwrap_or_else(|| "unknown".to_string()),
            format_timestamp(a.detected_at),
        ),
    }
}

fn target_fields(target: Option<&crate::types::AlertTarget>) -> (String, String, String) {
    match target {
        Some(t) => (
            escape_markdown(&t.event_name),
            escape_markdown(&t.question),
            t.outcome.clone(),
        ),
        None => ("unknown".to_string(), "unknown".to_string(), "unknown".to_string()),
    }
}

/// Posts one alert message via the Telegram Bot API. Success is an HTTP
/// 200 whose body's `ok` field is true; 429 is logged as rate-limited;
/// other failures are logged and dropped — no persistent retry queue
/// (spec.md §6).
pub async fn send_telegram_alert(
    client: &reqwest::Client,
    bot_token: &str,
    chat_id: &str,
    message: &str,
) -> bool {
    let url = format!("{TELEGRAM_API_BASE}/bot{bot_token}/sendMessage");
    let payload = json!({
        "chat_id": chat_id,
        "text": message,
        "parse_mode": "Markdown",
    });

    let response = match client.post(&url).json(&payload).send().await {
        Ok(r) => r,
        Err(e) => {
            error!("telegram request error: {e}");
            return false;
        }
    };

    match response.status().as_u16() {
        200 => match response.json::<serde_json::Value>().await {
            Ok(body) if body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) => {
                info!("telegram alert sent successfully");
                true
            }
            Ok(body) => {
                error!(
                    "telegram API error: {}",
                    body.get("description").and_then(|d| d.as_str()).unwrap_or("unknown")
                );
                false
            }
            Err(e) => {
                error!("telegram response parse error: {e}");
                false
            }
        },
        429 => {
            warn!("telegram rate limited, alert not sent");
            false
        }
        status => {
            error!("telegram HTTP error: {status}");
            false
        }
    }
}

/// Sends every surviving alert for this cycle, logging per-alert failures
/// and a `"sent n/total"` summary line (supplemented from
/// `original_source/src/alerter.py::send_all_alerts`, SPEC_FULL.md §5).
pub async fn dispatch(client: &reqwest::Client, bot_token: &str, chat_id: &str, alerts: &[Alert]) {
    if alerts.is_empty() {
        return;
    }

    let mut sent = 0usize;
    for alert in alerts {
        let message = format_message(alert);
        if send_telegram_alert(client, bot_token, chat_id, &message).await {
            sent += 1;
        } else {
            warn!("failed to deliver alert");
        }
    }

    info!("sent {sent}/{} alerts via Telegram", alerts.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertTarget, LvrHealth, SpikeAlert};

    #[test]
    fn escapes_all_special_characters() {
        let input = "_*[]()~`>#+-=|{}.!";
        let escaped = escape_markdown(input);
        assert_eq!(escaped.chars().filter(|&c| c == '\\').count(), input.chars().count());
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(escape_markdown("Will it rain"), "Will it rain");
    }

    #[test]
    fn spike_message_contains_key_fields() {
        let alert = Alert::Spike(SpikeAlert {
            target: AlertTarget {
                event_slug: "rain".to_string(),
                event_name: "Rain Event".to_string(),
                question: "Will it rain?".to_string(),
                outcome: "Yes".to_string(),
            },
            direction: Direction::Up,
            change_percent: 20.0,
            price_before: 0.50,
            price_after: 0.60,
            detected_at: Utc::now(),
        });
        let msg = format_message(&alert);
        assert!(msg.contains("Price Spike Detected"));
        assert!(msg.contains("0.5000"));
        assert!(msg.contains("0.6000"));
        assert!(msg.contains("+20.0%"));
    }

    #[test]
    fn liquidity_warning_includes_health_label() {
        use crate::types::LiquidityWarningAlert;
        let alert = Alert::LiquidityWarning(LiquidityWarningAlert {
            target: AlertTarget {
                event_slug: "rain".to_string(),
                event_name: "Rain Event".to_string(),
                question: "Will it rain?".to_string(),
                outcome: "Yes".to_string(),
            },
            direction: Direction::Up,
            change_percent: 20.0,
            price_before: 0.50,
            price_after: 0.60,
            lvr: 10.0,
            health: LvrHealth::HighRisk,
            detected_at: Utc::now(),
        });
        let msg = format_message(&alert);
        assert!(msg.contains("High Risk"));
    }
}

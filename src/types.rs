use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Market / event data model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MonitoredMarket {
    pub market_id: String,
    pub question: String,
    pub outcome: String,
    pub token_id: Option<String>,
    pub current_price: Option<f64>,
    pub previous_price: Option<f64>,
    pub is_closed: bool,
    pub volume_24h: Option<f64>,
    pub liquidity: Option<f64>,
    pub lvr: Option<f64>,
}

impl MonitoredMarket {
    pub fn key(&self) -> (String, String) {
        (self.question.clone(), self.outcome.clone())
    }
}

#[derive(Debug, Clone)]
pub struct MonitoredEvent {
    pub slug: String,
    pub name: String,
    pub markets: Vec<MonitoredMarket>,
    pub last_updated: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Statistics keying
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Volume,
    Price,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Metric::Volume => "volume",
            Metric::Price => "price",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowSpan {
    OneHour,
    FourHour,
}

impl WindowSpan {
    pub fn duration(self) -> chrono::Duration {
        match self {
            WindowSpan::OneHour => chrono::Duration::hours(1),
            WindowSpan::FourHour => chrono::Duration::hours(4),
        }
    }
}

impl std::fmt::Display for WindowSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WindowSpan::OneHour => "1h",
            WindowSpan::FourHour => "4h",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// LVR health classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LvrHealth {
    Healthy,
    Elevated,
    HighRisk,
}

impl std::fmt::Display for LvrHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LvrHealth::Healthy => "Healthy",
            LvrHealth::Elevated => "Elevated",
            LvrHealth::HighRisk => "High Risk",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Alerts — one tagged sum over five kind-specific payloads
// ---------------------------------------------------------------------------

/// Identifies the market a given alert concerns, independent of which
/// detector produced it.
#[derive(Debug, Clone)]
pub struct AlertTarget {
    pub event_slug: String,
    pub event_name: String,
    pub question: String,
    pub outcome: String,
}

#[derive(Debug, Clone)]
pub struct SpikeAlert {
    pub target: AlertTarget,
    pub direction: Direction,
    pub change_percent: f64,
    pub price_before: f64,
    pub price_after: f64,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LiquidityWarningAlert {
    pub target: AlertTarget,
    pub direction: Direction,
    pub change_percent: f64,
    pub price_before: f64,
    pub price_after: f64,
    pub lvr: f64,
    pub health: LvrHealth,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ZScoreAlert {
    pub token_id: String,
    pub target: Option<AlertTarget>,
    pub window: WindowSpan,
    pub z_score: f64,
    pub current: f64,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MadAlert {
    pub token_id: String,
    pub target: Option<AlertTarget>,
    pub window: WindowSpan,
    pub multiplier: f64,
    pub current: f64,
    pub median: f64,
    pub relation: Relation,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ClosedMarketAlert {
    pub target: AlertTarget,
    pub final_price: Option<f64>,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// Derived at formatting time from a MAD alert's current value vs. median —
/// the detector itself does not carry a sign (spec §4.4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Above,
    Below,
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relation::Above => write!(f, "above"),
            Relation::Below => write!(f, "below"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Alert {
    Spike(SpikeAlert),
    LiquidityWarning(LiquidityWarningAlert),
    ZScore(ZScoreAlert),
    Mad(MadAlert),
    ClosedMarket(ClosedMarketAlert),
}

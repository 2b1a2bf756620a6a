/// Wire types for the dashboard JSON API
///
/// These types match the payloads served under `api/` by the scalping bot's web
/// process. Every numeric field is decoded leniently: a missing, null, or non-numeric
/// value becomes `None` and renders as a placeholder instead of failing the feed.
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// One independently fetched JSON resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    Status,
    Indicators,
    Performance,
    Risk,
    Trades,
    Signals,
}

impl Feed {
    /// Feeds fetched together by one refresh cycle. Signals run on their own cadence.
    pub const CYCLE: [Feed; 5] = [
        Feed::Status,
        Feed::Indicators,
        Feed::Performance,
        Feed::Risk,
        Feed::Trades,
    ];

    pub const ALL: [Feed; 6] = [
        Feed::Status,
        Feed::Indicators,
        Feed::Performance,
        Feed::Risk,
        Feed::Trades,
        Feed::Signals,
    ];

    /// Relative endpoint path
    pub fn path(&self) -> &'static str {
        match self {
            Feed::Status => "api/status",
            Feed::Indicators => "api/indicators",
            Feed::Performance => "api/performance",
            Feed::Risk => "api/risk",
            Feed::Trades => "api/trades",
            Feed::Signals => "api/signals",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Status => "status",
            Feed::Indicators => "indicators",
            Feed::Performance => "performance",
            Feed::Risk => "risk",
            Feed::Trades => "trades",
            Feed::Signals => "signals",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Position / signal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Side {
    Long,
    Short,
    #[default]
    Unknown,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
            Side::Unknown => "--",
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Side::Long)
    }
}

impl From<&str> for Side {
    fn from(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "LONG" | "BUY" => Side::Long,
            "SHORT" | "SELL" => Side::Short,
            _ => Side::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for Side {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) => Side::from(s.as_str()),
            _ => Side::Unknown,
        })
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trading mode a trade was executed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TradingMode {
    Live,
    Paper,
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Live => "live",
            TradingMode::Paper => "paper",
        }
    }
}

impl FromStr for TradingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(TradingMode::Live),
            "paper" => Ok(TradingMode::Paper),
            other => Err(format!("unknown trading mode: {other}")),
        }
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// api/status
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub bot_status: BotStatus,
    #[serde(default)]
    pub account: Account,
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub positions_count: Option<u64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub btc_price: Option<f64>,
    #[serde(default)]
    pub positions: Vec<Position>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotStatus {
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub running: bool,
    /// "paper", "live", "stopped", ...
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Account {
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub balance: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub total_pnl: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub total_return_percent: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub unrealized_pnl: Option<f64>,
}

/// Open position, replaced wholesale on every poll
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub side: Side,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub entry_price: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub current_price: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub stop_loss: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub take_profit: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub unrealized_pnl: Option<f64>,
    /// Entry time, drives the live position age
    #[serde(default, alias = "entry_time", deserialize_with = "de::lenient_timestamp")]
    pub opened_at: Option<DateTime<Utc>>,
}

// ============================================================================
// api/indicators
// ============================================================================

/// Long/short signal candidate computed by the strategy engine
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SignalDetail {
    /// 0..1
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_conditions")]
    pub conditions: Vec<String>,
}

/// Raw indicator values.
///
/// Two naming schemes for the EMAs coexist: the legacy `ema_5/8/21` fields and the
/// scalping `ema_micro/fast/slow` fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IndicatorSet {
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub ema_5: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub ema_8: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub ema_21: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub ema_micro: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub ema_fast: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub ema_slow: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub rsi: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub stoch_k: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub stoch_d: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub volume_ratio: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub atr_pct: Option<f64>,
    /// Discrete signal string, e.g. "LONG", "SHORT", "NONE"
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub signal: Option<String>,
    #[serde(default)]
    pub long: Option<SignalDetail>,
    #[serde(default)]
    pub short: Option<SignalDetail>,
    /// "trending", "ranging", "choppy"
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub market_regime: Option<String>,
}

impl IndicatorSet {
    /// Overlay every present field of `other` on top of `self`.
    fn overlay(mut self, other: IndicatorSet) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $( if other.$field.is_some() { self.$field = other.$field; } )*
            };
        }
        take!(
            ema_5, ema_8, ema_21, ema_micro, ema_fast, ema_slow, rsi, stoch_k, stoch_d,
            volume_ratio, atr_pct, signal, long, short, market_regime
        );
        self
    }
}

/// `api/indicators` body.
///
/// The server may send the values flat or nested under `indicators` (with the regime and
/// long/short candidates at the top level). Both shapes are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndicatorsResponse {
    #[serde(default)]
    pub indicators: Option<IndicatorSet>,
    #[serde(flatten)]
    pub top: IndicatorSet,
}

impl IndicatorsResponse {
    /// Merge both shapes into one set, nested values taking precedence.
    pub fn into_set(self) -> IndicatorSet {
        match self.indicators {
            Some(nested) => self.top.overlay(nested),
            None => self.top,
        }
    }
}

// ============================================================================
// api/performance & api/risk
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PerformanceResponse {
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub total_trades: Option<u64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub win_rate: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub wins: Option<u64>,
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub losses: Option<u64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub profit_factor: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub avg_pnl: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub best_trade: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RiskResponse {
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub daily_pnl: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub daily_loss_limit: Option<f64>,
    /// Percent
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub max_drawdown: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub max_drawdown_limit: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub consecutive_wins: Option<u64>,
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub consecutive_losses: Option<u64>,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub circuit_breaker: bool,
}

// ============================================================================
// api/trades
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TradesResponse {
    #[serde(default)]
    pub trades: Vec<Trade>,
}

/// Closed trade
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Trade {
    #[serde(default)]
    pub side: Side,
    #[serde(default, deserialize_with = "de::lenient_mode")]
    pub trading_mode: Option<TradingMode>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub pnl: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub pnl_percent: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub entry_price: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub exit_price: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub exit_reason: Option<String>,
    /// Hours
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub hold_duration: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_timestamp")]
    pub closed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// api/signals
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignalsResponse {
    #[serde(default)]
    pub signals: Vec<SignalRecord>,
    #[serde(default)]
    pub stats: Option<SignalStats>,
}

/// Logged strategy signal, executed or rejected
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignalRecord {
    #[serde(default, deserialize_with = "de::lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub side: Side,
    /// 0..100
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub entry_price: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub stop_loss: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub take_profit: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub conditions: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub executed: bool,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub execution_status: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SignalStats {
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub total: Option<u64>,
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub executed: Option<u64>,
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub rejected: Option<u64>,
    /// Percent
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub execution_rate: Option<f64>,
}

// ============================================================================
// health
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthResponse {
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub service: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub version: Option<String>,
}

/// Parse a server timestamp.
///
/// Accepts RFC 3339, naive ISO-8601 (interpreted as local time, which is what the
/// server writes), and epoch seconds or milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }
    raw.parse::<f64>().ok().and_then(timestamp_from_epoch)
}

fn timestamp_from_epoch(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() || epoch < 0.0 {
        return None;
    }
    // Anything past ~2001-09 in seconds is already above 1e9, millis are above 1e12
    if epoch >= 1e12 {
        DateTime::from_timestamp_millis(epoch as i64)
    } else {
        DateTime::from_timestamp_millis((epoch * 1000.0) as i64)
    }
}

/// Lenient field decoders
mod de {
    use super::*;

    pub fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value
            .and_then(|v| v.as_f64())
            .filter(|v| v.is_finite()))
    }

    pub fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value.and_then(|v| match v {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
            _ => None,
        }))
    }

    pub fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"),
            _ => false,
        })
    }

    pub fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn lenient_mode<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<TradingMode>, D::Error> {
        Ok(lenient_string(d)?.and_then(|s| s.parse().ok()))
    }

    pub fn lenient_conditions<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
            _ => Vec::new(),
        })
    }

    pub fn lenient_timestamp<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::String(s)) => parse_timestamp(&s),
            Some(Value::Number(n)) => n.as_f64().and_then(timestamp_from_epoch),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_status_tolerates_missing_and_non_numeric() {
        let body = r#"{
            "bot_status": {"running": true, "mode": "paper"},
            "account": {"balance": 1012.5, "total_pnl": "n/a"},
            "positions_count": 1,
            "positions": [{"side": "LONG", "entry_price": 67000.0, "stop_loss": null}]
        }"#;
        let status: StatusResponse = serde_json::from_str(body).unwrap();

        assert!(status.bot_status.running);
        assert_eq!(status.bot_status.mode.as_deref(), Some("paper"));
        assert_eq!(status.account.balance, Some(1012.5));
        assert_eq!(status.account.total_pnl, None);
        assert_eq!(status.btc_price, None);
        assert_eq!(status.positions.len(), 1);
        assert_eq!(status.positions[0].side, Side::Long);
        assert_eq!(status.positions[0].stop_loss, None);
    }

    #[test]
    fn test_indicators_flat_shape() {
        let body = r#"{"ema_micro": 100.5, "ema_fast": 100.2, "ema_slow": 99.9, "rsi": 75,
                       "volume_ratio": 1.8, "atr_pct": 0.5, "signal": "LONG",
                       "long": {"confidence": 0.72, "conditions": ["ema_cross", "rsi_ok"]}}"#;
        let set = serde_json::from_str::<IndicatorsResponse>(body)
            .unwrap()
            .into_set();

        assert_eq!(set.ema_micro, Some(100.5));
        assert_eq!(set.rsi, Some(75.0));
        assert_eq!(set.signal.as_deref(), Some("LONG"));
        let long = set.long.unwrap();
        assert_eq!(long.confidence, Some(0.72));
        assert_eq!(long.conditions, vec!["ema_cross", "rsi_ok"]);
        assert!(set.short.is_none());
    }

    #[test]
    fn test_indicators_nested_shape_overrides_top_level() {
        let body = r#"{"indicators": {"rsi": 42.0, "ema_micro": 10.0},
                       "rsi": 99.0, "market_regime": "choppy",
                       "short": {"confidence": 0.65, "conditions": "volume_spike"},
                       "timestamp": "2025-01-01T00:00:00"}"#;
        let set = serde_json::from_str::<IndicatorsResponse>(body)
            .unwrap()
            .into_set();

        assert_eq!(set.rsi, Some(42.0));
        assert_eq!(set.ema_micro, Some(10.0));
        assert_eq!(set.market_regime.as_deref(), Some("choppy"));
        assert_eq!(set.short.unwrap().conditions, vec!["volume_spike"]);
    }

    #[test]
    fn test_trade_mode_and_side() {
        let body = r#"{"trades": [
            {"side": "SHORT", "trading_mode": "LIVE", "pnl": -2.5, "hold_duration": 0.25},
            {"side": "sell", "trading_mode": "backtest"},
            {}
        ]}"#;
        let resp: TradesResponse = serde_json::from_str(body).unwrap();

        assert_eq!(resp.trades[0].side, Side::Short);
        assert_eq!(resp.trades[0].trading_mode, Some(TradingMode::Live));
        assert_eq!(resp.trades[0].pnl, Some(-2.5));
        assert_eq!(resp.trades[1].side, Side::Short);
        assert_eq!(resp.trades[1].trading_mode, None);
        assert_eq!(resp.trades[2].side, Side::Unknown);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2025-03-01T12:30:15Z").unwrap();
        assert_eq!(rfc.hour(), 12);
        assert_eq!(rfc.minute(), 30);

        let offset = parse_timestamp("2025-03-01T12:30:15+02:00").unwrap();
        assert_eq!(offset.hour(), 10);

        let naive = parse_timestamp("2025-03-01T12:30:15.123456").unwrap();
        assert_eq!(naive.with_timezone(&Local).hour(), 12);

        let millis = parse_timestamp("1740832215000").unwrap();
        let secs = parse_timestamp("1740832215").unwrap();
        assert_eq!(millis, secs);

        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_feed_paths() {
        assert_eq!(Feed::Status.path(), "api/status");
        assert_eq!(Feed::Signals.path(), "api/signals");
        assert_eq!(Feed::CYCLE.len(), 5);
        assert!(!Feed::CYCLE.contains(&Feed::Signals));
        assert_eq!(Feed::Risk.to_string(), "risk");
    }
}

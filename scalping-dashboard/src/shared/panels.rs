/// Display panels built from feed payloads.
///
/// Each builder is pure: one payload in, one panel out. The dashboard swaps the panel into
/// its region of the view-model once the fetch has resolved.
use crate::shared::{
    classify::Tone,
    format::{format_currency, format_elapsed, format_fixed, format_hold_time, format_percent},
    types::{
        IndicatorSet, PerformanceResponse, Position, RiskResponse, Side, StatusResponse, Trade,
        TradesResponse, TradingMode,
    },
};
use chrono::{DateTime, Utc};

/// Formatted value with its tone
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cell {
    pub text: String,
    pub tone: Tone,
}

impl Cell {
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }

    /// Signed currency toned by its own sign
    pub fn currency(value: Option<f64>) -> Self {
        Self::new(format_currency(value), Tone::of(value))
    }

    /// Win/loss tone: anything not above zero reads as a loss
    fn win_loss(value: Option<f64>) -> Self {
        let tone = match value {
            Some(v) if v > 0.0 => Tone::Positive,
            _ => Tone::Negative,
        };
        Self::new(format_currency(value), tone)
    }
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PositionCard {
    pub side: Side,
    pub pnl: Cell,
    pub entry: String,
    pub current: String,
    pub stop_loss: String,
    pub take_profit: String,
    pub opened_at: Option<DateTime<Utc>>,
}

impl PositionCard {
    pub fn new(position: &Position) -> Self {
        Self {
            side: position.side,
            pnl: Cell::win_loss(position.unrealized_pnl),
            entry: format_currency(position.entry_price),
            current: format_currency(position.current_price),
            stop_loss: format_currency(position.stop_loss),
            take_profit: format_currency(position.take_profit),
            opened_at: position.opened_at,
        }
    }

    /// Live age as `M:SS`, when the entry time is known
    pub fn age(&self, now: DateTime<Utc>) -> Option<String> {
        self.opened_at.map(|start| format_elapsed(start, now))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusPanel {
    pub running: bool,
    /// Bot mode as reported (`paper`, `live`, ...)
    pub mode: Option<String>,
    pub balance: String,
    pub balance_change: Cell,
    pub total_pnl: Cell,
    pub pnl_percent: Cell,
    /// `count/max`
    pub positions: String,
    pub unrealized_pnl: Cell,
    pub btc_price: String,
    pub cards: Vec<PositionCard>,
}

impl StatusPanel {
    pub fn new(status: &StatusResponse, initial_capital: f64, max_positions: u32) -> Self {
        let account = &status.account;
        let balance_change = account.balance.map(|balance| balance - initial_capital);
        let count = status
            .positions_count
            .unwrap_or(status.positions.len() as u64);

        Self {
            running: status.bot_status.running,
            mode: status.bot_status.mode.clone(),
            balance: format_currency(account.balance),
            balance_change: Cell::currency(balance_change),
            total_pnl: Cell::currency(account.total_pnl),
            // toned by the PnL, not the percent
            pnl_percent: Cell::new(
                format_percent(account.total_return_percent),
                Tone::of(account.total_pnl),
            ),
            positions: format!("{count}/{max_positions}"),
            unrealized_pnl: Cell::currency(account.unrealized_pnl),
            btc_price: format_currency(status.btc_price),
            cards: status.positions.iter().map(PositionCard::new).collect(),
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.running {
            "LIVE"
        } else {
            "OFFLINE"
        }
    }
}

// ============================================================================
// Indicators (base step)
// ============================================================================

/// Raw indicator readout, independent of the classifier
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPanel {
    pub ema_5: String,
    pub ema_8: String,
    pub ema_21: String,
    pub rsi: Cell,
    pub stoch_k: String,
    pub volume: String,
    /// RSI as bar fill, `None` leaves the bar as it was
    pub rsi_bar_pct: Option<f64>,
}

impl IndicatorPanel {
    pub fn new(set: &IndicatorSet) -> Self {
        let truthy = |v: Option<f64>| v.filter(|v| *v != 0.0);
        let rsi = truthy(set.rsi);

        Self {
            ema_5: format_fixed(truthy(set.ema_5), 2),
            ema_8: format_fixed(truthy(set.ema_8), 2),
            ema_21: format_fixed(truthy(set.ema_21), 2),
            rsi: Cell::new(format_fixed(rsi, 2), Tone::rsi(rsi)),
            stoch_k: format_fixed(truthy(set.stoch_k), 2),
            volume: match truthy(set.volume_ratio) {
                Some(ratio) => format!("{:.1}%", ratio * 100.0),
                None => "--".to_string(),
            },
            rsi_bar_pct: rsi.map(|r| r.clamp(0.0, 100.0)),
        }
    }
}

// ============================================================================
// Performance
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PerformancePanel {
    pub total_trades: String,
    pub win_rate: Cell,
    pub wins_losses: String,
    pub profit_factor: String,
    pub avg_pnl: Cell,
    pub best_trade: Cell,
}

impl PerformancePanel {
    pub fn new(performance: &PerformanceResponse) -> Self {
        let count = |v: Option<u64>| v.map(|v| v.to_string()).unwrap_or_else(|| "--".into());

        Self {
            total_trades: count(performance.total_trades),
            win_rate: Cell::new(
                match performance.win_rate {
                    Some(rate) => format!("{rate:.1}%"),
                    None => "--".to_string(),
                },
                Tone::win_rate(performance.win_rate),
            ),
            wins_losses: format!("{} / {}", count(performance.wins), count(performance.losses)),
            profit_factor: format_fixed(performance.profit_factor.filter(|pf| *pf != 0.0), 2),
            avg_pnl: Cell::currency(performance.avg_pnl),
            best_trade: Cell::currency(performance.best_trade),
        }
    }
}

// ============================================================================
// Risk
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarLevel {
    #[default]
    Normal,
    Warning,
    Danger,
}

/// Risk usage bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressBar {
    /// Unclamped usage
    pub percent: f64,
    pub level: BarLevel,
}

impl ProgressBar {
    /// Only danger bars escalate to warning (>50%) and danger (>80%)
    pub fn new(percent: f64, danger_bar: bool) -> Self {
        let percent = if percent.is_finite() { percent } else { 0.0 };
        let level = match danger_bar {
            true if percent > 80.0 => BarLevel::Danger,
            true if percent > 50.0 => BarLevel::Warning,
            _ => BarLevel::Normal,
        };
        Self { percent, level }
    }

    /// Fill width, clamped to `0..=100`
    pub fn width(&self) -> f64 {
        self.percent.clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskPanel {
    pub daily_pnl: Cell,
    pub max_drawdown: String,
    pub consecutive: String,
    pub daily_bar: ProgressBar,
    pub drawdown_bar: ProgressBar,
    pub circuit_breaker: bool,
}

impl RiskPanel {
    pub fn new(risk: &RiskResponse) -> Self {
        let daily_pnl = risk.daily_pnl.unwrap_or(0.0);
        let drawdown = risk.max_drawdown.unwrap_or(0.0);

        Self {
            daily_pnl: Cell::currency(risk.daily_pnl),
            max_drawdown: format!("{:.2}%", drawdown),
            consecutive: format!(
                "{}W / {}L",
                risk.consecutive_wins.unwrap_or(0),
                risk.consecutive_losses.unwrap_or(0)
            ),
            daily_bar: ProgressBar::new(
                ratio_pct(daily_pnl, risk.daily_loss_limit).abs(),
                daily_pnl < 0.0,
            ),
            drawdown_bar: ProgressBar::new(ratio_pct(drawdown, risk.max_drawdown_limit), true),
            circuit_breaker: risk.circuit_breaker,
        }
    }

    pub fn circuit_label(&self) -> &'static str {
        if self.circuit_breaker {
            "ACTIVE"
        } else {
            "OK"
        }
    }
}

/// `value / limit * 100`, zero when the limit is missing or zero
fn ratio_pct(value: f64, limit: Option<f64>) -> f64 {
    match limit {
        Some(limit) if limit != 0.0 && limit.is_finite() => value / limit * 100.0,
        _ => 0.0,
    }
}

// ============================================================================
// Trades
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRow {
    pub side: Side,
    pub mode: TradingMode,
    pub win: bool,
    pub pnl: Cell,
    pub prices: String,
    pub exit_reason: String,
    pub hold: String,
    pub pnl_percent: Cell,
    pub closed_at: Option<DateTime<Utc>>,
}

impl TradeRow {
    pub fn new(trade: &Trade) -> Self {
        let win = trade.pnl.is_some_and(|pnl| pnl > 0.0);
        Self {
            side: trade.side,
            mode: trade.trading_mode.unwrap_or(TradingMode::Paper),
            win,
            pnl: Cell::win_loss(trade.pnl),
            prices: format!(
                "{} → {}",
                format_currency(trade.entry_price),
                format_currency(trade.exit_price)
            ),
            exit_reason: trade.exit_reason.clone().unwrap_or_else(|| "--".to_string()),
            hold: format_hold_time(trade.hold_duration.unwrap_or(0.0) * 3600.0),
            pnl_percent: Cell::new(format_percent(trade.pnl_percent), Tone::of(trade.pnl_percent)),
            closed_at: trade.closed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TradesBody {
    Rows(Vec<TradeRow>),
    Empty(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradesPanel {
    /// Mode filter the list was fetched with
    pub mode: Option<TradingMode>,
    pub body: TradesBody,
}

impl TradesPanel {
    pub fn new(trades: &TradesResponse, mode: Option<TradingMode>) -> Self {
        let body = if trades.trades.is_empty() {
            TradesBody::Empty(empty_trades_message(mode))
        } else {
            TradesBody::Rows(trades.trades.iter().map(TradeRow::new).collect())
        };
        Self { mode, body }
    }
}

pub fn empty_trades_message(mode: Option<TradingMode>) -> String {
    match mode {
        Some(mode) => format!("No trades yet ({mode} mode)"),
        None => "No trades yet".to_string(),
    }
}

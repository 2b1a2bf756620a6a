/// Signal log view
///
/// Caches the most recent `api/signals` batch and renders it through a client-side
/// filter. Changing the filter never touches the network; changing the window does.
use crate::shared::{
    format::{format_clock, format_grouped, format_rate},
    types::{Side, SignalRecord, SignalStats, SignalsResponse},
};
use chrono::{Local, TimeZone};
use std::{fmt, str::FromStr};

/// Selectable signal windows, in hours
pub const SIGNAL_WINDOWS: [u32; 6] = [1, 6, 12, 24, 48, 168];

pub const LOADING_PLACEHOLDER: &str = "Loading signals...";
pub const EMPTY_PLACEHOLDER: &str = "No signals found";
pub const ERROR_PLACEHOLDER: &str = "Error loading signals";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalFilter {
    #[default]
    All,
    Executed,
    Rejected,
}

impl SignalFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalFilter::All => "all",
            SignalFilter::Executed => "executed",
            SignalFilter::Rejected => "rejected",
        }
    }

    /// Next filter in the key cycle
    pub fn next(&self) -> Self {
        match self {
            SignalFilter::All => SignalFilter::Executed,
            SignalFilter::Executed => SignalFilter::Rejected,
            SignalFilter::Rejected => SignalFilter::All,
        }
    }

    pub fn matches(&self, record: &SignalRecord) -> bool {
        match self {
            SignalFilter::All => true,
            SignalFilter::Executed => record.executed,
            SignalFilter::Rejected => !record.executed,
        }
    }
}

impl FromStr for SignalFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(SignalFilter::All),
            "executed" => Ok(SignalFilter::Executed),
            "rejected" => Ok(SignalFilter::Rejected),
            other => Err(format!("unknown signal filter: {other}")),
        }
    }
}

impl fmt::Display for SignalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Window following `hours` in [`SIGNAL_WINDOWS`], wrapping around
pub fn next_window(hours: u32) -> u32 {
    SIGNAL_WINDOWS
        .iter()
        .position(|h| *h == hours)
        .map(|idx| SIGNAL_WINDOWS[(idx + 1) % SIGNAL_WINDOWS.len()])
        .unwrap_or(SIGNAL_WINDOWS[0])
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum LoadState {
    #[default]
    Pending,
    Loaded,
    Failed,
}

/// One rendered table row
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRow {
    pub time: String,
    pub side: Side,
    pub confidence: String,
    pub entry: String,
    pub stop: String,
    pub target: String,
    pub conditions: String,
    pub executed: bool,
    pub status: String,
    pub rejection: String,
}

impl SignalRow {
    pub fn new<Tz: TimeZone>(record: &SignalRecord, zone: &Tz) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        let entry = record.entry_price;
        let level = |label: &str, price: Option<f64>| match price {
            Some(price) => format!(
                "{label}: ${:.2} ({})",
                price,
                distance_pct(entry, price)
                    .map(|pct| format!("{pct:.2}%"))
                    .unwrap_or_else(|| "--".to_string())
            ),
            None => format!("{label}: --"),
        };

        Self {
            time: format_clock(record.timestamp, zone),
            side: record.side,
            confidence: match record.confidence {
                Some(c) => format!("{}%", trim_number(c)),
                None => "--%".to_string(),
            },
            entry: match entry {
                Some(price) => format!("${}", format_grouped(price, 2)),
                None => "--".to_string(),
            },
            stop: level("SL", record.stop_loss),
            target: level("TP", record.take_profit),
            conditions: record.conditions.clone().unwrap_or_else(|| "N/A".to_string()),
            executed: record.executed,
            status: record
                .execution_status
                .clone()
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            rejection: record
                .rejection_reason
                .clone()
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// `(level - entry) / entry * 100`
pub fn distance_pct(entry: Option<f64>, level: f64) -> Option<f64> {
    entry
        .filter(|e| *e != 0.0 && e.is_finite())
        .map(|e| (level - e) / e * 100.0)
}

/// Table body: rows, or a placeholder spanning every column
#[derive(Debug, Clone, PartialEq)]
pub enum SignalBody {
    Rows(Vec<SignalRow>),
    Placeholder(&'static str),
}

/// Stats header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalStatsView {
    pub total: u64,
    pub executed: u64,
    pub rejected: u64,
    pub execution_rate: String,
}

#[derive(Debug, Clone, Default)]
pub struct SignalLog {
    records: Vec<SignalRecord>,
    stats: Option<SignalStats>,
    filter: SignalFilter,
    hours: u32,
    state: LoadState,
    has_batch: bool,
    last_error: Option<String>,
}

impl SignalLog {
    pub fn new(hours: u32) -> Self {
        Self {
            hours,
            ..Default::default()
        }
    }

    pub fn filter(&self) -> SignalFilter {
        self.filter
    }

    pub fn hours(&self) -> u32 {
        self.hours
    }

    pub fn records(&self) -> &[SignalRecord] {
        &self.records
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Replace the cache with a freshly fetched batch
    pub fn apply_batch(&mut self, response: SignalsResponse) {
        self.records = response.signals;
        self.stats = response.stats;
        self.state = LoadState::Loaded;
        self.has_batch = true;
        self.last_error = None;
    }

    /// Record a failed fetch; the cache is kept for later filter changes
    pub fn mark_error(&mut self, reason: impl Into<String>) {
        self.state = LoadState::Failed;
        self.last_error = Some(reason.into());
    }

    /// Change the filter. Re-renders from the cache only.
    pub fn set_filter(&mut self, filter: SignalFilter) {
        self.filter = filter;
        if self.state == LoadState::Failed {
            self.state = if self.has_batch {
                LoadState::Loaded
            } else {
                LoadState::Pending
            };
        }
    }

    /// Change the window. Returns whether a fetch is needed.
    pub fn set_hours(&mut self, hours: u32) -> bool {
        let changed = self.hours != hours;
        self.hours = hours;
        changed
    }

    /// Cached records passing the current filter
    pub fn filtered(&self) -> impl Iterator<Item = &SignalRecord> {
        let filter = self.filter;
        self.records.iter().filter(move |r| filter.matches(r))
    }

    pub fn body(&self) -> SignalBody {
        self.body_in(&Local)
    }

    pub fn body_in<Tz: TimeZone>(&self, zone: &Tz) -> SignalBody
    where
        Tz::Offset: fmt::Display,
    {
        match self.state {
            LoadState::Pending => return SignalBody::Placeholder(LOADING_PLACEHOLDER),
            LoadState::Failed => return SignalBody::Placeholder(ERROR_PLACEHOLDER),
            LoadState::Loaded => {}
        }
        let rows: Vec<_> = self.filtered().map(|r| SignalRow::new(r, zone)).collect();
        if rows.is_empty() {
            SignalBody::Placeholder(EMPTY_PLACEHOLDER)
        } else {
            SignalBody::Rows(rows)
        }
    }

    /// Server stats when supplied, otherwise derived from the cached batch
    pub fn stats_view(&self) -> SignalStatsView {
        match &self.stats {
            Some(stats) => SignalStatsView {
                total: stats.total.unwrap_or(0),
                executed: stats.executed.unwrap_or(0),
                rejected: stats.rejected.unwrap_or(0),
                execution_rate: format_rate(stats.execution_rate.unwrap_or(0.0)),
            },
            None => {
                let total = self.records.len() as u64;
                let executed = self.records.iter().filter(|r| r.executed).count() as u64;
                let rate = if total == 0 {
                    0.0
                } else {
                    executed as f64 / total as f64 * 100.0
                };
                SignalStatsView {
                    total,
                    executed,
                    rejected: total - executed,
                    execution_rate: format_rate(rate),
                }
            }
        }
    }
}

/// `72` for whole numbers, `72.5` otherwise
fn trim_number(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

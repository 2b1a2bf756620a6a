/// Dashboard configuration
///
/// Defaults match the scalping bot's web process on localhost. Every field can be
/// overridden from the environment with [`DashboardConfig::from_env`].
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Polling and display configuration
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Base URL the `api/*` paths are joined onto
    pub base_url: String,
    /// Full refresh cycle period
    pub refresh_interval: Duration,
    /// Cosmetic countdown tick
    pub countdown_tick: Duration,
    /// Signals view period
    pub signals_interval: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// `limit` sent with `api/trades`
    pub trades_limit: usize,
    /// `limit` sent with `api/signals`
    pub signals_limit: usize,
    /// Initial signals window in hours
    pub signals_hours: u32,
    /// Capital the balance change is measured against
    pub initial_capital: f64,
    /// Position slots shown as `count/max`
    pub max_positions: u32,
    /// A feed with no success within `stale_factor` intervals is stale
    pub stale_factor: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/".to_string(),
            refresh_interval: Duration::from_millis(5000),
            countdown_tick: Duration::from_millis(1000),
            signals_interval: Duration::from_millis(10_000),
            request_timeout: Duration::from_secs(10),
            trades_limit: 10,
            signals_limit: 50,
            signals_hours: 24,
            initial_capital: 1000.0,
            max_positions: 2,
            stale_factor: 3,
        }
    }
}

impl DashboardConfig {
    /// Create a new configuration with custom base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Build from environment variables, falling back to defaults for anything unset or
    /// unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("DASHBOARD_URL").unwrap_or(defaults.base_url),
            refresh_interval: env_millis("REFRESH_MS").unwrap_or(defaults.refresh_interval),
            countdown_tick: defaults.countdown_tick,
            signals_interval: env_millis("SIGNALS_REFRESH_MS")
                .unwrap_or(defaults.signals_interval),
            request_timeout: env_millis("REQUEST_TIMEOUT_MS").unwrap_or(defaults.request_timeout),
            trades_limit: env_parse("TRADES_LIMIT").unwrap_or(defaults.trades_limit),
            signals_limit: env_parse("SIGNALS_LIMIT").unwrap_or(defaults.signals_limit),
            signals_hours: env_parse("SIGNALS_HOURS").unwrap_or(defaults.signals_hours),
            initial_capital: env_parse("INITIAL_CAPITAL").unwrap_or(defaults.initial_capital),
            max_positions: env_parse("MAX_POSITIONS").unwrap_or(defaults.max_positions),
            stale_factor: defaults.stale_factor,
        }
    }

    /// Set refresh cycle period
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set signals view period
    pub fn with_signals_interval(mut self, interval: Duration) -> Self {
        self.signals_interval = interval;
        self
    }

    /// Set per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_trades_limit(mut self, limit: usize) -> Self {
        self.trades_limit = limit;
        self
    }

    pub fn with_signals_limit(mut self, limit: usize) -> Self {
        self.signals_limit = limit;
        self
    }

    pub fn with_signals_hours(mut self, hours: u32) -> Self {
        self.signals_hours = hours;
        self
    }

    pub fn with_initial_capital(mut self, capital: f64) -> Self {
        self.initial_capital = capital;
        self
    }

    pub fn with_max_positions(mut self, max: u32) -> Self {
        self.max_positions = max;
        self
    }

    /// Parse the base URL, adding the trailing slash `Url::join` needs to keep a path prefix.
    pub fn base(&self) -> Result<Url, url::ParseError> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw)
    }

    /// Age after which a feed polled every `interval` counts as stale
    pub fn stale_after(&self, interval: Duration) -> Duration {
        interval * self.stale_factor.max(1)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        warn!(key, value = %raw, "ignoring unparsable environment override");
    }
    parsed
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key)
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// Dashboard controller and view-model
///
/// [`Dashboard`] owns the feed source and the shared [`DashboardState`]. Every fetcher
/// awaits its request without holding the lock, then takes the lock once to swap its
/// panel in. A failed fetch leaves the region's previous panel on screen.
use crate::shared::{
    classify::{IndicatorClassifier, IndicatorView},
    client::FeedSource,
    config::DashboardConfig,
    error::FeedError,
    panels::{IndicatorPanel, PerformancePanel, RiskPanel, StatusPanel, TradesPanel},
    scheduler::{job, Countdown, Job},
    signal_log::{next_window, SignalFilter, SignalLog},
    types::{Feed, HealthResponse, IndicatorSet, TradingMode},
};
use chrono::{DateTime, Utc};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Poll health of one feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedHealth {
    /// Start of tracking, stands in for the last success until the first one
    pub tracked_since: DateTime<Utc>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u64,
}

impl FeedHealth {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            tracked_since: now,
            last_success: None,
            last_error: None,
            consecutive_failures: 0,
        }
    }

    /// No success within `stale_after`
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        let since = self.last_success.unwrap_or(self.tracked_since);
        let Ok(limit) = chrono::Duration::from_std(stale_after) else {
            return false;
        };
        now - since > limit
    }

    fn record_success(&mut self, now: DateTime<Utc>) {
        self.last_success = Some(now);
        self.last_error = None;
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self, error: &FeedError) {
        self.last_error = Some(error.to_string());
        self.consecutive_failures += 1;
    }
}

/// View-model drawn by the terminal UI.
///
/// Each panel is written by exactly one feed; `None` until that feed first succeeds.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub status: Option<StatusPanel>,
    pub indicators: Option<IndicatorPanel>,
    pub analysis: Option<IndicatorView>,
    pub performance: Option<PerformancePanel>,
    pub risk: Option<RiskPanel>,
    pub trades: Option<TradesPanel>,
    /// Trades mode filter, `None` for all modes
    pub trade_mode: Option<TradingMode>,
    pub signal_log: SignalLog,
    pub classifier: IndicatorClassifier,
    pub health: BTreeMap<Feed, FeedHealth>,
    pub countdown: Countdown,
    pub last_update: Option<DateTime<Utc>>,
    pub server: Option<HealthResponse>,
}

impl DashboardState {
    pub fn new(config: &DashboardConfig, now: DateTime<Utc>) -> Self {
        Self {
            status: None,
            indicators: None,
            analysis: None,
            performance: None,
            risk: None,
            trades: None,
            trade_mode: None,
            signal_log: SignalLog::new(config.signals_hours),
            classifier: IndicatorClassifier::new(),
            health: Feed::ALL
                .into_iter()
                .map(|feed| (feed, FeedHealth::new(now)))
                .collect(),
            countdown: Countdown::new(
                (config.refresh_interval.as_millis() / config.countdown_tick.as_millis().max(1))
                    as u32,
            ),
            last_update: None,
            server: None,
        }
    }

    /// Base step of the indicators pipeline: raw readout
    pub fn apply_indicator_panel(&mut self, mut panel: IndicatorPanel) {
        if panel.rsi_bar_pct.is_none() {
            panel.rsi_bar_pct = self.indicators.as_ref().and_then(|p| p.rsi_bar_pct);
        }
        self.indicators = Some(panel);
    }

    /// Classifier step of the indicators pipeline. Advances the EMA history once.
    pub fn apply_classification(&mut self, set: &IndicatorSet) {
        let view = self.classifier.classify(set);
        let view = match &self.analysis {
            Some(previous) => view.retain_from(previous),
            None => view,
        };
        self.analysis = Some(view);
    }

    /// Feeds with no success within `stale_factor` of their poll period
    pub fn stale_feeds(
        &self,
        config: &DashboardConfig,
        now: DateTime<Utc>,
    ) -> Vec<(Feed, Option<DateTime<Utc>>)> {
        self.health
            .iter()
            .filter(|(feed, health)| {
                health.is_stale(now, config.stale_after(poll_period(config, **feed)))
            })
            .map(|(feed, health)| (*feed, health.last_success))
            .collect()
    }

    fn record_success(&mut self, feed: Feed, now: DateTime<Utc>) {
        self.health
            .entry(feed)
            .or_insert_with(|| FeedHealth::new(now))
            .record_success(now);
    }

    fn record_failure(&mut self, error: &FeedError, now: DateTime<Utc>) {
        self.health
            .entry(error.feed())
            .or_insert_with(|| FeedHealth::new(now))
            .record_failure(error);
    }
}

fn poll_period(config: &DashboardConfig, feed: Feed) -> Duration {
    match feed {
        Feed::Signals => config.signals_interval,
        _ => config.refresh_interval,
    }
}

/// Clears the refresh cycle flag when the cycle ends
struct CycleGuard(Arc<AtomicBool>);

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Polling controller
pub struct Dashboard<S> {
    source: Arc<S>,
    state: Arc<Mutex<DashboardState>>,
    config: Arc<DashboardConfig>,
    cycle_in_flight: Arc<AtomicBool>,
}

impl<S> Clone for Dashboard<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            state: self.state.clone(),
            config: self.config.clone(),
            cycle_in_flight: self.cycle_in_flight.clone(),
        }
    }
}

impl<S> Dashboard<S>
where
    S: FeedSource + 'static,
{
    pub fn new(source: S, config: DashboardConfig) -> Self {
        let state = DashboardState::new(&config, Utc::now());
        Self {
            source: Arc::new(source),
            state: Arc::new(Mutex::new(state)),
            config: Arc::new(config),
            cycle_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Copy of the view-model for drawing
    pub async fn snapshot(&self) -> DashboardState {
        self.state.lock().await.clone()
    }

    /// One refresh cycle: every feed except signals, concurrently.
    ///
    /// Never fails; each fetcher records its own outcome. `last_update` is stamped once all
    /// have settled. Scheduled and manual cycles share one in-flight flag: a cycle started
    /// while another is running is skipped and `false` is returned.
    pub async fn fetch_all(&self) -> bool {
        if self
            .cycle_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("refresh cycle already in flight, skipping");
            return false;
        }
        let _guard = CycleGuard(self.cycle_in_flight.clone());

        tokio::join!(
            self.fetch_status(),
            self.fetch_indicators(),
            self.fetch_performance(),
            self.fetch_risk(),
            self.fetch_trades(),
        );
        self.state.lock().await.last_update = Some(Utc::now());
        debug!("refresh cycle complete");
        true
    }

    /// Manual refresh: one guarded cycle plus a signals poll
    pub async fn refresh_now(&self) {
        let (ran, _) = tokio::join!(self.fetch_all(), self.refresh_signals());
        if !ran {
            info!("manual refresh skipped, a refresh cycle is in flight");
        }
    }

    pub async fn fetch_status(&self) {
        match self.source.status().await {
            Ok(response) => {
                let panel = StatusPanel::new(
                    &response,
                    self.config.initial_capital,
                    self.config.max_positions,
                );
                let mut state = self.state.lock().await;
                state.status = Some(panel);
                state.record_success(Feed::Status, Utc::now());
            }
            Err(error) => self.record_failure(error).await,
        }
    }

    /// One fetch, then the base step and the classifier step on the same payload
    pub async fn fetch_indicators(&self) {
        match self.source.indicators().await {
            Ok(set) => {
                let panel = IndicatorPanel::new(&set);
                let mut state = self.state.lock().await;
                state.apply_indicator_panel(panel);
                state.apply_classification(&set);
                state.record_success(Feed::Indicators, Utc::now());
            }
            Err(error) => self.record_failure(error).await,
        }
    }

    pub async fn fetch_performance(&self) {
        match self.source.performance().await {
            Ok(response) => {
                let panel = PerformancePanel::new(&response);
                let mut state = self.state.lock().await;
                state.performance = Some(panel);
                state.record_success(Feed::Performance, Utc::now());
            }
            Err(error) => self.record_failure(error).await,
        }
    }

    pub async fn fetch_risk(&self) {
        match self.source.risk().await {
            Ok(response) => {
                let panel = RiskPanel::new(&response);
                let mut state = self.state.lock().await;
                state.risk = Some(panel);
                state.record_success(Feed::Risk, Utc::now());
            }
            Err(error) => self.record_failure(error).await,
        }
    }

    pub async fn fetch_trades(&self) {
        let mode = self.state.lock().await.trade_mode;
        match self.source.trades(mode, self.config.trades_limit).await {
            Ok(response) => {
                let panel = TradesPanel::new(&response, mode);
                let mut state = self.state.lock().await;
                state.record_success(Feed::Trades, Utc::now());
                if state.trade_mode != mode {
                    debug!(?mode, "discarding trades fetched for a superseded mode");
                    return;
                }
                state.trades = Some(panel);
            }
            Err(error) => self.record_failure(error).await,
        }
    }

    /// Fetch the signals batch for the current window into the cache
    pub async fn refresh_signals(&self) {
        let hours = self.state.lock().await.signal_log.hours();
        match self.source.signals(self.config.signals_limit, hours).await {
            Ok(response) => {
                let mut state = self.state.lock().await;
                state.record_success(Feed::Signals, Utc::now());
                if state.signal_log.hours() != hours {
                    debug!(hours, "discarding signals fetched for a superseded window");
                    return;
                }
                state.signal_log.apply_batch(response);
            }
            Err(error) => {
                let mut state = self.state.lock().await;
                if state.signal_log.hours() == hours {
                    state.signal_log.mark_error(error.to_string());
                } else {
                    debug!(hours, "ignoring failure for a superseded signals window");
                }
                drop(state);
                self.record_failure(error).await;
            }
        }
    }

    /// Switch the trades filter. Issues exactly one trades fetch.
    pub async fn set_trade_mode(&self, mode: Option<TradingMode>) {
        self.state.lock().await.trade_mode = mode;
        info!(mode = mode.map(|m| m.as_str()).unwrap_or("all"), "trade mode changed");
        self.fetch_trades().await;
    }

    /// all → live → paper → all
    pub async fn cycle_trade_mode(&self) {
        let next = match self.state.lock().await.trade_mode {
            None => Some(TradingMode::Live),
            Some(TradingMode::Live) => Some(TradingMode::Paper),
            Some(TradingMode::Paper) => None,
        };
        self.set_trade_mode(next).await;
    }

    /// Switch the signal filter. Re-renders from the cache, no request.
    pub async fn set_signal_filter(&self, filter: SignalFilter) {
        self.state.lock().await.signal_log.set_filter(filter);
        debug!(%filter, "signal filter changed");
    }

    pub async fn cycle_signal_filter(&self) {
        let next = self.state.lock().await.signal_log.filter().next();
        self.set_signal_filter(next).await;
    }

    /// Switch the signal window. Issues exactly one signals fetch when the window changes.
    pub async fn set_signal_hours(&self, hours: u32) {
        let changed = self.state.lock().await.signal_log.set_hours(hours);
        if changed {
            info!(hours, "signal window changed");
            self.refresh_signals().await;
        }
    }

    /// Step to the next window in the key cycle
    pub async fn cycle_signal_hours(&self) {
        let next = next_window(self.state.lock().await.signal_log.hours());
        self.set_signal_hours(next).await;
    }

    /// Advance the cosmetic countdown
    pub async fn tick_countdown(&self) -> u32 {
        self.state.lock().await.countdown.tick()
    }

    /// Query `health` once and log the server identity
    pub async fn probe_health(&self) -> Result<HealthResponse, FeedError> {
        let health = self.source.health().await?;
        info!(
            status = health.status.as_deref().unwrap_or("unknown"),
            service = health.service.as_deref().unwrap_or("unknown"),
            version = health.version.as_deref().unwrap_or("unknown"),
            "dashboard server reachable"
        );
        self.state.lock().await.server = Some(health.clone());
        Ok(health)
    }

    pub fn refresh_job(&self) -> Job {
        let dashboard = self.clone();
        job(move || {
            let dashboard = dashboard.clone();
            async move {
                dashboard.fetch_all().await;
            }
        })
    }

    pub fn signals_job(&self) -> Job {
        let dashboard = self.clone();
        job(move || {
            let dashboard = dashboard.clone();
            async move { dashboard.refresh_signals().await }
        })
    }

    pub fn countdown_job(&self) -> Job {
        let dashboard = self.clone();
        job(move || {
            let dashboard = dashboard.clone();
            async move {
                dashboard.tick_countdown().await;
            }
        })
    }

    async fn record_failure(&self, error: FeedError) {
        warn!(feed = %error.feed(), %error, "feed fetch failed");
        self.state.lock().await.record_failure(&error, Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{
        classify::{MarketRegime, RsiBand, TrendArrow},
        panels::TradesBody,
        signal_log::SignalBody,
        types::{
            Account, PerformanceResponse, RiskResponse, SignalRecord, SignalsResponse,
            StatusResponse, TradesResponse,
        },
    };
    use async_trait::async_trait;
    use std::{
        collections::{HashMap, HashSet, VecDeque},
        sync::Mutex as StdMutex,
    };

    /// Scripted outcome for one request
    #[derive(Debug, Clone, Copy)]
    struct Step {
        delay: Duration,
        fail: bool,
    }

    /// In-memory feed source recording every request
    #[derive(Default)]
    struct StubSource {
        requests: StdMutex<Vec<Feed>>,
        trades_queries: StdMutex<Vec<(Option<TradingMode>, usize)>>,
        signals_queries: StdMutex<Vec<(usize, u32)>>,
        failing: StdMutex<HashSet<Feed>>,
        script: StdMutex<HashMap<Feed, VecDeque<Step>>>,
        emas: StdMutex<VecDeque<f64>>,
        balance: StdMutex<f64>,
        daily_pnl: StdMutex<f64>,
        signals: StdMutex<Vec<SignalRecord>>,
    }

    impl StubSource {
        fn fail(&self, feed: Feed) {
            self.failing.lock().unwrap().insert(feed);
        }

        fn recover(&self, feed: Feed) {
            self.failing.lock().unwrap().remove(&feed);
        }

        /// Queue the outcome of the next unscripted request to `feed`
        fn script(&self, feed: Feed, delay_ms: u64, fail: bool) {
            self.script
                .lock()
                .unwrap()
                .entry(feed)
                .or_default()
                .push_back(Step {
                    delay: Duration::from_millis(delay_ms),
                    fail,
                });
        }

        fn count(&self, feed: Feed) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|f| **f == feed)
                .count()
        }

        async fn hit(&self, feed: Feed) -> Result<(), FeedError> {
            self.requests.lock().unwrap().push(feed);
            let step = self
                .script
                .lock()
                .unwrap()
                .get_mut(&feed)
                .and_then(|steps| steps.pop_front());
            if let Some(step) = step {
                tokio::time::sleep(step.delay).await;
                if step.fail {
                    return Err(FeedError::Timeout { feed });
                }
            }
            if self.failing.lock().unwrap().contains(&feed) {
                return Err(FeedError::Status { feed, status: 503 });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl FeedSource for StubSource {
        async fn status(&self) -> Result<StatusResponse, FeedError> {
            self.hit(Feed::Status).await?;
            Ok(StatusResponse {
                account: Account {
                    balance: Some(*self.balance.lock().unwrap()),
                    ..Default::default()
                },
                ..Default::default()
            })
        }

        async fn indicators(&self) -> Result<IndicatorSet, FeedError> {
            let ema = self.emas.lock().unwrap().pop_front();
            self.hit(Feed::Indicators).await?;
            Ok(IndicatorSet {
                ema_micro: ema,
                rsi: Some(75.0),
                volume_ratio: Some(1.8),
                atr_pct: Some(0.5),
                signal: Some("LONG".to_string()),
                ..Default::default()
            })
        }

        async fn performance(&self) -> Result<PerformanceResponse, FeedError> {
            self.hit(Feed::Performance).await?;
            Ok(PerformanceResponse {
                total_trades: Some(4),
                win_rate: Some(75.0),
                ..Default::default()
            })
        }

        async fn risk(&self) -> Result<RiskResponse, FeedError> {
            self.hit(Feed::Risk).await?;
            Ok(RiskResponse {
                daily_pnl: Some(*self.daily_pnl.lock().unwrap()),
                daily_loss_limit: Some(50.0),
                ..Default::default()
            })
        }

        async fn trades(
            &self,
            mode: Option<TradingMode>,
            limit: usize,
        ) -> Result<TradesResponse, FeedError> {
            self.trades_queries.lock().unwrap().push((mode, limit));
            self.hit(Feed::Trades).await?;
            Ok(TradesResponse::default())
        }

        async fn signals(&self, limit: usize, hours: u32) -> Result<SignalsResponse, FeedError> {
            self.signals_queries.lock().unwrap().push((limit, hours));
            let signals = self.signals.lock().unwrap().clone();
            self.hit(Feed::Signals).await?;
            Ok(SignalsResponse {
                signals,
                stats: None,
            })
        }

        async fn health(&self) -> Result<HealthResponse, FeedError> {
            Ok(HealthResponse {
                status: Some("healthy".to_string()),
                service: Some("scalping-dashboard".to_string()),
                version: Some("2.0".to_string()),
            })
        }
    }

    fn dashboard() -> Dashboard<StubSource> {
        let source = StubSource::default();
        *source.balance.lock().unwrap() = 1000.0;
        *source.daily_pnl.lock().unwrap() = -10.0;
        Dashboard::new(source, DashboardConfig::default())
    }

    #[tokio::test]
    async fn test_fetch_all_populates_every_cycle_panel() {
        let dashboard = dashboard();
        dashboard.fetch_all().await;

        let state = dashboard.snapshot().await;
        assert!(state.status.is_some());
        assert!(state.indicators.is_some());
        assert!(state.performance.is_some());
        assert!(state.risk.is_some());
        assert!(state.trades.is_some());
        assert!(state.last_update.is_some());

        for feed in Feed::CYCLE {
            assert_eq!(dashboard.source().count(feed), 1, "{feed} fetched once");
        }
        assert_eq!(dashboard.source().count(Feed::Signals), 0);
    }

    #[tokio::test]
    async fn test_failed_feed_keeps_previous_panel() {
        let dashboard = dashboard();
        dashboard.fetch_all().await;
        let before = dashboard.snapshot().await.risk;

        dashboard.source().fail(Feed::Risk);
        *dashboard.source().balance.lock().unwrap() = 1050.0;
        *dashboard.source().daily_pnl.lock().unwrap() = -45.0;
        dashboard.fetch_all().await;

        let state = dashboard.snapshot().await;
        assert_eq!(state.risk, before);
        assert_eq!(state.status.as_ref().map(|s| s.balance.as_str()), Some("+$1050.00"));
        assert!(state.performance.is_some());
        assert!(state.trades.is_some());

        let risk = &state.health[&Feed::Risk];
        assert_eq!(risk.consecutive_failures, 1);
        assert_eq!(
            risk.last_error.as_deref(),
            Some("risk: server responded with HTTP 503")
        );
        assert!(state.health[&Feed::Status].last_success.is_some());

        dashboard.source().recover(Feed::Risk);
        dashboard.fetch_all().await;
        let state = dashboard.snapshot().await;
        assert_eq!(state.risk.map(|r| r.daily_pnl.text), Some("-$45.00".to_string()));
        assert_eq!(state.health[&Feed::Risk].consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_indicators_pipeline_runs_both_steps() {
        let dashboard = dashboard();
        dashboard.fetch_indicators().await;

        let state = dashboard.snapshot().await;
        assert_eq!(dashboard.source().count(Feed::Indicators), 1);
        assert_eq!(state.indicators.map(|p| p.rsi.text), Some("75.00".to_string()));

        let analysis = state.analysis.unwrap();
        assert_eq!(analysis.rsi_band, RsiBand::Overbought);
        assert_eq!(analysis.regime, MarketRegime::Trending);
    }

    #[tokio::test]
    async fn test_trade_mode_change_fetches_once() {
        let dashboard = dashboard();
        dashboard.set_trade_mode(Some(TradingMode::Paper)).await;

        assert_eq!(dashboard.source().count(Feed::Trades), 1);
        assert_eq!(
            *dashboard.source().trades_queries.lock().unwrap(),
            vec![(Some(TradingMode::Paper), 10)]
        );

        let state = dashboard.snapshot().await;
        assert_eq!(
            state.trades.map(|t| t.body),
            Some(TradesBody::Empty("No trades yet (paper mode)".to_string()))
        );
    }

    #[tokio::test]
    async fn test_signal_filter_does_not_fetch() {
        let dashboard = dashboard();
        *dashboard.source().signals.lock().unwrap() = vec![
            SignalRecord {
                executed: true,
                ..Default::default()
            },
            SignalRecord::default(),
        ];
        dashboard.refresh_signals().await;
        assert_eq!(dashboard.source().count(Feed::Signals), 1);

        dashboard.set_signal_filter(SignalFilter::Executed).await;
        dashboard.cycle_signal_filter().await;
        assert_eq!(dashboard.source().count(Feed::Signals), 1);

        let state = dashboard.snapshot().await;
        assert_eq!(state.signal_log.filter(), SignalFilter::Rejected);
        match state.signal_log.body() {
            SignalBody::Rows(rows) => assert_eq!(rows.len(), 1),
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_signal_window_change_fetches_exactly_once() {
        let dashboard = dashboard();
        dashboard.refresh_signals().await;

        dashboard.set_signal_hours(6).await;
        dashboard.set_signal_hours(6).await;
        dashboard.set_signal_hours(48).await;

        assert_eq!(
            *dashboard.source().signals_queries.lock().unwrap(),
            vec![(50, 24), (50, 6), (50, 48)]
        );

        dashboard.cycle_signal_hours().await;
        assert_eq!(dashboard.snapshot().await.signal_log.hours(), 168);
        assert_eq!(dashboard.source().count(Feed::Signals), 4);
    }

    #[tokio::test]
    async fn test_signals_error_renders_error_row() {
        let dashboard = dashboard();
        dashboard.source().fail(Feed::Signals);
        dashboard.refresh_signals().await;

        let state = dashboard.snapshot().await;
        assert_eq!(
            state.signal_log.body(),
            SignalBody::Placeholder("Error loading signals")
        );
        assert_eq!(state.health[&Feed::Signals].consecutive_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_refresh_cycles_are_skipped() {
        let dashboard = dashboard();
        dashboard.source().script(Feed::Indicators, 300, false);
        dashboard.source().emas.lock().unwrap().extend([100.0, 101.0]);

        let (first, second) = tokio::join!(dashboard.fetch_all(), dashboard.fetch_all());
        assert!(first);
        assert!(!second);
        assert_eq!(dashboard.source().count(Feed::Indicators), 1);

        let state = dashboard.snapshot().await;
        assert_eq!(state.analysis.map(|a| a.emas[0].value), Some(Some(100.0)));

        // Flag released once the cycle settles
        assert!(dashboard.fetch_all().await);
        let micro = dashboard.snapshot().await.analysis.map(|a| a.emas[0]);
        assert_eq!(micro.and_then(|r| r.value), Some(101.0));
        assert_eq!(micro.and_then(|r| r.trend), Some(TrendArrow::Up));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_during_cycle_fetches_indicators_once() {
        let dashboard = dashboard();
        dashboard.source().script(Feed::Indicators, 300, false);

        let cycle = {
            let dashboard = dashboard.clone();
            tokio::spawn(async move { dashboard.fetch_all().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        dashboard.refresh_now().await;

        assert!(cycle.await.unwrap());
        assert_eq!(dashboard.source().count(Feed::Indicators), 1);
        assert_eq!(dashboard.source().count(Feed::Signals), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trades_for_superseded_mode_are_discarded() {
        let dashboard = dashboard();
        dashboard.source().script(Feed::Trades, 300, false);

        let stale = {
            let dashboard = dashboard.clone();
            tokio::spawn(async move { dashboard.fetch_trades().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        dashboard.set_trade_mode(Some(TradingMode::Live)).await;

        let live = Some(TradesBody::Empty("No trades yet (live mode)".to_string()));
        assert_eq!(dashboard.snapshot().await.trades.map(|t| t.body), live);

        stale.await.unwrap();
        let state = dashboard.snapshot().await;
        assert_eq!(
            *dashboard.source().trades_queries.lock().unwrap(),
            vec![(None, 10), (Some(TradingMode::Live), 10)]
        );
        assert_eq!(state.trades.map(|t| t.body), live);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signals_for_superseded_window_are_discarded() {
        let dashboard = dashboard();
        *dashboard.source().signals.lock().unwrap() = vec![SignalRecord::default()];
        dashboard.source().script(Feed::Signals, 300, false);

        let stale = {
            let dashboard = dashboard.clone();
            tokio::spawn(async move { dashboard.refresh_signals().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        *dashboard.source().signals.lock().unwrap() = vec![];
        dashboard.set_signal_hours(6).await;
        assert_eq!(
            dashboard.snapshot().await.signal_log.body(),
            SignalBody::Placeholder("No signals found")
        );

        stale.await.unwrap();
        let state = dashboard.snapshot().await;
        assert_eq!(state.signal_log.hours(), 6);
        assert!(state.signal_log.records().is_empty());
        assert_eq!(state.signal_log.body(), SignalBody::Placeholder("No signals found"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_for_superseded_window_keeps_rows() {
        let dashboard = dashboard();
        *dashboard.source().signals.lock().unwrap() = vec![SignalRecord::default()];
        dashboard.source().script(Feed::Signals, 300, true);

        let stale = {
            let dashboard = dashboard.clone();
            tokio::spawn(async move { dashboard.refresh_signals().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        dashboard.set_signal_hours(6).await;
        assert!(matches!(dashboard.snapshot().await.signal_log.body(), SignalBody::Rows(_)));

        stale.await.unwrap();
        let state = dashboard.snapshot().await;
        assert!(matches!(state.signal_log.body(), SignalBody::Rows(_)));
        assert_eq!(state.health[&Feed::Signals].consecutive_failures, 1);
        assert_eq!(
            state.health[&Feed::Signals].last_error.as_deref(),
            Some("signals: request timed out")
        );
    }

    #[tokio::test]
    async fn test_probe_health_records_server() {
        let dashboard = dashboard();
        let health = dashboard.probe_health().await.unwrap();
        assert_eq!(health.status.as_deref(), Some("healthy"));
        assert!(dashboard.snapshot().await.server.is_some());
    }

    #[tokio::test]
    async fn test_countdown_ticks_from_refresh_period() {
        let dashboard = dashboard();
        let shown = [
            dashboard.tick_countdown().await,
            dashboard.tick_countdown().await,
            dashboard.tick_countdown().await,
            dashboard.tick_countdown().await,
            dashboard.tick_countdown().await,
            dashboard.tick_countdown().await,
        ];
        assert_eq!(shown, [4, 3, 2, 1, 0, 4]);
    }

    #[test]
    fn test_feed_health_staleness() {
        let start = DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut health = FeedHealth::new(start);
        let window = Duration::from_secs(15);

        assert!(!health.is_stale(start + chrono::Duration::seconds(15), window));
        assert!(health.is_stale(start + chrono::Duration::seconds(16), window));

        health.record_success(start + chrono::Duration::seconds(20));
        assert!(!health.is_stale(start + chrono::Duration::seconds(30), window));
        assert!(health.is_stale(start + chrono::Duration::seconds(36), window));
    }

    #[test]
    fn test_stale_feeds_use_their_own_period() {
        let config = DashboardConfig::default();
        let start = DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let state = DashboardState::new(&config, start);

        // 20s: refresh feeds (15s window) are stale, signals (30s window) are not
        let stale = state.stale_feeds(&config, start + chrono::Duration::seconds(20));
        let feeds: Vec<_> = stale.iter().map(|(feed, _)| *feed).collect();
        assert_eq!(feeds, Feed::CYCLE.to_vec());
    }
}

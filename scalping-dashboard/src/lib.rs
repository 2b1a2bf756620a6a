/// Scalping Dashboard - Shared Library
///
/// Terminal presentation layer for the scalping bot's JSON API. The library provides:
/// - Wire types and lenient decoding for every `api/*` feed
/// - An HTTP feed source behind the `FeedSource` trait
/// - The polling controller and its `DashboardState` view-model
/// - Indicator classification, signal log filtering and display panels
/// - Periodic schedulers with an in-flight overlap guard
/// - Ratatui rendering of the view-model
pub mod shared;

// Re-export commonly used types for convenience
pub use shared::types::{
    Feed, IndicatorSet, Side, SignalRecord, StatusResponse, Trade, TradingMode,
};

pub use shared::client::{FeedSource, HttpFeedSource};
pub use shared::config::DashboardConfig;
pub use shared::error::{ClientError, FeedError};

pub use shared::classify::{IndicatorClassifier, IndicatorView};
pub use shared::dashboard::{Dashboard, DashboardState, FeedHealth};
pub use shared::logging::{init_logging, log_path_from_env};
pub use shared::scheduler::{Countdown, Scheduler, SchedulerHandle};
pub use shared::signal_log::{next_window, SignalFilter, SignalLog};
pub use shared::widget::render_dashboard;

/// Shared modules for the scalping dashboard
pub mod classify;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod format;
pub mod logging;
pub mod panels;
pub mod scheduler;
pub mod signal_log;
pub mod types;
pub mod widget;

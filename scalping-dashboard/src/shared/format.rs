//! Display formatting for dashboard values.
//!
//! Every formatter takes `Option` input: a missing or non-finite value renders as a
//! fixed placeholder, never a panic.

use chrono::{DateTime, TimeZone, Utc};
use std::fmt::Display;

/// Placeholder for a missing value
pub const PLACEHOLDER: &str = "--";

/// Signed currency with two decimals: `+$12.34`, `-$5.00`. Absent input gives `$0.00`.
pub fn format_currency(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) if v < 0.0 => format!("-${:.2}", v.abs()),
        Some(v) => format!("+${:.2}", v),
        None => "$0.00".to_string(),
    }
}

/// Signed percent with two decimals: `+1.25%`. Absent input gives `0.00%`.
pub fn format_percent(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) if v < 0.0 => format!("{:.2}%", v),
        Some(v) => format!("+{:.2}%", v),
        None => "0.00%".to_string(),
    }
}

/// Unsigned fixed-point number, or `--`
pub fn format_fixed(value: Option<f64>, decimals: usize) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{:.*}", decimals, v),
        None => PLACEHOLDER.to_string(),
    }
}

/// Price with thousands separators: `67,012.50`
pub fn format_grouped(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Percentage without sign, trimming a zero fraction: `60%`, `62.5%`
pub fn format_rate(value: f64) -> String {
    if !value.is_finite() {
        return "0%".to_string();
    }
    if (value - value.round()).abs() < 1e-9 {
        format!("{:.0}%", value)
    } else {
        format!("{:.1}%", value)
    }
}

/// Hold duration from seconds: `59s`, `1m`, `59m`, `1h 0m`
pub fn format_hold_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    if seconds < 60 {
        return format!("{seconds}s");
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m");
    }
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// Elapsed time as `M:SS`, used for live position age
pub fn format_elapsed(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = (now - start).num_seconds().max(0);
    format!("{}:{:02}", elapsed / 60, elapsed % 60)
}

/// Relative timestamp in the viewer's time zone.
///
/// Same day: `Today 14:03:22`; previous day: `Yesterday 23:10`; otherwise `Mar 4 09:15`.
pub fn format_timestamp<Tz>(timestamp: Option<DateTime<Utc>>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let Some(timestamp) = timestamp else {
        return PLACEHOLDER.to_string();
    };
    let local = timestamp.with_timezone(&now.timezone());
    let today = now.date_naive();

    if local.date_naive() == today {
        return format!("Today {}", local.format("%H:%M:%S"));
    }
    if today.pred_opt() == Some(local.date_naive()) {
        return format!("Yesterday {}", local.format("%H:%M"));
    }
    local.format("%b %-d %H:%M").to_string()
}

/// Wall-clock `HH:MM` in the given zone
pub fn format_clock<Tz>(timestamp: Option<DateTime<Utc>>, zone: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match timestamp {
        Some(ts) => ts.with_timezone(zone).format("%H:%M").to_string(),
        None => PLACEHOLDER.to_string(),
    }
}

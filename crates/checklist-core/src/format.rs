use chrono::{DateTime, NaiveDate, Utc};

pub const NO_DEADLINE: &str = "No deadline";

// Halves round up, also for negative values.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Age of `created_at` as seen from `now`: "just now", "5 mins ago", ...
/// Weeks is the largest unit.
pub fn format_relative(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff_ms = (now - created_at).num_milliseconds() as f64;

    let minutes = round_half_up(diff_ms / 60_000.0);
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes == 1 {
        return "1 min ago".to_string();
    }
    if minutes < 60 {
        return format!("{minutes} mins ago");
    }

    let hours = round_half_up(minutes as f64 / 60.0);
    if hours == 1 {
        return "1 hour ago".to_string();
    }
    if hours < 24 {
        return format!("{hours} hours ago");
    }

    let days = round_half_up(hours as f64 / 24.0);
    if days == 1 {
        return "1 day ago".to_string();
    }
    if days < 7 {
        return format!("{days} days ago");
    }

    let weeks = round_half_up(days as f64 / 7.0);
    if weeks == 1 {
        return "1 week ago".to_string();
    }
    format!("{weeks} weeks ago")
}

pub fn format_due(due: Option<NaiveDate>) -> String {
    match due {
        Some(date) => date.format("%d %b %Y").to_string(),
        None => NO_DEADLINE.to_string(),
    }
}

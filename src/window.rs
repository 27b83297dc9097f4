use std::time::SystemTime;

const SECONDS_PER_HOUR: u64 = 3600;
const HOURS_PER_DAY: u64 = 24;
const HOURS_PER_WEEK: u64 = 7 * HOURS_PER_DAY;

/// One-day historical sampling slice taken `weeks_ago` weeks back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookbackWindow {
    pub weeks_ago: u64,
    pub start_hours_ago: u64,
    pub end_hours_ago: u64,
}

impl LookbackWindow {
    pub fn label(&self) -> String {
        format!("{}w", self.weeks_ago)
    }

    /// Header used for the delta column, e.g. `Δ-3w`.
    pub fn delta_label(&self) -> String {
        format!("\u{0394}-{}", self.label())
    }

    pub fn start_param(&self) -> String {
        format!("{}h-ago", self.start_hours_ago)
    }

    pub fn end_param(&self) -> String {
        format!("{}h-ago", self.end_hours_ago)
    }

    pub fn start_timestamp(&self, now: Option<SystemTime>) -> f64 {
        hours_before(self.start_hours_ago, now)
    }

    pub fn end_timestamp(&self, now: Option<SystemTime>) -> f64 {
        hours_before(self.end_hours_ago, now)
    }
}

fn hours_before(hours: u64, now: Option<SystemTime>) -> f64 {
    let reference = now.unwrap_or_else(SystemTime::now);
    let reference_secs = reference
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();
    reference_secs - (hours * SECONDS_PER_HOUR) as f64
}

#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("weeks must be at least 1 (got {0})")]
    InvalidWeeks(i64),
}

pub fn build_window(weeks_ago: i64) -> Result<LookbackWindow, WindowError> {
    if weeks_ago < 1 {
        return Err(WindowError::InvalidWeeks(weeks_ago));
    }
    let weeks = weeks_ago as u64;
    let start_hours_ago = weeks * HOURS_PER_WEEK;
    Ok(LookbackWindow {
        weeks_ago: weeks,
        start_hours_ago,
        end_hours_ago: start_hours_ago - HOURS_PER_DAY,
    })
}

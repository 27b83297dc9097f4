use std::cmp::Ordering;
use std::fmt;

use crate::metrics::Counts;

/// Follower change over the lookback window.
///
/// `Unknown` orders below every `Known` value, so accounts without history
/// always rank last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    Unknown,
    Known(i64),
}

impl Ord for Delta {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Delta::Unknown, Delta::Unknown) => Ordering::Equal,
            (Delta::Unknown, Delta::Known(_)) => Ordering::Less,
            (Delta::Known(_), Delta::Unknown) => Ordering::Greater,
            (Delta::Known(a), Delta::Known(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Delta {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delta::Known(value) => write!(f, "{value}"),
            Delta::Unknown => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountReport {
    pub username: String,
    pub current_count: i64,
    pub count_at_window_start: Option<i64>,
    pub delta: Delta,
}

impl AccountReport {
    pub fn new(username: impl Into<String>, current_count: i64, baseline: Option<i64>) -> Self {
        let delta = match baseline {
            Some(start) => Delta::Known(current_count - start),
            None => Delta::Unknown,
        };
        AccountReport {
            username: username.into(),
            current_count,
            count_at_window_start: baseline,
            delta,
        }
    }

    /// Delta as displayed; blank when the account has no history.
    pub fn delta_text(&self) -> String {
        self.delta.to_string()
    }
}

/// Merge current counts with the window baselines.
///
/// The current set decides which accounts exist: historical-only usernames
/// are dropped.
pub fn aggregate(current: &Counts, historical: &Counts) -> Vec<AccountReport> {
    current
        .iter()
        .map(|(username, &count)| {
            AccountReport::new(username.as_str(), count, historical.get(username).copied())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(entries: &[(&str, i64)]) -> Counts {
        entries
            .iter()
            .map(|(name, count)| (name.to_string(), *count))
            .collect()
    }

    #[test]
    fn one_report_per_current_account() {
        let current = counts(&[("alice", 150), ("bob", 42), ("carol", 7)]);
        let historical = counts(&[("alice", 140), ("zed", 99)]);

        let reports = aggregate(&current, &historical);

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.username != "zed"));
    }

    #[test]
    fn delta_is_exact_difference() {
        let current = counts(&[("alice", 150), ("bob", 30)]);
        let historical = counts(&[("alice", 140), ("bob", 45)]);

        let reports = aggregate(&current, &historical);

        assert_eq!(reports[0].delta, Delta::Known(10));
        assert_eq!(reports[0].count_at_window_start, Some(140));
        assert_eq!(reports[1].delta, Delta::Known(-15));
    }

    #[test]
    fn missing_history_is_unknown() {
        let current = counts(&[("alice", 150), ("bob", 42)]);
        let reports = aggregate(&current, &Counts::new());

        assert!(reports
            .iter()
            .all(|r| r.delta == Delta::Unknown && r.count_at_window_start.is_none()));
        assert_eq!(reports[1].delta_text(), "");
        assert_eq!(reports[1].current_count, 42);
    }

    #[test]
    fn empty_current_yields_nothing() {
        let historical = counts(&[("alice", 140)]);
        assert!(aggregate(&Counts::new(), &historical).is_empty());
    }

    #[test]
    fn unknown_orders_below_any_known_delta() {
        assert!(Delta::Unknown < Delta::Known(i64::MIN));
        assert!(Delta::Known(-1_000_000) < Delta::Known(0));
        assert_eq!(Delta::Unknown.cmp(&Delta::Unknown), Ordering::Equal);
        assert_eq!(Delta::Known(-3).to_string(), "-3");
    }
}

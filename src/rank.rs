use std::cmp::Reverse;

use crate::aggregate::AccountReport;

/// Accounts ordered by delta, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedReport {
    /// Header for the delta column, e.g. `Δ-3w`
    pub delta_label: String,
    pub accounts: Vec<AccountReport>,
}

impl RankedReport {
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Stable sort by delta, descending.
///
/// Equal deltas keep their input order; reports coming from
/// [`aggregate`](crate::aggregate::aggregate) are in username order, so ties
/// end up sorted by username.
pub fn rank(mut reports: Vec<AccountReport>, delta_label: impl Into<String>) -> RankedReport {
    reports.sort_by_key(|report| Reverse(report.delta));
    RankedReport {
        delta_label: delta_label.into(),
        accounts: reports,
    }
}

//! Queue statistics and the admin results listing
//!
//! Decision aggregates cover a trailing window of whole days (today
//! included); pool counts are always current.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::review::ReviewStatus;
use crate::store::{DiscardEntry, ResultEntry};

/// Days covered by the decision aggregates
pub const STATS_WINDOW_DAYS: u32 = 14;

/// Payload field naming the automation that produced a record
pub const AUTOMATISMO_FIELD: &str = "Automatismo";

/// Entries in `top_automatismos`
const TOP_AUTOMATISMOS: usize = 10;

/// Most rows a listing returns
pub const LISTING_LIMIT: usize = 500;

/// Snapshot of the queue for dashboards and the CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    /// Records still in the pending pool
    pub pending: usize,

    /// Pending records nobody holds
    pub available: usize,

    /// Pending records under an unexpired lease
    pub leased: usize,

    /// Width of the decision window in days
    pub window_days: u32,

    /// Decisions per status wire string
    pub results_by_status: BTreeMap<String, usize>,

    /// Decisions per reviewer
    pub by_user: BTreeMap<String, usize>,

    /// Decisions per UTC day, keyed `YYYYMMDD`
    pub by_day: BTreeMap<String, usize>,

    /// Share of decisions in the KO family, `0.0..=1.0`
    pub ko_rate: f64,

    /// Decisions marked DUDA
    pub duda_count: usize,

    /// Most frequent automations, most frequent first
    pub top_automatismos: Vec<(String, usize)>,

    /// Discarded records
    pub discards: usize,
}

impl Stats {
    /// Decisions across every status
    pub fn total_results(&self) -> usize {
        self.results_by_status.values().sum()
    }

    /// Fill the decision aggregates from the entries inside the window
    /// ending at `now`
    pub(crate) fn aggregate(
        &mut self,
        results: &[ResultEntry],
        discards: &[DiscardEntry],
        now: DateTime<Utc>,
    ) {
        let last = now.date_naive();
        let first = last - Duration::days(i64::from(STATS_WINDOW_DAYS) - 1);
        let in_window = |ts: &DateTime<Utc>| (first..=last).contains(&ts.date_naive());

        self.window_days = STATS_WINDOW_DAYS;
        let mut ko = 0;
        let mut automatismos: BTreeMap<String, usize> = BTreeMap::new();

        for result in results.iter().filter(|r| in_window(&r.timestamp)) {
            bump(&mut self.results_by_status, result.status.as_str());
            bump(&mut self.by_user, &result.user);
            bump(&mut self.by_day, &result.timestamp.format("%Y%m%d").to_string());
            bump(&mut automatismos, &result.record.field(AUTOMATISMO_FIELD));
            if result.status.is_ko() {
                ko += 1;
            }
            if result.status == ReviewStatus::Duda {
                self.duda_count += 1;
            }
        }

        let total = self.total_results();
        self.ko_rate = if total == 0 {
            0.0
        } else {
            ko as f64 / total as f64
        };

        let mut ranked: Vec<_> = automatismos.into_iter().collect();
        // Stable sort keeps ties in name order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(TOP_AUTOMATISMOS);
        self.top_automatismos = ranked;

        self.discards = discards
            .iter()
            .filter(|d| in_window(&d.discarded_at))
            .count();
    }
}

fn bump(counts: &mut BTreeMap<String, usize>, key: &str) {
    *counts.entry(key.to_string()).or_insert(0) += 1;
}

/// Filter for the admin results listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultFilter {
    /// Exact reviewer identity
    pub user: Option<String>,

    /// Exact status
    pub status: Option<ReviewStatus>,

    /// Case-insensitive substring of the record id
    pub record_id: Option<String>,
}

impl ResultFilter {
    pub fn matches(&self, result: &ResultEntry) -> bool {
        if let Some(ref user) = self.user {
            if !user.trim().is_empty() && result.user != user.trim() {
                return false;
            }
        }
        if let Some(status) = self.status {
            if result.status != status {
                return false;
            }
        }
        if let Some(ref needle) = self.record_id {
            let needle = needle.trim().to_lowercase();
            if !result.record_id.as_str().to_lowercase().contains(&needle) {
                return false;
            }
        }
        true
    }

    /// Matching entries, newest first, at most `LISTING_LIMIT`
    pub fn apply(&self, results: Vec<ResultEntry>) -> Vec<ResultEntry> {
        let mut rows: Vec<_> = results.into_iter().filter(|r| self.matches(r)).collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(LISTING_LIMIT);
        rows
    }
}

//! Usage statistics engine.
//!
//! Computes leaderboards from normalized result rows:
//! - Date-window and finish-tier filtering
//! - Usage counts and share per combo or part
//! - Drill-down into the rows behind one leaderboard entry
//!
//! [`MonthlyIndex`] answers the same leaderboard queries from monthly
//! pre-aggregated counts and must agree with [`aggregate`] exactly.

mod monthly;

pub use monthly::*;

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

use crate::ingest::{Dataset, Schema, SheetTable};
use crate::models::{FinishTier, GroupKey, Period, ResultRow};

/// A column the active query needs is absent from the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("No {0} column in the sheet")]
    MissingColumn(&'static str),
}

/// One leaderboard line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageEntry {
    pub label: String,
    pub usage: usize,
    /// Percentage of the window total, one decimal
    pub share: f64,
}

/// Usage counts for one (key, period, finish) query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Leaderboard {
    /// Rows passing the window and finish filters
    pub total: usize,
    /// Sorted by usage descending, then label ascending
    pub entries: Vec<UsageEntry>,
}

impl Leaderboard {
    /// Build from per-label counts. Shares are computed against `total`.
    pub fn from_counts(counts: HashMap<String, usize>, total: usize) -> Self {
        let mut entries: Vec<UsageEntry> = counts
            .into_iter()
            .filter(|(_, usage)| *usage > 0)
            .map(|(label, usage)| UsageEntry {
                share: calculate_share(usage, total),
                label,
                usage,
            })
            .collect();

        entries.sort_by(|a, b| b.usage.cmp(&a.usage).then_with(|| a.label.cmp(&b.label)));

        Self { total, entries }
    }

    /// Drop entries used fewer than `min_usage` times. Shares are unchanged.
    pub fn with_min_usage(mut self, min_usage: usize) -> Self {
        self.entries.retain(|e| e.usage >= min_usage);
        self
    }

    pub fn get(&self, label: &str) -> Option<&UsageEntry> {
        self.entries.iter().find(|e| e.label == label)
    }
}

/// Percentage of `total`, rounded to one decimal. A zero total counts as 1.
pub fn calculate_share(usage: usize, total: usize) -> f64 {
    let share = usage as f64 / total.max(1) as f64 * 100.0;
    (share * 10.0).round() / 10.0
}

/// Check that the sheet can answer a query.
pub fn check_schema(schema: &Schema, key: GroupKey, finish: FinishTier) -> Result<(), SchemaError> {
    if finish.needs_placement() && !schema.placement {
        return Err(SchemaError::MissingColumn("Placement"));
    }
    match key.column() {
        Some(column) if !schema.supports(key) => Err(SchemaError::MissingColumn(column)),
        _ => Ok(()),
    }
}

/// Rows inside the period window ending at `now` that pass the finish tier.
pub fn window_rows<'a>(
    dataset: &'a Dataset,
    period: Period,
    finish: FinishTier,
    now: NaiveDateTime,
) -> impl Iterator<Item = &'a ResultRow> + 'a {
    let cutoff = period.cutoff(now);
    dataset
        .rows
        .iter()
        .filter(move |r| r.parsed_date.is_some_and(|d| d >= cutoff))
        .filter(move |r| finish.accepts(r.placement))
}

/// Count usage per group value, recomputing from rows.
pub fn aggregate(
    dataset: &Dataset,
    key: GroupKey,
    period: Period,
    finish: FinishTier,
    now: NaiveDateTime,
) -> Result<Leaderboard, SchemaError> {
    check_schema(&dataset.schema, key, finish)?;

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut total = 0;
    for row in window_rows(dataset, period, finish, now) {
        *counts.entry(row.group_value(key).to_string()).or_default() += 1;
        total += 1;
    }

    Ok(Leaderboard::from_counts(counts, total))
}

/// The rows behind one leaderboard entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Drilldown {
    pub item: String,
    pub usage: usize,
    /// Share of the same window total the leaderboard uses
    pub share: f64,
    pub total: usize,
    /// Newest first, then by event name
    pub rows: Vec<ResultRow>,
}

/// Resolve the rows matching `value` under the same filters as [`aggregate`].
pub fn drilldown(
    dataset: &Dataset,
    key: GroupKey,
    value: &str,
    period: Period,
    finish: FinishTier,
    now: NaiveDateTime,
) -> Result<Drilldown, SchemaError> {
    check_schema(&dataset.schema, key, finish)?;

    let mut total = 0;
    let mut rows: Vec<ResultRow> = Vec::new();
    for row in window_rows(dataset, period, finish, now) {
        total += 1;
        if row.group_value(key) == value {
            rows.push(row.clone());
        }
    }

    rows.sort_by(|a, b| {
        b.parsed_date
            .cmp(&a.parsed_date)
            .then_with(|| a.event.cmp(&b.event))
    });

    Ok(Drilldown {
        item: value.to_string(),
        usage: rows.len(),
        share: calculate_share(rows.len(), total),
        total,
        rows,
    })
}

/// A normalized dataset together with its monthly index.
#[derive(Debug, Clone)]
pub struct Board {
    pub dataset: Dataset,
    pub index: MonthlyIndex,
}

impl Board {
    pub fn new(dataset: Dataset) -> Self {
        let index = MonthlyIndex::build(&dataset);
        Self { dataset, index }
    }

    /// Normalize a sheet and index it.
    pub fn prepare(table: &SheetTable) -> Self {
        Self::new(crate::ingest::normalize(table))
    }

    /// Leaderboard from the monthly index.
    pub fn leaderboard(
        &self,
        key: GroupKey,
        period: Period,
        finish: FinishTier,
        now: NaiveDateTime,
    ) -> Result<Leaderboard, SchemaError> {
        self.index.aggregate(key, period, finish, now)
    }

    pub fn drilldown(
        &self,
        key: GroupKey,
        value: &str,
        period: Period,
        finish: FinishTier,
        now: NaiveDateTime,
    ) -> Result<Drilldown, SchemaError> {
        drilldown(&self.dataset, key, value, period, finish, now)
    }
}

//! Monthly pre-aggregation.
//!
//! One pass over the rows buckets usage per (group key, label, month) for
//! every finish tier. A leaderboard query then sums the buckets at or after
//! the cutoff month instead of rescanning rows.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;

use super::{check_schema, Leaderboard, SchemaError};
use crate::ingest::{Dataset, Schema};
use crate::models::{FinishTier, GroupKey, Period, YearMonth};

/// Row counts per finish tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierCounts {
    pub all: usize,
    pub first: usize,
    pub top3: usize,
}

impl TierCounts {
    pub fn add(&mut self, placement: Option<u32>) {
        self.all += 1;
        if FinishTier::First.accepts(placement) {
            self.first += 1;
        }
        if FinishTier::TopThree.accepts(placement) {
            self.top3 += 1;
        }
    }

    pub fn get(&self, finish: FinishTier) -> usize {
        match finish {
            FinishTier::First => self.first,
            FinishTier::TopThree => self.top3,
            FinishTier::All => self.all,
        }
    }
}

type MonthBuckets = BTreeMap<YearMonth, TierCounts>;

/// Pre-aggregated monthly usage for every group key the sheet supports.
#[derive(Debug, Clone, Default)]
pub struct MonthlyIndex {
    schema: Schema,
    groups: HashMap<GroupKey, HashMap<String, MonthBuckets>>,
}

impl MonthlyIndex {
    /// Bucket every dated row. Undated rows can never fall inside a window.
    pub fn build(dataset: &Dataset) -> Self {
        let mut groups: HashMap<GroupKey, HashMap<String, MonthBuckets>> = HashMap::new();

        for key in GroupKey::ALL {
            if !dataset.schema.supports(key) {
                continue;
            }
            let labels = groups.entry(key).or_default();
            for row in &dataset.rows {
                let Some(month) = row.year_month() else {
                    continue;
                };
                labels
                    .entry(row.group_value(key).to_string())
                    .or_default()
                    .entry(month)
                    .or_default()
                    .add(row.placement);
            }
        }

        Self {
            schema: dataset.schema,
            groups,
        }
    }

    /// Number of distinct labels indexed under `key`.
    pub fn label_count(&self, key: GroupKey) -> usize {
        self.groups.get(&key).map_or(0, HashMap::len)
    }

    /// Same result as [`super::aggregate`] for the same inputs.
    pub fn aggregate(
        &self,
        key: GroupKey,
        period: Period,
        finish: FinishTier,
        now: NaiveDateTime,
    ) -> Result<Leaderboard, SchemaError> {
        check_schema(&self.schema, key, finish)?;

        let cutoff = period.cutoff_month(now);
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut total = 0;

        if let Some(labels) = self.groups.get(&key) {
            for (label, months) in labels {
                let usage: usize = months.range(cutoff..).map(|(_, c)| c.get(finish)).sum();
                if usage > 0 {
                    counts.insert(label.clone(), usage);
                    total += usage;
                }
            }
        }

        Ok(Leaderboard::from_counts(counts, total))
    }
}

//! Tournament result row model.

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::GroupKey;

/// Combo label used when none of the three parts are present.
pub const UNKNOWN_COMBO: &str = "(Unknown Combo)";

/// One participant's placement in one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultRow {
    /// Event name
    pub event: Option<String>,

    /// Date exactly as it appeared in the sheet (trimmed)
    pub date: Option<String>,

    /// Parsed, timezone-naive date
    #[serde(skip)]
    pub parsed_date: Option<NaiveDateTime>,

    /// Number of participants in the event
    pub participants: Option<u32>,

    /// Finishing rank (1 = winner)
    pub placement: Option<u32>,

    pub username: Option<String>,
    pub blade: Option<String>,
    pub ratchet: Option<String>,
    pub bit: Option<String>,

    #[serde(rename = "Assist Blade")]
    pub assist_blade: Option<String>,

    /// Derived "Blade Ratchet Bit" label
    #[serde(skip)]
    pub combo: String,
}

impl ResultRow {
    /// Create a row from its three combo parts, deriving the combo label.
    pub fn new(blade: Option<String>, ratchet: Option<String>, bit: Option<String>) -> Self {
        let combo = combo_label(blade.as_deref(), ratchet.as_deref(), bit.as_deref());
        Self {
            event: None,
            date: None,
            parsed_date: None,
            participants: None,
            placement: None,
            username: None,
            blade,
            ratchet,
            bit,
            assist_blade: None,
            combo,
        }
    }

    /// Builder method to set the event name.
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Builder method to set the parsed date.
    pub fn with_date(mut self, date: NaiveDateTime) -> Self {
        self.date = Some(date.format("%Y-%m-%d").to_string());
        self.parsed_date = Some(date);
        self
    }

    /// Builder method to set the placement.
    pub fn with_placement(mut self, placement: u32) -> Self {
        self.placement = Some(placement);
        self
    }

    /// Value of this row under the given grouping key.
    ///
    /// Missing part values map to the key's unknown sentinel so every row
    /// belongs to exactly one group.
    pub fn group_value(&self, key: GroupKey) -> &str {
        let part = match key {
            GroupKey::Combo => return &self.combo,
            GroupKey::Blade => self.blade.as_deref(),
            GroupKey::Ratchet => self.ratchet.as_deref(),
            GroupKey::Bit => self.bit.as_deref(),
        };
        part.unwrap_or_else(|| key.unknown_label())
    }

    /// Year/month bucket of the parsed date.
    pub fn year_month(&self) -> Option<YearMonth> {
        self.parsed_date.map(|d| YearMonth::new(d.year(), d.month()))
    }
}

/// Join the present combo parts with a space, in Blade/Ratchet/Bit order.
pub fn combo_label(blade: Option<&str>, ratchet: Option<&str>, bit: Option<&str>) -> String {
    let parts: Vec<&str> = [blade, ratchet, bit]
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect();

    if parts.is_empty() {
        UNKNOWN_COMBO.to_string()
    } else {
        parts.join(" ")
    }
}

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }
}

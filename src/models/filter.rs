//! Leaderboard filter dimensions.
//!
//! Each dimension has a URL slug (the value carried in navigation
//! parameters) and a human label (what the controls show).

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::YearMonth;

/// What the leaderboard groups rows by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKey {
    #[default]
    Combo,
    Blade,
    Ratchet,
    Bit,
}

impl GroupKey {
    pub const ALL: [GroupKey; 4] = [
        GroupKey::Combo,
        GroupKey::Blade,
        GroupKey::Ratchet,
        GroupKey::Bit,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            GroupKey::Combo => "combo",
            GroupKey::Blade => "blade",
            GroupKey::Ratchet => "ratchet",
            GroupKey::Bit => "bit",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "combo" => Some(GroupKey::Combo),
            "blade" => Some(GroupKey::Blade),
            "ratchet" => Some(GroupKey::Ratchet),
            "bit" => Some(GroupKey::Bit),
            _ => None,
        }
    }

    /// Control label, e.g. "Top combos".
    pub fn label(&self) -> &'static str {
        match self {
            GroupKey::Combo => "Top combos",
            GroupKey::Blade => "Blades",
            GroupKey::Ratchet => "Ratchets",
            GroupKey::Bit => "Bits",
        }
    }

    /// Singular column heading, e.g. "Combo".
    pub fn thing(&self) -> &'static str {
        match self {
            GroupKey::Combo => "Combo",
            GroupKey::Blade => "Blade",
            GroupKey::Ratchet => "Ratchet",
            GroupKey::Bit => "Bit",
        }
    }

    /// Sheet column backing this key, if it is a raw part.
    pub fn column(&self) -> Option<&'static str> {
        match self {
            GroupKey::Combo => None,
            GroupKey::Blade => Some("Blade"),
            GroupKey::Ratchet => Some("Ratchet"),
            GroupKey::Bit => Some("Bit"),
        }
    }

    /// Label for rows whose value under this key is missing.
    pub fn unknown_label(&self) -> &'static str {
        match self {
            GroupKey::Combo => super::UNKNOWN_COMBO,
            GroupKey::Blade => "(Unknown Blade)",
            GroupKey::Ratchet => "(Unknown Ratchet)",
            GroupKey::Bit => "(Unknown Bit)",
        }
    }
}

/// Placement-based row filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FinishTier {
    #[serde(rename = "1st")]
    First,
    #[default]
    #[serde(rename = "top3")]
    TopThree,
    #[serde(rename = "all")]
    All,
}

impl FinishTier {
    pub const ALL: [FinishTier; 3] = [FinishTier::First, FinishTier::TopThree, FinishTier::All];

    pub fn slug(&self) -> &'static str {
        match self {
            FinishTier::First => "1st",
            FinishTier::TopThree => "top3",
            FinishTier::All => "all",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "1st" => Some(FinishTier::First),
            "top3" => Some(FinishTier::TopThree),
            "all" => Some(FinishTier::All),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FinishTier::First => "Only 1st",
            FinishTier::TopThree => "1st - 3rd",
            FinishTier::All => "All",
        }
    }

    /// Whether this tier reads the Placement column at all.
    pub fn needs_placement(&self) -> bool {
        !matches!(self, FinishTier::All)
    }

    /// Whether a row with this placement passes the tier.
    pub fn accepts(&self, placement: Option<u32>) -> bool {
        match self {
            FinishTier::First => placement == Some(1),
            FinishTier::TopThree => matches!(placement, Some(1..=3)),
            FinishTier::All => true,
        }
    }
}

/// Trailing date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    ThreeMonths,
    #[default]
    #[serde(rename = "6m")]
    SixMonths,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::OneMonth, Period::ThreeMonths, Period::SixMonths];

    pub fn slug(&self) -> &'static str {
        match self {
            Period::OneMonth => "1m",
            Period::ThreeMonths => "3m",
            Period::SixMonths => "6m",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Some(Period::OneMonth),
            "3m" => Some(Period::ThreeMonths),
            "6m" => Some(Period::SixMonths),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::OneMonth => "Past month",
            Period::ThreeMonths => "Past 3 months",
            Period::SixMonths => "Past 6 months",
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            Period::OneMonth => 1,
            Period::ThreeMonths => 3,
            Period::SixMonths => 6,
        }
    }

    /// First month included in the window ending at `now`.
    ///
    /// Calendar-month subtraction; the day is clamped to the end of the
    /// target month before the month is taken.
    pub fn cutoff_month(&self, now: NaiveDateTime) -> YearMonth {
        let date = now
            .date()
            .checked_sub_months(Months::new(self.months()))
            .unwrap_or(NaiveDate::MIN);
        YearMonth::new(date.year(), date.month())
    }

    /// First instant included in the window ending at `now`.
    pub fn cutoff(&self, now: NaiveDateTime) -> NaiveDateTime {
        let ym = self.cutoff_month(now);
        NaiveDate::from_ymd_opt(ym.year, ym.month, 1)
            .unwrap_or(NaiveDate::MIN)
            .and_hms_opt(0, 0, 0)
            .unwrap_or(NaiveDateTime::MIN)
    }
}

/// Resolved leaderboard filter for one render pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterState {
    pub mode: GroupKey,
    pub finish: FinishTier,
    pub period: Period,
    pub item: Option<String>,
}

impl FilterState {
    pub fn new(mode: GroupKey, finish: FinishTier, period: Period) -> Self {
        Self {
            mode,
            finish,
            period,
            item: None,
        }
    }

    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_slug_round_trip() {
        for key in GroupKey::ALL {
            assert_eq!(GroupKey::from_slug(key.slug()), Some(key));
        }
        for tier in FinishTier::ALL {
            assert_eq!(FinishTier::from_slug(tier.slug()), Some(tier));
        }
        for period in Period::ALL {
            assert_eq!(Period::from_slug(period.slug()), Some(period));
        }
    }

    #[test]
    fn test_from_slug_case_insensitive() {
        assert_eq!(GroupKey::from_slug("BLADE"), Some(GroupKey::Blade));
        assert_eq!(FinishTier::from_slug("Top3"), Some(FinishTier::TopThree));
        assert_eq!(Period::from_slug(" 3M "), Some(Period::ThreeMonths));
        assert_eq!(Period::from_slug("12m"), None);
    }

    #[test]
    fn test_finish_tier_accepts() {
        assert!(FinishTier::First.accepts(Some(1)));
        assert!(!FinishTier::First.accepts(Some(2)));
        assert!(!FinishTier::First.accepts(None));

        assert!(FinishTier::TopThree.accepts(Some(3)));
        assert!(!FinishTier::TopThree.accepts(Some(4)));
        assert!(!FinishTier::TopThree.accepts(Some(0)));

        assert!(FinishTier::All.accepts(None));
        assert!(FinishTier::All.accepts(Some(40)));
    }

    #[test]
    fn test_cutoff_is_calendar_month() {
        let now = at(2026, 10, 16);
        assert_eq!(Period::OneMonth.cutoff_month(now), YearMonth::new(2026, 9));
        assert_eq!(Period::SixMonths.cutoff_month(now), YearMonth::new(2026, 4));
        assert_eq!(
            Period::SixMonths.cutoff(now),
            at(2026, 4, 1).date().and_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_cutoff_clamps_day_and_crosses_year() {
        // March 31 minus one month clamps to Feb 28
        assert_eq!(
            Period::OneMonth.cutoff_month(at(2026, 3, 31)),
            YearMonth::new(2026, 2)
        );
        assert_eq!(
            Period::ThreeMonths.cutoff_month(at(2026, 1, 10)),
            YearMonth::new(2025, 10)
        );
    }
}

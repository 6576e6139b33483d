//! Navigation parameters.
//!
//! Five query-string parameters (`view`, `mode`, `finish`, `period`, `item`)
//! are the only navigable state. A render pass reads them, lets controls
//! override them, and writes back the canonical set only when it changed.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use super::{FilterState, FinishTier, GroupKey, Period};

/// The parameter names this application owns.
pub const NAV_KEYS: [&str; 5] = ["view", "mode", "finish", "period", "item"];

/// Which page a pass renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Home,
    Detail,
}

impl View {
    pub fn slug(&self) -> &'static str {
        match self {
            View::Home => "home",
            View::Detail => "detail",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "home" => Some(View::Home),
            "detail" => Some(View::Detail),
            _ => None,
        }
    }
}

/// Raw navigation parameters as read from (or written to) a query string.
///
/// Values are stored decoded. `None` means the key was absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NavParams {
    pub view: Option<String>,
    pub mode: Option<String>,
    pub finish: Option<String>,
    pub period: Option<String>,
    pub item: Option<String>,
}

impl NavParams {
    /// Read our keys from a query string, with or without the leading `?`.
    ///
    /// Unrelated keys are ignored. If a key repeats, the first value wins.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        let query = query.strip_prefix('?').unwrap_or(query);

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "view" => &mut params.view,
                "mode" => &mut params.mode,
                "finish" => &mut params.finish,
                "period" => &mut params.period,
                "item" => &mut params.item,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        params
    }

    /// Canonical parameters for a resolved view and filter.
    pub fn canonical(view: View, filter: &FilterState) -> Self {
        Self {
            view: Some(view.slug().to_string()),
            mode: Some(filter.mode.slug().to_string()),
            finish: Some(filter.finish.slug().to_string()),
            period: Some(filter.period.slug().to_string()),
            item: match view {
                View::Detail => filter.item.clone(),
                View::Home => None,
            },
        }
    }

    /// Encode as a query string (no leading `?`).
    pub fn to_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        let ordered = [
            ("view", &self.view),
            ("mode", &self.mode),
            ("item", &self.item),
            ("finish", &self.finish),
            ("period", &self.period),
        ];
        for (key, value) in ordered {
            if let Some(value) = value {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }

    fn value(slot: &Option<String>) -> Option<&str> {
        slot.as_deref().filter(|v| !v.is_empty())
    }
}

/// Control values that take precedence over the persisted parameters for a
/// single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlOverrides {
    pub view: Option<View>,
    pub mode: Option<GroupKey>,
    pub finish: Option<FinishTier>,
    pub period: Option<Period>,
}

/// Outcome of resolving navigation state for one render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPass {
    pub view: View,
    pub filter: FilterState,
    pub canonical: NavParams,
    /// True when `canonical` differs from what was read and must be written back.
    pub changed: bool,
}

/// Resolve the view and filter for a pass.
///
/// `view=detail` only sticks when a non-empty `item` is present.
pub fn resolve_pass(read: &NavParams, controls: &ControlOverrides) -> ResolvedPass {
    let mode = controls
        .mode
        .or_else(|| NavParams::value(&read.mode).and_then(GroupKey::from_slug))
        .unwrap_or_default();
    let finish = controls
        .finish
        .or_else(|| NavParams::value(&read.finish).and_then(FinishTier::from_slug))
        .unwrap_or_default();
    let period = controls
        .period
        .or_else(|| NavParams::value(&read.period).and_then(Period::from_slug))
        .unwrap_or_default();
    let requested = controls
        .view
        .or_else(|| NavParams::value(&read.view).and_then(View::from_slug))
        .unwrap_or_default();
    let item = NavParams::value(&read.item).map(str::to_string);

    let (view, item) = match (requested, item) {
        (View::Detail, Some(item)) => (View::Detail, Some(item)),
        _ => (View::Home, None),
    };

    let filter = FilterState {
        mode,
        finish,
        period,
        item,
    };
    let canonical = NavParams::canonical(view, &filter);
    let changed = canonical != *read;

    ResolvedPass {
        view,
        filter,
        canonical,
        changed,
    }
}

impl FilterState {
    /// The view this state renders: detail when an item is selected.
    pub fn view(&self) -> View {
        if self.item.as_deref().is_some_and(|i| !i.is_empty()) {
            View::Detail
        } else {
            View::Home
        }
    }

    /// Encode as a query string (no leading `?`).
    pub fn to_query(&self) -> String {
        NavParams::canonical(self.view(), self).to_query()
    }

    /// Decode a query string, applying defaults for anything missing.
    pub fn from_query(query: &str) -> Self {
        resolve_pass(&NavParams::from_query(query), &ControlOverrides::default()).filter
    }

    /// Link to the detail view for one leaderboard label under this filter.
    pub fn detail_link(&self, label: &str) -> String {
        let target = FilterState {
            item: Some(label.to_string()),
            ..self.clone()
        };
        format!("?{}", target.to_query())
    }

    /// Link back to the leaderboard, keeping mode, finish and period.
    pub fn back_link(&self) -> String {
        let target = FilterState {
            item: None,
            ..self.clone()
        };
        format!("?{}", target.to_query())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_when_absent() {
        let pass = resolve_pass(&NavParams::default(), &ControlOverrides::default());

        assert_eq!(pass.view, View::Home);
        assert_eq!(pass.filter.mode, GroupKey::Combo);
        assert_eq!(pass.filter.finish, FinishTier::TopThree);
        assert_eq!(pass.filter.period, Period::SixMonths);
        assert_eq!(pass.filter.item, None);
        assert!(pass.changed);
        assert_eq!(pass.canonical.to_query(), "view=home&mode=combo&finish=top3&period=6m");
    }

    #[test]
    fn test_empty_values_use_defaults() {
        let read = NavParams::from_query("?view=&mode=&finish=&period=");
        let pass = resolve_pass(&read, &ControlOverrides::default());

        assert_eq!(pass.filter, FilterState::default());
    }

    #[test]
    fn test_unrecognized_values_fall_back() {
        let read = NavParams::from_query("mode=spinner&finish=top8&period=2y&view=settings");
        let pass = resolve_pass(&read, &ControlOverrides::default());

        assert_eq!(pass.view, View::Home);
        assert_eq!(pass.filter, FilterState::default());
    }

    #[test]
    fn test_canonical_read_is_unchanged() {
        let read = NavParams::from_query("view=home&mode=blade&finish=1st&period=1m");
        let pass = resolve_pass(&read, &ControlOverrides::default());

        assert!(!pass.changed);
        assert_eq!(pass.canonical, read);
    }

    #[test]
    fn test_detail_requires_item() {
        let read = NavParams::from_query("view=detail&mode=blade&finish=all&period=3m");
        let pass = resolve_pass(&read, &ControlOverrides::default());

        assert_eq!(pass.view, View::Home);
        assert!(pass.changed);
        assert_eq!(pass.canonical.view.as_deref(), Some("home"));

        let read = NavParams::from_query("view=detail&item=&mode=blade");
        assert_eq!(resolve_pass(&read, &ControlOverrides::default()).view, View::Home);
    }

    #[test]
    fn test_item_dropped_on_home() {
        let read = NavParams::from_query("view=home&mode=combo&item=Foo&finish=top3&period=6m");
        let pass = resolve_pass(&read, &ControlOverrides::default());

        assert_eq!(pass.filter.item, None);
        assert_eq!(pass.canonical.item, None);
        assert!(pass.changed);
    }

    #[test]
    fn test_controls_override_persisted() {
        let read = NavParams::from_query("view=home&mode=combo&finish=top3&period=6m");
        let controls = ControlOverrides {
            mode: Some(GroupKey::Bit),
            period: Some(Period::OneMonth),
            ..Default::default()
        };
        let pass = resolve_pass(&read, &controls);

        assert_eq!(pass.filter.mode, GroupKey::Bit);
        assert_eq!(pass.filter.finish, FinishTier::TopThree);
        assert_eq!(pass.filter.period, Period::OneMonth);
        assert!(pass.changed);
    }

    #[test]
    fn test_item_percent_decoding() {
        let read = NavParams::from_query("view=detail&mode=combo&item=Wizard%20Rod%209-60%20Ball");
        let pass = resolve_pass(&read, &ControlOverrides::default());

        assert_eq!(pass.view, View::Detail);
        assert_eq!(pass.filter.item.as_deref(), Some("Wizard Rod 9-60 Ball"));
    }

    #[test]
    fn test_filter_state_round_trip() {
        let labels = ["Wizard Rod 9-60 Ball", "Hells&Scythe", "50% = off?", "Dran/Sword #1"];
        for mode in GroupKey::ALL {
            for finish in FinishTier::ALL {
                for period in Period::ALL {
                    let home = FilterState::new(mode, finish, period);
                    assert_eq!(FilterState::from_query(&home.to_query()), home);

                    for label in labels {
                        let detail = home.clone().with_item(label);
                        assert_eq!(FilterState::from_query(&detail.to_query()), detail);
                    }
                }
            }
        }
    }

    #[test]
    fn test_links() {
        let state = FilterState::new(GroupKey::Blade, FinishTier::First, Period::ThreeMonths);

        assert_eq!(
            state.detail_link("Phoenix Wing"),
            "?view=detail&mode=blade&item=Phoenix+Wing&finish=1st&period=3m"
        );
        assert_eq!(
            state.with_item("Phoenix Wing").back_link(),
            "?view=home&mode=blade&finish=1st&period=3m"
        );
    }

    #[test]
    fn test_unrelated_keys_ignored() {
        let read = NavParams::from_query("utm_source=x&mode=bit&min_usage=3");
        assert_eq!(read.mode.as_deref(), Some("bit"));
        assert_eq!(read.view, None);
    }
}

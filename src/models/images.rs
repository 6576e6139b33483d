//! Optional part-image lookup.

use std::collections::HashMap;

use serde::Serialize;

use super::GroupKey;

/// Part type as written in the images tab's `PartType` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartKind {
    Blade,
    Ratchet,
    Bit,
}

impl PartKind {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "blade" => Some(PartKind::Blade),
            "ratchet" => Some(PartKind::Ratchet),
            "bit" => Some(PartKind::Bit),
            _ => None,
        }
    }
}

/// Mapping from (part type, part name) to an image URL.
#[derive(Debug, Clone, Default)]
pub struct ImageLookup {
    images: HashMap<PartKind, HashMap<String, String>>,
}

impl ImageLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image. Later entries for the same part replace earlier ones.
    pub fn insert(&mut self, kind: PartKind, name: impl Into<String>, url: impl Into<String>) {
        self.images
            .entry(kind)
            .or_default()
            .insert(name.into(), url.into());
    }

    pub fn get(&self, kind: PartKind, name: &str) -> Option<&str> {
        self.images
            .get(&kind)
            .and_then(|m| m.get(name))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.images.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Image for a leaderboard label under the given grouping.
    ///
    /// Combos use the image of their blade: the longest known blade name
    /// that the label starts with as a whole word.
    pub fn image_for(&self, label: &str, mode: GroupKey) -> Option<&str> {
        if label.is_empty() {
            return None;
        }
        match mode {
            GroupKey::Blade => self.get(PartKind::Blade, label),
            GroupKey::Ratchet => self.get(PartKind::Ratchet, label),
            GroupKey::Bit => self.get(PartKind::Bit, label),
            GroupKey::Combo => self
                .images
                .get(&PartKind::Blade)?
                .iter()
                .filter(|(name, _)| {
                    label
                        .strip_prefix(name.as_str())
                        .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
                })
                .max_by_key(|(name, _)| name.len())
                .map(|(_, url)| url.as_str()),
        }
    }
}

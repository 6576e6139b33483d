//! Sheet ingestion: CSV parsing and row normalization.
//!
//! Parsing turns an export body into a [`SheetTable`] of trimmed strings.
//! Normalization turns a table into a typed [`Dataset`]; it never fails and
//! only produces missing values for bad cells.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::models::{combo_label, GroupKey, ImageLookup, PartKind, ResultRow};

/// Columns the normalizer reads. Anything else in the sheet is dropped.
pub const EXPECTED_COLUMNS: [&str; 9] = [
    "Event",
    "Date",
    "Participants",
    "Placement",
    "Username",
    "Blade",
    "Ratchet",
    "Bit",
    "Assist Blade",
];

/// Columns the images tab must carry.
pub const IMAGE_COLUMNS: [&str; 3] = ["PartType", "Name", "ImageURL"];

/// Errors turning an export body into a table.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("sheet is empty (no header row)")]
    Empty,

    #[error("response is not CSV (got an HTML page; is the sheet shared publicly?)")]
    NotCsv,

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
}

/// A parsed sheet: header row plus string records.
#[derive(Debug, Clone, Serialize)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,

    /// Short content hash of the export body.
    pub fingerprint: String,
}

impl SheetTable {
    /// Index of a column by (trimmed) header name.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn has_columns(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.column(n).is_some())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse a CSV export body.
pub fn parse_csv(body: &str) -> Result<SheetTable, IngestError> {
    let head: String = body.trim_start().chars().take(15).collect();
    let head = head.to_ascii_lowercase();
    if head.starts_with("<!doctype") || head.starts_with("<html") {
        return Err(IngestError::NotCsv);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(IngestError::Empty);
    }

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(record.iter().map(|c| c.trim().to_string()).collect());
    }

    Ok(SheetTable {
        headers,
        records,
        fingerprint: fingerprint(body),
    })
}

fn fingerprint(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    hex::encode(&digest[..8])
}

/// Which expected columns the sheet actually carried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub date: bool,
    pub placement: bool,
    pub blade: bool,
    pub ratchet: bool,
    pub bit: bool,
}

impl Schema {
    /// Whether grouping by this key can be answered from the sheet.
    pub fn supports(&self, key: GroupKey) -> bool {
        match key {
            GroupKey::Combo => true,
            GroupKey::Blade => self.blade,
            GroupKey::Ratchet => self.ratchet,
            GroupKey::Bit => self.bit,
        }
    }
}

/// Normalized result rows ready for aggregation.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub rows: Vec<ResultRow>,
    pub schema: Schema,
    pub fingerprint: String,
}

impl Dataset {
    /// Build a dataset directly from rows, treating every column as present.
    pub fn from_rows(rows: Vec<ResultRow>) -> Self {
        Self {
            rows,
            schema: Schema {
                date: true,
                placement: true,
                blade: true,
                ratchet: true,
                bit: true,
            },
            fingerprint: String::new(),
        }
    }
}

/// Normalize a raw sheet into typed rows.
pub fn normalize(table: &SheetTable) -> Dataset {
    let col = |name: &str| table.column(name);
    let event = col("Event");
    let date = col("Date");
    let participants = col("Participants");
    let placement = col("Placement");
    let username = col("Username");
    let blade = col("Blade");
    let ratchet = col("Ratchet");
    let bit = col("Bit");
    let assist = col("Assist Blade");

    let missing: Vec<&str> = EXPECTED_COLUMNS
        .into_iter()
        .filter(|c| table.column(c).is_none())
        .collect();
    if !missing.is_empty() {
        debug!("Sheet is missing columns: {}", missing.join(", "));
    }

    let rows: Vec<ResultRow> = table
        .records
        .iter()
        .map(|record| {
            let text = |idx: Option<usize>| cell(record, idx).map(str::to_string);
            let blade = text(blade);
            let ratchet = text(ratchet);
            let bit = text(bit);
            let raw_date = text(date);

            ResultRow {
                event: text(event),
                parsed_date: raw_date.as_deref().and_then(parse_date),
                date: raw_date,
                participants: cell(record, participants).and_then(parse_count),
                placement: cell(record, placement).and_then(parse_count),
                username: text(username),
                combo: combo_label(blade.as_deref(), ratchet.as_deref(), bit.as_deref()),
                blade,
                ratchet,
                bit,
                assist_blade: text(assist),
            }
        })
        .collect();

    let undated = rows.iter().filter(|r| r.parsed_date.is_none()).count();
    debug!(
        "Normalized {} rows ({} without a usable date)",
        rows.len(),
        undated
    );

    Dataset {
        rows,
        schema: Schema {
            date: date.is_some(),
            placement: placement.is_some(),
            blade: blade.is_some(),
            ratchet: ratchet.is_some(),
            bit: bit.is_some(),
        },
        fingerprint: table.fingerprint.clone(),
    }
}

/// Build the image lookup from an images tab. `None` when required columns are missing.
pub fn image_lookup(table: &SheetTable) -> Option<ImageLookup> {
    if !table.has_columns(&IMAGE_COLUMNS) {
        return None;
    }
    let kind = table.column("PartType")?;
    let name = table.column("Name")?;
    let url = table.column("ImageURL")?;

    let mut lookup = ImageLookup::new();
    for record in &table.records {
        let (Some(kind), Some(name), Some(url)) = (
            cell(record, Some(kind)).and_then(PartKind::from_name),
            cell(record, Some(name)),
            cell(record, Some(url)),
        ) else {
            continue;
        };
        lookup.insert(kind, name, url);
    }
    Some(lookup)
}

/// Trimmed, non-empty cell value.
fn cell(record: &[String], idx: Option<usize>) -> Option<&str> {
    let value = record.get(idx?)?.trim();
    (!value.is_empty()).then_some(value)
}

/// Coerce a numeric cell to a non-negative integer.
///
/// Accepts integral floats such as "3.0"; anything else is missing.
pub fn parse_count(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Ok(n) = s.parse::<u32>() {
        return Some(n);
    }
    let f: f64 = s.parse().ok()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 {
        Some(f as u32)
    } else {
        None
    }
}

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Parse a sheet date into a timezone-naive instant.
///
/// Offsets are dropped keeping the wall-clock time.
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

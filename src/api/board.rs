//! Render passes.
//!
//! A pass resolves navigation state, loads the sheet (cached), prepares
//! the board (cached per sheet content), and produces a [`RenderModel`] for
//! either the leaderboard or the detail view. Nothing outlives the pass
//! except the caches.

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::state::AppState;
use crate::calculate::{Board, SchemaError};
use crate::fetch::LoadError;
use crate::ingest::SheetTable;
use crate::models::{FilterState, ImageLookup, NavParams, ResolvedPass, ResultRow, View};

/// Shown instead of an empty table.
pub const NO_ROWS_NOTICE: &str = "No rows matched under the current filters.";

/// Added to `notes` when the sheet has no Date column.
pub const NO_DATE_NOTE: &str = "No Date column in the sheet; no row falls inside a time window.";

/// Failures that halt a render pass.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Per-pass display knobs that are not navigation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    pub min_usage: usize,
    pub show_images: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            min_usage: 1,
            show_images: false,
        }
    }
}

/// One rendered leaderboard line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub label: String,
    pub usage: usize,
    pub share: f64,
    /// e.g. "33.3%"
    pub share_display: String,
    pub detail_link: String,
}

/// Human labels for the active filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterLabels {
    pub mode: &'static str,
    pub thing: &'static str,
    pub finish: &'static str,
    pub period: &'static str,
}

impl FilterLabels {
    fn new(filter: &FilterState) -> Self {
        Self {
            mode: filter.mode.label(),
            thing: filter.mode.thing(),
            finish: filter.finish.label(),
            period: filter.period.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum Page {
    Home {
        heading: String,
        total: usize,
        leaderboard: Vec<AggregateRow>,
        notice: Option<String>,
    },
    Detail {
        heading: String,
        item: String,
        usage: usize,
        share: f64,
        share_display: String,
        back_link: String,
        rows: Vec<ResultRow>,
        notice: Option<String>,
    },
}

/// Everything a front end needs to draw one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderModel {
    /// Canonical navigation parameters for this pass
    pub params: NavParams,
    pub canonical_query: String,
    pub filter: FilterState,
    pub labels: FilterLabels,
    /// Fingerprint of the sheet content the numbers came from
    pub data_version: String,
    pub row_count: usize,
    /// Informational messages (never errors)
    pub notes: Vec<String>,
    #[serde(flatten)]
    pub page: Page,
}

fn format_share(share: f64) -> String {
    format!("{:.1}%", share)
}

/// Build the render model for a resolved pass. Pure.
pub fn render(
    board: &Board,
    pass: &ResolvedPass,
    images: Option<&ImageLookup>,
    options: &DisplayOptions,
    now: NaiveDateTime,
) -> Result<RenderModel, SchemaError> {
    let filter = &pass.filter;

    let page = match (pass.view, filter.item.as_deref()) {
        (View::Detail, Some(item)) => {
            let detail = board.drilldown(filter.mode, item, filter.period, filter.finish, now)?;
            Page::Detail {
                heading: format!(
                    "Details: {} (by {}; {}, {})",
                    item,
                    filter.mode.thing(),
                    filter.finish.label(),
                    filter.period.label()
                ),
                item: detail.item,
                usage: detail.usage,
                share: detail.share,
                share_display: format_share(detail.share),
                back_link: filter.back_link(),
                notice: detail.rows.is_empty().then(|| NO_ROWS_NOTICE.to_string()),
                rows: detail.rows,
            }
        }
        _ => {
            let leaderboard = board
                .leaderboard(filter.mode, filter.period, filter.finish, now)?
                .with_min_usage(options.min_usage);
            let rows: Vec<AggregateRow> = leaderboard
                .entries
                .into_iter()
                .map(|e| AggregateRow {
                    image: images
                        .and_then(|i| i.image_for(&e.label, filter.mode))
                        .map(str::to_string),
                    detail_link: filter.detail_link(&e.label),
                    share_display: format_share(e.share),
                    share: e.share,
                    usage: e.usage,
                    label: e.label,
                })
                .collect();
            Page::Home {
                heading: "Leaderboard".to_string(),
                total: leaderboard.total,
                notice: rows.is_empty().then(|| NO_ROWS_NOTICE.to_string()),
                leaderboard: rows,
            }
        }
    };

    let mut notes = Vec::new();
    if !board.dataset.schema.date {
        notes.push(NO_DATE_NOTE.to_string());
    }

    Ok(RenderModel {
        canonical_query: pass.canonical.to_query(),
        params: pass.canonical.clone(),
        filter: filter.clone(),
        labels: FilterLabels::new(filter),
        data_version: board.dataset.fingerprint.clone(),
        row_count: board.dataset.rows.len(),
        notes,
        page,
    })
}

/// Prepared board for a sheet, reusing one built from identical content.
pub async fn prepared_board(state: &AppState, table: &SheetTable) -> std::sync::Arc<Board> {
    if let Some(board) = state.boards.get(&table.fingerprint).await {
        debug!("Reusing prepared board {}", table.fingerprint);
        return board;
    }
    state
        .boards
        .insert(table.fingerprint.clone(), Board::prepare(table))
        .await
}

/// Run one full pass: load, prepare, compute, render.
pub async fn run_pass(
    state: &AppState,
    pass: &ResolvedPass,
    options: &DisplayOptions,
    now: NaiveDateTime,
) -> Result<RenderModel, BoardError> {
    let table = state
        .loader
        .load(&state.sheet.url, &state.sheet.main_tab)
        .await?;
    let board = prepared_board(state, &table).await;

    let mut notes = Vec::new();
    let images = if options.show_images {
        match state.sheet.images_tab() {
            Some(tab) => match state.loader.load_images(&state.sheet.url, tab).await {
                Ok(images) => Some(images),
                Err(e) => {
                    warn!("Images unavailable: {}", e);
                    notes.push(format!("Images unavailable: {}", e));
                    None
                }
            },
            None => {
                notes.push("No images tab configured.".to_string());
                None
            }
        }
    } else {
        None
    };

    let mut model = render(&board, pass, images.as_ref(), options, now)?;
    model.notes.extend(notes);
    Ok(model)
}

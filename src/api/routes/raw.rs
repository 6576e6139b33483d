use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::{ApiError, Pagination, PaginationMeta};

#[derive(Debug, Deserialize)]
pub struct RawParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RawTableResponse {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
    pub pagination: PaginationMeta,
    pub data_version: String,
}

/// The main tab exactly as exported, one page at a time.
pub async fn raw_table(
    State(state): State<AppState>,
    Query(params): Query<RawParams>,
) -> Result<Json<RawTableResponse>, ApiError> {
    let table = state
        .loader
        .load(&state.sheet.url, &state.sheet.main_tab)
        .await
        .map_err(|e| ApiError::Load(e.to_string()))?;

    let pagination = Pagination::new(params.page, params.page_size);
    let records = pagination.slice(&table.records).to_vec();

    Ok(Json(RawTableResponse {
        headers: table.headers.clone(),
        records,
        pagination: PaginationMeta::new(&pagination, table.len() as u32),
        data_version: table.fingerprint.clone(),
    }))
}

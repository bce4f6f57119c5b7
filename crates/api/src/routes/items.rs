//! Operator endpoints: inspect items, retry, recover stale claims.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use inbox_core::{Error, ItemId, ItemStatus, QueueItem};
use serde::Deserialize;
use worker::RecoveryReport;

use crate::response::{ApiError, ItemList};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecoverQuery {
    /// Overrides the configured staleness threshold.
    pub stale_after_secs: Option<u64>,
}

/// GET /items/:id
pub async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<QueueItem>, ApiError> {
    let id = ItemId(id);
    let item = state.store.get(id).await?.ok_or(Error::NotFound(id))?;
    Ok(Json(item))
}

/// GET /items?status=&limit=
pub async fn list_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ItemList>, ApiError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<ItemStatus>)
        .transpose()?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let items = state.store.list(status, limit).await?;
    Ok(Json(items.into()))
}

/// POST /items/:id/retry - Completed or Failed back to Pending.
pub async fn retry_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<QueueItem>, ApiError> {
    let item = state.recovery.retry(ItemId(id)).await?;
    Ok(Json(item))
}

/// POST /recover - Release stale Processing items.
pub async fn recover_handler(
    State(state): State<AppState>,
    Query(query): Query<RecoverQuery>,
) -> Result<Json<RecoveryReport>, ApiError> {
    let threshold = query
        .stale_after_secs
        .map(Duration::from_secs)
        .unwrap_or(state.stale_after);
    let report = state.recovery.recover_stale(threshold).await?;
    Ok(Json(report))
}

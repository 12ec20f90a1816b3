use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use reelscope_core::{ContentItem, ItemStatus};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ItemQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ItemStats {
    pending: i64,
    processing: i64,
    completed: i64,
    failed: i64,
    total: i64,
}

/// GET /api/v1/items?status=&limit=
pub(super) async fn list_items(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ItemQuery>,
) -> Result<Json<ApiResponse<Vec<ContentItem>>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<ItemStatus>)
        .transpose()
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;

    let items = reelscope_db::list_items(&state.pool, status, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(items, req_id.0)))
}

/// GET /api/v1/items/{shortcode}
pub(super) async fn get_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(shortcode): Path<String>,
) -> Result<Json<ApiResponse<ContentItem>>, ApiError> {
    let item = reelscope_db::get_item(&state.pool, &shortcode)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(item, req_id.0)))
}

/// GET /api/v1/items/stats
pub(super) async fn item_stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<ItemStats>>, ApiError> {
    let counts = reelscope_db::count_items_by_status(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let stats = ItemStats {
        pending: counts.pending,
        processing: counts.processing,
        completed: counts.completed,
        failed: counts.failed,
        total: counts.total(),
    };
    Ok(Json(ApiResponse::new(stats, req_id.0)))
}

//! Channel registration and listing for operators.

use axum::{extract::State, http::StatusCode, Extension, Json};
use reelscope_core::{Category, Channel};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CreateChannelRequest {
    pub handle: String,
    pub priority: Option<i64>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateChannelResponse {
    handle: String,
    created: bool,
}

/// GET /api/v1/channels
pub(super) async fn list_channels(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<Channel>>>, ApiError> {
    let channels = reelscope_db::list_channels(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(channels, req_id.0)))
}

/// POST /api/v1/channels: registers a channel; an existing handle is left
/// untouched and reported with `created: false`.
pub(super) async fn create_channel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateChannelRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreateChannelResponse>>), ApiError> {
    let rid = &req_id.0;

    let handle = body.handle.trim().trim_start_matches('@').to_owned();
    if handle.is_empty() || handle.len() > 100 {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "handle must be 1-100 characters",
        ));
    }

    let mut channel = reelscope_db::NewChannel::new(&handle);
    if let Some(priority) = body.priority {
        channel.priority = u8::try_from(priority)
            .ok()
            .filter(|p| (1..=10).contains(p))
            .ok_or_else(|| {
                ApiError::new(
                    rid,
                    "validation_error",
                    format!("priority must be between 1 and 10, got {priority}"),
                )
            })?;
    }
    if let Some(category) = body.category.as_deref() {
        channel.category = category.parse::<Category>().map_err(|e| {
            ApiError::new(rid, "validation_error", e.to_string())
        })?;
    }

    let created = reelscope_db::add_channel(&state.pool, channel)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    tracing::info!(channel = %handle, created, "api: channel registration");

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(ApiResponse::new(
            CreateChannelResponse { handle, created },
            req_id.0,
        )),
    ))
}

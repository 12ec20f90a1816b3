mod channels;
mod items;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &reelscope_db::DbError) -> ApiError {
    if matches!(error, reelscope_db::DbError::NotFound) {
        return ApiError::new(request_id, "not_found", "record not found");
    }
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/channels",
            get(channels::list_channels).post(channels::create_channel),
        )
        .route("/api/v1/items", get(items::list_items))
        .route("/api/v1/items/stats", get(items::item_stats))
        .route("/api/v1/items/{shortcode}", get(items::get_item))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    match reelscope_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::new(
                HealthData {
                    status: "ok",
                    database: "ok",
                },
                req_id.0,
            )),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::new(
                    HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    req_id.0,
                )),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use reelscope_core::PostType;
    use reelscope_db::{add_channel, add_content_items, NewChannel, NewContentItem};
    use tower::ServiceExt;

    #[test]
    fn normalize_limit_applies_defaults_and_bounds() {
        assert_eq!(normalize_limit(None), 50);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(1_000)), 200);
        assert_eq!(normalize_limit(Some(25)), 25);
    }

    #[test]
    fn api_error_validation_error_maps_to_bad_request() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_record_maps_to_not_found() {
        let response = map_db_error("req-2".to_string(), &reelscope_db::DbError::NotFound)
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    fn open_app(pool: sqlx::PgPool) -> Router {
        let auth = AuthState::from_keys("", true).expect("auth");
        build_app(AppState { pool }, auth, default_rate_limit_state())
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json parse")
    }

    async fn seed_item(pool: &sqlx::PgPool, shortcode: &str, priority: u8) {
        let item = NewContentItem {
            shortcode,
            source_url: "https://www.instagram.com/p/seed/",
            channel_handle: "seeded",
            priority,
            post_type: PostType::Album,
            caption: Some("seed"),
            hashtags: &[],
            like_count: None,
            video_duration_secs: None,
            uploaded_at: None,
        };
        add_content_items(pool, &[item]).await.expect("seed item");
    }

    async fn get(app: Router, uri: &str) -> axum::response::Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response")
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_reports_database_ok(pool: sqlx::PgPool) {
        let response = get(open_app(pool), "/api/v1/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let json = json_body(response).await;
        assert_eq!(json["data"]["status"], "ok");
        assert!(json["meta"]["request_id"].is_string());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn protected_routes_require_bearer_token(pool: sqlx::PgPool) {
        let auth = AuthState::from_keys("secret", false).expect("auth");
        let app = build_app(AppState { pool }, auth, default_rate_limit_state());

        let denied = get(app.clone(), "/api/v1/channels").await;
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/channels")
                    .header("authorization", "Bearer secret")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(allowed.status(), StatusCode::OK);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_stays_public_when_auth_enabled(pool: sqlx::PgPool) {
        let auth = AuthState::from_keys("secret", false).expect("auth");
        let app = build_app(AppState { pool }, auth, default_rate_limit_state());
        assert_eq!(get(app, "/api/v1/health").await.status(), StatusCode::OK);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn create_then_list_channels(pool: sqlx::PgPool) {
        let app = open_app(pool);
        let created = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/channels")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"handle":"rustlang","priority":7}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(created.status(), StatusCode::CREATED);
        assert_eq!(json_body(created).await["data"]["created"], true);

        let listed = json_body(get(app, "/api/v1/channels").await).await;
        let channels = listed["data"].as_array().expect("data array");
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0]["handle"], "rustlang");
        assert_eq!(channels[0]["priority"], 7);
        assert_eq!(channels[0]["is_bootstrapped"], false);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn duplicate_channel_is_reported_not_created(pool: sqlx::PgPool) {
        add_channel(&pool, NewChannel::new("rustlang"))
            .await
            .expect("seed channel");
        let response = open_app(pool)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/channels")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"handle":"rustlang"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["data"]["created"], false);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn out_of_range_priority_is_rejected(pool: sqlx::PgPool) {
        let response = open_app(pool)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/channels")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"handle":"x","priority":11}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn items_can_be_listed_fetched_and_counted(pool: sqlx::PgPool) {
        add_channel(&pool, NewChannel::new("seeded"))
            .await
            .expect("seed channel");
        seed_item(&pool, "AAA", 3).await;
        seed_item(&pool, "BBB", 9).await;
        let app = open_app(pool);

        let listed = json_body(get(app.clone(), "/api/v1/items?status=pending&limit=10").await).await;
        assert_eq!(listed["data"].as_array().expect("data array").len(), 2);

        let item = json_body(get(app.clone(), "/api/v1/items/BBB").await).await;
        assert_eq!(item["data"]["priority"], 9);
        assert_eq!(item["data"]["status"], "pending");
        assert_eq!(item["data"]["post_type"], "album");

        let missing = get(app.clone(), "/api/v1/items/NOPE").await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let stats = json_body(get(app, "/api/v1/items/stats").await).await;
        assert_eq!(stats["data"]["pending"], 2);
        assert_eq!(stats["data"]["total"], 2);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_status_filter_is_rejected(pool: sqlx::PgPool) {
        let response = get(open_app(pool), "/api/v1/items?status=queued").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

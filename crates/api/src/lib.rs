mod rate_limit;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Json, State};
use axum::http::{Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use waypoint_agents::{fallback_notice, RoutePlanner, RouteSource};
use waypoint_core::{Language, OriginHub, PlanRequest, Route};
use waypoint_observability::{AppMetrics, MetricsSnapshot};
use waypoint_storage::{Store, Tour, TourRepository};

pub use crate::rate_limit::IpRateLimiter;

const DEFAULT_API_KEY: &str = "dev-waypoint-key";
const MAX_BODY_BYTES: usize = 32 * 1024;

#[derive(Clone)]
pub struct ApiState {
    pub planner: Arc<RoutePlanner>,
    pub store: Arc<Store>,
    pub metrics: Arc<AppMetrics>,
    pub api_key: String,
    pub limiter: IpRateLimiter,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    capabilities: HealthCapabilities,
}

#[derive(Debug, Serialize)]
struct HealthCapabilities {
    persistent_storage: bool,
    fallback_hub: OriginHub,
}

#[derive(Debug, Serialize)]
struct PlanResponse {
    route: Route,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct AcceptTourRequest {
    origin_hub: OriginHub,
    #[serde(default)]
    language: Language,
    travel_date: NaiveDate,
    route: Route,
}

#[derive(Debug, Serialize)]
struct ToursResponse {
    tours: Vec<Tour>,
}

pub async fn build_app() -> Result<Router> {
    let metrics = AppMetrics::shared();
    let planner = Arc::new(
        RoutePlanner::from_env(metrics.clone()).context("failed to initialize route planner")?,
    );

    let store = match env::var("WAYPOINT_DATABASE_URL") {
        Ok(database_url) if !database_url.trim().is_empty() => Store::sqlite(&database_url).await?,
        _ => Store::memory(),
    };

    let api_key = env::var("WAYPOINT_API_KEY").unwrap_or_else(|_| DEFAULT_API_KEY.to_string());
    let rate_limit_window = Duration::from_secs(
        env::var("WAYPOINT_RATE_LIMIT_WINDOW_SECONDS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(60),
    );
    let rate_limit_max = env::var("WAYPOINT_RATE_LIMIT_MAX")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(30);

    let state = ApiState {
        planner,
        store: Arc::new(store),
        metrics,
        api_key,
        limiter: IpRateLimiter::new(rate_limit_window, rate_limit_max),
    };

    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/plan", post(plan))
        .route("/v1/tours", get(tours_list).post(tours_accept))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        capabilities: HealthCapabilities {
            persistent_storage: matches!(state.store.as_ref(), Store::Sqlite(_)),
            fallback_hub: state.planner.catalog().default_hub(),
        },
    };
    (StatusCode::OK, Json(payload))
}

async fn plan(State(state): State<ApiState>, Json(input): Json<PlanRequest>) -> impl IntoResponse {
    match state.planner.plan_with_source(&input).await {
        Ok((route, source)) => {
            let notice = match source {
                RouteSource::Model => None,
                RouteSource::Fallback(_) => Some(fallback_notice(input.language)),
            };
            (StatusCode::OK, Json(PlanResponse { route, notice })).into_response()
        }
        Err(err) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({
                "error": "invalid_request",
                "message": err.user_message(input.language)
            })),
        )
            .into_response(),
    }
}

async fn tours_accept(
    State(state): State<ApiState>,
    Json(input): Json<AcceptTourRequest>,
) -> impl IntoResponse {
    if !input.route.is_structurally_valid() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({
                "error": "invalid_route",
                "message": "route needs at least two named stops and a non-negative distance"
            })),
        )
            .into_response();
    }

    let tour = Tour::accepted(
        input.origin_hub,
        input.language,
        input.travel_date,
        input.route,
    );
    if let Err(err) = state.store.save(&tour).await {
        error!(error = %err, "failed to save tour");
        return storage_error();
    }

    info!(tour_id = %tour.id, hub = %tour.origin_hub, "tour accepted");
    (StatusCode::CREATED, Json(tour)).into_response()
}

async fn tours_list(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list().await {
        Ok(tours) => (StatusCode::OK, Json(ToursResponse { tours })).into_response(),
        Err(err) => {
            error!(error = %err, "failed to list tours");
            storage_error()
        }
    }
}

fn storage_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": "storage_unavailable",
            "message": "tour storage is unavailable, try again later"
        })),
    )
        .into_response()
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if header_key != state.api_key {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "unauthorized",
                "message": "missing or invalid x-api-key"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    if !state.limiter.allow(&ip) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "rate_limited",
                "message": "rate limit exceeded for this IP"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health")
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .next()
                .unwrap_or("unknown")
                .trim()
                .to_string()
        })
        .unwrap_or_else(|| "local".to_string())
}

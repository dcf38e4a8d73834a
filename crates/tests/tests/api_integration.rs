use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::{json, Value};
use tower::ServiceExt;
use waypoint_agents::{InferenceClient, PlannerSettings, RoutePlanner};
use waypoint_api::{build_router, ApiState, IpRateLimiter};
use waypoint_core::{CallOutcome, FallbackCatalog, Language, RetryPolicy, StaticGazetteer};
use waypoint_observability::AppMetrics;
use waypoint_storage::Store;

const API_KEY: &str = "test-waypoint-key";

/// Always answers with the same text, or never answers at all.
struct FixedInference(Option<&'static str>);

impl InferenceClient for FixedInference {
    fn invoke<'a>(&'a self, _prompt: &'a str, _language: Language) -> BoxFuture<'a, CallOutcome> {
        match self.0 {
            Some(text) => future::ready(Ok(text.to_string())).boxed(),
            None => future::pending().boxed(),
        }
    }
}

fn app_with(reply: Option<&'static str>, rate_limit_max: usize) -> Router {
    let metrics = AppMetrics::shared();
    let planner = RoutePlanner::new(
        Arc::new(FixedInference(reply)),
        Arc::new(StaticGazetteer::georgia()),
        Arc::new(FallbackCatalog::builtin()),
        metrics.clone(),
        PlannerSettings {
            retry: RetryPolicy::new(2, Duration::from_millis(5)),
            deadline: Duration::from_millis(40),
            ..PlannerSettings::default()
        },
    );

    build_router(ApiState {
        planner: Arc::new(planner),
        store: Arc::new(Store::memory()),
        metrics,
        api_key: API_KEY.to_string(),
        limiter: IpRateLimiter::new(Duration::from_secs(60), rate_limit_max),
    })
}

fn app(reply: Option<&'static str>) -> Router {
    app_with(reply, 100)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn kutaisi_nature() -> Value {
    json!({
        "origin_hub": "kutaisi",
        "duration_label": "1 day",
        "interest_tags": ["nature"],
        "language": "en",
        "travel_date": "2026-10-20"
    })
}

#[tokio::test]
async fn health_is_public() {
    let response = app(None)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = read_json(response).await;
    assert_eq!(parsed["status"], "ok");
    assert_eq!(parsed["capabilities"]["fallback_hub"], "kutaisi");
}

#[tokio::test]
async fn plan_requires_api_key() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/plan")
        .header("content-type", "application/json")
        .body(Body::from(kutaisi_nature().to_string()))
        .unwrap();

    let response = app(None).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn plan_returns_model_route() {
    let reply = "```json\n{\"stops\": [\"Kutaisi\", \"Sataplia\", \"Kutaisi\"], \"total_distance_km\": \"25 km\"}\n```";

    let response = app(Some(reply))
        .oneshot(post_json("/v1/plan", kutaisi_nature()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = read_json(response).await;
    assert_eq!(parsed["route"]["stops"], json!(["Kutaisi", "Sataplia", "Kutaisi"]));
    assert_eq!(parsed["route"]["totalDistanceKm"], 25.0);
    assert!(parsed.get("notice").is_none());
}

#[tokio::test]
async fn silent_model_serves_fallback_with_notice() {
    let response = app(None)
        .oneshot(post_json("/v1/plan", kutaisi_nature()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = read_json(response).await;
    assert_eq!(
        parsed["route"]["stops"],
        json!(["Kutaisi", "Prometheus Cave", "Martvili Canyon", "Kutaisi"])
    );
    assert_eq!(parsed["route"]["totalDistanceKm"], 130.0);
    assert!(parsed["notice"].as_str().is_some());
}

#[tokio::test]
async fn plan_without_preferences_is_unprocessable() {
    let response = app(None)
        .oneshot(post_json(
            "/v1/plan",
            json!({
                "origin_hub": "batumi",
                "duration_label": "1 day",
                "interest_tags": [],
                "free_text_wish": "   ",
                "language": "ru",
                "travel_date": "2026-10-20"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let parsed = read_json(response).await;
    assert_eq!(parsed["error"], "invalid_request");
}

#[tokio::test]
async fn accepted_tours_are_listed() {
    let app = app(None);
    let route = json!({
        "stops": ["Tbilisi", "Mtskheta", "Tbilisi"],
        "totalDistanceKm": 50,
        "durationLabel": "1 day"
    });

    let created = app
        .clone()
        .oneshot(post_json(
            "/v1/tours",
            json!({
                "origin_hub": "tbilisi",
                "travel_date": "2026-10-21",
                "route": route
            }),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let tour = read_json(created).await;

    let listed = app
        .oneshot(
            Request::builder()
                .uri("/v1/tours")
                .header("x-api-key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(listed.status(), StatusCode::OK);
    let parsed = read_json(listed).await;
    assert_eq!(parsed["tours"][0]["id"], tour["id"]);
    assert_eq!(parsed["tours"][0]["route"]["stops"][1], "Mtskheta");
}

#[tokio::test]
async fn single_stop_route_cannot_be_accepted() {
    let response = app(None)
        .oneshot(post_json(
            "/v1/tours",
            json!({
                "origin_hub": "kutaisi",
                "travel_date": "2026-10-21",
                "route": { "stops": ["Kutaisi"] }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn v1_routes_are_rate_limited_per_ip() {
    let app = app_with(Some("{\"stops\": [\"Batumi\", \"Gonio\"]}"), 1);
    let request = || {
        Request::builder()
            .uri("/v1/tours")
            .header("x-api-key", API_KEY)
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap()
    };

    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

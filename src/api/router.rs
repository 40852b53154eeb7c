//! API router.
//!
//! Routes are nested under `/api/`.
//!
//! Layer stack (outermost → innermost):
//! 1. CORS → 2. Cache-Control: no-store → 3. Audit logger → 4. Origin guard (detect only)

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::config::ServerConfig;
use crate::forwarder::Forwarder;

/// Multipart framing allowance on top of the upload cap.
const BODY_LIMIT_HEADROOM: usize = 1024 * 1024;

/// Build the API router from a forwarder and the server settings.
pub fn api_router(forwarder: Forwarder, server: &ServerConfig) -> Router {
    let ctx = ApiContext::from_config(forwarder, server);
    build_router(ctx, &server.allowed_origins)
}

/// Build router from a pre-constructed `ApiContext`.
///
/// Lets callers supply their own `OriginPolicy`.
pub fn build_router(ctx: ApiContext, cors_origins: &[String]) -> Router {
    let body_limit = ctx.forwarder.config().max_upload_bytes + BODY_LIMIT_HEADROOM;

    let guarded = Router::new()
        .route("/detect-age", post(endpoints::detect::detect_age))
        .route_layer(axum::middleware::from_fn_with_state(
            ctx.clone(),
            middleware::origin::require_allowed_origin,
        ))
        .layer(DefaultBodyLimit::max(body_limit));

    let public = Router::new().route("/health", get(endpoints::health::check));

    Router::new()
        .nest("/api", guarded.merge(public))
        .with_state(ctx)
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors_layer(cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o.trim_end_matches('/')).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Json;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::api::middleware::audit::REQUEST_ID_HEADER;
    use crate::config::ForwarderConfig;
    use crate::test_support::{multipart_body, spawn_upstream, unreachable_base_url};

    const ORIGIN: &str = "http://localhost:3000";

    fn router_for(base_url: &str) -> Router {
        router_with(ForwarderConfig::new(base_url))
    }

    fn router_with(config: ForwarderConfig) -> Router {
        api_router(Forwarder::new(config).unwrap(), &ServerConfig::default())
    }

    fn detect_request(origin: Option<&str>, field: &str, mime: &str, bytes: &[u8]) -> Request<Body> {
        let (content_type, body) = multipart_body(field, "face.jpg", mime, bytes);
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/detect-age")
            .header(header::CONTENT_TYPE, content_type);
        if let Some(o) = origin {
            builder = builder.header(header::ORIGIN, o);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn jpeg_bytes() -> Vec<u8> {
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 16, 1, 2]
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn counting_upstream(hits: Arc<AtomicUsize>) -> Router {
        Router::new().route(
            "/predict",
            post(move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({ "age": 30, "confidence": 0.91, "gender": "male" }))
                }
            }),
        )
    }

    #[tokio::test]
    async fn health_needs_no_origin() {
        let app = router_for("http://127.0.0.1:9");
        let req = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::config::APP_VERSION);
    }

    #[tokio::test]
    async fn detect_returns_canonical_result() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_upstream(counting_upstream(hits.clone())).await;

        let response = router_for(&base)
            .oneshot(detect_request(Some(ORIGIN), "image", "image/jpeg", &jpeg_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["result"]["age"], 30);
        assert_eq!(json["result"]["age_range"], "27-33");
        assert_eq!(json["result"]["gender"], "male");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_origin_is_forbidden_before_forwarding() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_upstream(counting_upstream(hits.clone())).await;

        let response = router_for(&base)
            .oneshot(detect_request(None, "image", "image/jpeg", &jpeg_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "FORBIDDEN_ORIGIN");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn foreign_origin_is_forbidden() {
        let response = router_for("http://127.0.0.1:9")
            .oneshot(detect_request(Some("https://evil.example"), "image", "image/jpeg", &jpeg_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn referer_accepted_when_origin_absent() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_upstream(counting_upstream(hits.clone())).await;

        let mut req = detect_request(None, "image", "image/jpeg", &jpeg_bytes());
        req.headers_mut().insert(
            header::REFERER,
            HeaderValue::from_static("http://localhost:3000/camera"),
        );

        let response = router_for(&base).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn disallowed_type_is_400_without_forwarding() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_upstream(counting_upstream(hits.clone())).await;

        let response = router_for(&base)
            .oneshot(detect_request(Some(ORIGIN), "image", "image/gif", b"GIF89a...."))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "INVALID_UPLOAD");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_file_is_400() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_upstream(counting_upstream(hits.clone())).await;
        let big = vec![0u8; 10 * 1024 * 1024 + 1];

        let response = router_for(&base)
            .oneshot(detect_request(Some(ORIGIN), "image", "image/png", &big))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_image_field_is_400() {
        let response = router_for("http://127.0.0.1:9")
            .oneshot(detect_request(Some(ORIGIN), "file", "image/jpeg", &jpeg_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["message"], "No image provided");
    }

    #[tokio::test]
    async fn untyped_part_is_sniffed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_upstream(counting_upstream(hits.clone())).await;

        let response = router_for(&base)
            .oneshot(detect_request(
                Some(ORIGIN),
                "image",
                "application/octet-stream",
                &jpeg_bytes(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upstream_500_is_502() {
        let base = spawn_upstream(Router::new().route(
            "/predict",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "Traceback: secret internals") }),
        ))
        .await;

        let response = router_for(&base)
            .oneshot(detect_request(Some(ORIGIN), "image", "image/jpeg", &jpeg_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = json_body(response).await;
        assert!(!json.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn slow_upstream_is_408() {
        let base = spawn_upstream(Router::new().route(
            "/predict",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "age": 30 }))
            }),
        ))
        .await;

        let app = router_with(ForwarderConfig::new(&base).with_timeout(Duration::from_millis(200)));
        let response = app
            .oneshot(detect_request(Some(ORIGIN), "image", "image/jpeg", &jpeg_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_503() {
        let base = unreachable_base_url().await;
        let response = router_for(&base)
            .oneshot(detect_request(Some(ORIGIN), "image", "image/jpeg", &jpeg_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn malformed_upstream_is_502() {
        let base = spawn_upstream(Router::new().route(
            "/predict",
            post(|| async { Json(json!(["not", "an", "object"])) }),
        ))
        .await;

        let response = router_for(&base)
            .oneshot(detect_request(Some(ORIGIN), "image", "image/jpeg", &jpeg_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "MALFORMED_RESPONSE");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let req = Request::builder().uri("/nonexistent").body(Body::empty()).unwrap();
        let response = router_for("http://127.0.0.1:9").oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

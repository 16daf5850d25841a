use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::pipeline::RequestId;

pub mod handlers;

/// Chat messages are short; anything larger is a client bug.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the public router.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let cors = cors_layer(ctx.config.allowed_origin.clone());

    Router::new()
        .route("/", get(handlers::root))
        .route("/api/chat", post(handlers::chat))
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(handlers::readiness))
        .route("/metrics", get(handlers::metrics))
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
}

/// The SPA frontend origin plus any localhost origin (dev servers).
fn cors_layer(allowed_origin: String) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            let origin = origin.to_str().unwrap_or("");
            origin == allowed_origin
                || origin.starts_with("http://localhost:")
                || origin.starts_with("http://127.0.0.1:")
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
}

/// Middleware: mints the request id handlers log under and echoes it as X-Request-Id.
async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let req_id = RequestId::new();
    req.extensions_mut().insert(req_id.clone());
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(req_id.as_str()) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: security headers on every response.
async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    // Replies contain business data fetched with the user's identity
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.remove("Server");

    resp
}

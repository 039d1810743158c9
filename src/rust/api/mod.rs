//! REST API served under `/api/v1`.

pub mod error;
pub mod routes;
pub mod state;

use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use log::{info, warn};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use uuid::Uuid;

use crate::config::Settings;

pub use error::ApiError;
pub use state::{AppState, SharedState};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Builds the full application router with middleware attached.
pub fn build_router(state: SharedState) -> Router {
    let body_limit = state.settings.max_file_size_bytes() + 1024 * 1024;
    let cors = cors_layer(&state.settings);

    let api = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/predict", post(routes::prediction::predict_disease))
        .route("/diseases", get(routes::diseases::list_diseases))
        .route("/diseases/:name", get(routes::diseases::get_disease))
        .route("/whatsapp/webhook", post(routes::whatsapp::whatsapp_webhook));

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(request_id))
        .layer(cors)
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if settings.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = settings
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Tags every request with an `X-Request-ID` and logs one line per request.
async fn request_id(mut request: Request, next: Next) -> Response {
    let header = HeaderName::from_static(REQUEST_ID_HEADER);
    let id = request
        .headers()
        .get(&header)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    if let Ok(value) = HeaderValue::from_str(&id) {
        request.headers_mut().insert(header.clone(), value);
    }

    let start = Instant::now();
    let mut response = next.run(request).await;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(header, value);
    }
    let short: String = id.chars().take(8).collect();
    info!(
        "{} {} -> {} ({:.0} ms) [{}]",
        method,
        path,
        response.status().as_u16(),
        elapsed_ms,
        short
    );
    response
}

//! The built-in API sub-router, mounted at `/api` unless the embedding
//! application brings its own routes.

use serde_json::json;

use crate::health::HealthState;
use crate::request::Request;
use crate::response::IntoResponse;
use crate::router::Router;

/// Mount prefix used by the bootstrap pass.
pub const PREFIX: &str = "/api";

pub fn router(health: HealthState) -> Router {
    Router::new()
        .get("/", |_req: Request| async {
            json!({ "name": env!("CARGO_PKG_NAME"), "version": env!("CARGO_PKG_VERSION") })
        })
        .get("/health", move |_req: Request| {
            let snapshot = health.snapshot();
            async move { serde_json::to_value(snapshot).unwrap_or_default().into_response() }
        })
}

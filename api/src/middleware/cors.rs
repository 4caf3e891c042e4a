use axum::http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::session::SESSION_HEADER;

/// Browser-hosted MCP clients connect from arbitrary origins and must be able
/// to read the session header.
///
/// - Origins: any
/// - Methods: GET, POST, OPTIONS
/// - Headers: Accept, Content-Type, Mcp-Session-Id, Last-Event-ID
/// - Max age: 3600s
pub fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("accept"),
            HeaderName::from_static("content-type"),
            HeaderName::from_static(SESSION_HEADER),
            HeaderName::from_static("last-event-id"),
        ])
        .expose_headers([HeaderName::from_static(SESSION_HEADER)])
        .max_age(std::time::Duration::from_secs(3600))
}

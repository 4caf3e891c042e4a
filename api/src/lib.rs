//! HTTP and server-sent events transport for the Slide MCP server.
//!
//! `POST /mcp` carries JSON-RPC messages with session affinity through the
//! `Mcp-Session-Id` header, `GET /mcp` opens the session's event stream and
//! `GET /health` answers `OK`.

use std::net::SocketAddr;

use axum::Router;
use slide_mcp_runtime::McpServer;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub mod error;
mod middleware;
pub mod routes;
pub mod session;
pub mod sse;
pub mod state;

pub use error::HttpError;
pub use state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::mcp_http::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::cors::build_cors_layer()),
        )
        .with_state(state)
}

/// Binds `0.0.0.0:<port>` and serves until the listener fails.
pub async fn serve(server: McpServer, port: u16) -> std::io::Result<()> {
    let state = AppState::new(server);
    let _sweeper = state.sessions.spawn_sweeper(state.streams.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(event = "http_transport_listening", %addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await
}

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use slide_mcp_runtime::is_notification;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::error::HttpError;
use crate::session::SESSION_HEADER;
use crate::state::AppState;

const MCP_PATH: &str = "/mcp";
const EVENT_STREAM: &str = "text/event-stream";

pub fn router() -> Router<AppState> {
    Router::new().route(
        MCP_PATH,
        post(mcp_post).get(mcp_get).fallback(method_not_allowed),
    )
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// True when any listed media type is `text/event-stream`.
fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|media| {
            media
                .split(';')
                .next()
                .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(EVENT_STREAM))
        })
}

fn with_session(mut response: Response, session_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

async fn mcp_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HttpError> {
    let request_id = Uuid::now_v7();
    let echoed = header_value(&headers, SESSION_HEADER);
    let session_id = state.sessions.resolve(echoed.as_deref()).await;

    let incoming: Value = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(
            event = "mcp_http_parse_error",
            request_id = %request_id,
            session_id = %session_id,
            error = %e
        );
        HttpError::Parse {
            session_id: session_id.clone(),
        }
    })?;

    let notification = is_notification(&incoming);
    tracing::info!(
        event = "mcp_http_request",
        request_id = %request_id,
        session_id = %session_id,
        method = ?incoming.get("method").and_then(serde_json::Value::as_str),
        notification
    );

    let responses = state.server.handle_incoming_message(incoming).await;
    let response = match responses.len() {
        0 => StatusCode::ACCEPTED.into_response(),
        1 => (
            StatusCode::OK,
            Json(responses.into_iter().next().unwrap_or(Value::Null)),
        )
            .into_response(),
        _ => (StatusCode::OK, Json(Value::Array(responses))).into_response(),
    };
    Ok(with_session(response, &session_id))
}

async fn mcp_get(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, HttpError> {
    if !accepts_event_stream(&headers) {
        tracing::warn!(event = "mcp_sse_not_acceptable", accept = ?header_value(&headers, "accept"));
        return Err(HttpError::NotAcceptable);
    }
    let Some(session_id) = header_value(&headers, SESSION_HEADER) else {
        return Err(HttpError::InvalidSession);
    };
    if !state.sessions.validate(&session_id).await {
        return Err(HttpError::InvalidSession);
    }
    if let Some(last_event_id) = header_value(&headers, "last-event-id") {
        tracing::debug!(event = "mcp_sse_resume", session_id = %session_id, last_event_id = %last_event_id);
    }

    let frames = state
        .streams
        .attach(&session_id)
        .await
        .map(Ok::<_, Infallible>);
    let response = (
        [(CONTENT_TYPE, EVENT_STREAM), (CACHE_CONTROL, "no-cache")],
        Body::from_stream(frames),
    )
        .into_response();
    Ok(with_session(response, &session_id))
}

async fn method_not_allowed() -> HttpError {
    HttpError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Method, Request};
    use serde_json::json;
    use slide_core::ServerConfig;
    use slide_mcp_runtime::McpServer;
    use tower::ServiceExt;

    use super::*;

    fn state() -> AppState {
        let config = ServerConfig::new("test-key", "http://127.0.0.1:9").expect("config");
        AppState::new(McpServer::new(Arc::new(config)))
    }

    fn post_request(body: &str, session: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(MCP_PATH)
            .header(CONTENT_TYPE, "application/json");
        if let Some(id) = session {
            builder = builder.header(SESSION_HEADER, id);
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("request should build")
    }

    fn session_of(response: &Response) -> String {
        response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .expect("session header should be echoed")
            .to_string()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn request_returns_json_and_mints_a_session() {
        let response = crate::app(state())
            .oneshot(post_request(
                &json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string(),
                None,
            ))
            .await
            .expect("request should succeed");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(session_of(&response).len(), 32);
        let body = body_json(response).await;
        assert_eq!(body["id"], 1);
        assert!(body["result"]["tools"].is_array());
    }

    #[tokio::test]
    async fn known_session_is_reused_and_unknown_is_replaced() {
        let state = state();
        let known = state.sessions.create().await;

        let response = crate::app(state.clone())
            .oneshot(post_request(
                r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
                Some(&known),
            ))
            .await
            .expect("request should succeed");
        assert_eq!(session_of(&response), known);

        let response = crate::app(state)
            .oneshot(post_request(
                r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#,
                Some("stale"),
            ))
            .await
            .expect("request should succeed");
        let minted = session_of(&response);
        assert_ne!(minted, "stale");
        assert_ne!(minted, known);
    }

    #[tokio::test]
    async fn notification_is_accepted_with_empty_body() {
        let response = crate::app(state())
            .oneshot(post_request(
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
                None,
            ))
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn message_without_id_is_accepted_even_with_a_loose_envelope() {
        let state = state();
        for body in [r#"{"method":"notifications/initialized"}"#, r#"{"jsonrpc":"1.0"}"#] {
            let response = crate::app(state.clone())
                .oneshot(post_request(body, None))
                .await
                .expect("request should succeed");
            assert_eq!(response.status(), StatusCode::ACCEPTED);
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("body should read");
            assert!(bytes.is_empty());
        }

        let response = crate::app(state)
            .oneshot(post_request(r#"{"jsonrpc":"2.0","id":4}"#, None))
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], 4);
        assert_eq!(body["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn malformed_body_is_a_400_parse_error() {
        let response = crate::app(state())
            .oneshot(post_request("{nope", None))
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["id"], Value::Null);
        assert_eq!(body["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn stream_requires_event_stream_accept_and_a_session() {
        let state = state();
        let session = state.sessions.create().await;

        let response = crate::app(state.clone())
            .oneshot(
                Request::builder()
                    .uri(MCP_PATH)
                    .header(ACCEPT, "application/json")
                    .header(SESSION_HEADER, &session)
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);

        let response = crate::app(state)
            .oneshot(
                Request::builder()
                    .uri(MCP_PATH)
                    .header(ACCEPT, EVENT_STREAM)
                    .header(SESSION_HEADER, "unknown")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn stream_opens_with_comment_and_delivers_events() {
        let state = state();
        let session = state.sessions.create().await;

        let response = crate::app(state.clone())
            .oneshot(
                Request::builder()
                    .uri(MCP_PATH)
                    .header(ACCEPT, "text/event-stream, application/json")
                    .header(SESSION_HEADER, &session)
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).expect("content type"),
            EVENT_STREAM
        );

        let mut frames = response.into_body().into_data_stream();
        let first = frames
            .next()
            .await
            .expect("first frame")
            .expect("frame bytes");
        assert!(first.starts_with(b": connected at "));

        assert!(state.streams.send(&session, Some("message"), "{}").await);
        let event = frames
            .next()
            .await
            .expect("event frame")
            .expect("frame bytes");
        let event = String::from_utf8(event.to_vec()).expect("utf8");
        assert!(event.starts_with("id: "));
        assert!(event.ends_with("event: message\ndata: {}\n\n"));
    }

    #[tokio::test]
    async fn other_methods_and_health() {
        let response = crate::app(state())
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri(MCP_PATH)
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = crate::app(state())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        assert_eq!(&bytes[..], b"OK");
    }
}

use axum::Json;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use slide_mcp_runtime::{RpcError, error_response};

use crate::session::SESSION_HEADER;

/// Transport-level failures on `/mcp`, answered with an HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Body was not JSON. Answered with a JSON-RPC parse-error envelope.
    #[error("parse error")]
    Parse { session_id: String },
    #[error("Unsupported Accept header for GET")]
    NotAcceptable,
    #[error("Invalid or missing session")]
    InvalidSession,
    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match self {
            HttpError::Parse { session_id } => {
                let body = error_response(serde_json::Value::Null, RpcError::parse_error());
                let mut response = (StatusCode::BAD_REQUEST, Json(body)).into_response();
                if let Ok(value) = HeaderValue::from_str(&session_id) {
                    response.headers_mut().insert(SESSION_HEADER, value);
                }
                response
            }
            HttpError::NotAcceptable => {
                (StatusCode::NOT_ACCEPTABLE, self.to_string()).into_response()
            }
            HttpError::InvalidSession => {
                (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
            }
            HttpError::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, self.to_string()).into_response()
            }
        }
    }
}

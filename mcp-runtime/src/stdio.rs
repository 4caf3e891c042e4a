//! Newline-delimited JSON-RPC over a byte stream (stdin/stdout in production).

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::RpcError;
use crate::{McpServer, error_response, is_notification};

static RAW_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""id"\s*:\s*("(?:[^"\\]|\\.)*"|-?\d+(?:\.\d+)?|null)"#).expect("valid id regex")
});

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to read MCP message: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to write MCP response: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to serialize MCP response: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Best-effort `id` recovery from a line that is not valid JSON.
fn salvage_id(raw: &str) -> Option<Value> {
    let captured = RAW_ID_RE.captures(raw)?.get(1)?.as_str();
    serde_json::from_str(captured).ok()
}

async fn write_line<W>(writer: &mut W, value: &Value) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line).await.map_err(TransportError::Write)?;
    writer.flush().await.map_err(TransportError::Write)
}

/// Serves until EOF, or until the first request has been answered when
/// `exit_after_first` is set.
pub async fn serve<R, W>(
    server: &McpServer,
    reader: R,
    mut writer: W,
    exit_after_first: bool,
) -> Result<(), TransportError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.map_err(TransportError::Read)? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let incoming: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(event = "stdio_parse_error", error = %e);
                if let Some(id) = salvage_id(line) {
                    write_line(&mut writer, &error_response(id, RpcError::parse_error())).await?;
                }
                continue;
            }
        };

        let notification = is_notification(&incoming);
        for response in server.handle_incoming_message(incoming).await {
            write_line(&mut writer, &response).await?;
        }
        if exit_after_first && !notification {
            tracing::info!(event = "stdio_exit_after_first");
            break;
        }
    }
    Ok(())
}

/// [`serve`] bound to the process stdin and stdout.
pub async fn serve_stdio(server: &McpServer, exit_after_first: bool) -> Result<(), TransportError> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    serve(server, stdin, tokio::io::stdout(), exit_after_first).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::context_for;
    use serde_json::json;
    use wiremock::MockServer;

    async fn run(input: &str, exit_after_first: bool) -> Vec<Value> {
        let mock = MockServer::start().await;
        let server = McpServer::with_context(context_for(&mock));
        let mut output = Vec::new();
        serve(&server, input.as_bytes(), &mut output, exit_after_first)
            .await
            .expect("serve");
        String::from_utf8(output)
            .expect("utf8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("one json value per line"))
            .collect()
    }

    #[tokio::test]
    async fn notifications_and_blank_lines_write_nothing() {
        let out = run(
            "\n{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n   \n",
            false,
        )
        .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn each_request_gets_one_line_echoing_its_id() {
        let input = [
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string(),
            json!({"jsonrpc": "2.0", "id": "b", "method": "bogus"}).to_string(),
        ]
        .join("\n");
        let out = run(&input, false).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["id"], 1);
        assert!(out[0]["result"]["tools"].is_array());
        assert_eq!(out[1]["id"], "b");
        assert_eq!(out[1]["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn parse_errors_answer_only_when_an_id_is_visible() {
        let out = run("{\"jsonrpc\":\"2.0\",\"id\":42,\"method\":\n{not json\n", false).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["id"], 42);
        assert_eq!(out[0]["error"]["code"], -32700);
        assert_eq!(out[0]["error"]["message"], "Parse error");
    }

    #[tokio::test]
    async fn exit_after_first_stops_after_one_request() {
        let input = [
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string(),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}).to_string(),
        ]
        .join("\n");
        let out = run(&input, true).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["id"], 1);
    }

    #[tokio::test]
    async fn exit_after_first_skips_past_unparseable_lines() {
        let input = [
            "{not json".to_string(),
            "{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":".to_string(),
            json!({"jsonrpc": "2.0", "id": 8, "method": "tools/list"}).to_string(),
            json!({"jsonrpc": "2.0", "id": 9, "method": "tools/list"}).to_string(),
        ]
        .join("\n");
        let out = run(&input, true).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["id"], 7);
        assert_eq!(out[0]["error"]["code"], -32700);
        assert_eq!(out[1]["id"], 8);
        assert!(out[1]["result"]["tools"].is_array());
    }

    #[tokio::test]
    async fn exit_after_first_ignores_leading_notifications() {
        let notifications = [
            json!({"method": "notifications/initialized"}).to_string(),
            json!({"jsonrpc": "1.0", "method": "notifications/cancelled"}).to_string(),
        ]
        .join("\n");
        assert!(run(&notifications, true).await.is_empty());

        let input = format!(
            "{notifications}\n{}\n{}",
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})
        );
        let out = run(&input, true).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["id"], 1);
    }

    #[test]
    fn salvages_string_and_numeric_ids() {
        assert_eq!(salvage_id(r#"{"id": "a\"b", "x":"#), Some(json!("a\"b")));
        assert_eq!(salvage_id(r#"{"id":-3,"#), Some(json!(-3)));
        assert_eq!(salvage_id("{broken"), None);
    }
}

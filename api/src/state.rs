use std::sync::Arc;

use slide_mcp_runtime::McpServer;

use crate::session::SessionManager;
use crate::sse::SseHub;

#[derive(Clone)]
pub struct AppState {
    pub server: Arc<McpServer>,
    pub sessions: SessionManager,
    pub streams: SseHub,
}

impl AppState {
    pub fn new(server: McpServer) -> Self {
        Self {
            server: Arc::new(server),
            sessions: SessionManager::new(),
            streams: SseHub::new(),
        }
    }
}

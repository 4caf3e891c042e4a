use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::sse::SseHub;

pub const SESSION_HEADER: &str = "mcp-session-id";
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(60 * 60);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub created_at: Instant,
    pub last_used: Instant,
}

/// Process-local session table keyed by the opaque hex id sent in `Mcp-Session-Id`.
#[derive(Debug, Clone, Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

/// 128 random bits, hex encoded.
pub fn new_session_id() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> String {
        let id = new_session_id();
        let now = Instant::now();
        self.sessions.write().await.insert(
            id.clone(),
            Session {
                created_at: now,
                last_used: now,
            },
        );
        tracing::info!(event = "mcp_session_created", session_id = %id);
        id
    }

    /// Marks the session used. False when the id is unknown.
    pub async fn validate(&self, id: &str) -> bool {
        match self.sessions.write().await.get_mut(id) {
            Some(session) => {
                session.last_used = Instant::now();
                true
            }
            None => {
                tracing::warn!(event = "mcp_session_unknown", session_id = %id);
                false
            }
        }
    }

    /// Reuses the echoed session when it is known, otherwise mints a new one.
    pub async fn resolve(&self, echoed: Option<&str>) -> String {
        match echoed {
            Some(id) if !id.is_empty() && self.validate(id).await => id.to_string(),
            _ => self.create().await,
        }
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).copied()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops sessions idle longer than `ttl` as of `now`, keeping any session
    /// with an attached stream reader. Returns how many were removed.
    pub async fn sweep_idle(&self, now: Instant, ttl: Duration, streams: &SseHub) -> usize {
        let attached = streams.attached_sessions().await;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            attached.contains(id) || now.saturating_duration_since(session.last_used) <= ttl
        });
        before - sessions.len()
    }

    pub fn spawn_sweeper(&self, streams: SseHub) -> tokio::task::JoinHandle<()> {
        let sessions = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = sessions
                    .sweep_idle(Instant::now(), SESSION_IDLE_TTL, &streams)
                    .await;
                if evicted > 0 {
                    tracing::info!(event = "mcp_sessions_evicted", count = evicted);
                }
            }
        })
    }
}

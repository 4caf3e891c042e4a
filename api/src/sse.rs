//! Server-sent event fan-out. Each session has at most one reader; the reader's
//! heartbeat task removes it from the table as soon as the client goes away.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tokio::sync::{RwLock, mpsc};
use tokio_stream::wrappers::ReceiverStream;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
struct Reader {
    reader_id: u64,
    tx: mpsc::Sender<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SseHub {
    readers: Arc<RwLock<HashMap<String, Reader>>>,
    next_reader: Arc<AtomicU64>,
}

/// 8 random bytes, hex encoded.
pub fn new_event_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes)
}

pub fn comment_frame(text: &str) -> String {
    format!(": {text}\n\n")
}

pub fn event_frame(event_id: &str, event_type: Option<&str>, data: &str) -> String {
    let mut frame = format!("id: {event_id}\n");
    if let Some(kind) = event_type.filter(|kind| !kind.is_empty()) {
        frame.push_str(&format!("event: {kind}\n"));
    }
    for line in data.split('\n') {
        frame.push_str(&format!("data: {line}\n"));
    }
    frame.push('\n');
    frame
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl SseHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the session's reader, replacing any previous one, and returns
    /// the frame stream to hand to the HTTP body.
    pub async fn attach(&self, session_id: &str) -> ReceiverStream<String> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let reader_id = self.next_reader.fetch_add(1, Ordering::Relaxed);
        let _ = tx.try_send(comment_frame(&format!("connected at {}", now_rfc3339())));

        let previous = self.readers.write().await.insert(
            session_id.to_string(),
            Reader {
                reader_id,
                tx: tx.clone(),
            },
        );
        if previous.is_some() {
            tracing::info!(event = "sse_reader_replaced", session_id = %session_id);
        }
        let readers = self.readers.read().await.len();
        tracing::info!(
            event = "sse_reader_attached",
            session_id = %session_id,
            readers
        );

        self.spawn_heartbeat(session_id.to_string(), reader_id, tx);
        ReceiverStream::new(rx)
    }

    fn spawn_heartbeat(&self, session_id: String, reader_id: u64, tx: mpsc::Sender<String>) {
        let hub = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            ticker.tick().await;
            let mut beats: u64 = 0;
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {
                        beats += 1;
                        let beat = comment_frame(&format!("heartbeat {}", now_rfc3339()));
                        if tx.send(beat).await.is_err() {
                            tracing::debug!(event = "sse_heartbeat_failed", session_id = %session_id, beats);
                            break;
                        }
                    }
                }
            }
            hub.detach(&session_id, reader_id).await;
        });
    }

    async fn detach(&self, session_id: &str, reader_id: u64) {
        let mut readers = self.readers.write().await;
        if readers
            .get(session_id)
            .is_some_and(|reader| reader.reader_id == reader_id)
        {
            readers.remove(session_id);
            tracing::info!(
                event = "sse_reader_detached",
                session_id = %session_id,
                readers = readers.len()
            );
        }
    }

    pub async fn is_attached(&self, session_id: &str) -> bool {
        self.readers.read().await.contains_key(session_id)
    }

    pub async fn attached_sessions(&self) -> HashSet<String> {
        self.readers.read().await.keys().cloned().collect()
    }

    /// Sends one event to a session's reader. A session without a reader is a
    /// logged no-op.
    pub async fn send(&self, session_id: &str, event_type: Option<&str>, data: &str) -> bool {
        let tx = self
            .readers
            .read()
            .await
            .get(session_id)
            .map(|reader| reader.tx.clone());
        let Some(tx) = tx else {
            tracing::warn!(event = "sse_send_without_reader", session_id = %session_id);
            return false;
        };
        let frame = event_frame(&new_event_id(), event_type, data);
        match tx.send(frame).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(event = "sse_send_failed", session_id = %session_id);
                false
            }
        }
    }

    pub async fn broadcast(&self, event_type: Option<&str>, data: &str) -> BroadcastOutcome {
        let targets: Vec<(String, mpsc::Sender<String>)> = self
            .readers
            .read()
            .await
            .iter()
            .map(|(id, reader)| (id.clone(), reader.tx.clone()))
            .collect();
        if targets.is_empty() {
            tracing::warn!(event = "sse_broadcast_without_readers");
        }

        let mut outcome = BroadcastOutcome::default();
        for (session_id, tx) in targets {
            let frame = event_frame(&new_event_id(), event_type, data);
            if tx.send(frame).await.is_ok() {
                outcome.delivered += 1;
            } else {
                tracing::warn!(event = "sse_broadcast_failed", session_id = %session_id);
                outcome.failed += 1;
            }
        }
        tracing::info!(
            event = "sse_broadcast",
            delivered = outcome.delivered,
            failed = outcome.failed
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[test]
    fn event_frames_follow_the_wire_format() {
        assert_eq!(
            event_frame("00ff", Some("message"), "{\"a\":1}"),
            "id: 00ff\nevent: message\ndata: {\"a\":1}\n\n"
        );
        assert_eq!(event_frame("01", None, "x"), "id: 01\ndata: x\n\n");
        assert_eq!(event_frame("01", Some(""), "a\nb"), "id: 01\ndata: a\ndata: b\n\n");
        assert_eq!(new_event_id().len(), 16);
    }

    #[tokio::test]
    async fn reader_gets_initial_comment_then_events() {
        let hub = SseHub::new();
        let mut stream = hub.attach("s1").await;

        let first = stream.next().await.expect("initial comment");
        assert!(first.starts_with(": connected at "));

        assert!(hub.send("s1", Some("message"), "hello").await);
        let event = stream.next().await.expect("event");
        assert!(event.starts_with("id: "));
        assert!(event.ends_with("event: message\ndata: hello\n\n"));
    }

    #[tokio::test]
    async fn sending_without_reader_is_a_no_op() {
        let hub = SseHub::new();
        assert!(!hub.send("missing", None, "x").await);
    }

    #[tokio::test]
    async fn closed_reader_leaves_the_table() {
        let hub = SseHub::new();
        let stream = hub.attach("s1").await;
        assert!(hub.is_attached("s1").await);
        drop(stream);

        tokio::time::timeout(Duration::from_secs(5), async {
            while hub.is_attached("s1").await {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("reader detached before the next heartbeat");
    }

    #[tokio::test]
    async fn broadcast_counts_successes_and_failures() {
        let hub = SseHub::new();
        let _live = hub.attach("live").await;
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        hub.readers
            .write()
            .await
            .insert("gone".to_string(), Reader { reader_id: u64::MAX, tx });

        let outcome = hub.broadcast(None, "ping").await;
        assert_eq!(
            outcome,
            BroadcastOutcome {
                delivered: 1,
                failed: 1
            }
        );
    }
}

//! Real-time push channels.
//!
//! Delivery is best-effort and at-most-once. A client that was not
//! listening simply misses the event and is expected to refetch.

use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::events::{Event, EventSink, PushTarget};

#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn publish(&self, event: Event) -> anyhow::Result<()>;

    /// Deliver to all of one user's connected sessions.
    async fn emit_to_user(
        &self,
        user_id: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.publish(Event::new(PushTarget::User(user_id.to_string()), event, payload))
            .await
    }

    /// Broadcast to every session watching a workspace.
    async fn emit_to_workspace(
        &self,
        workspace_id: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.publish(Event::new(
            PushTarget::Workspace(workspace_id.to_string()),
            event,
            payload,
        ))
        .await
    }
}

/// In-process fan-out over a tokio broadcast channel. Subscribers receive
/// every event and filter on [`Event::channel`].
pub struct BroadcastPush {
    tx: broadcast::Sender<Event>,
}

impl BroadcastPush {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastPush {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl PushChannel for BroadcastPush {
    async fn publish(&self, event: Event) -> anyhow::Result<()> {
        if let Err(err) = self.tx.send(event) {
            debug!(channel = %err.0.channel, event = %err.0.event, "push dropped: no subscribers");
        }
        Ok(())
    }
}

/// Writes each pushed event as one JSON line.
pub struct JsonlPush {
    sink: Mutex<EventSink>,
}

impl JsonlPush {
    pub fn new(sink: EventSink) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl PushChannel for JsonlPush {
    async fn publish(&self, event: Event) -> anyhow::Result<()> {
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| anyhow!("event sink lock poisoned"))?;
        sink.emit(&event)?;
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPush;

#[async_trait]
impl PushChannel for NoopPush {
    async fn publish(&self, _event: Event) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::names;

    #[tokio::test]
    async fn broadcast_reaches_subscribers_with_channel_name() {
        let push = BroadcastPush::new(8);
        let mut rx = push.subscribe();
        push.emit_to_user("u-9", names::NOTIFICATION_NEW, serde_json::json!({"id": "n1"}))
            .await
            .expect("emit");

        let event = rx.recv().await.expect("recv");
        assert_eq!(event.channel.to_string(), "user:u-9");
        assert_eq!(event.event, names::NOTIFICATION_NEW);
        assert_eq!(event.data["id"], "n1");
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_not_an_error() {
        let push = BroadcastPush::default();
        push.emit_to_workspace("w1", names::TASK_UPDATED, serde_json::Value::Null)
            .await
            .expect("no subscribers is fine");
    }

    #[tokio::test]
    async fn jsonl_push_writes_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("events.jsonl");
        let push = JsonlPush::new(EventSink::file(&path).expect("sink"));
        push.emit_to_workspace("w1", names::COMMENT_CREATED, serde_json::json!({"id": "c1"}))
            .await
            .expect("emit");

        let content = std::fs::read_to_string(&path).expect("read");
        assert!(content.contains("\"channel\":\"workspace:w1\""));
        assert!(content.ends_with('\n'));
    }
}

//! The hub: a single serialized actor owning the subscription registry.
//!
//! Every mutation and every delivery goes through one command queue and is
//! applied by one task, in receipt order. Other components hold a cheap,
//! cloneable [`Hub`] handle and never see the map itself.
//!
//! ```text
//! inbound pumps ──Subscribe/Unsubscribe──┐
//! inbound pumps ──Broadcast (notice)─────┼──▶ hub task ──try_send──▶ outbound queues
//! upstream bridge ──Broadcast (topic)────┘
//! ```

pub mod registry;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub use registry::{
    DeliveryReport, HubSnapshot, SubscriptionRegistry, TopicSnapshot, TopicSwitchPolicy,
};

use crate::domain::{BroadcastRequest, BroadcastTarget, ConnectionHandle, ConnectionId, Topic};
use crate::error::RelayError;

/// Operations accepted by the hub task.
#[derive(Debug)]
pub enum HubCommand {
    /// Add a connection to a topic.
    Subscribe {
        /// Connection to register.
        conn: ConnectionHandle,
        /// Topic to join.
        topic: Topic,
    },
    /// Remove a connection from one topic, or from all when `topic` is `None`.
    Unsubscribe {
        /// Connection to remove.
        id: ConnectionId,
        /// Topic to leave; `None` means every topic.
        topic: Option<Topic>,
    },
    /// Deliver a payload to a topic or a single connection.
    Broadcast(BroadcastRequest),
    /// Reply with a read-only view of the registry.
    Snapshot {
        /// Reply channel.
        reply: oneshot::Sender<HubSnapshot>,
    },
}

/// Cloneable handle to the hub task.
#[derive(Debug, Clone)]
pub struct Hub {
    commands: mpsc::Sender<HubCommand>,
}

impl Hub {
    /// Spawns the hub task and returns a handle to it.
    ///
    /// The task ends once every [`Hub`] handle has been dropped.
    #[must_use]
    pub fn spawn(policy: TopicSwitchPolicy, capacity: usize) -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(run(SubscriptionRegistry::new(policy), rx));
        (Self { commands }, task)
    }

    /// Registers `conn` under `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HubUnavailable`] if the hub task has stopped.
    pub async fn subscribe(&self, conn: ConnectionHandle, topic: Topic) -> Result<(), RelayError> {
        self.send(HubCommand::Subscribe { conn, topic }).await
    }

    /// Removes `id` from `topic`, or from every topic when `topic` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HubUnavailable`] if the hub task has stopped.
    pub async fn unsubscribe(&self, id: ConnectionId, topic: Option<Topic>) -> Result<(), RelayError> {
        self.send(HubCommand::Unsubscribe { id, topic }).await
    }

    /// Submits a broadcast request.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HubUnavailable`] if the hub task has stopped.
    pub async fn broadcast(&self, request: BroadcastRequest) -> Result<(), RelayError> {
        self.send(HubCommand::Broadcast(request)).await
    }

    /// Returns a consistent view of the registry, ordered after every
    /// command submitted before it.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HubUnavailable`] if the hub task has stopped.
    pub async fn snapshot(&self) -> Result<HubSnapshot, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| RelayError::HubUnavailable)
    }

    async fn send(&self, command: HubCommand) -> Result<(), RelayError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RelayError::HubUnavailable)
    }
}

/// The hub task: applies commands one at a time until all handles drop.
async fn run(mut registry: SubscriptionRegistry, mut rx: mpsc::Receiver<HubCommand>) {
    tracing::info!(policy = ?registry.policy(), "hub started");

    while let Some(command) = rx.recv().await {
        match command {
            HubCommand::Subscribe { conn, topic } => {
                tracing::info!(connection_id = %conn.id(), %topic, "subscribe");
                registry.subscribe(conn, topic);
            }
            HubCommand::Unsubscribe { id, topic } => {
                let removed = registry.unsubscribe(id, topic.as_ref());
                match topic {
                    Some(topic) => {
                        tracing::info!(connection_id = %id, %topic, removed, "unsubscribe");
                    }
                    None => tracing::debug!(connection_id = %id, removed, "unsubscribe all"),
                }
            }
            HubCommand::Broadcast(request) => {
                let label = match &request.target {
                    BroadcastTarget::Topic(topic) => topic.to_string(),
                    BroadcastTarget::Connection(conn) => format!("connection:{}", conn.id()),
                };
                let report = registry.broadcast(request);
                tracing::debug!(
                    target_label = %label,
                    delivered = report.delivered,
                    evicted = report.evicted,
                    "broadcast"
                );
            }
            HubCommand::Snapshot { reply } => {
                let _ = reply.send(registry.snapshot());
            }
        }
    }

    tracing::info!(topics = registry.topic_count(), "hub stopped");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::extract::ws::Utf8Bytes;
    use tokio::sync::watch;

    use super::*;

    fn peer(capacity: usize) -> (ConnectionHandle, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        let (closer, _) = watch::channel(false);
        (
            ConnectionHandle::new(ConnectionId::new(), tx, Arc::new(closer)),
            rx,
        )
    }

    fn topic(name: &str) -> Topic {
        let Ok(t) = Topic::new(name) else {
            panic!("valid topic");
        };
        t
    }

    async fn snapshot(hub: &Hub) -> HubSnapshot {
        let Ok(snapshot) = hub.snapshot().await else {
            panic!("hub stopped");
        };
        snapshot
    }

    #[tokio::test]
    async fn commands_apply_in_receipt_order() {
        let (hub, _task) = Hub::spawn(TopicSwitchPolicy::Replace, 16);
        let (conn, mut rx) = peer(8);
        let id = conn.id();

        assert!(hub.subscribe(conn, topic("trades")).await.is_ok());
        assert!(
            hub.broadcast(BroadcastRequest::to_topic(topic("trades"), "first"))
                .await
                .is_ok()
        );
        assert!(hub.unsubscribe(id, Some(topic("trades"))).await.is_ok());
        assert!(
            hub.broadcast(BroadcastRequest::to_topic(topic("trades"), "second"))
                .await
                .is_ok()
        );

        let snap = snapshot(&hub).await;
        assert!(snap.topics.is_empty());
        assert_eq!(snap.connections, 0);

        let Some(first) = rx.recv().await else {
            panic!("expected first payload");
        };
        assert_eq!(first.as_str(), "first");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn fan_out_skips_other_topics() {
        let (hub, _task) = Hub::spawn(TopicSwitchPolicy::Replace, 16);
        let mut members = Vec::new();
        for _ in 0..3 {
            let (conn, rx) = peer(8);
            assert!(hub.subscribe(conn, topic("T")).await.is_ok());
            members.push(rx);
        }
        let (outsider, mut outsider_rx) = peer(8);
        assert!(hub.subscribe(outsider, topic("U")).await.is_ok());

        assert!(
            hub.broadcast(BroadcastRequest::to_topic(topic("T"), "P"))
                .await
                .is_ok()
        );
        let snap = snapshot(&hub).await;
        assert_eq!(snap.members("T").len(), 3);

        for rx in &mut members {
            let Some(got) = rx.recv().await else {
                panic!("member missed payload");
            };
            assert_eq!(got.as_str(), "P");
        }
        assert!(outsider_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropping_all_handles_stops_task() {
        let (hub, task) = Hub::spawn(TopicSwitchPolicy::Replace, 4);
        drop(hub);
        assert!(task.await.is_ok());
    }

    #[tokio::test]
    async fn stopped_hub_reports_unavailable() {
        let (hub, task) = Hub::spawn(TopicSwitchPolicy::Replace, 4);
        task.abort();
        let _ = task.await;
        assert!(matches!(
            hub.snapshot().await,
            Err(RelayError::HubUnavailable)
        ));
    }
}

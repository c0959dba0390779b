//! Routing handle for one connection, plus the broadcast envelope.
//!
//! A [`ConnectionHandle`] is what the hub stores for each subscriber. It
//! can enqueue onto the connection's bounded outbound queue without
//! blocking and can signal the connection to close, but it never touches
//! the socket: the connection's own pump pair owns that exclusively.

use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{mpsc, watch};

use super::{ConnectionId, Topic};

/// Why a non-blocking enqueue did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The outbound queue is at capacity (slow or stalled consumer).
    #[error("outbound queue full")]
    Full,
    /// The connection has released its queue.
    #[error("connection gone")]
    Gone,
}

/// Non-owning reference to a live connection.
///
/// Cloning is cheap. The outbound queue stays open while any handle is
/// alive; once the connection's own handle and every hub copy are dropped
/// the outbound loop drains what is left and exits.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbox: mpsc::Sender<Utf8Bytes>,
    closer: Arc<watch::Sender<bool>>,
}

impl ConnectionHandle {
    /// Creates a handle over an outbound queue and a shutdown signal.
    #[must_use]
    pub fn new(
        id: ConnectionId,
        outbox: mpsc::Sender<Utf8Bytes>,
        closer: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self { id, outbox, closer }
    }

    /// Returns the connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Enqueues a payload without waiting for queue space.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Full`] when the queue is at capacity and
    /// [`DeliveryError::Gone`] when the connection has gone away.
    pub fn try_deliver(&self, payload: Utf8Bytes) -> Result<(), DeliveryError> {
        self.outbox.try_send(payload).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Gone,
        })
    }

    /// Signals the connection to close. Idempotent.
    pub fn close(&self) {
        self.closer.send_replace(true);
    }

    /// Returns `true` once [`ConnectionHandle::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closer.borrow()
    }
}

/// Destination of a [`BroadcastRequest`].
#[derive(Debug, Clone)]
pub enum BroadcastTarget {
    /// Every connection currently subscribed to the topic.
    Topic(Topic),
    /// Exactly one connection (out-of-band notices).
    Connection(ConnectionHandle),
}

/// A payload plus where it should go.
#[derive(Debug, Clone)]
pub struct BroadcastRequest {
    /// Serialized frame body.
    pub payload: Utf8Bytes,
    /// Recipient selector.
    pub target: BroadcastTarget,
}

impl BroadcastRequest {
    /// Addresses `payload` to every subscriber of `topic`.
    #[must_use]
    pub fn to_topic(topic: Topic, payload: impl Into<Utf8Bytes>) -> Self {
        Self {
            payload: payload.into(),
            target: BroadcastTarget::Topic(topic),
        }
    }

    /// Addresses `payload` to a single connection.
    #[must_use]
    pub fn to_connection(conn: ConnectionHandle, payload: impl Into<Utf8Bytes>) -> Self {
        Self {
            payload: payload.into(),
            target: BroadcastTarget::Connection(conn),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn handle(capacity: usize) -> (ConnectionHandle, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        let (closer, _) = watch::channel(false);
        (
            ConnectionHandle::new(ConnectionId::new(), tx, Arc::new(closer)),
            rx,
        )
    }

    #[test]
    fn full_queue_reports_full() {
        let (conn, _rx) = handle(1);
        assert_eq!(conn.try_deliver("a".into()), Ok(()));
        assert_eq!(conn.try_deliver("b".into()), Err(DeliveryError::Full));
    }

    #[test]
    fn dropped_receiver_reports_gone() {
        let (conn, rx) = handle(4);
        drop(rx);
        assert_eq!(conn.try_deliver("a".into()), Err(DeliveryError::Gone));
    }

    #[test]
    fn close_is_idempotent_and_shared() {
        let (conn, _rx) = handle(1);
        let copy = conn.clone();
        assert!(!copy.is_closed());
        conn.close();
        conn.close();
        assert!(copy.is_closed());
    }

    #[tokio::test]
    async fn delivered_payloads_keep_order() {
        let (conn, mut rx) = handle(8);
        for body in ["one", "two", "three"] {
            assert!(conn.try_deliver(body.into()).is_ok());
        }
        for expected in ["one", "two", "three"] {
            let Some(got) = rx.recv().await else {
                panic!("queue closed early");
            };
            assert_eq!(got.as_str(), expected);
        }
    }
}

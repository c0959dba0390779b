//! Per-connection pump pair.
//!
//! Each accepted socket is split into a read half and a write half. The
//! inbound loop is the only reader and the outbound loop is the only
//! writer. They share two things:
//!
//! - the bounded outbound queue (the hub is the producer, the outbound
//!   loop the consumer);
//! - a shutdown signal, raised by the hub on eviction or by the outbound
//!   loop when it stops writing.
//!
//! Lifecycle: `Connecting` (upgrade) → `Active` (both loops running) →
//! `Closing` (either loop hit a terminal condition) → `Closed` (both loops
//! exited, hub entry removed, socket released).

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use super::messages::{ClientRequest, Notice, PairRejection, RequestEvent};
use crate::config::ConnectionSettings;
use crate::domain::{
    BroadcastRequest, ConnectionHandle, ConnectionId, SupportedPair, Topic, TopicError, TopicPath,
};
use crate::error::RelayError;
use crate::hub::Hub;

/// What a single well-formed request frame asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Join the topic.
    Subscribe(Topic),
    /// Leave the topic.
    Unsubscribe(Topic),
    /// Public topic on an unsupported pair: notify and unsubscribe.
    Reject(Topic),
}

/// Interprets a frame body. Malformed frames yield `None` and are dropped.
#[must_use]
pub fn interpret(raw: &[u8], supported: &SupportedPair) -> Option<Intent> {
    let request = ClientRequest::parse(raw)?;
    let path = TopicPath::parse(&request.topic).ok()?;
    match path.resolve(supported) {
        Ok(topic) => Some(match request.event {
            RequestEvent::Subscribe => Intent::Subscribe(topic),
            RequestEvent::Unsubscribe => Intent::Unsubscribe(topic),
        }),
        Err(TopicError::UnsupportedPair { topic, .. }) => Some(Intent::Reject(topic)),
        Err(_) => None,
    }
}

/// Why the inbound loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEnd {
    /// Normal or going-away close, or the stream ended.
    PeerClosed,
    /// Transport error or an abnormal close status.
    Unexpected {
        /// Close status to report back.
        code: u16,
        /// Error or close reason text.
        reason: String,
    },
    /// The shared shutdown signal was raised.
    Shutdown,
    /// No inbound frame within the configured idle deadline.
    IdleTimeout,
    /// The hub stopped accepting commands.
    HubGone,
}

/// Why the outbound loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundEnd {
    /// Every queue handle was dropped and the queue drained.
    Drained,
    /// Closed on the shutdown signal; a close frame was sent.
    Evicted,
    /// A frame or ping could not be written.
    WriteFailed,
}

/// One live client session, as seen by its inbound loop.
#[derive(Debug)]
pub struct Connection {
    handle: ConnectionHandle,
    topic: Option<Topic>,
    remote: Option<SocketAddr>,
}

impl Connection {
    /// Wraps a routing handle. The current topic starts empty.
    #[must_use]
    pub fn new(handle: ConnectionHandle, remote: Option<SocketAddr>) -> Self {
        Self {
            handle,
            topic: None,
            remote,
        }
    }

    /// Connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    /// Topic named by the most recent subscribe, if any.
    #[must_use]
    pub fn topic(&self) -> Option<&Topic> {
        self.topic.as_ref()
    }

    /// Applies one request to the hub.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HubUnavailable`] if the hub task has stopped.
    pub async fn apply(&mut self, intent: Intent, hub: &Hub) -> Result<(), RelayError> {
        match intent {
            Intent::Subscribe(topic) => {
                self.topic = Some(topic.clone());
                hub.subscribe(self.handle.clone(), topic).await
            }
            Intent::Unsubscribe(topic) => {
                if self.topic.as_ref() == Some(&topic) {
                    self.topic = None;
                }
                hub.unsubscribe(self.id(), Some(topic)).await
            }
            Intent::Reject(topic) => {
                tracing::info!(
                    connection_id = %self.id(),
                    remote_addr = ?self.remote,
                    %topic,
                    "currency pair not supported"
                );
                let notice = PairRejection::new(&topic).to_frame();
                hub.broadcast(BroadcastRequest::to_connection(self.handle.clone(), notice))
                    .await?;
                hub.unsubscribe(self.id(), Some(topic)).await
            }
        }
    }

    /// Deregisters the connection and, for unexpected closes, queues a
    /// close notice to it. Consumes the connection so its queue handle is
    /// released.
    async fn teardown(self, hub: &Hub, end: &InboundEnd) {
        if let InboundEnd::Unexpected { code, reason } = end {
            let notice = Notice::unexpected_close(*code, reason.clone()).to_frame();
            let _ = hub
                .broadcast(BroadcastRequest::to_connection(self.handle.clone(), notice))
                .await;
        }
        let _ = hub.unsubscribe(self.id(), None).await;
    }
}

enum Read {
    Frame(Result<Message, axum::Error>),
    Ended,
    Idle,
}

async fn next_frame<R>(reader: &mut R, idle: Option<Duration>) -> Read
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let next = match idle {
        Some(limit) => match tokio::time::timeout(limit, reader.next()).await {
            Ok(next) => next,
            Err(_) => return Read::Idle,
        },
        None => reader.next().await,
    };
    next.map_or(Read::Ended, Read::Frame)
}

/// Resolves once the shutdown signal is raised or can no longer change.
async fn closed(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}

fn classify_close(frame: Option<CloseFrame>) -> InboundEnd {
    match frame {
        Some(frame) if frame.code != close_code::NORMAL && frame.code != close_code::AWAY => {
            InboundEnd::Unexpected {
                code: frame.code,
                reason: frame.reason.as_str().to_string(),
            }
        }
        _ => InboundEnd::PeerClosed,
    }
}

/// Inbound loop: sole reader of the socket.
///
/// Parses request frames and forwards them to the hub until the peer
/// closes, the transport fails, or the shutdown signal is raised.
pub async fn inbound_pump<R>(
    mut reader: R,
    conn: &mut Connection,
    hub: &Hub,
    settings: &ConnectionSettings,
    mut shutdown: watch::Receiver<bool>,
) -> InboundEnd
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let read = tokio::select! {
            read = next_frame(&mut reader, settings.read_idle_timeout) => read,
            () = closed(&mut shutdown) => return InboundEnd::Shutdown,
        };

        let intent = match read {
            Read::Frame(Ok(Message::Text(text))) => {
                tracing::debug!(connection_id = %conn.id(), request = %text.as_str(), "request");
                interpret(text.as_str().as_bytes(), &settings.supported_pair)
            }
            Read::Frame(Ok(Message::Binary(data))) => interpret(&data, &settings.supported_pair),
            Read::Frame(Ok(Message::Close(frame))) => return classify_close(frame),
            Read::Frame(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Read::Frame(Err(err)) => {
                return InboundEnd::Unexpected {
                    code: close_code::ABNORMAL,
                    reason: err.to_string(),
                };
            }
            Read::Ended => return InboundEnd::PeerClosed,
            Read::Idle => return InboundEnd::IdleTimeout,
        };

        let Some(intent) = intent else {
            continue;
        };
        if conn.apply(intent, hub).await.is_err() {
            return InboundEnd::HubGone;
        }
    }
}

/// Upper bound on the close frame and writer shutdown of a closing
/// connection; a stalled peer must not hold the socket open.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Writes one frame unless the shutdown signal is raised first, in which
/// case the pending write is abandoned.
async fn write_frame<W>(
    writer: &mut W,
    message: Message,
    shutdown: &mut watch::Receiver<bool>,
    id: ConnectionId,
) -> Result<(), OutboundEnd>
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    let kind = if matches!(message, Message::Ping(_)) {
        "keepalive ping"
    } else {
        "payload"
    };
    tokio::select! {
        biased;
        () = closed(shutdown) => Err(OutboundEnd::Evicted),
        sent = writer.send(message) => sent.map_err(|err| {
            tracing::warn!(connection_id = %id, error = %err, kind, "write failed");
            OutboundEnd::WriteFailed
        }),
    }
}

/// Outbound loop: sole writer of the socket.
///
/// Writes queued payloads as text frames and a ping every `keepalive`.
/// When the hub raises the shutdown signal, pending payloads are dropped
/// and a close frame carrying the close notice is sent. Always raises the
/// shutdown signal and closes the writer on exit.
pub async fn outbound_pump<W>(
    mut writer: W,
    mut queue: mpsc::Receiver<Utf8Bytes>,
    mut shutdown: watch::Receiver<bool>,
    closer: Arc<watch::Sender<bool>>,
    keepalive: Duration,
    id: ConnectionId,
) -> OutboundEnd
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + keepalive, keepalive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let ping = Bytes::from(Notice::ping().to_frame().as_str().to_owned());

    let end = loop {
        let sent = tokio::select! {
            biased;
            () = closed(&mut shutdown) => Err(OutboundEnd::Evicted),
            next = queue.recv() => match next {
                Some(payload) => {
                    write_frame(&mut writer, Message::Text(payload), &mut shutdown, id).await
                }
                // The hub drops its handles right after signalling closure.
                None if *shutdown.borrow() => Err(OutboundEnd::Evicted),
                None => Err(OutboundEnd::Drained),
            },
            _ = ticker.tick() => {
                write_frame(&mut writer, Message::Ping(ping.clone()), &mut shutdown, id).await
            }
        };
        if let Err(end) = sent {
            break end;
        }
    };

    if end == OutboundEnd::Evicted {
        tracing::info!(connection_id = %id, "hub closed the connection");
        let frame = CloseFrame {
            code: close_code::NORMAL,
            reason: Notice::closed().to_frame(),
        };
        match tokio::time::timeout(CLOSE_GRACE, writer.send(Message::Close(Some(frame)))).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::debug!(connection_id = %id, error = %err, "close frame not sent");
            }
            Err(_) => tracing::debug!(connection_id = %id, "close frame timed out"),
        }
    }

    closer.send_replace(true);
    if tokio::time::timeout(CLOSE_GRACE, writer.close()).await.is_err() {
        tracing::debug!(connection_id = %id, "writer close timed out");
    }
    end
}

/// Runs both loops over already-split socket halves and returns once the
/// connection is fully closed.
pub async fn drive<R, W>(
    reader: R,
    writer: W,
    id: ConnectionId,
    remote: Option<SocketAddr>,
    hub: Hub,
    settings: Arc<ConnectionSettings>,
) -> InboundEnd
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: fmt::Display + Send,
{
    let (outbox, queue) = mpsc::channel(settings.outbound_queue_capacity.max(1));
    let (closer, shutdown) = watch::channel(false);
    let closer = Arc::new(closer);
    let handle = ConnectionHandle::new(id, outbox, Arc::clone(&closer));

    let writer_task = tokio::spawn(outbound_pump(
        writer,
        queue,
        shutdown.clone(),
        closer,
        settings.keepalive_interval,
        id,
    ));

    let mut conn = Connection::new(handle, remote);
    let end = inbound_pump(reader, &mut conn, &hub, &settings, shutdown).await;
    tracing::debug!(connection_id = %id, topic = ?conn.topic(), ?end, "inbound loop ended");
    conn.teardown(&hub, &end).await;

    match writer_task.await {
        Ok(outbound) => {
            tracing::info!(connection_id = %id, remote_addr = ?remote, ?end, ?outbound, "connection closed");
        }
        Err(err) => tracing::warn!(connection_id = %id, error = %err, "outbound loop aborted"),
    }
    end
}

/// Entry point for an upgraded socket.
pub async fn run_connection(
    socket: WebSocket,
    remote: SocketAddr,
    hub: Hub,
    settings: Arc<ConnectionSettings>,
) {
    let id = ConnectionId::new();
    tracing::info!(connection_id = %id, remote_addr = %remote, "connection opened");
    let (writer, reader) = socket.split();
    drive(reader, writer, id, Some(remote), hub, settings).await;
}

//! Redis pattern-subscription feed.
//!
//! [`RedisFeed`] owns the reconnect policy for the upstream feed: a
//! supervisor task (re)connects, issues `PSUBSCRIBE`, and pushes every
//! message into a bounded channel. The consumer only ever sees an
//! infinite [`Stream`] of [`FeedMessage`]s.

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::FeedMessage;
use crate::config::FeedSettings;
use crate::error::RelayError;

/// Buffer between the Redis reader and the bridge.
const FEED_BUFFER: usize = 1024;

/// Upstream feed backed by Redis pub/sub.
#[derive(Debug, Clone)]
pub struct RedisFeed {
    client: redis::Client,
    pattern: String,
    retry_delay: Duration,
}

impl RedisFeed {
    /// Creates a feed client. Does not connect yet.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Feed`] if the URL is not a valid Redis URL.
    pub fn new(settings: &FeedSettings) -> Result<Self, RelayError> {
        Ok(Self {
            client: redis::Client::open(settings.url.as_str())?,
            pattern: settings.channel_pattern.clone(),
            retry_delay: settings.retry_delay,
        })
    }

    /// Starts the supervisor task and returns the message stream.
    ///
    /// The task keeps reconnecting until the stream is dropped.
    #[must_use]
    pub fn spawn(self) -> (impl Stream<Item = FeedMessage> + Send + 'static, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let task = tokio::spawn(self.supervise(tx));
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        });
        (stream, task)
    }

    async fn supervise(self, tx: mpsc::Sender<FeedMessage>) {
        loop {
            match self.pump(&tx).await {
                Ok(()) => tracing::warn!(pattern = %self.pattern, "feed subscription ended"),
                Err(err) => tracing::error!(pattern = %self.pattern, error = %err, "feed error"),
            }
            if tx.is_closed() {
                tracing::info!("feed consumer gone, stopping");
                return;
            }
            tokio::time::sleep(self.retry_delay).await;
            tracing::info!(pattern = %self.pattern, "reconnecting to feed");
        }
    }

    /// Runs one subscription until the connection drops or the consumer
    /// goes away.
    async fn pump(&self, tx: &mpsc::Sender<FeedMessage>) -> Result<(), RelayError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(&self.pattern).await?;
        tracing::info!(pattern = %self.pattern, "feed subscribed");

        let messages = pubsub
            .into_on_message()
            .filter_map(|msg| futures_util::future::ready(decode(&msg)));
        forward(messages, tx).await;
        Ok(())
    }
}

fn decode(msg: &redis::Msg) -> Option<FeedMessage> {
    let channel = msg.get_channel_name().to_string();
    match msg.get_payload::<String>() {
        Ok(payload) => Some(FeedMessage { channel, payload }),
        Err(err) => {
            tracing::warn!(%channel, error = %err, "non-text feed payload skipped");
            None
        }
    }
}

/// Pushes `messages` into `tx` until the stream ends or the consumer is
/// dropped, even while the feed is quiet.
async fn forward<S>(messages: S, tx: &mpsc::Sender<FeedMessage>)
where
    S: Stream<Item = FeedMessage>,
{
    let mut messages = std::pin::pin!(messages);
    loop {
        let next = tokio::select! {
            () = tx.closed() => return,
            next = messages.next() => next,
        };
        let Some(message) = next else {
            return;
        };
        if tx.send(message).await.is_err() {
            return;
        }
    }
}

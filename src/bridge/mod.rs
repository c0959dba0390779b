//! Upstream bridge: turns feed messages into hub broadcasts.
//!
//! The bridge is a single sequential consumer of the feed stream, so feed
//! order is preserved into hub submission order. Payloads are forwarded
//! as-is; interpreting them is the subscriber's business.

pub mod redis_feed;

use futures_util::{Stream, StreamExt};

pub use redis_feed::RedisFeed;

use crate::domain::{BroadcastRequest, Topic};
use crate::hub::Hub;

/// One message received from the upstream feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMessage {
    /// Channel the message was published on.
    pub channel: String,
    /// Message body, forwarded verbatim.
    pub payload: String,
}

/// How feed messages are assigned a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicMapping {
    /// Every message goes to the same topic.
    Fixed(Topic),
    /// The feed channel name is the topic.
    Channel,
}

impl TopicMapping {
    /// Returns the topic for `message`, or `None` when it has no usable
    /// channel name.
    #[must_use]
    pub fn resolve(&self, message: &FeedMessage) -> Option<Topic> {
        match self {
            Self::Fixed(topic) => Some(topic.clone()),
            Self::Channel => Topic::new(message.channel.as_str()).ok(),
        }
    }
}

/// Forwards feed messages to the hub.
#[derive(Debug, Clone)]
pub struct UpstreamBridge {
    hub: Hub,
    mapping: TopicMapping,
}

impl UpstreamBridge {
    /// Creates a bridge submitting to `hub`.
    #[must_use]
    pub fn new(hub: Hub, mapping: TopicMapping) -> Self {
        Self { hub, mapping }
    }

    /// Consumes `feed` until it ends or the hub stops, returning the number
    /// of messages forwarded.
    pub async fn run<S>(self, feed: S) -> u64
    where
        S: Stream<Item = FeedMessage>,
    {
        let mut feed = std::pin::pin!(feed);
        let mut forwarded = 0_u64;
        tracing::info!(mapping = ?self.mapping, "upstream bridge listening");

        while let Some(message) = feed.next().await {
            let Some(topic) = self.mapping.resolve(&message) else {
                tracing::warn!(channel = %message.channel, "feed message without topic, skipped");
                continue;
            };
            let request = BroadcastRequest::to_topic(topic, message.payload);
            if self.hub.broadcast(request).await.is_err() {
                tracing::warn!("hub unavailable, upstream bridge stopping");
                return forwarded;
            }
            forwarded += 1;
        }

        tracing::info!(forwarded, "upstream feed ended");
        forwarded
    }
}

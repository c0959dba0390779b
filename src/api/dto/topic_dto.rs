//! Hub statistics DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::hub::HubSnapshot;

/// Subscriber count for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TopicStatsDto {
    /// Topic name.
    pub topic: String,
    /// Number of subscribed connections.
    pub subscribers: usize,
}

/// Response body of `GET /topics`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TopicsResponse {
    /// Live topics, sorted by name.
    pub topics: Vec<TopicStatsDto>,
    /// Distinct subscribed connections.
    pub connections: usize,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl From<HubSnapshot> for TopicsResponse {
    fn from(snapshot: HubSnapshot) -> Self {
        Self {
            topics: snapshot
                .topics
                .into_iter()
                .map(|t| TopicStatsDto {
                    topic: t.topic.to_string(),
                    subscribers: t.members.len(),
                })
                .collect(),
            connections: snapshot.connections,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ConnectionId, Topic};
    use crate::hub::TopicSnapshot;

    #[test]
    fn snapshot_maps_to_counts() {
        let Ok(trades) = Topic::new("trades") else {
            panic!("valid topic");
        };
        let snapshot = HubSnapshot {
            topics: vec![TopicSnapshot {
                topic: trades,
                members: vec![ConnectionId::new(), ConnectionId::new()],
            }],
            connections: 2,
        };
        let response = TopicsResponse::from(snapshot);
        assert_eq!(
            response.topics,
            vec![TopicStatsDto {
                topic: "trades".to_string(),
                subscribers: 2,
            }]
        );
        assert_eq!(response.connections, 2);
    }
}

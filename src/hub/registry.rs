//! Topic → subscriber mapping owned by the hub actor.
//!
//! [`SubscriptionRegistry`] is plain, single-threaded state. It is only
//! ever touched from inside the hub's serialized command loop, so it needs
//! no locking. Two invariants hold after every operation:
//!
//! - a topic key exists iff its member set is non-empty;
//! - under [`TopicSwitchPolicy::Replace`] a connection is a member of at
//!   most one topic.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::Serialize;

use crate::domain::{
    BroadcastRequest, BroadcastTarget, ConnectionHandle, ConnectionId, DeliveryError, Topic,
};

/// What happens to a connection's existing membership when it subscribes
/// to a different topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TopicSwitchPolicy {
    /// Leave every previous topic first: one topic per connection.
    #[default]
    Replace,
    /// Keep previous memberships; clients unsubscribe explicitly.
    Accumulate,
}

impl FromStr for TopicSwitchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "accumulate" => Ok(Self::Accumulate),
            other => Err(format!("unknown topic switch policy: {other}")),
        }
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Payloads accepted by an outbound queue.
    pub delivered: usize,
    /// Connections dropped from the registry because delivery failed.
    pub evicted: usize,
}

/// Read-only view of one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicSnapshot {
    /// Topic name.
    pub topic: Topic,
    /// Member connections, sorted.
    pub members: Vec<ConnectionId>,
}

/// Read-only view of the whole registry, topics sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubSnapshot {
    /// Every topic with at least one member.
    pub topics: Vec<TopicSnapshot>,
    /// Distinct connections holding at least one membership.
    pub connections: usize,
}

impl HubSnapshot {
    /// Returns the members of `topic`, empty if the topic does not exist.
    #[must_use]
    pub fn members(&self, topic: &str) -> &[ConnectionId] {
        self.topics
            .iter()
            .find(|t| t.topic.as_str() == topic)
            .map(|t| t.members.as_slice())
            .unwrap_or_default()
    }

    /// Returns `true` if `id` is a member of `topic`.
    #[must_use]
    pub fn contains(&self, topic: &str, id: ConnectionId) -> bool {
        self.members(topic).contains(&id)
    }
}

/// The topic → connections map plus a reverse index for teardown.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    topics: HashMap<Topic, HashMap<ConnectionId, ConnectionHandle>>,
    memberships: HashMap<ConnectionId, HashSet<Topic>>,
    policy: TopicSwitchPolicy,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(policy: TopicSwitchPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Returns the configured switch policy.
    #[must_use]
    pub const fn policy(&self) -> TopicSwitchPolicy {
        self.policy
    }

    /// Adds `conn` to `topic`, creating the topic if needed.
    ///
    /// Re-subscribing to the same topic refreshes the stored handle and
    /// leaves membership unchanged.
    pub fn subscribe(&mut self, conn: ConnectionHandle, topic: Topic) {
        let id = conn.id();
        if self.policy == TopicSwitchPolicy::Replace {
            let stale: Vec<Topic> = self
                .memberships
                .get(&id)
                .map(|topics| topics.iter().filter(|t| **t != topic).cloned().collect())
                .unwrap_or_default();
            for old in stale {
                self.remove_member(&old, id);
            }
        }
        self.topics
            .entry(topic.clone())
            .or_default()
            .insert(id, conn);
        self.memberships.entry(id).or_default().insert(topic);
    }

    /// Removes `id` from `topic`, or from every topic when `topic` is
    /// `None`. Returns how many memberships were removed; never fails.
    pub fn unsubscribe(&mut self, id: ConnectionId, topic: Option<&Topic>) -> usize {
        match topic {
            Some(topic) => usize::from(self.remove_member(topic, id)),
            None => self.remove_everywhere(id),
        }
    }

    /// Delivers a broadcast without ever waiting on a subscriber.
    ///
    /// A subscriber whose queue is full is told to close and dropped from
    /// every topic; one whose queue is gone is dropped silently. Either way
    /// the remaining subscribers still get the payload.
    pub fn broadcast(&mut self, request: BroadcastRequest) -> DeliveryReport {
        let BroadcastRequest { payload, target } = request;
        let mut report = DeliveryReport::default();

        let failed: Vec<ConnectionId> = match target {
            BroadcastTarget::Connection(conn) => match conn.try_deliver(payload) {
                Ok(()) => {
                    report.delivered = 1;
                    Vec::new()
                }
                Err(err) => {
                    if err == DeliveryError::Full {
                        conn.close();
                    }
                    vec![conn.id()]
                }
            },
            BroadcastTarget::Topic(topic) => {
                let Some(members) = self.topics.get(&topic) else {
                    return report;
                };
                let mut failed = Vec::new();
                for (id, conn) in members {
                    match conn.try_deliver(payload.clone()) {
                        Ok(()) => report.delivered += 1,
                        Err(DeliveryError::Full) => {
                            tracing::warn!(connection_id = %id, %topic, "outbound queue full, evicting");
                            conn.close();
                            failed.push(*id);
                        }
                        Err(DeliveryError::Gone) => failed.push(*id),
                    }
                }
                failed
            }
        };

        for id in failed {
            if self.remove_everywhere(id) > 0 {
                report.evicted += 1;
            }
        }
        report
    }

    /// Number of members subscribed to `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, HashMap::len)
    }

    /// Number of live topics.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Topics `id` is currently a member of.
    #[must_use]
    pub fn topics_of(&self, id: ConnectionId) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .memberships
            .get(&id)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default();
        topics.sort();
        topics
    }

    /// Builds a sorted, read-only view of the registry.
    #[must_use]
    pub fn snapshot(&self) -> HubSnapshot {
        let mut topics: Vec<TopicSnapshot> = self
            .topics
            .iter()
            .map(|(topic, members)| {
                let mut members: Vec<ConnectionId> = members.keys().copied().collect();
                members.sort();
                TopicSnapshot {
                    topic: topic.clone(),
                    members,
                }
            })
            .collect();
        topics.sort_by(|a, b| a.topic.cmp(&b.topic));
        HubSnapshot {
            topics,
            connections: self.memberships.len(),
        }
    }

    fn remove_member(&mut self, topic: &Topic, id: ConnectionId) -> bool {
        let Some(members) = self.topics.get_mut(topic) else {
            return false;
        };
        if members.remove(&id).is_none() {
            return false;
        }
        if members.is_empty() {
            self.topics.remove(topic);
        }
        if let Some(joined) = self.memberships.get_mut(&id) {
            joined.remove(topic);
            if joined.is_empty() {
                self.memberships.remove(&id);
            }
        }
        true
    }

    fn remove_everywhere(&mut self, id: ConnectionId) -> usize {
        let Some(joined) = self.memberships.remove(&id) else {
            return 0;
        };
        let mut removed = 0;
        for topic in joined {
            if let Some(members) = self.topics.get_mut(&topic) {
                if members.remove(&id).is_some() {
                    removed += 1;
                }
                if members.is_empty() {
                    self.topics.remove(&topic);
                }
            }
        }
        removed
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        for (topic, members) in &self.topics {
            assert!(!members.is_empty(), "empty member set kept for {topic}");
            for id in members.keys() {
                assert!(
                    self.memberships.get(id).is_some_and(|t| t.contains(topic)),
                    "reverse index missing {id} -> {topic}"
                );
            }
        }
        for (id, joined) in &self.memberships {
            assert!(!joined.is_empty());
            if self.policy == TopicSwitchPolicy::Replace {
                assert!(joined.len() <= 1, "{id} is in {} topics", joined.len());
            }
            for topic in joined {
                assert!(self.topics.get(topic).is_some_and(|m| m.contains_key(id)));
            }
        }
    }
}

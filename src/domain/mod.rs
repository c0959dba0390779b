//! Domain layer: identifiers, topics, and connection routing handles.
//!
//! These are the types shared by the hub, the WebSocket pump pair, and the
//! upstream bridge. None of them own a socket.

pub mod connection_handle;
pub mod connection_id;
pub mod topic;

pub use connection_handle::{BroadcastRequest, BroadcastTarget, ConnectionHandle, DeliveryError};
pub use connection_id::ConnectionId;
pub use topic::{SupportedPair, Topic, TopicError, TopicPath, Visibility};

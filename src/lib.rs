//! # topic-relay
//!
//! Real-time WebSocket fan-out relay.
//!
//! Clients connect over WebSocket and subscribe to named topics. An
//! upstream pub/sub feed (Redis) publishes messages which the relay
//! forwards verbatim to every subscriber of the matching topic. All
//! subscription state lives in a single hub task; connections and the
//! feed bridge talk to it through one ordered command queue.
//!
//! ## Architecture
//!
//! ```text
//! Redis PSUBSCRIBE ──► RedisFeed (bridge/) ──► UpstreamBridge
//!                                                  │ Broadcast
//!                                                  ▼
//! Clients (WebSocket) ──► Connection (ws/) ──► Hub (hub/) ──► SubscriptionRegistry
//!     ▲                      │ inbound pump        │
//!     │                      │                     │ try_send / evict
//!     └──── outbound pump ◄──┴──── bounded queue ◄─┘
//!
//! Clients (HTTP) ──► REST handlers (api/): /health, /topics
//! ```

pub mod api;
pub mod app_state;
pub mod bridge;
pub mod config;
pub mod domain;
pub mod error;
pub mod hub;
pub mod ws;

//! WebSocket layer: upgrade handler, per-connection pump pair, wire types.
//!
//! The endpoint at `/ws` accepts `subscribe`/`unsubscribe` requests and
//! streams topic broadcasts back to the client.

pub mod connection;
pub mod handler;
pub mod messages;

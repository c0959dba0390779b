//! WebSocket wire types: client requests and server notices.

use axum::extract::ws::{Utf8Bytes, close_code};
use serde::{Deserialize, Serialize};

use crate::domain::Topic;

/// Request verb sent by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestEvent {
    /// Join a topic.
    Subscribe,
    /// Leave a topic.
    Unsubscribe,
}

/// One inbound client frame.
///
/// ```json
/// { "event": "subscribe", "topic": "public/trades/XRPPHP" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientRequest {
    /// Subscribe or unsubscribe.
    pub event: RequestEvent,
    /// Topic path, `<visibility>/<name>[/<pair>]`.
    pub topic: String,
}

impl ClientRequest {
    /// Parses a frame body. Anything that is not a well-formed request
    /// yields `None`; malformed frames are dropped, not answered.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Option<Self> {
        serde_json::from_slice(raw).ok()
    }
}

/// Control notice sent to a single client: close reasons and keepalives.
///
/// Close notices always carry `code` and `message`, even when the
/// message is empty. A keepalive is just `{"type":"ping"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Notice kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// WebSocket close status associated with the notice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    /// Human-readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Notice {
    /// Keepalive payload carried in ping frames.
    #[must_use]
    pub fn ping() -> Self {
        Self {
            kind: "ping".to_string(),
            code: None,
            message: None,
        }
    }

    /// Sent in the close frame when the hub shuts a connection down.
    #[must_use]
    pub fn closed() -> Self {
        Self {
            kind: "close message".to_string(),
            code: Some(close_code::NORMAL),
            message: Some("Websocket connection closed".to_string()),
        }
    }

    /// Sent when the peer went away without a normal close.
    #[must_use]
    pub fn unexpected_close(code: u16, reason: impl Into<String>) -> Self {
        Self {
            kind: "unexpected close".to_string(),
            code: Some(code),
            message: Some(reason.into()),
        }
    }

    /// Serializes the notice into a text frame body.
    #[must_use]
    pub fn to_frame(&self) -> Utf8Bytes {
        serde_json::to_string(self).unwrap_or_default().into()
    }
}

/// Failure answer to a subscribe on an unsupported trading pair.
///
/// ```json
/// {"event":"trades","success":false,"reason":"Currency pair is not supported"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairRejection {
    /// Topic name the client asked for.
    pub event: String,
    /// Always `false`.
    pub success: bool,
    /// Human-readable reason.
    pub reason: String,
}

impl PairRejection {
    /// Builds the rejection for `topic`.
    #[must_use]
    pub fn new(topic: &Topic) -> Self {
        Self {
            event: topic.to_string(),
            success: false,
            reason: "Currency pair is not supported".to_string(),
        }
    }

    /// Serializes the rejection into a text frame body.
    #[must_use]
    pub fn to_frame(&self) -> Utf8Bytes {
        serde_json::to_string(self).unwrap_or_default().into()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_subscribe_request() {
        let raw = br#"{"event":"subscribe","topic":"public/trades/XRPPHP"}"#;
        let Some(req) = ClientRequest::parse(raw) else {
            panic!("valid request");
        };
        assert_eq!(req.event, RequestEvent::Subscribe);
        assert_eq!(req.topic, "public/trades/XRPPHP");
    }

    #[test]
    fn malformed_requests_are_none() {
        let cases: [&[u8]; 5] = [
            b"not json",
            br#"{"event":"publish","topic":"private/x"}"#,
            br#"{"event":"subscribe"}"#,
            br#"[1,2,3]"#,
            b"",
        ];
        for raw in cases {
            assert!(ClientRequest::parse(raw).is_none());
        }
    }

    #[test]
    fn ping_notice_is_type_only() {
        assert_eq!(Notice::ping().to_frame().as_str(), r#"{"type":"ping"}"#);
    }

    #[test]
    fn close_notice_shape() {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(Notice::closed().to_frame().as_str())
        else {
            panic!("notice is JSON");
        };
        assert_eq!(value.get("type"), Some(&serde_json::json!("close message")));
        assert_eq!(value.get("code"), Some(&serde_json::json!(1000)));
        assert_eq!(
            value.get("message"),
            Some(&serde_json::json!("Websocket connection closed"))
        );
    }

    #[test]
    fn unexpected_close_keeps_empty_message() {
        assert_eq!(
            Notice::unexpected_close(close_code::ABNORMAL, "").to_frame().as_str(),
            r#"{"type":"unexpected close","code":1006,"message":""}"#
        );
    }

    #[test]
    fn rejection_shape() {
        let Ok(topic) = Topic::new("trades") else {
            panic!("valid topic");
        };
        assert_eq!(
            PairRejection::new(&topic).to_frame().as_str(),
            r#"{"event":"trades","success":false,"reason":"Currency pair is not supported"}"#
        );
    }
}

//! Topic names and the client topic grammar.
//!
//! Clients address topics with a slash-separated path:
//!
//! ```text
//! private/<name>
//! public/<name>/<pair>
//! ```
//!
//! The first segment selects the [`Visibility`]. Public topics carry a
//! trading-pair segment that must match the single [`SupportedPair`] the
//! relay is configured with (case-insensitive). Segments past the ones the
//! grammar names are ignored.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A non-empty topic name: the key under which connections are grouped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Creates a topic from a name.
    ///
    /// # Errors
    ///
    /// Returns [`TopicError::EmptyName`] if `name` is empty.
    pub fn new(name: impl Into<String>) -> Result<Self, TopicError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TopicError::EmptyName);
        }
        Ok(Self(name))
    }

    /// Returns the topic name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for Topic {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Topic grammar failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    /// The topic name segment is missing or empty.
    #[error("topic name must not be empty")]
    EmptyName,

    /// The first segment is neither `private` nor `public`.
    #[error("unknown topic visibility: {0:?}")]
    UnknownVisibility(String),

    /// A public topic named a pair other than the supported one.
    #[error("currency pair {pair:?} is not supported for topic {topic}")]
    UnsupportedPair {
        /// Topic the client asked for.
        topic: Topic,
        /// Pair segment as sent by the client (possibly empty).
        pair: String,
    },
}

/// First path segment of a client topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// `private/<name>`: no further validation.
    Private,
    /// `public/<name>/<pair>`: the pair must be supported.
    Public,
}

impl FromStr for Visibility {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "public" => Ok(Self::Public),
            other => Err(TopicError::UnknownVisibility(other.to_string())),
        }
    }
}

/// The single trading pair public topics may reference.
///
/// Stored uppercase; matching is ASCII case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedPair(String);

impl SupportedPair {
    /// Creates a supported pair, normalising it to uppercase.
    #[must_use]
    pub fn new(pair: &str) -> Self {
        Self(pair.trim().to_ascii_uppercase())
    }

    /// Returns `true` if `candidate` names this pair.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.eq_ignore_ascii_case(candidate)
    }

    /// Returns the normalised pair identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SupportedPair {
    fn default() -> Self {
        Self::new("XRPPHP")
    }
}

/// A parsed client topic path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPath {
    /// Visibility segment.
    pub visibility: Visibility,
    /// Topic name segment.
    pub topic: Topic,
    /// Pair segment; always `None` for private topics.
    pub pair: Option<String>,
}

impl TopicPath {
    /// Parses `<visibility>/<name>[/<pair>]`.
    ///
    /// A public path without a pair segment parses with `pair: None` and is
    /// rejected later by [`TopicPath::resolve`].
    ///
    /// # Errors
    ///
    /// Returns [`TopicError::UnknownVisibility`] or [`TopicError::EmptyName`]
    /// when the path does not follow the grammar.
    pub fn parse(raw: &str) -> Result<Self, TopicError> {
        let mut segments = raw.split('/');
        let visibility: Visibility = segments.next().unwrap_or_default().parse()?;
        let topic = Topic::new(segments.next().unwrap_or_default())?;
        let pair = match visibility {
            Visibility::Private => None,
            Visibility::Public => segments.next().map(str::to_string),
        };
        Ok(Self {
            visibility,
            topic,
            pair,
        })
    }

    /// Validates the path against the supported pair and yields the topic
    /// the hub routes on.
    ///
    /// # Errors
    ///
    /// Returns [`TopicError::UnsupportedPair`] for a public path whose pair
    /// is missing or does not match `supported`.
    pub fn resolve(self, supported: &SupportedPair) -> Result<Topic, TopicError> {
        match (self.visibility, self.pair) {
            (Visibility::Private, _) => Ok(self.topic),
            (Visibility::Public, Some(pair)) if supported.matches(&pair) => Ok(self.topic),
            (Visibility::Public, pair) => Err(TopicError::UnsupportedPair {
                topic: self.topic,
                pair: pair.unwrap_or_default(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn topic(name: &str) -> Topic {
        let Ok(t) = Topic::new(name) else {
            panic!("valid topic");
        };
        t
    }

    #[test]
    fn empty_topic_rejected() {
        assert_eq!(Topic::new(""), Err(TopicError::EmptyName));
    }

    #[test]
    fn private_path_has_no_pair() {
        let Ok(path) = TopicPath::parse("private/order") else {
            panic!("valid path");
        };
        assert_eq!(path.visibility, Visibility::Private);
        assert_eq!(path.topic, topic("order"));
        assert_eq!(path.pair, None);
    }

    #[test]
    fn private_ignores_trailing_segments() {
        let Ok(path) = TopicPath::parse("private/deposit/anything") else {
            panic!("valid path");
        };
        assert_eq!(path.resolve(&SupportedPair::default()), Ok(topic("deposit")));
    }

    #[test]
    fn public_pair_matches_case_insensitively() {
        let pair = SupportedPair::new("XRPPHP");
        for raw in ["public/trades/XRPPHP", "public/trades/xrpphp", "public/trades/XrpPhp"] {
            let Ok(path) = TopicPath::parse(raw) else {
                panic!("valid path");
            };
            assert_eq!(path.resolve(&pair), Ok(topic("trades")));
        }
    }

    #[test]
    fn public_unsupported_pair_rejected() {
        let Ok(path) = TopicPath::parse("public/trades/BTCUSD") else {
            panic!("valid path");
        };
        assert_eq!(
            path.resolve(&SupportedPair::default()),
            Err(TopicError::UnsupportedPair {
                topic: topic("trades"),
                pair: "BTCUSD".to_string(),
            })
        );
    }

    #[test]
    fn public_missing_pair_rejected() {
        let Ok(path) = TopicPath::parse("public/orderBook") else {
            panic!("valid path");
        };
        assert!(matches!(
            path.resolve(&SupportedPair::default()),
            Err(TopicError::UnsupportedPair { .. })
        ));
    }

    #[test]
    fn malformed_paths_rejected() {
        assert_eq!(
            TopicPath::parse("secret/trades"),
            Err(TopicError::UnknownVisibility("secret".to_string()))
        );
        assert_eq!(TopicPath::parse("private"), Err(TopicError::EmptyName));
        assert_eq!(TopicPath::parse("public//XRPPHP"), Err(TopicError::EmptyName));
        assert!(TopicPath::parse("").is_err());
    }

    #[test]
    fn supported_pair_normalises() {
        let pair = SupportedPair::new(" xrpphp ");
        assert_eq!(pair.as_str(), "XRPPHP");
    }
}

//! Module that contains the messages chasing each other around the ring.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stamp carried by the tokens. Its absolute value is the round number.
pub type Stamp = i64;

/// Enum that tells which of the two tokens a message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Grants the critical section. Positive stamps.
    Ping,
    /// Detects the loss of the PING. Negative stamps.
    Pong,
}

/// Struct that represents one token in flight between two neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub stamp: Stamp,
}

impl Message {
    pub fn ping(stamp: Stamp) -> Self {
        Self {
            kind: MessageKind::Ping,
            stamp,
        }
    }

    pub fn pong(stamp: Stamp) -> Self {
        Self {
            kind: MessageKind::Pong,
            stamp,
        }
    }

    /// Function that returns the message as a JSON formatted `String`.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Function that parses the message from a JSON formatted `String`.
    pub fn from_json_string(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Self>(line)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ping => write!(f, "PING"),
            Self::Pong => write!(f, "PONG"),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.kind, self.stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_carries_kind_beside_stamp() {
        let line = Message::pong(-3).to_json_string().unwrap();
        assert_eq!(line, r#"{"kind":"pong","stamp":-3}"#);

        let parsed = Message::from_json_string(r#"{"kind":"ping","stamp":7}"#).unwrap();
        assert_eq!(parsed, Message::ping(7));
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(Message::from_json_string(r#"{"kind":"potato","stamp":1}"#).is_err());
        assert!(Message::from_json_string("not json").is_err());
    }

    #[test]
    fn display_matches_log_format() {
        assert_eq!(Message::ping(1).to_string(), "PING [1]");
        assert_eq!(Message::pong(-1).to_string(), "PONG [-1]");
    }
}

//! The closed event-type enumeration shared by every component that needs to
//! iterate "all button kinds" and guarantee a zero-filled result.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the six button kinds a viewer can press, split into two disjoint
/// groups of three. Every aggregation in this crate iterates [`EventType::ALL`]
/// so that absent types still show up with a zero count.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Helpful1,
    Helpful2,
    Helpful3,
    Adversarial1,
    Adversarial2,
    Adversarial3,
}

impl EventType {
    /// Fixed iteration order. Every code path that needs "all event types"
    /// goes through this list rather than re-deriving it.
    pub const ALL: [EventType; 6] = [
        EventType::Helpful1,
        EventType::Helpful2,
        EventType::Helpful3,
        EventType::Adversarial1,
        EventType::Adversarial2,
        EventType::Adversarial3,
    ];

    /// The wire token used in JSON payloads and as the `button_name` fallback.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Helpful1 => "helpful_1",
            EventType::Helpful2 => "helpful_2",
            EventType::Helpful3 => "helpful_3",
            EventType::Adversarial1 => "adversarial_1",
            EventType::Adversarial2 => "adversarial_2",
            EventType::Adversarial3 => "adversarial_3",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name one of the six known types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventType(pub String);

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event type {:?}", self.0)
    }
}

impl std::error::Error for UnknownEventType {}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "helpful_1" => Ok(EventType::Helpful1),
            "helpful_2" => Ok(EventType::Helpful2),
            "helpful_3" => Ok(EventType::Helpful3),
            "adversarial_1" => Ok(EventType::Adversarial1),
            "adversarial_2" => Ok(EventType::Adversarial2),
            "adversarial_3" => Ok(EventType::Adversarial3),
            other => Err(UnknownEventType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for ty in EventType::ALL {
            assert_eq!(EventType::from_str(ty.as_str()).unwrap(), ty);
        }
    }

    #[test]
    fn rejects_unknown_tokens() {
        assert!(EventType::from_str("helpful_4").is_err());
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&EventType::Adversarial2).unwrap();
        assert_eq!(json, "\"adversarial_2\"");
    }
}

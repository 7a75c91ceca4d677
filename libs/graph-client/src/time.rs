use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Timestamp layout used by the Graph API, e.g. `2024-01-15T10:30:00+0000`.
pub const GRAPH_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Graph API timestamp. Empty strings and `null` decode to the zero value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GraphTime(pub Option<DateTime<FixedOffset>>);

impl GraphTime {
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_none()
    }

    #[must_use]
    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        self.0.as_ref()
    }
}

impl From<DateTime<FixedOffset>> for GraphTime {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self(Some(value))
    }
}

impl fmt::Display for GraphTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(t) => write!(f, "{}", t.format(GRAPH_TIME_FORMAT)),
            None => Ok(()),
        }
    }
}

impl Serialize for GraphTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GraphTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") => Ok(Self(None)),
            Some(s) => DateTime::parse_from_str(s, GRAPH_TIME_FORMAT)
                .map(|t| Self(Some(t)))
                .map_err(D::Error::custom),
        }
    }
}

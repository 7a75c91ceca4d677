//! Wire shapes shared by every Graph API endpoint.

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::time::GraphTime;

/// Top-level shape of a Graph API response body.
///
/// Every field is optional; `data` and `summary` are left undecoded by the pager.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<D> {
    #[serde(default)]
    pub error: Option<RemoteError>,
    #[serde(default)]
    pub data: Option<D>,
    #[serde(default)]
    pub paging: Paging,
    #[serde(default)]
    pub summary: Option<Box<serde_json::value::RawValue>>,
}

/// The part of a response the decoder inspects before decoding the payload.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorContainer {
    #[serde(default)]
    pub error: Option<RemoteError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cursors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

/// Pagination links of a list response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paging {
    pub cursors: Cursors,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
}

impl Paging {
    /// URL of the next page; absent and empty links both end the list.
    #[must_use]
    pub fn next_page(&self) -> Option<&str> {
        self.next.as_deref().filter(|next| !next.is_empty())
    }
}

/// Common reply of mutating calls.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MinimalResponse {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "GraphTime::is_zero")]
    pub updated_time: GraphTime,
    #[serde(skip_serializing)]
    pub error: Option<RemoteError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct IdResponse {
    pub id: String,
}

/// Node type as reported by `?metadata=1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Metadata {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MetadataContainer {
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Summary {
    pub total_count: u64,
}

/// Reply of list calls made with `summary=true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SummaryContainer {
    pub summary: Summary,
}

#[cfg(test)]
mod tests {
    use serde_json::value::RawValue;

    use super::*;

    #[test]
    fn test_envelope_with_all_fields() {
        let body = r#"{"data":[1,2],"paging":{"cursors":{"after":"b"},"next":"https://next"}}"#;
        let envelope: Envelope<Box<RawValue>> = serde_json::from_str(body).unwrap();
        assert!(envelope.error.is_none());
        assert_eq!(envelope.data.unwrap().get(), "[1,2]");
        assert_eq!(envelope.paging.cursors.after.as_deref(), Some("b"));
        assert_eq!(envelope.paging.next_page(), Some("https://next"));
    }

    #[test]
    fn test_envelope_all_absent() {
        let envelope: Envelope<Box<RawValue>> = serde_json::from_str("{}").unwrap();
        assert!(envelope.data.is_none());
        assert_eq!(envelope.paging.next_page(), None);
    }

    #[test]
    fn test_empty_next_ends_paging() {
        let paging: Paging = serde_json::from_str(r#"{"next":""}"#).unwrap();
        assert_eq!(paging.next_page(), None);
    }

    #[test]
    fn test_error_container_ignores_payload() {
        let container: ErrorContainer = serde_json::from_str(r#"{"id":"1"}"#).unwrap();
        assert!(container.error.is_none());

        let container: ErrorContainer =
            serde_json::from_str(r#"{"error":{"message":"boom","code":1}}"#).unwrap();
        assert_eq!(container.error.unwrap().code, 1);
    }

    #[test]
    fn test_minimal_response() {
        let response: MinimalResponse = serde_json::from_str(
            r#"{"success":true,"id":"42","updated_time":"2024-01-15T10:30:00+0000"}"#,
        )
        .unwrap();
        assert!(response.success);
        assert_eq!(response.id, "42");
        assert!(!response.updated_time.is_zero());
    }
}

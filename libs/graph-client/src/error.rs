use std::fmt;
use std::io;

use http::StatusCode;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Error code the Graph API uses for "unsupported get request".
const NOT_FOUND_CODE: u64 = 100;
/// Subcode that, combined with [`NOT_FOUND_CODE`], means the object does not exist.
const NOT_FOUND_SUBCODE: u64 = 33;

pub type Result<T, E = GraphError> = std::result::Result<T, E>;

/// Structured failure reported by the Graph API inside the `error` field of a
/// response envelope.
///
/// Any field may be absent or `null`; both decode to the zero value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemoteError {
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub code: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub error_subcode: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub fbtrace_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_transient: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub error_user_title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub error_user_msg: String,
    pub error_data: Option<serde_json::Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl RemoteError {
    /// Whether this is the "object does not exist" error (code 100, subcode 33).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code == NOT_FOUND_CODE && self.error_subcode == NOT_FOUND_SUBCODE
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.error_user_msg.is_empty() {
            return f.write_str(&self.error_user_msg);
        }
        write!(
            f,
            "graph api: type='{}' message='{}' error_user_title='{}'",
            self.kind, self.message, self.error_user_title
        )
    }
}

impl std::error::Error for RemoteError {}

/// Returned by bulk id uploads when the server acknowledged a different
/// number of ids than were sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("uploaded {total} ids, received {received}, failed uploading {failed}")]
pub struct UploadError {
    pub total: u64,
    pub received: u64,
    pub failed: u64,
}

/// Error types for Graph API client operations
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("unexpected status {status} from graph api, attempt {attempt}")]
    ServerStatus { status: StatusCode, attempt: u32 },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Remote(Box<RemoteError>),

    #[error("unexpected status {status} for {method} {url}")]
    UnexpectedStatus {
        status: StatusCode,
        method: http::Method,
        url: String,
    },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("destination is not a collection, got {found}")]
    NotACollection { found: &'static str },

    #[error("{key} is already being processed")]
    AlreadyRunning { key: String },

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Route build error: {0}")]
    Route(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("output channel closed")]
    ChannelClosed,

    #[error("report run {id} failed")]
    ReportFailed { id: String },

    #[error("report run {id} made no progress before the stall timeout")]
    ReportTimeout { id: String },

    #[error("did not get report run id")]
    MissingReportRunId,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GraphError {
    /// Failures of the network exchange itself, as opposed to anything the
    /// server said.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            GraphError::Connection(_) | GraphError::Timeout(_) | GraphError::Reqwest(_)
        )
    }

    /// The structured remote error, if this is one.
    #[must_use]
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            GraphError::Remote(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.remote().is_some_and(RemoteError::is_not_found)
    }
}

impl From<RemoteError> for GraphError {
    fn from(err: RemoteError) -> Self {
        GraphError::Remote(Box::new(err))
    }
}

/// Whether `err` is the Graph API "object does not exist" error.
#[must_use]
pub fn is_not_found(err: &GraphError) -> bool {
    err.is_not_found()
}

use bytes::Bytes;
use serde::Serialize;

use crate::error::GraphError;

/// Form field that carries the file in multipart uploads.
pub const UPLOAD_FILE_FIELD: &str = "video_file_chunk";

/// Fully buffered multipart upload. Kept as parts so every retry attempt
/// can rebuild the form.
#[derive(Clone)]
pub struct MultipartBody {
    pub fields: Vec<(String, String)>,
    pub file_name: String,
    pub contents: Bytes,
}

impl std::fmt::Debug for MultipartBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartBody")
            .field("fields", &self.fields)
            .field("file_name", &self.file_name)
            .field("contents", &self.contents.len())
            .finish()
    }
}

/// HTTP request body
#[derive(Clone, Default)]
pub enum Body {
    /// Empty body
    #[default]
    Empty,
    /// Buffered bytes
    Bytes(Bytes),
    /// Multipart form with one file part
    Multipart(MultipartBody),
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => write!(f, "Body::Empty"),
            Body::Bytes(bytes) => f.debug_tuple("Body::Bytes").field(&bytes.len()).finish(),
            Body::Multipart(form) => f.debug_tuple("Body::Multipart").field(form).finish(),
        }
    }
}

impl Body {
    /// Create a body from a JSON-serializable value
    ///
    /// # Errors
    /// Returns [`GraphError::Decode`] if `value` cannot be serialized.
    pub fn from_json<T: Serialize + ?Sized>(value: &T) -> Result<Self, GraphError> {
        let json = serde_json::to_vec(value)?;
        Ok(Body::Bytes(Bytes::from(json)))
    }

    /// Create an `application/x-www-form-urlencoded` body
    ///
    /// # Errors
    /// Returns [`GraphError::Route`] if the pairs cannot be encoded.
    pub fn from_form(pairs: &[(&str, &str)]) -> Result<Self, GraphError> {
        let encoded =
            serde_urlencoded::to_string(pairs).map_err(|e| GraphError::Route(e.to_string()))?;
        Ok(Body::Bytes(Bytes::from(encoded)))
    }

    /// Bytes of a buffered body, used for diagnostics
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Bytes(bytes) => Some(bytes),
            Body::Empty | Body::Multipart(_) => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Bytes(Bytes::from(s))
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(v))
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Body::Bytes(b)
    }
}

impl From<MultipartBody> for Body {
    fn from(form: MultipartBody) -> Self {
        Body::Multipart(form)
    }
}

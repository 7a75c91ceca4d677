use http::{HeaderMap, HeaderValue, Method};
use url::Url;

use crate::body::Body;
use crate::error::GraphError;

/// Outgoing HTTP request as seen by every [`Transport`](crate::Transport) layer.
///
/// Bodies are buffered, so a request can be cloned for each retry attempt.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Body,
}

impl Request {
    /// Create a new request builder
    #[must_use]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[must_use]
    pub fn into_parts(self) -> (Method, Url, HeaderMap, Body) {
        (self.method, self.url, self.headers, self.body)
    }
}

/// Builder for constructing HTTP requests with a fluent API
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    url: Option<String>,
    headers: HeaderMap,
    body: Body,
}

impl RequestBuilder {
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set a JSON body and the matching Content-Type header
    #[must_use]
    pub fn json_body(mut self, body: Body) -> Self {
        self.body = body;
        self.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self
    }

    /// Set a urlencoded form body and the matching Content-Type header
    #[must_use]
    pub fn form_body(mut self, body: Body) -> Self {
        self.body = body;
        self.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        self
    }

    #[must_use]
    pub fn body<B: Into<Body>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    /// Build the request
    ///
    /// # Errors
    /// Returns [`GraphError::Route`] if no URL was set or it does not parse.
    pub fn build(self) -> Result<Request, GraphError> {
        let method = self.method.unwrap_or(Method::GET);
        let raw = self
            .url
            .ok_or_else(|| GraphError::Route("Request URL is required".into()))?;
        let url = Url::parse(&raw).map_err(|e| GraphError::Route(format!("{raw}: {e}")))?;

        Ok(Request {
            method,
            url,
            headers: self.headers,
            body: self.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_get() {
        let request = Request::builder()
            .url("https://graph.facebook.com/v19.0/me")
            .build()
            .unwrap();
        assert_eq!(request.method(), Method::GET);
        assert!(request.body().is_empty());
        assert!(request.headers().is_empty());
    }

    #[test]
    fn test_missing_url() {
        let err = Request::builder().build().unwrap_err();
        assert!(matches!(err, GraphError::Route(_)));
    }

    #[test]
    fn test_invalid_url() {
        let err = Request::builder().url("not a url").build().unwrap_err();
        assert!(matches!(err, GraphError::Route(_)));
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let request = Request::builder()
            .method(Method::POST)
            .url("https://example.com/x")
            .json_body(Body::from(b"{}".to_vec()))
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_form_body_sets_content_type() {
        let request = Request::builder()
            .method(Method::POST)
            .url("https://example.com/x")
            .form_body(Body::from(b"a=1".to_vec()))
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/x-www-form-urlencoded"
        );
        assert_eq!(request.headers().len(), 1);
    }
}

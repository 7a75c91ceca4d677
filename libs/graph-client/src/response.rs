use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

/// Buffered HTTP response, together with the method and URL of the request
/// that produced it (used in diagnostics).
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    method: Method,
    url: Url,
}

impl Response {
    #[must_use]
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
        method: Method,
        url: Url,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            method,
            url,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request URL with the credentials stripped, safe to log.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        let mut url = self.url.clone();
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "access_token" && k != "appsecret_proof")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
        url.to_string()
    }

    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_url_strips_credentials() {
        let url = Url::parse(
            "https://graph.facebook.com/v19.0/me?fields=id&access_token=secret&appsecret_proof=abc",
        )
        .unwrap();
        let response = Response::new(
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::new(),
            Method::GET,
            url,
        );
        assert_eq!(
            response.redacted_url(),
            "https://graph.facebook.com/v19.0/me?fields=id"
        );
    }

    #[test]
    fn test_redacted_url_without_other_params() {
        let url = Url::parse("https://graph.facebook.com/v19.0/me?access_token=secret").unwrap();
        let response = Response::new(
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::new(),
            Method::GET,
            url,
        );
        assert_eq!(response.redacted_url(), "https://graph.facebook.com/v19.0/me");
    }
}

use std::fmt;
use std::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::error::GraphError;

/// Default Graph API host.
pub const DEFAULT_BASE_URL: &str = "https://graph.facebook.com";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default number of request body bytes included in failure logs.
pub const DEFAULT_LOG_BODY_LIMIT: usize = 2048;

/// Configuration for [`GraphClient`](crate::GraphClient)
#[derive(Clone)]
pub struct GraphClientConfig {
    pub access_token: String,
    pub app_secret: String,
    pub base_url: String,
    pub timeout: Duration,
    pub retry_policy: BackoffPolicy,
    pub upload_retry_policy: BackoffPolicy,
    /// Request bodies longer than this are truncated in logs; 0 disables
    /// truncation.
    pub log_body_limit: usize,
}

impl fmt::Debug for GraphClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphClientConfig")
            .field("access_token", &"<redacted>")
            .field("app_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry_policy", &self.retry_policy)
            .field("upload_retry_policy", &self.upload_retry_policy)
            .field("log_body_limit", &self.log_body_limit)
            .finish()
    }
}

impl GraphClientConfig {
    pub fn new(access_token: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            app_secret: app_secret.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            retry_policy: BackoffPolicy::requests(),
            upload_retry_policy: BackoffPolicy::uploads(),
            log_body_limit: DEFAULT_LOG_BODY_LIMIT,
        }
    }

    /// Point the client at another host, e.g. a mock server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: BackoffPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    #[must_use]
    pub fn with_upload_retry_policy(mut self, policy: BackoffPolicy) -> Self {
        self.upload_retry_policy = policy;
        self
    }

    #[must_use]
    pub fn with_log_body_limit(mut self, limit: usize) -> Self {
        self.log_body_limit = limit;
        self
    }

    /// Create configuration from environment variables
    ///
    /// Expects:
    /// - `GRAPH_ACCESS_TOKEN`: default access token (required)
    /// - `GRAPH_APP_SECRET`: app secret used for the proof (required)
    /// - `GRAPH_BASE_URL`: API host (default: `https://graph.facebook.com`)
    /// - `GRAPH_TIMEOUT_SECS`: per-request timeout in seconds (default: 60)
    ///
    /// # Errors
    /// Returns [`GraphError::Config`] if a required variable is missing or the
    /// timeout is not a number.
    pub fn from_env() -> Result<Self, GraphError> {
        let access_token = std::env::var("GRAPH_ACCESS_TOKEN")
            .map_err(|_| GraphError::Config("GRAPH_ACCESS_TOKEN not set".into()))?;
        let app_secret = std::env::var("GRAPH_APP_SECRET")
            .map_err(|_| GraphError::Config("GRAPH_APP_SECRET not set".into()))?;
        let base_url =
            std::env::var("GRAPH_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let mut config = Self::new(access_token, app_secret).with_base_url(base_url);
        if let Ok(raw) = std::env::var("GRAPH_TIMEOUT_SECS") {
            let secs: u64 = raw
                .parse()
                .map_err(|_| GraphError::Config(format!("GRAPH_TIMEOUT_SECS is not a number: {raw}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

/// Tuning for asynchronous report runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// How often the run status is polled.
    pub poll_interval: Duration,
    /// Give up when the completion percentage has not advanced for this long.
    pub stall_timeout: Duration,
    /// Page size used when reading the finished report.
    pub page_limit: u32,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            stall_timeout: Duration::from_secs(10 * 60),
            page_limit: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = GraphClientConfig::new("token", "secret");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.retry_policy, BackoffPolicy::requests());
        assert_eq!(config.upload_retry_policy, BackoffPolicy::uploads());
        assert_eq!(config.log_body_limit, 2048);
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = GraphClientConfig::new("t", "s").with_base_url("http://localhost:8080/");
        assert_eq!(config.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let config = GraphClientConfig::new("very-secret-token", "very-secret-key");
        let debug = format!("{config:?}");
        assert!(!debug.contains("very-secret-token"));
        assert!(!debug.contains("very-secret-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_report_option_defaults() {
        let options = ReportOptions::default();
        assert_eq!(options.poll_interval, Duration::from_secs(15));
        assert_eq!(options.stall_timeout, Duration::from_secs(600));
        assert_eq!(options.page_limit, 100);
    }
}

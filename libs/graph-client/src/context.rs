use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::stats::Stat;

/// Per-call options threaded through every layer of a request.
///
/// Carries the page access token override used by the auth layer, the
/// progress handle the pager reports into, and the cancellation token that
/// aborts in-flight exchanges and backoff waits.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    access_token: Option<String>,
    stat: Option<Arc<Stat>>,
    cancel: CancellationToken,
}

impl CallContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `token` instead of the client's default access token.
    ///
    /// An empty token leaves the context unchanged.
    #[must_use]
    pub fn with_page_access_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        if !token.is_empty() {
            self.access_token = Some(token);
        }
        self
    }

    /// Attach a progress handle that paginated calls report into.
    #[must_use]
    pub fn with_stat(mut self, stat: Arc<Stat>) -> Self {
        self.stat = Some(stat);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    #[must_use]
    pub fn stat(&self) -> Option<&Arc<Stat>> {
        self.stat.as_ref()
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_page_token_is_ignored() {
        let ctx = CallContext::new().with_page_access_token("page-token");
        assert_eq!(ctx.access_token(), Some("page-token"));

        let ctx = ctx.with_page_access_token("");
        assert_eq!(ctx.access_token(), Some("page-token"));

        assert_eq!(CallContext::new().with_page_access_token("").access_token(), None);
    }

    #[test]
    fn test_cancellation_is_shared_between_clones() {
        let ctx = CallContext::new();
        let clone = ctx.clone();
        ctx.cancellation().cancel();
        assert!(clone.is_cancelled());
    }
}

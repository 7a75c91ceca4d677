//! Layered request/response interceptors around the base HTTP exchange.
//!
//! The production chain, outer to inner, is
//! [`AuthTransport`] -> [`RetryTransport`] -> [`UsageLogTransport`] -> base.
//! Signing sits outside the retry loop so every attempt carries the same
//! credentials, and the usage logger sits inside it so it sees the headers
//! of each individual attempt.

mod auth;
mod base;
mod retry;
mod usage;

use std::sync::Arc;

use async_trait::async_trait;

use crate::backoff::BackoffPolicy;
use crate::context::CallContext;
use crate::error::GraphError;
use crate::request::Request;
use crate::response::Response;

pub use auth::{AuthTransport, app_secret_proof};
pub use base::ReqwestTransport;
pub use retry::RetryTransport;
pub use usage::{APP_USAGE_HEADER, AppUsage, UsageLogTransport};

/// One request/response exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the exchange for `request`.
    ///
    /// Implementations must honor `ctx`'s cancellation token.
    async fn round_trip(&self, ctx: &CallContext, request: Request)
    -> Result<Response, GraphError>;
}

/// Compose the standard chain around `base`.
#[must_use]
pub fn chain(
    access_token: impl Into<String>,
    app_secret: impl Into<String>,
    retry_policy: BackoffPolicy,
    base: Arc<dyn Transport>,
) -> Arc<dyn Transport> {
    let usage = Arc::new(UsageLogTransport::new(base));
    let retry = Arc::new(RetryTransport::new(usage, retry_policy));
    Arc::new(AuthTransport::new(access_token, app_secret, retry))
}

use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderMap;
use serde::Deserialize;
use tracing::{error, info};

use super::Transport;
use crate::context::CallContext;
use crate::error::GraphError;
use crate::request::Request;
use crate::response::Response;

/// Response header carrying application rate-limit usage.
pub const APP_USAGE_HEADER: &str = "x-app-usage";

/// Usage percentages reported by the Graph API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppUsage {
    pub call_count: u64,
    pub total_cputime: u64,
    pub total_time: u64,
}

/// Logs the usage header of every response passing through.
pub struct UsageLogTransport {
    next: Arc<dyn Transport>,
}

impl UsageLogTransport {
    pub fn new(next: Arc<dyn Transport>) -> Self {
        Self { next }
    }
}

#[async_trait]
impl Transport for UsageLogTransport {
    async fn round_trip(
        &self,
        ctx: &CallContext,
        request: Request,
    ) -> Result<Response, GraphError> {
        let response = self.next.round_trip(ctx, request).await?;
        log_app_usage(response.headers());
        Ok(response)
    }
}

/// Parse and log the usage header. Parse failures are logged and otherwise
/// ignored.
pub(crate) fn log_app_usage(headers: &HeaderMap) -> Option<AppUsage> {
    let raw = headers.get(APP_USAGE_HEADER)?;
    let parsed = raw
        .to_str()
        .map_err(|e| e.to_string())
        .and_then(|value| serde_json::from_str::<AppUsage>(value).map_err(|e| e.to_string()));
    match parsed {
        Ok(usage) => {
            if usage != AppUsage::default() {
                info!(
                    call_count = usage.call_count,
                    total_cputime = usage.total_cputime,
                    total_time = usage.total_time,
                    "graph api app usage"
                );
            }
            Some(usage)
        }
        Err(err) => {
            error!(error = %err, header = ?raw, "failed to parse app usage header");
            None
        }
    }
}

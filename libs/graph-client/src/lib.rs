//! Graph API Client Library
//!
//! Typed async client for the Facebook Graph/Marketing HTTP API:
//!
//! - Signed requests (`access_token` + `appsecret_proof`) with per-call token override
//! - Retries with exponential backoff on transport failures and 5xx responses
//! - Envelope decoding that separates remote errors from unexpected statuses
//! - Cursor pagination, either accumulated or streamed over a channel
//! - Progress tracking for long-running downloads
//!
//! # Examples
//!
//! ## Fetching a list
//!
//! ```no_run
//! use graph_client::{CallContext, GraphClient, GraphClientConfig};
//! use serde_json::Value;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GraphClient::from_config(GraphClientConfig::from_env()?)?;
//! let url = client
//!     .route("v19.0", "/act_123/campaigns")
//!     .fields(&["id", "name"])
//!     .limit(100)
//!     .build()?;
//!
//! let mut campaigns: Vec<Value> = Vec::new();
//! client.get_list(&CallContext::new(), &url, &mut campaigns).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Streaming a report
//!
//! ```no_run
//! use graph_client::marketing::{Insight, Service};
//! use graph_client::{CallContext, GraphClientConfig};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = Service::connect(GraphClientConfig::from_env()?).await?;
//! let (tx, mut rx) = mpsc::channel::<Insight>(100);
//!
//! let report = service
//!     .insights
//!     .new_report("123")
//!     .with_route(|route| route.level("ad").date_preset("last_7d"));
//! let reader = tokio::spawn(async move {
//!     while let Some(row) = rx.recv().await {
//!         println!("{} {}", row.ad_id, row.impressions);
//!     }
//! });
//! report.generate_report(&CallContext::new(), tx).await?;
//! reader.await?;
//! # Ok(())
//! # }
//! ```

mod accumulate;
mod backoff;
mod body;
mod client;
mod config;
mod context;
mod error;
pub mod marketing;
mod pager;
mod request;
mod response;
mod route;
mod stats;
mod time;
pub mod transport;
mod types;

// Re-export public API
pub use accumulate::{Accumulate, append_json};
pub use backoff::{BackoffPolicy, ExponentialBackoff};
pub use body::{Body, MultipartBody, UPLOAD_FILE_FIELD};
pub use client::GraphClient;
pub use config::{DEFAULT_BASE_URL, GraphClientConfig, ReportOptions};
pub use context::CallContext;
pub use error::{GraphError, RemoteError, Result, UploadError, is_not_found};
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use route::{Filter, Route, TimeRange};
pub use stats::{Stat, StatGuard, StatSnapshot, StatsRegistry};
pub use time::{GRAPH_TIME_FORMAT, GraphTime};
pub use transport::Transport;
pub use types::{
    Cursors, Envelope, ErrorContainer, IdResponse, Metadata, MetadataContainer, MinimalResponse,
    Paging, Summary, SummaryContainer,
};

// Re-export commonly used types from dependencies
pub use http::{Method, StatusCode};

//! Marketing API services built on [`GraphClient`].

mod audience;
mod insights;
mod post;

use std::sync::Arc;

use crate::client::GraphClient;
use crate::config::GraphClientConfig;
use crate::context::CallContext;
use crate::error::GraphError;
use crate::types::{Metadata, MetadataContainer};

pub use audience::{
    AudienceService, BATCH_MAX_IDS, CustomAudience, LookalikeOrigin, LookalikeSpec,
};
pub use insights::{Insight, InsightsService, ReportRequest};
pub use post::{Comment, CommentAuthor, CommentParent, PostService};

/// Graph API version used by every marketing route.
pub const VERSION: &str = "v19.0";

/// Entry point bundling the marketing services around one client.
pub struct Service {
    client: Arc<GraphClient>,
    pub audiences: AudienceService,
    pub insights: InsightsService,
    pub posts: PostService,
}

impl Service {
    /// Build a client from `config` and verify the credentials with
    /// `GET /me`.
    ///
    /// # Errors
    /// Configuration errors, or whatever the verification call fails with.
    pub async fn connect(config: GraphClientConfig) -> Result<Self, GraphError> {
        let client = Arc::new(GraphClient::from_config(config)?);
        Self::from_client(client).await
    }

    /// Verify the credentials of an existing client and wrap it.
    ///
    /// # Errors
    /// Whatever the `GET /me` call fails with.
    pub async fn from_client(client: Arc<GraphClient>) -> Result<Self, GraphError> {
        let url = client.route(VERSION, "/me").build()?;
        client
            .get_json::<serde::de::IgnoredAny>(&CallContext::new(), &url)
            .await?;
        Ok(Self::new(client))
    }

    /// Wrap `client` without a verification call.
    #[must_use]
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self {
            audiences: AudienceService::new(client.clone()),
            insights: InsightsService::new(client.clone()),
            posts: PostService::new(client.clone()),
            client,
        }
    }

    #[must_use]
    pub fn client(&self) -> &Arc<GraphClient> {
        &self.client
    }

    /// Node type of the object `id`.
    ///
    /// # Errors
    /// [`GraphError::InvalidResponse`] if the reply carries no metadata.
    pub async fn get_metadata(&self, ctx: &CallContext, id: &str) -> Result<Metadata, GraphError> {
        let url = self
            .client
            .route(VERSION, format!("/{id}"))
            .metadata(true)
            .build()?;
        let container: MetadataContainer = self.client.get_json(ctx, &url).await?;
        container
            .metadata
            .ok_or_else(|| GraphError::InvalidResponse(format!("no metadata for {id}")))
    }
}

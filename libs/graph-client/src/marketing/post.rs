use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::VERSION;
use crate::client::GraphClient;
use crate::context::CallContext;
use crate::error::GraphError;
use crate::route::Route;
use crate::stats::{StatGuard, StatsRegistry};
use crate::time::GraphTime;

const COMMENT_FIELDS: &[&str] = &["message", "message_tags", "parent", "from", "created_time"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentAuthor {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentParent {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Comment {
    pub id: String,
    pub message: String,
    pub created_time: GraphTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<CommentAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<CommentParent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub message_tags: Vec<serde_json::Value>,
}

/// Post operations. Comment downloads report progress under the post id.
pub struct PostService {
    client: Arc<GraphClient>,
    stats: StatsRegistry,
}

impl PostService {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self {
            client,
            stats: StatsRegistry::default(),
        }
    }

    /// Progress of the comment downloads in flight, keyed by post id.
    #[must_use]
    pub fn stats(&self) -> &StatsRegistry {
        &self.stats
    }

    /// `filter` is `stream` or `toplevel`; empty leaves it to the server.
    fn comments_route(&self, post_id: &str, filter: &str) -> Route {
        self.client
            .route(VERSION, format!("/{post_id}/comments"))
            .fields(COMMENT_FIELDS)
            .limit(100)
            .order("chronological")
            .filter(filter)
    }

    fn track(&self, post_id: &str) -> Result<StatGuard, GraphError> {
        self.stats
            .register(post_id)
            .ok_or_else(|| GraphError::AlreadyRunning {
                key: post_id.to_owned(),
            })
    }

    /// All comments of a post in chronological order.
    ///
    /// # Errors
    /// [`GraphError::AlreadyRunning`] if comments of this post are already
    /// being downloaded, or the first page error.
    pub async fn list_comments(
        &self,
        ctx: &CallContext,
        post_id: &str,
        filter: &str,
    ) -> Result<Vec<Comment>, GraphError> {
        let url = self.comments_route(post_id, filter).build()?;
        let stat = self.track(post_id)?;
        let ctx = ctx.clone().with_stat(stat.stat());

        let mut comments = Vec::new();
        self.client.get_list(&ctx, &url, &mut comments).await?;
        Ok(comments)
    }

    /// Stream all comments of a post into `out`; returns how many were sent.
    ///
    /// # Errors
    /// Same as [`PostService::list_comments`], plus malformed comments.
    pub async fn read_comments(
        &self,
        ctx: &CallContext,
        post_id: &str,
        filter: &str,
        out: mpsc::Sender<Comment>,
    ) -> Result<u64, GraphError> {
        let url = self.comments_route(post_id, filter).build()?;
        let stat = self.track(post_id)?;
        let ctx = ctx.clone().with_stat(stat.stat());
        self.client.stream_list(&ctx, &url, out).await
    }
}

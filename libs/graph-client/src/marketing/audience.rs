use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::VERSION;
use crate::client::GraphClient;
use crate::context::CallContext;
use crate::error::{GraphError, UploadError};

/// Largest number of ids sent in one upload batch.
pub const BATCH_MAX_IDS: usize = 10_000;

const ID_SCHEMA: &str = "MOBILE_ADVERTISER_ID";

const AUDIENCE_FIELDS: &[&str] = &[
    "id",
    "name",
    "description",
    "subtype",
    "approximate_count_upper_bound",
    "approximate_count_lower_bound",
    "rule",
    "customer_file_source",
    "lookalike_audience_ids",
];

const LIST_FIELDS: &[&str] = &[
    "id",
    "name",
    "description",
    "approximate_count_upper_bound",
    "approximate_count_lower_bound",
    "subtype",
    "lookalike_spec",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomAudience {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub account_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subtype: String,
    pub approximate_count_upper_bound: i64,
    pub approximate_count_lower_bound: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rule: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub customer_file_source: String,
    #[serde(rename = "lookalike_audience_ids", skip_serializing_if = "Vec::is_empty")]
    pub lookalikes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookalike_spec: Option<LookalikeSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookalikeSpec {
    pub country: String,
    pub origin: Vec<LookalikeOrigin>,
    pub ratio: f64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookalikeOrigin {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize)]
struct EditIdsRequest<'a> {
    session: UploadSession,
    payload: UploadPayload<'a>,
}

#[derive(Debug, Serialize)]
struct UploadSession {
    session_id: u32,
    batch_seq: u32,
    last_batch_flag: bool,
}

#[derive(Debug, Serialize)]
struct UploadPayload<'a> {
    schema: &'static str,
    data: &'a [String],
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EditIdsResponse {
    num_received: u64,
    num_invalid_entries: u64,
}

/// Custom audience operations.
pub struct AudienceService {
    client: Arc<GraphClient>,
    batch_size: usize,
}

impl AudienceService {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self {
            client,
            batch_size: BATCH_MAX_IDS,
        }
    }

    /// Override the upload batch size; values are clamped to
    /// `1..=BATCH_MAX_IDS`.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, BATCH_MAX_IDS);
        self
    }

    /// Fetch one audience; `None` if it does not exist.
    ///
    /// # Errors
    /// Any error other than not-found.
    pub async fn get(&self, ctx: &CallContext, id: &str) -> Result<Option<CustomAudience>, GraphError> {
        let url = self
            .client
            .route(VERSION, format!("/{id}"))
            .fields(AUDIENCE_FIELDS)
            .build()?;
        match self.client.get_json(ctx, &url).await {
            Ok(audience) => Ok(Some(audience)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// All custom audiences of an ad account.
    ///
    /// # Errors
    /// The first page error.
    pub async fn list_custom(
        &self,
        ctx: &CallContext,
        account_id: &str,
    ) -> Result<Vec<CustomAudience>, GraphError> {
        let url = self
            .client
            .route(VERSION, format!("/act_{account_id}/customaudiences"))
            .limit(250)
            .fields(LIST_FIELDS)
            .build()?;
        let mut audiences = Vec::new();
        self.client.get_list(ctx, &url, &mut audiences).await?;
        Ok(audiences)
    }

    /// Add (or with `remove`, delete) the ids read from `ids` to an audience.
    ///
    /// Ids are sent in batches within one upload session until the channel
    /// closes; empty ids are skipped. Each batch is counted into the stat
    /// attached to `ctx`.
    ///
    /// # Errors
    /// The first request error, or [`GraphError::Upload`] if the server
    /// acknowledged a different number of ids than were sent.
    pub async fn edit_ids(
        &self,
        ctx: &CallContext,
        audience_id: &str,
        ids: &mut mpsc::Receiver<String>,
        remove: bool,
    ) -> Result<(), GraphError> {
        let url = self
            .client
            .route(VERSION, format!("/{audience_id}/users"))
            .build()?;
        let session_id = new_session_id();

        let mut total = 0_u64;
        let mut received = 0_u64;
        let mut failed = 0_u64;
        let mut batch_seq = 0_u32;
        let mut pending = next_id(ctx, ids).await?;

        while let Some(first) = pending.take() {
            let mut batch = Vec::with_capacity(self.batch_size);
            batch.push(first);
            while batch.len() < self.batch_size {
                match next_id(ctx, ids).await? {
                    Some(id) => batch.push(id),
                    None => break,
                }
            }
            if batch.len() == self.batch_size {
                pending = next_id(ctx, ids).await?;
            }
            batch_seq += 1;
            let count = u64::try_from(batch.len()).unwrap_or(u64::MAX);
            total += count;

            let request = EditIdsRequest {
                session: UploadSession {
                    session_id,
                    batch_seq,
                    last_batch_flag: pending.is_none(),
                },
                payload: UploadPayload {
                    schema: ID_SCHEMA,
                    data: &batch,
                },
            };
            let response: EditIdsResponse = if remove {
                self.client.delete_json(ctx, &url, &request).await?
            } else {
                self.client.post_json(ctx, &url, &request).await?
            };
            debug!(
                audience_id,
                batch_seq,
                ids = batch.len(),
                num_received = response.num_received,
                "uploaded id batch"
            );
            received = response.num_received;
            failed = response.num_invalid_entries;
            if let Some(stat) = ctx.stat() {
                stat.add(count);
            }
        }

        if total != received {
            return Err(UploadError {
                total,
                received,
                failed,
            }
            .into());
        }
        Ok(())
    }
}

/// Next non-empty id, or `None` once the channel is closed.
async fn next_id(
    ctx: &CallContext,
    ids: &mut mpsc::Receiver<String>,
) -> Result<Option<String>, GraphError> {
    loop {
        let id = tokio::select! {
            id = ids.recv() => id,
            () = ctx.cancellation().cancelled() => return Err(GraphError::Cancelled),
        };
        match id {
            Some(id) if id.is_empty() => {}
            other => return Ok(other),
        }
    }
}

fn new_session_id() -> u32 {
    let bytes = Uuid::new_v4().into_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::VERSION;
use crate::client::GraphClient;
use crate::config::ReportOptions;
use crate::context::CallContext;
use crate::error::GraphError;
use crate::pager::ListObserver;
use crate::route::Route;
use crate::stats::{Stat, StatGuard, StatsRegistry};

const JOB_COMPLETED: &str = "Job Completed";
const JOB_FAILED: &str = "Job Failed";

/// Status of an asynchronous report run.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReportRun {
    report_run_id: String,
    async_status: String,
    async_percent_completion: u64,
    is_running: bool,
}

/// One row of an insights report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Insight {
    pub account_id: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub adset_id: String,
    pub adset_name: String,
    pub ad_id: String,
    pub objective: String,
    pub date_start: String,
    pub date_stop: String,
    pub age: String,
    pub gender: String,
    pub country: String,
    pub region: String,
    pub publisher_platform: String,
    pub platform_position: String,
    #[serde(rename = "impression_device")]
    pub device_type: String,
    #[serde(deserialize_with = "number_from_string")]
    pub impressions: u64,
    #[serde(deserialize_with = "number_from_string")]
    pub clicks: u64,
    #[serde(deserialize_with = "number_from_string")]
    pub reach: f64,
    #[serde(deserialize_with = "number_from_string")]
    pub frequency: f64,
    #[serde(deserialize_with = "number_from_string")]
    pub spend: f64,
}

/// Report progress in impressions: each page's `summary` carries the total,
/// delivered rows make up the current count.
struct ImpressionProgress<'a>(&'a Stat);

#[derive(Default, Deserialize)]
#[serde(default)]
struct Impressions {
    #[serde(deserialize_with = "number_from_string")]
    impressions: u64,
}

impl ListObserver for ImpressionProgress<'_> {
    fn page(&self, summary: Option<&RawValue>) {
        let total = summary.and_then(|raw| serde_json::from_str::<Impressions>(raw.get()).ok());
        if let Some(total) = total {
            self.0.set_total(total.impressions);
        }
    }

    fn element(&self, raw: &RawValue) {
        if let Ok(row) = serde_json::from_str::<Impressions>(raw.get()) {
            self.0.add(row.impressions);
        }
    }
}

/// The insights endpoint encodes metrics as decimal strings.
fn number_from_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: Display,
{
    match Option::<String>::deserialize(deserializer)?.as_deref() {
        None | Some("") => Ok(T::default()),
        Some(raw) => raw.parse().map_err(D::Error::custom),
    }
}

/// Insights reports, downloaded directly or through asynchronous runs.
pub struct InsightsService {
    client: Arc<GraphClient>,
    stats: StatsRegistry,
    options: ReportOptions,
}

impl InsightsService {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self {
            client,
            stats: StatsRegistry::default(),
            options: ReportOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ReportOptions) -> Self {
        self.options = options;
        self
    }

    /// Progress of the report runs currently being generated, keyed by run id.
    #[must_use]
    pub fn stats(&self) -> &StatsRegistry {
        &self.stats
    }

    /// Report over an ad account.
    pub fn new_report(&self, account_id: &str) -> ReportRequest<'_> {
        ReportRequest {
            service: self,
            route: self
                .client
                .route(VERSION, format!("/act_{account_id}/insights")),
        }
    }

    /// Report over a campaign, ad set or ad.
    pub fn new_report_of(&self, object_id: &str) -> ReportRequest<'_> {
        ReportRequest {
            service: self,
            route: self.client.route(VERSION, format!("/{object_id}/insights")),
        }
    }
}

/// A report under construction. Configure the query with
/// [`ReportRequest::with_route`], then download or generate it.
pub struct ReportRequest<'a> {
    service: &'a InsightsService,
    route: Route,
}

impl ReportRequest<'_> {
    /// Adjust the report's route, e.g. to set fields, level or time range.
    #[must_use]
    pub fn with_route(mut self, configure: impl FnOnce(Route) -> Route) -> Self {
        self.route = configure(self.route);
        self
    }

    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Fetch all report rows synchronously.
    ///
    /// # Errors
    /// The first page error.
    pub async fn download<T: DeserializeOwned>(&self, ctx: &CallContext) -> Result<Vec<T>, GraphError> {
        let url = self.route.build()?;
        let mut rows = Vec::new();
        self.service.client.get_list(ctx, &url, &mut rows).await?;
        Ok(rows)
    }

    /// Create an asynchronous report run, wait for it to finish, stream its
    /// rows into `out` and delete the run.
    ///
    /// While running, the run's progress is visible in
    /// [`InsightsService::stats`] under its run id. Returns the number of rows
    /// delivered.
    ///
    /// # Errors
    /// [`GraphError::MissingReportRunId`], [`GraphError::AlreadyRunning`],
    /// [`GraphError::ReportFailed`], [`GraphError::ReportTimeout`], or the
    /// first request error.
    pub async fn generate_report<T>(
        &self,
        ctx: &CallContext,
        out: mpsc::Sender<T>,
    ) -> Result<u64, GraphError>
    where
        T: DeserializeOwned + Send,
    {
        let client = &self.service.client;
        let url = self
            .route
            .clone()
            .default_summary(true)
            .unified_attribution_settings(true)
            .build()?;
        let run: ReportRun = client.post(ctx, &url).await?;
        if run.report_run_id.is_empty() {
            return Err(GraphError::MissingReportRunId);
        }
        let run_id = run.report_run_id;
        let run_url = client.route(VERSION, format!("/{run_id}")).build()?;

        let Some(stat) = self.service.stats.register(&run_id) else {
            return Err(GraphError::AlreadyRunning { key: run_id });
        };

        let result = self.wait_and_read(ctx, &run_id, &run_url, &stat, out).await;
        drop(stat);

        // The caller's token may already be cancelled; clean up regardless.
        let cleanup_ctx = ctx.clone().with_cancellation(CancellationToken::new());
        if let Err(err) = client.delete(&cleanup_ctx, &run_url).await {
            warn!(id = %run_id, url = %run_url, error = %err, "failed deleting report run");
        }
        result
    }

    async fn wait_and_read<T>(
        &self,
        ctx: &CallContext,
        run_id: &str,
        run_url: &str,
        stat: &StatGuard,
        out: mpsc::Sender<T>,
    ) -> Result<u64, GraphError>
    where
        T: DeserializeOwned + Send,
    {
        let client = &self.service.client;
        let options = self.service.options;

        let mut deadline = Instant::now() + options.stall_timeout;
        let mut last_percentage = 0;
        loop {
            tokio::select! {
                () = sleep(options.poll_interval) => {}
                () = ctx.cancellation().cancelled() => return Err(GraphError::Cancelled),
            }
            if Instant::now() >= deadline {
                return Err(GraphError::ReportTimeout {
                    id: run_id.to_owned(),
                });
            }

            let run: ReportRun = client.get_json(ctx, run_url).await?;
            debug!(
                id = run_id,
                status = %run.async_status,
                percent = run.async_percent_completion,
                "polled report run"
            );
            if run.async_status == JOB_COMPLETED
                && run.async_percent_completion == 100
                && !run.is_running
            {
                stat.set_created();
                break;
            }
            stat.set_progress(run.async_percent_completion, 100);
            if run.async_status == JOB_FAILED {
                return Err(GraphError::ReportFailed {
                    id: run_id.to_owned(),
                });
            }
            if run.async_percent_completion > last_percentage {
                last_percentage = run.async_percent_completion;
                deadline = Instant::now() + options.stall_timeout;
            }
        }

        let rows_url = client
            .route(VERSION, format!("/{run_id}/insights"))
            .limit(options.page_limit)
            .build()?;
        client
            .stream_list_observed(ctx, &rows_url, out, &ImpressionProgress(stat))
            .await
    }
}

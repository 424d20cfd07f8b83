//! On-Page crawl tasks: post a crawl, then poll its summary until it finishes.
//!
//! The summary endpoint answers `40400` while the task is still queued. That is
//! surfaced as [`ClientError::TaskNotReady`] so callers can tell "poll again"
//! apart from a real failure.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::error::{ClientError, Provider};
use crate::http::sleep_or_cancel;

use super::client::DataForSeoClient;
use super::envelope::{STATUS_NOT_FOUND, created_task_id, first_task_result};

pub(crate) const ON_PAGE_TASK_POST_PATH: &str = "on_page/task_post";
pub(crate) const ON_PAGE_SUMMARY_PATH: &str = "on_page/summary";

const PROVIDER: Provider = Provider::DataForSeo;

/// Parameters for [`DataForSeoClient::on_page_task_post`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnPageTaskRequest {
    /// Domain to crawl, without scheme.
    pub target: String,
    pub max_crawl_pages: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
    /// Render pages in a browser before auditing.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub enable_javascript: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pingback_url: Option<String>,
}

impl OnPageTaskRequest {
    #[must_use]
    pub fn new(target: impl Into<String>, max_crawl_pages: u32) -> Self {
        Self {
            target: target.into(),
            max_crawl_pages,
            start_url: None,
            enable_javascript: false,
            pingback_url: None,
        }
    }

    #[must_use]
    pub fn start_url(mut self, start_url: impl Into<String>) -> Self {
        self.start_url = Some(start_url.into());
        self
    }

    #[must_use]
    pub fn enable_javascript(mut self, enable: bool) -> Self {
        self.enable_javascript = enable;
        self
    }

    fn validate(&self) -> Result<(), ClientError> {
        let target = self.target.trim();
        if target.is_empty() {
            return Err(ClientError::invalid_request(PROVIDER, "target must not be empty"));
        }
        if target.contains("://") {
            return Err(ClientError::invalid_request(
                PROVIDER,
                "target must be a bare domain without scheme",
            ));
        }
        if self.max_crawl_pages == 0 {
            return Err(ClientError::invalid_request(
                PROVIDER,
                "max_crawl_pages must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Crawl progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStatus {
    #[serde(default)]
    pub max_crawl_pages: Option<i64>,
    #[serde(default)]
    pub pages_in_queue: Option<i64>,
    #[serde(default)]
    pub pages_crawled: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cms: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub total_pages: Option<i64>,
}

/// Site-wide audit counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    /// 0 to 100.
    #[serde(default)]
    pub onpage_score: Option<f64>,
    #[serde(default)]
    pub links_external: Option<i64>,
    #[serde(default)]
    pub links_internal: Option<i64>,
    #[serde(default)]
    pub broken_links: Option<i64>,
    #[serde(default)]
    pub broken_resources: Option<i64>,
    #[serde(default)]
    pub duplicate_title: Option<i64>,
    #[serde(default)]
    pub duplicate_description: Option<i64>,
    #[serde(default)]
    pub duplicate_content: Option<i64>,
    /// Page counts per failed check, e.g. `no_h1_tag`.
    #[serde(default)]
    pub checks: BTreeMap<String, i64>,
}

/// Summary of an On-Page crawl.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnPageSummary {
    /// `in_progress` or `finished`.
    pub crawl_progress: String,
    #[serde(default)]
    pub crawl_status: Option<CrawlStatus>,
    #[serde(default)]
    pub domain_info: Option<DomainInfo>,
    #[serde(default)]
    pub page_metrics: Option<PageMetrics>,
}

impl OnPageSummary {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.crawl_progress == "finished"
    }
}

impl DataForSeoClient {
    /// Queues an On-Page crawl and returns its task id.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidRequest`] for a bad target, otherwise any error
    /// from [`post`](Self::post) or [`created_task_id`](super::created_task_id).
    #[instrument(skip(self, ctx, request), fields(target = %request.target))]
    pub async fn on_page_task_post(
        &self,
        ctx: &CancellationToken,
        request: &OnPageTaskRequest,
    ) -> Result<String, ClientError> {
        request.validate()?;
        let envelope = self.post(ctx, ON_PAGE_TASK_POST_PATH, request).await?;
        let id = created_task_id(&envelope)?;
        info!(task_id = %id, "on-page task created");
        Ok(id)
    }

    /// Fetches the crawl summary for a task id.
    ///
    /// # Errors
    ///
    /// [`ClientError::TaskNotReady`] while the task is still queued (status
    /// `40400` on the envelope or the task), [`ClientError::Api`] for any
    /// other non-`20000` envelope, otherwise any error from
    /// [`first_task_result`](super::first_task_result).
    #[instrument(skip(self, ctx))]
    pub async fn on_page_summary(
        &self,
        ctx: &CancellationToken,
        task_id: &str,
    ) -> Result<OnPageSummary, ClientError> {
        let task_id = task_id.trim();
        if !is_path_segment(task_id) {
            return Err(ClientError::invalid_request(
                PROVIDER,
                format!("invalid task id {task_id:?}"),
            ));
        }

        let envelope = self
            .get_raw(ctx, &format!("{ON_PAGE_SUMMARY_PATH}/{task_id}"))
            .await?;
        if envelope.status_code == STATUS_NOT_FOUND {
            return Err(ClientError::TaskNotReady { provider: PROVIDER });
        }
        envelope.ensure_ok()?;
        if envelope
            .tasks
            .first()
            .is_some_and(|task| task.status_code == STATUS_NOT_FOUND)
        {
            return Err(ClientError::TaskNotReady { provider: PROVIDER });
        }

        let summaries: Vec<OnPageSummary> = first_task_result(&envelope)?;
        summaries
            .into_iter()
            .next()
            .ok_or(ClientError::EmptyResult { provider: PROVIDER })
    }

    /// Polls [`on_page_summary`](Self::on_page_summary) until the crawl finishes.
    ///
    /// Polls at most `max_polls` times, sleeping `interval` between polls.
    /// "Not ready" answers and in-progress summaries both count as a poll.
    ///
    /// # Errors
    ///
    /// [`ClientError::TaskNotReady`] if the budget runs out, [`ClientError::Cancelled`]
    /// if `ctx` fires while waiting, or the first non-retryable error.
    #[instrument(skip(self, ctx))]
    pub async fn wait_for_on_page_summary(
        &self,
        ctx: &CancellationToken,
        task_id: &str,
        interval: Duration,
        max_polls: u32,
    ) -> Result<OnPageSummary, ClientError> {
        for poll in 1..=max_polls.max(1) {
            match self.on_page_summary(ctx, task_id).await {
                Ok(summary) if summary.is_finished() => return Ok(summary),
                Ok(summary) => {
                    debug!(poll, progress = %summary.crawl_progress, "crawl still running");
                }
                Err(ClientError::TaskNotReady { .. }) => debug!(poll, "task not ready"),
                Err(e) => return Err(e),
            }
            if poll < max_polls && !sleep_or_cancel(ctx, interval).await {
                return Err(ClientError::cancelled(PROVIDER));
            }
        }
        Err(ClientError::TaskNotReady { provider: PROVIDER })
    }
}

/// A task id is spliced into the URL path, so it must stay one plain segment.
fn is_path_segment(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.chars().any(|c| {
            matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control()
        })
}

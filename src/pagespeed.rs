//! PageSpeed Insights v5 client.
//!
//! One call runs a full Lighthouse audit server-side, which routinely takes
//! 30-60 s, so the client defaults to the slow-provider timeout. The raw
//! Lighthouse report is large; [`PageSpeedReport`] keeps the category scores,
//! the lab metrics and the Chrome UX field data.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{ClientError, Provider};
use crate::http::{
    ClientOptions, RequestExecutor, RetryPolicy, SLOW_PROVIDER_TIMEOUT, client_option_setters,
};

/// Default runPagespeed endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";

/// Default concurrency gate capacity.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

const PROVIDER: Provider = Provider::PageSpeed;

const CATEGORIES: [&str; 4] = ["performance", "accessibility", "best-practices", "seo"];

/// Device profile Lighthouse emulates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Mobile,
    Desktop,
}

impl Strategy {
    #[must_use]
    pub fn as_query(self) -> &'static str {
        match self {
            Self::Mobile => "MOBILE",
            Self::Desktop => "DESKTOP",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mobile => f.write_str("mobile"),
            Self::Desktop => f.write_str("desktop"),
        }
    }
}

/// Lighthouse category scores, 0 to 100. `None` when Lighthouse could not score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub performance: Option<u8>,
    pub accessibility: Option<u8>,
    pub best_practices: Option<u8>,
    pub seo: Option<u8>,
}

/// Lab metrics from the emulated run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LabMetrics {
    pub largest_contentful_paint_ms: Option<f64>,
    pub first_contentful_paint_ms: Option<f64>,
    pub cumulative_layout_shift: Option<f64>,
    pub total_blocking_time_ms: Option<f64>,
    pub speed_index_ms: Option<f64>,
}

/// One Chrome UX Report metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetric {
    /// 75th percentile. CLS is reported multiplied by 100.
    #[serde(default)]
    pub percentile: Option<i64>,
    /// `FAST`, `AVERAGE` or `SLOW`.
    #[serde(default)]
    pub category: Option<String>,
}

/// Real-user data for the URL, when Google has enough traffic to report it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldData {
    #[serde(default)]
    pub overall_category: Option<String>,
    /// Keyed by CrUX metric id, e.g. `LARGEST_CONTENTFUL_PAINT_MS`.
    #[serde(default)]
    pub metrics: BTreeMap<String, FieldMetric>,
}

/// Flattened PageSpeed result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSpeedReport {
    pub url: String,
    pub final_url: Option<String>,
    pub strategy: Strategy,
    pub lighthouse_version: Option<String>,
    pub fetch_time: Option<String>,
    pub scores: CategoryScores,
    pub lab: LabMetrics,
    pub field: Option<FieldData>,
}

// Wire shapes. Only the fields the report keeps are decoded.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    lighthouse_result: Option<LighthouseResult>,
    #[serde(default)]
    loading_experience: Option<FieldData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LighthouseResult {
    #[serde(default)]
    final_url: Option<String>,
    #[serde(default)]
    lighthouse_version: Option<String>,
    #[serde(default)]
    fetch_time: Option<String>,
    #[serde(default)]
    runtime_error: Option<RuntimeError>,
    #[serde(default)]
    categories: BTreeMap<String, Category>,
    #[serde(default)]
    audits: BTreeMap<String, Audit>,
}

#[derive(Debug, Deserialize)]
struct RuntimeError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Audit {
    #[serde(default)]
    numeric_value: Option<f64>,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_percent(score: Option<f64>) -> Option<u8> {
    score
        .filter(|s| s.is_finite())
        .map(|s| (s.clamp(0.0, 1.0) * 100.0).round() as u8)
}

impl LighthouseResult {
    fn score(&self, category: &str) -> Option<u8> {
        to_percent(self.categories.get(category).and_then(|c| c.score))
    }

    fn metric(&self, audit: &str) -> Option<f64> {
        self.audits.get(audit).and_then(|a| a.numeric_value)
    }
}

fn into_report(
    response: ApiResponse,
    url: &str,
    strategy: Strategy,
) -> Result<PageSpeedReport, ClientError> {
    let Some(lighthouse) = response.lighthouse_result else {
        return Err(ClientError::EmptyResult { provider: PROVIDER });
    };
    if let Some(error) = &lighthouse.runtime_error
        && !error.code.is_empty()
        && error.code != "NO_ERROR"
    {
        return Err(ClientError::Rejected {
            provider: PROVIDER,
            message: format!("{}: {}", error.code, error.message),
        });
    }

    let field = response
        .loading_experience
        .filter(|field| !field.metrics.is_empty());

    Ok(PageSpeedReport {
        url: response.id.unwrap_or_else(|| url.to_string()),
        final_url: lighthouse.final_url.clone(),
        strategy,
        lighthouse_version: lighthouse.lighthouse_version.clone(),
        fetch_time: lighthouse.fetch_time.clone(),
        scores: CategoryScores {
            performance: lighthouse.score("performance"),
            accessibility: lighthouse.score("accessibility"),
            best_practices: lighthouse.score("best-practices"),
            seo: lighthouse.score("seo"),
        },
        lab: LabMetrics {
            largest_contentful_paint_ms: lighthouse.metric("largest-contentful-paint"),
            first_contentful_paint_ms: lighthouse.metric("first-contentful-paint"),
            cumulative_layout_shift: lighthouse.metric("cumulative-layout-shift"),
            total_blocking_time_ms: lighthouse.metric("total-blocking-time"),
            speed_index_ms: lighthouse.metric("speed-index"),
        },
        field,
    })
}

/// PageSpeed Insights client. The API key is optional.
#[derive(Debug, Clone)]
pub struct PageSpeedClient {
    executor: RequestExecutor,
    options: ClientOptions,
    api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PageSpeedClientBuilder {
    options: ClientOptions,
    api_key: Option<String>,
}

impl PageSpeedClientBuilder {
    client_option_setters!();

    /// Passes `key=<api_key>` on every request. Blank keys are ignored.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.trim().is_empty()).then_some(api_key);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidRequest`] when the base URL is not an absolute
    /// http(s) URL, [`ClientError::ClientBuild`] if the HTTP client cannot be built.
    pub fn build(self) -> Result<PageSpeedClient, ClientError> {
        self.options.validate_base_url(PROVIDER)?;
        let executor = RequestExecutor::new(PROVIDER, &self.options)?;
        Ok(PageSpeedClient {
            executor,
            options: self.options,
            api_key: self.api_key,
        })
    }
}

impl PageSpeedClient {
    #[must_use]
    pub fn builder() -> PageSpeedClientBuilder {
        PageSpeedClientBuilder {
            options: ClientOptions::new(
                DEFAULT_BASE_URL,
                SLOW_PROVIDER_TIMEOUT,
                DEFAULT_MAX_CONCURRENCY,
                RetryPolicy::exponential(),
            ),
            api_key: None,
        }
    }

    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    #[must_use]
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Builds the request URL with all four categories requested.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidRequest`] if the base URL does not parse.
    pub fn request_url(&self, target: &str, strategy: Strategy) -> Result<url::Url, ClientError> {
        let mut params: Vec<(&str, &str)> =
            vec![("url", target), ("strategy", strategy.as_query())];
        params.extend(CATEGORIES.iter().map(|c| ("category", *c)));
        if let Some(key) = &self.api_key {
            params.push(("key", key.as_str()));
        }
        url::Url::parse_with_params(&self.options.base_url, &params).map_err(|e| {
            ClientError::invalid_request(
                PROVIDER,
                format!("invalid base url {:?}: {e}", self.options.base_url),
            )
        })
    }

    /// Runs a Lighthouse audit of `target`.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidRequest`] for a blank or non-http(s) target,
    /// [`ClientError::Rejected`] when Lighthouse reports a runtime error,
    /// [`ClientError::EmptyResult`] when the response has no Lighthouse result,
    /// otherwise any executor or decode error.
    #[instrument(skip(self, ctx))]
    pub async fn run(
        &self,
        ctx: &CancellationToken,
        target: &str,
        strategy: Strategy,
    ) -> Result<PageSpeedReport, ClientError> {
        let target = target.trim();
        let parsed = url::Url::parse(target).map_err(|e| {
            ClientError::invalid_request(PROVIDER, format!("invalid target url {target:?}: {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::invalid_request(
                PROVIDER,
                format!("unsupported target scheme {:?}", parsed.scheme()),
            ));
        }

        let url = self.request_url(target, strategy)?;
        // Never log the key.
        let log_url = format!("{}?url={target}", self.options.base_url);
        let response = self
            .executor
            .execute(ctx, &log_url, |http| http.get(url.clone()))
            .await?;

        let decoded: ApiResponse = serde_json::from_slice(&response.body)
            .map_err(|e| ClientError::decode(PROVIDER, "pagespeed response", e))?;
        let report = into_report(decoded, target, strategy)?;
        debug!(
            performance = report.scores.performance,
            has_field_data = report.field.is_some(),
            "pagespeed report"
        );
        Ok(report)
    }
}

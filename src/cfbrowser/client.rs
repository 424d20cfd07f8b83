//! Browser-rendering worker client.

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{ClientError, Provider};
use crate::http::{
    ClientOptions, RawResponse, RequestExecutor, RetryPolicy, SLOW_PROVIDER_TIMEOUT,
    client_option_setters,
};

use super::types::{ApiEnvelope, RenderRequest, Screenshot};

/// Default concurrency gate capacity.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

const PROVIDER: Provider = Provider::BrowserRendering;

/// Client for a headless-browser rendering worker.
///
/// Rendering is slow and the worker rate-limits aggressively, so the client
/// defaults to a 90 s timeout and server-guided backoff that honours
/// `Retry-After` on 429.
#[derive(Debug, Clone)]
pub struct BrowserRenderingClient {
    executor: RequestExecutor,
    options: ClientOptions,
    api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BrowserRenderingClientBuilder {
    options: ClientOptions,
    api_key: Option<String>,
}

impl BrowserRenderingClientBuilder {
    client_option_setters!();

    /// Sends `Authorization: Bearer <key>` on every request. Blank keys are ignored.
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
    /// [`ClientError::InvalidRequest`] when the worker URL is not an absolute
    /// http(s) URL, [`ClientError::ClientBuild`] if the HTTP client cannot be built.
    pub fn build(self) -> Result<BrowserRenderingClient, ClientError> {
        self.options.validate_base_url(PROVIDER)?;
        let executor = RequestExecutor::new(PROVIDER, &self.options)?;
        Ok(BrowserRenderingClient {
            executor,
            options: self.options,
            api_key: self.api_key,
        })
    }
}

impl BrowserRenderingClient {
    /// Starts a builder for the worker at `worker_url`.
    #[must_use]
    pub fn builder(worker_url: impl Into<String>) -> BrowserRenderingClientBuilder {
        BrowserRenderingClientBuilder {
            options: ClientOptions::new(
                worker_url,
                SLOW_PROVIDER_TIMEOUT,
                DEFAULT_MAX_CONCURRENCY,
                RetryPolicy::server_guided(),
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

    /// Fully rendered HTML of the page.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidRequest`] for a malformed request, executor
    /// errors, [`ClientError::Decode`], [`ClientError::Rejected`] or
    /// [`ClientError::EmptyResult`].
    #[instrument(skip(self, ctx, request), fields(url = ?request.url))]
    pub async fn content(
        &self,
        ctx: &CancellationToken,
        request: &RenderRequest,
    ) -> Result<String, ClientError> {
        self.post_json(ctx, "content", request).await
    }

    /// The rendered page converted to Markdown.
    ///
    /// # Errors
    ///
    /// Same as [`content`](Self::content).
    #[instrument(skip(self, ctx, request), fields(url = ?request.url))]
    pub async fn markdown(
        &self,
        ctx: &CancellationToken,
        request: &RenderRequest,
    ) -> Result<String, ClientError> {
        self.post_json(ctx, "markdown", request).await
    }

    /// Every link on the rendered page. A page without links yields an empty list.
    ///
    /// # Errors
    ///
    /// Same as [`content`](Self::content).
    #[instrument(skip(self, ctx, request), fields(url = ?request.url))]
    pub async fn links(
        &self,
        ctx: &CancellationToken,
        request: &RenderRequest,
    ) -> Result<Vec<String>, ClientError> {
        let links: Vec<String> = self.post_json(ctx, "links", request).await?;
        debug!(links = links.len(), "links extracted");
        Ok(links)
    }

    /// Screenshot of the rendered page.
    ///
    /// The worker answers with image bytes on success and a JSON envelope on
    /// failure; the latter is surfaced as [`ClientError::Rejected`].
    ///
    /// # Errors
    ///
    /// Same as [`content`](Self::content).
    #[instrument(skip(self, ctx, request), fields(url = ?request.url))]
    pub async fn screenshot(
        &self,
        ctx: &CancellationToken,
        request: &RenderRequest,
    ) -> Result<Screenshot, ClientError> {
        let response = self.post(ctx, "screenshot", request).await?;
        let content_type = response
            .headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        if content_type.starts_with("application/json") {
            let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_slice(&response.body)
                .map_err(|e| ClientError::decode(PROVIDER, "screenshot response", e))?;
            envelope.into_result()?;
            return Err(ClientError::EmptyResult { provider: PROVIDER });
        }
        if response.body.is_empty() {
            return Err(ClientError::EmptyResult { provider: PROVIDER });
        }
        debug!(bytes = response.body.len(), %content_type, "screenshot received");
        Ok(Screenshot {
            content_type,
            bytes: response.body,
        })
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        ctx: &CancellationToken,
        endpoint: &str,
        request: &RenderRequest,
    ) -> Result<T, ClientError> {
        let response = self.post(ctx, endpoint, request).await?;
        let envelope: ApiEnvelope<T> = serde_json::from_slice(&response.body)
            .map_err(|e| ClientError::decode(PROVIDER, "worker response", e))?;
        envelope.into_result()
    }

    async fn post(
        &self,
        ctx: &CancellationToken,
        endpoint: &str,
        request: &RenderRequest,
    ) -> Result<RawResponse, ClientError> {
        request.validate()?;
        let payload = serde_json::to_vec(request)
            .map_err(|source| ClientError::Encode { provider: PROVIDER, source })?;
        let url = self.options.endpoint(endpoint);

        self.executor
            .execute(ctx, &url, |http| {
                let builder = http
                    .post(url.as_str())
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(payload.clone());
                match &self.api_key {
                    Some(key) => builder.bearer_auth(key),
                    None => builder,
                }
            })
            .await
    }
}

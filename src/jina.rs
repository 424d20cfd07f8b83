//! Markdown extraction through the Jina reader proxy.
//!
//! `GET <base><target>` returns the target page as Markdown. There is no
//! envelope: the body is the result.

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{ClientError, Provider};
use crate::http::{
    ClientOptions, DEFAULT_TIMEOUT, RequestExecutor, RetryPolicy, client_option_setters,
};

/// Default reader endpoint.
pub const DEFAULT_BASE_URL: &str = "https://r.jina.ai/";

/// Default concurrency gate capacity.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

const PROVIDER: Provider = Provider::Jina;

/// Reader client. The API key is optional; anonymous use is rate-limited harder.
#[derive(Debug, Clone)]
pub struct JinaClient {
    executor: RequestExecutor,
    options: ClientOptions,
    api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JinaClientBuilder {
    options: ClientOptions,
    api_key: Option<String>,
}

impl JinaClientBuilder {
    client_option_setters!();

    /// Sends `Authorization: Bearer <key>`. Blank keys are ignored.
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
    pub fn build(self) -> Result<JinaClient, ClientError> {
        self.options.validate_base_url(PROVIDER)?;
        let executor = RequestExecutor::new(PROVIDER, &self.options)?;
        Ok(JinaClient {
            executor,
            options: self.options,
            api_key: self.api_key,
        })
    }
}

impl JinaClient {
    #[must_use]
    pub fn builder() -> JinaClientBuilder {
        JinaClientBuilder {
            options: ClientOptions::new(
                DEFAULT_BASE_URL,
                DEFAULT_TIMEOUT,
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

    /// Reader URL for `target`: the target is appended verbatim to the base.
    #[must_use]
    pub fn reader_url(&self, target: &str) -> String {
        format!("{}/{}", self.options.base_url.trim_end_matches('/'), target.trim())
    }

    /// Fetches `target` rendered as Markdown.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidRequest`] when `target` is blank or not an
    /// http(s) URL, otherwise any executor error.
    #[instrument(skip(self, ctx))]
    pub async fn read_markdown(
        &self,
        ctx: &CancellationToken,
        target: &str,
    ) -> Result<String, ClientError> {
        validate_target(target)?;
        let url = self.reader_url(target);

        let response = self
            .executor
            .execute(ctx, &url, |http| {
                let builder = http
                    .get(url.as_str())
                    .header(reqwest::header::ACCEPT, "text/markdown");
                match &self.api_key {
                    Some(key) => builder.bearer_auth(key),
                    None => builder,
                }
            })
            .await?;

        let markdown = response.text();
        debug!(chars = markdown.len(), "markdown received");
        Ok(markdown)
    }
}

fn validate_target(target: &str) -> Result<(), ClientError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ClientError::invalid_request(PROVIDER, "target url is empty"));
    }
    let parsed = url::Url::parse(target).map_err(|e| {
        ClientError::invalid_request(PROVIDER, format!("invalid target url {target:?}: {e}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ClientError::invalid_request(
            PROVIDER,
            format!("unsupported target scheme {:?}", parsed.scheme()),
        ));
    }
    Ok(())
}

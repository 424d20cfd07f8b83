//! DataForSEO client construction and the strict/permissive request modes.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{ClientError, Provider};
use crate::http::{
    ClientOptions, DEFAULT_TIMEOUT, RequestExecutor, RetryPolicy, client_option_setters, join_url,
};

use super::envelope::{Envelope, decode_envelope, decode_envelope_strict};

/// Default DataForSEO API host.
pub const DEFAULT_BASE_URL: &str = "https://api.dataforseo.com";

/// Version prefix every endpoint path is placed under.
pub const API_VERSION: &str = "v3";

/// Default concurrency gate capacity.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

const PROVIDER: Provider = Provider::DataForSeo;

/// DataForSEO v3 client.
///
/// One instance per process is enough: the HTTP pool and the concurrency gate
/// are shared by every call, and cloning shares them too.
///
/// # Example
///
/// ```no_run
/// use tokio_util::sync::CancellationToken;
/// use upstream_core::dataforseo::{DataForSeoClient, KeywordRequest};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = DataForSeoClient::builder("login", "password")
///     .max_concurrency(3)
///     .build()?;
/// let ctx = CancellationToken::new();
/// let page = client
///     .keyword_suggestions(&ctx, &KeywordRequest::new("rust web framework"))
///     .await?;
/// println!("{} of {} suggestions", page.items.len(), page.total_count);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DataForSeoClient {
    executor: RequestExecutor,
    options: ClientOptions,
    login: String,
    password: String,
}

/// Builder for [`DataForSeoClient`].
///
/// Defaults: base URL [`DEFAULT_BASE_URL`], 30 s timeout, capacity 5,
/// exponential backoff with 3 attempts.
#[derive(Debug, Clone)]
pub struct DataForSeoClientBuilder {
    login: String,
    password: String,
    options: ClientOptions,
}

impl DataForSeoClientBuilder {
    client_option_setters!();

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidRequest`] for blank credentials or a base
    /// URL that is not absolute http(s), [`ClientError::ClientBuild`] if the
    /// HTTP client cannot be built.
    pub fn build(self) -> Result<DataForSeoClient, ClientError> {
        if self.login.trim().is_empty() || self.password.is_empty() {
            return Err(ClientError::invalid_request(
                PROVIDER,
                "login and password are required",
            ));
        }
        self.options.validate_base_url(PROVIDER)?;
        let executor = RequestExecutor::new(PROVIDER, &self.options)?;
        Ok(DataForSeoClient {
            executor,
            options: self.options,
            login: self.login,
            password: self.password,
        })
    }
}

impl DataForSeoClient {
    /// Starts a builder with the account's API login and password.
    #[must_use]
    pub fn builder(login: impl Into<String>, password: impl Into<String>) -> DataForSeoClientBuilder {
        DataForSeoClientBuilder {
            login: login.into(),
            password: password.into(),
            options: ClientOptions::new(
                DEFAULT_BASE_URL,
                DEFAULT_TIMEOUT,
                DEFAULT_MAX_CONCURRENCY,
                RetryPolicy::exponential(),
            ),
        }
    }

    /// Returns the options the client was built with.
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Returns the shared executor (gate and retry policy).
    #[must_use]
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// POSTs `item` wrapped in a one-element array and requires a `20000` envelope.
    ///
    /// # Errors
    ///
    /// Transport/retry errors from the executor, [`ClientError::Decode`], or
    /// [`ClientError::Api`] when the envelope status is not `20000`.
    #[instrument(skip(self, ctx, item), fields(path = %path))]
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        ctx: &CancellationToken,
        path: &str,
        item: &T,
    ) -> Result<Envelope, ClientError> {
        let body = self.send_post(ctx, path, item).await?;
        decode_envelope_strict(&body)
    }

    /// Like [`post`](Self::post) but leaves the envelope status to the caller.
    ///
    /// # Errors
    ///
    /// Transport/retry errors from the executor or [`ClientError::Decode`].
    #[instrument(skip(self, ctx, item), fields(path = %path))]
    pub async fn post_raw<T: Serialize + ?Sized>(
        &self,
        ctx: &CancellationToken,
        path: &str,
        item: &T,
    ) -> Result<Envelope, ClientError> {
        let body = self.send_post(ctx, path, item).await?;
        decode_envelope(&body)
    }

    /// GETs `path` and requires a `20000` envelope.
    ///
    /// # Errors
    ///
    /// Same as [`post`](Self::post).
    #[instrument(skip(self, ctx), fields(path = %path))]
    pub async fn get(&self, ctx: &CancellationToken, path: &str) -> Result<Envelope, ClientError> {
        let body = self.send_get(ctx, path).await?;
        decode_envelope_strict(&body)
    }

    /// GETs `path` and leaves the envelope status to the caller.
    ///
    /// # Errors
    ///
    /// Same as [`post_raw`](Self::post_raw).
    #[instrument(skip(self, ctx), fields(path = %path))]
    pub async fn get_raw(
        &self,
        ctx: &CancellationToken,
        path: &str,
    ) -> Result<Envelope, ClientError> {
        let body = self.send_get(ctx, path).await?;
        decode_envelope(&body)
    }

    /// Full URL for an endpoint path such as `serp/google/organic/live/advanced`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        self.options.endpoint(&join_url(API_VERSION, path))
    }

    async fn send_post<T: Serialize + ?Sized>(
        &self,
        ctx: &CancellationToken,
        path: &str,
        item: &T,
    ) -> Result<Vec<u8>, ClientError> {
        // The API rejects bare objects; always send a one-element array.
        let payload = serde_json::to_vec(&[item])
            .map_err(|source| ClientError::Encode { provider: PROVIDER, source })?;
        let url = self.endpoint(path);
        debug!(bytes = payload.len(), "posting task");

        let response = self
            .executor
            .execute(ctx, &url, |http| {
                http.post(url.as_str())
                    .basic_auth(&self.login, Some(&self.password))
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(payload.clone())
            })
            .await?;
        Ok(response.body)
    }

    async fn send_get(&self, ctx: &CancellationToken, path: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.endpoint(path);
        let response = self
            .executor
            .execute(ctx, &url, |http| {
                http.get(url.as_str())
                    .basic_auth(&self.login, Some(&self.password))
            })
            .await?;
        Ok(response.body)
    }
}

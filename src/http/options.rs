//! Shared construction policy for provider clients.
//!
//! Every provider builder wraps a [`ClientOptions`] seeded with that provider's
//! defaults. Setters apply in call order, so when two setters touch the same
//! field the later one wins.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::{ClientError, Provider};
use crate::user_agent;

use super::retry::RetryPolicy;

/// Default connect timeout for every provider (10 seconds).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Request timeout for slow providers such as rendering and audits (90 seconds).
pub const SLOW_PROVIDER_TIMEOUT: Duration = Duration::from_secs(90);

/// Request timeout for bulk package downloads (5 minutes).
pub const BULK_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Connection and retry settings for one client instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Root URL every endpoint path is joined onto.
    pub base_url: String,
    /// Whole-request timeout, per attempt.
    pub timeout: Duration,
    /// TCP/TLS connect timeout, per attempt.
    pub connect_timeout: Duration,
    /// Concurrency gate capacity.
    pub max_concurrency: usize,
    /// Attempt budget and backoff shape.
    pub retry: RetryPolicy,
    /// User-Agent header value.
    pub user_agent: String,
}

impl ClientOptions {
    /// Creates options with the given base URL, timeout, capacity and retry policy.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        max_concurrency: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
            connect_timeout: CONNECT_TIMEOUT,
            max_concurrency,
            retry,
            user_agent: user_agent::default_user_agent(),
        }
    }

    /// Builds the pooled HTTP client for these options.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ClientBuild`] when reqwest rejects the configuration.
    pub(crate) fn build_http_client(&self, provider: Provider) -> Result<Client, ClientError> {
        debug!(
            %provider,
            timeout_ms = self.timeout.as_millis(),
            max_concurrency = self.max_concurrency,
            "building HTTP client"
        );
        Client::builder()
            .connect_timeout(self.connect_timeout.min(self.timeout))
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .gzip(true)
            .build()
            .map_err(|source| ClientError::ClientBuild { provider, source })
    }

    /// Checks that the base URL is an absolute http(s) URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidRequest`] otherwise.
    pub(crate) fn validate_base_url(&self, provider: Provider) -> Result<(), ClientError> {
        let parsed = url::Url::parse(self.base_url.trim()).map_err(|e| {
            ClientError::invalid_request(
                provider,
                format!("invalid base url {:?}: {e}", self.base_url),
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::invalid_request(
                provider,
                format!("unsupported base url scheme {:?}", parsed.scheme()),
            ));
        }
        Ok(())
    }

    /// Joins an endpoint path onto the base URL with exactly one slash between them.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

/// Joins `base` and `path` with exactly one `/` between them.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{base}/{path}")
}

/// Generates the shared option setters on a provider builder that has an
/// `options: ClientOptions` field.
macro_rules! client_option_setters {
    () => {
        /// Overrides the base URL.
        #[must_use]
        pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
            self.options.base_url = base_url.into();
            self
        }

        /// Overrides the per-attempt request timeout.
        #[must_use]
        pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
            self.options.timeout = timeout;
            self
        }

        /// Overrides the concurrency gate capacity (minimum 1).
        #[must_use]
        pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
            self.options.max_concurrency = max_concurrency;
            self
        }

        /// Overrides the retry policy, including the backoff shape.
        #[must_use]
        pub fn retry_policy(mut self, retry: $crate::http::RetryPolicy) -> Self {
            self.options.retry = retry;
            self
        }

        /// Overrides the User-Agent header.
        #[must_use]
        pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
            self.options.user_agent = user_agent.into();
            self
        }

        /// Returns the options accumulated so far.
        #[must_use]
        pub fn options(&self) -> &$crate::http::ClientOptions {
            &self.options
        }
    };
}

pub(crate) use client_option_setters;

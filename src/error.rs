//! Error types shared by every provider client.
//!
//! Each variant carries the [`Provider`] that produced it, and the rendered
//! message always starts with the provider name so logs disambiguate which
//! remote dependency failed.

use std::fmt;

use thiserror::Error;

/// Remote dependency an error or a client belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// DataForSEO v3 API.
    DataForSeo,
    /// Google PageSpeed Insights v5.
    PageSpeed,
    /// Browser-rendering worker (Cloudflare Browser Rendering).
    BrowserRendering,
    /// Jina reader (URL to markdown).
    Jina,
    /// H5P package hub downloads.
    H5p,
}

impl Provider {
    /// Returns the short prefix used in error messages and log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DataForSeo => "dataforseo",
            Self::PageSpeed => "pagespeed",
            Self::BrowserRendering => "cfbrowser",
            Self::Jina => "jina",
            Self::H5p => "h5p",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum number of response body bytes kept in status errors.
pub(crate) const MAX_ERROR_BODY_CHARS: usize = 512;

/// Errors returned by provider clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The caller's cancellation token fired. Never retried.
    #[error("{provider}: request cancelled")]
    Cancelled {
        /// Client that observed the cancellation.
        provider: Provider,
    },

    /// The concurrency gate was closed underneath a waiting caller.
    #[error("{provider}: concurrency gate closed")]
    GateClosed {
        /// Client whose gate closed.
        provider: Provider,
    },

    /// Connection, DNS, TLS or timeout failure before a response arrived.
    #[error("{provider}: request to {url} failed: {source}")]
    Network {
        /// Provider being called.
        provider: Provider,
        /// Target URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Connected, but reading the response body failed.
    #[error("{provider}: reading response from {url} failed: {source}")]
    ReadBody {
        /// Provider being called.
        provider: Provider,
        /// Target URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status. The body is truncated for diagnostics.
    #[error("{provider}: HTTP {status} from {url}: {body}")]
    HttpStatus {
        /// Provider being called.
        provider: Provider,
        /// Target URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// Every attempt failed with a retryable error.
    #[error("{provider}: max retries exceeded after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Provider being called.
        provider: Provider,
        /// Attempts made, including the first.
        attempts: u32,
        /// Failure observed on the final attempt.
        #[source]
        last: Box<ClientError>,
    },

    /// Envelope-level business error (status code other than success).
    #[error("{provider}: API error {code}: {message}")]
    Api {
        /// Provider being called.
        provider: Provider,
        /// Provider status code.
        code: i64,
        /// Provider status message.
        message: String,
    },

    /// Task-level business error inside a successful envelope.
    #[error("{provider}: task error {code}: {message}")]
    Task {
        /// Provider being called.
        provider: Provider,
        /// Task status code.
        code: i64,
        /// Task status message.
        message: String,
    },

    /// Envelope carried no tasks.
    #[error("{provider}: no tasks in response")]
    NoTasks {
        /// Provider being called.
        provider: Provider,
    },

    /// Task or envelope carried no result payload.
    #[error("{provider}: empty result")]
    EmptyResult {
        /// Provider being called.
        provider: Provider,
    },

    /// The asynchronous task exists but has not finished processing.
    ///
    /// Not a failure: callers poll again later.
    #[error("{provider}: task not ready")]
    TaskNotReady {
        /// Provider being called.
        provider: Provider,
    },

    /// The provider processed the request and reported failure in its envelope.
    #[error("{provider}: request rejected: {message}")]
    Rejected {
        /// Provider being called.
        provider: Provider,
        /// Joined provider error messages.
        message: String,
    },

    /// Response body could not be decoded into the expected shape.
    #[error("{provider}: decoding {context}: {source}")]
    Decode {
        /// Provider being called.
        provider: Provider,
        /// What was being decoded.
        context: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Request payload could not be encoded.
    #[error("{provider}: encoding request: {source}")]
    Encode {
        /// Provider being called.
        provider: Provider,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Caller-supplied parameters were rejected before any request was sent.
    #[error("{provider}: invalid request: {reason}")]
    InvalidRequest {
        /// Provider being called.
        provider: Provider,
        /// Why the request was rejected.
        reason: String,
    },

    /// The underlying HTTP client could not be constructed.
    #[error("{provider}: building HTTP client: {source}")]
    ClientBuild {
        /// Provider being configured.
        provider: Provider,
        /// Underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl ClientError {
    /// Creates a cancellation error.
    pub fn cancelled(provider: Provider) -> Self {
        Self::Cancelled { provider }
    }

    /// Creates a network error.
    pub fn network(provider: Provider, url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            provider,
            url: url.into(),
            source,
        }
    }

    /// Creates a body read error.
    pub fn read_body(provider: Provider, url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::ReadBody {
            provider,
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error, truncating the body.
    pub fn http_status(provider: Provider, url: impl Into<String>, status: u16, body: &[u8]) -> Self {
        Self::HttpStatus {
            provider,
            url: url.into(),
            status,
            body: truncate_body(body),
        }
    }

    /// Creates an envelope-level API error.
    pub fn api(provider: Provider, code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            provider,
            code,
            message: message.into(),
        }
    }

    /// Creates a task-level error.
    pub fn task(provider: Provider, code: i64, message: impl Into<String>) -> Self {
        Self::Task {
            provider,
            code,
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(provider: Provider, context: &'static str, source: serde_json::Error) -> Self {
        Self::Decode {
            provider,
            context,
            source,
        }
    }

    /// Creates an invalid-request error.
    pub fn invalid_request(provider: Provider, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            provider,
            reason: reason.into(),
        }
    }

    /// Returns the provider that produced this error.
    #[must_use]
    pub fn provider(&self) -> Provider {
        match self {
            Self::Cancelled { provider }
            | Self::GateClosed { provider }
            | Self::Network { provider, .. }
            | Self::ReadBody { provider, .. }
            | Self::HttpStatus { provider, .. }
            | Self::RetriesExhausted { provider, .. }
            | Self::Api { provider, .. }
            | Self::Task { provider, .. }
            | Self::NoTasks { provider }
            | Self::EmptyResult { provider }
            | Self::TaskNotReady { provider }
            | Self::Rejected { provider, .. }
            | Self::Decode { provider, .. }
            | Self::Encode { provider, .. }
            | Self::InvalidRequest { provider, .. }
            | Self::ClientBuild { provider, .. } => *provider,
        }
    }

    /// Returns true when the caller's cancellation token ended the call.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns true for the "task exists but is not finished" sentinel.
    #[must_use]
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::TaskNotReady { .. })
    }

    /// Returns the HTTP status of this error or of the last attempt it wraps.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

/// Coarse classification of a [`ClientError`] for service-layer mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// The caller cancelled.
    Cancelled,
    /// Temporary failure; the retry budget was spent on it.
    Transient,
    /// The provider asked us to slow down (HTTP 429).
    RateLimited,
    /// Retrying would not change the outcome.
    Permanent,
    /// Asynchronous work is still running; poll again.
    NotReady,
}

/// Classifies an error into a [`FailureType`].
///
/// | Error | Type |
/// |-------|------|
/// | `Cancelled` | Cancelled |
/// | `TaskNotReady` | NotReady |
/// | `Network`, `ReadBody`, 5xx status | Transient |
/// | 429 status | RateLimited |
/// | `RetriesExhausted` | type of the last attempt |
/// | everything else | Permanent |
#[must_use]
pub fn classify_error(error: &ClientError) -> FailureType {
    match error {
        ClientError::Cancelled { .. } => FailureType::Cancelled,
        ClientError::TaskNotReady { .. } => FailureType::NotReady,
        ClientError::Network { .. } | ClientError::ReadBody { .. } => FailureType::Transient,
        ClientError::HttpStatus { status: 429, .. } => FailureType::RateLimited,
        ClientError::HttpStatus { status, .. } if *status >= 500 => FailureType::Transient,
        ClientError::RetriesExhausted { last, .. } => classify_error(last),
        _ => FailureType::Permanent,
    }
}

fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut truncated: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_starts_with_provider_prefix() {
        let error = ClientError::api(Provider::DataForSeo, 40501, "Invalid Field");
        assert_eq!(error.to_string(), "dataforseo: API error 40501: Invalid Field");

        let error = ClientError::cancelled(Provider::BrowserRendering);
        assert!(error.to_string().starts_with("cfbrowser:"));
    }

    #[test]
    fn test_task_error_message_format() {
        let error = ClientError::task(Provider::DataForSeo, 40602, "Task In Queue");
        assert!(error.to_string().contains("task error 40602: Task In Queue"));
    }

    #[test]
    fn test_http_status_body_is_truncated() {
        let body = vec![b'x'; 4096];
        let error = ClientError::http_status(Provider::Jina, "https://r.jina.ai/x", 400, &body);
        let ClientError::HttpStatus { body, .. } = &error else {
            panic!("expected HttpStatus");
        };
        assert_eq!(body.len(), MAX_ERROR_BODY_CHARS + 3);
        assert!(body.ends_with("..."));
    }

    #[test]
    fn test_retries_exhausted_mentions_last_status() {
        let last = ClientError::http_status(Provider::PageSpeed, "https://x", 503, b"busy");
        let error = ClientError::RetriesExhausted {
            provider: Provider::PageSpeed,
            attempts: 3,
            last: Box::new(last),
        };
        let msg = error.to_string();
        assert!(msg.contains("max retries exceeded"), "got: {msg}");
        assert!(msg.contains("503"), "got: {msg}");
        assert_eq!(error.status(), Some(503));
    }

    #[test]
    fn test_classify_error_table() {
        let p = Provider::DataForSeo;
        assert_eq!(
            classify_error(&ClientError::cancelled(p)),
            FailureType::Cancelled
        );
        assert_eq!(
            classify_error(&ClientError::TaskNotReady { provider: p }),
            FailureType::NotReady
        );
        assert_eq!(
            classify_error(&ClientError::http_status(p, "u", 429, b"")),
            FailureType::RateLimited
        );
        assert_eq!(
            classify_error(&ClientError::http_status(p, "u", 502, b"")),
            FailureType::Transient
        );
        assert_eq!(
            classify_error(&ClientError::http_status(p, "u", 404, b"")),
            FailureType::Permanent
        );
        assert_eq!(
            classify_error(&ClientError::api(p, 40100, "unauthorized")),
            FailureType::Permanent
        );
    }

    #[test]
    fn test_classify_exhausted_uses_last_attempt() {
        let error = ClientError::RetriesExhausted {
            provider: Provider::Jina,
            attempts: 3,
            last: Box::new(ClientError::http_status(Provider::Jina, "u", 429, b"")),
        };
        assert_eq!(classify_error(&error), FailureType::RateLimited);
    }

    #[test]
    fn test_provider_accessor() {
        let error = ClientError::invalid_request(Provider::H5p, "empty url");
        assert_eq!(error.provider(), Provider::H5p);
        assert!(!error.is_cancelled());
        assert!(!error.is_not_ready());
    }
}

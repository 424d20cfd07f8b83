//! Retrying request executor shared by every provider client.
//!
//! [`RequestExecutor::execute`] acquires a concurrency slot, then runs up to
//! `max_attempts` HTTP attempts. Attempt 0 fires immediately; every later
//! attempt first waits the delay chosen by the client's [`RetryPolicy`].
//!
//! # Retry Eligibility
//!
//! | Outcome | Action |
//! |---------|--------|
//! | 2xx | return body |
//! | transport or body read error | retry |
//! | 429 | retry (`Retry-After` honoured by server-guided policies) |
//! | 5xx | retry |
//! | any other status | fail immediately with the body attached |
//!
//! The cancellation token is raced against every suspension point: the gate,
//! the send, the body read and the backoff sleep. Cancellation unwinds the
//! whole call and the slot is released by the permit's `Drop`.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use crate::error::{ClientError, Provider};

use super::gate::{ConcurrencyGate, GateError};
use super::options::ClientOptions;
use super::retry::{
    RetryDecision, RetryPolicy, RetryReason, StatusClass, classify_status, parse_retry_after,
};
use super::sleep_or_cancel;

/// A successful (2xx) response, fully buffered.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Returns the body as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Gate + retry loop + pooled HTTP client for one provider.
///
/// Holds no per-call state: each call to [`execute`](Self::execute) owns its
/// own attempt counter and timers, so one executor serves any number of
/// concurrent callers.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    provider: Provider,
    http: Client,
    gate: ConcurrencyGate,
    retry: RetryPolicy,
}

impl RequestExecutor {
    /// Builds an executor from client options.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(provider: Provider, options: &ClientOptions) -> Result<Self, ClientError> {
        Ok(Self {
            provider,
            http: options.build_http_client(provider)?,
            gate: ConcurrencyGate::new(options.max_concurrency),
            retry: options.retry.clone(),
        })
    }

    /// Returns the provider this executor calls.
    #[must_use]
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Returns the concurrency gate.
    #[must_use]
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Runs one logical call.
    ///
    /// `build` is invoked once per attempt to produce a fresh request from the
    /// shared client; `url` is used for logging and error context only.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Cancelled`] if `ctx` fires at any point
    /// - [`ClientError::InvalidRequest`] if the request cannot be built,
    ///   for example a URL without a scheme
    /// - [`ClientError::HttpStatus`] for non-retryable statuses
    /// - [`ClientError::RetriesExhausted`] wrapping the last failure once the
    ///   attempt budget is spent
    pub async fn execute<F>(
        &self,
        ctx: &CancellationToken,
        url: &str,
        build: F,
    ) -> Result<RawResponse, ClientError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let span = info_span!("execute", provider = %self.provider, url = %url);
        self.execute_inner(ctx, url, build).instrument(span).await
    }

    async fn execute_inner<F>(
        &self,
        ctx: &CancellationToken,
        url: &str,
        build: F,
    ) -> Result<RawResponse, ClientError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let _permit = self.gate.acquire(ctx).await.map_err(|e| match e {
            GateError::Cancelled => ClientError::cancelled(self.provider),
            GateError::Closed => ClientError::GateClosed {
                provider: self.provider,
            },
        })?;

        let mut attempts_made = 0u32;
        loop {
            debug!(attempt = attempts_made, "sending request");
            let outcome = self.attempt(ctx, url, &build).await?;
            attempts_made += 1;

            let (error, reason) = match outcome {
                AttemptOutcome::Success(response) => return Ok(response),
                AttemptOutcome::Retryable { error, reason } => (error, reason),
            };

            match self.retry.decide(reason, attempts_made) {
                RetryDecision::Retry { delay, attempt } => {
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts(),
                        delay_ms = delay.as_millis(),
                        status = error.status(),
                        error = %error,
                        "retrying request"
                    );
                    if !sleep_or_cancel(ctx, delay).await {
                        return Err(ClientError::cancelled(self.provider));
                    }
                }
                RetryDecision::GiveUp { attempts } => {
                    warn!(attempts, error = %error, "retries exhausted");
                    return Err(ClientError::RetriesExhausted {
                        provider: self.provider,
                        attempts,
                        last: Box::new(error),
                    });
                }
            }
        }
    }

    /// Makes a single attempt.
    ///
    /// Returns `Err` only for outcomes that end the call immediately
    /// (cancellation, a request that cannot be built, non-retryable status).
    async fn attempt<F>(
        &self,
        ctx: &CancellationToken,
        url: &str,
        build: &F,
    ) -> Result<AttemptOutcome, ClientError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let sent = tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(ClientError::cancelled(self.provider)),
            sent = build(&self.http).send() => sent,
        };

        let response = match sent {
            Ok(response) => response,
            // A request that cannot be built fails the same way on every attempt.
            Err(source) if source.is_builder() => {
                return Err(ClientError::invalid_request(
                    self.provider,
                    format!("malformed request to {url}: {source}"),
                ));
            }
            Err(source) => {
                return Ok(AttemptOutcome::Retryable {
                    error: ClientError::network(self.provider, url, source),
                    reason: RetryReason::Transport,
                });
            }
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let body = tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(ClientError::cancelled(self.provider)),
            body = response.bytes() => body,
        };
        let body = match body {
            Ok(body) => body.to_vec(),
            Err(source) => {
                return Ok(AttemptOutcome::Retryable {
                    error: ClientError::read_body(self.provider, url, source),
                    reason: RetryReason::Transport,
                });
            }
        };

        debug!(status, bytes = body.len(), "response received");

        match classify_status(status) {
            StatusClass::Success => Ok(AttemptOutcome::Success(RawResponse {
                status,
                headers,
                body,
            })),
            StatusClass::RateLimited => {
                let retry_after = headers
                    .get(RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(parse_retry_after);
                Ok(AttemptOutcome::Retryable {
                    error: ClientError::http_status(self.provider, url, status, &body),
                    reason: RetryReason::RateLimited { retry_after },
                })
            }
            StatusClass::ServerError => Ok(AttemptOutcome::Retryable {
                error: ClientError::http_status(self.provider, url, status, &body),
                reason: RetryReason::ServerError,
            }),
            StatusClass::ClientError => {
                Err(ClientError::http_status(self.provider, url, status, &body))
            }
        }
    }
}

enum AttemptOutcome {
    Success(RawResponse),
    Retryable {
        error: ClientError,
        reason: RetryReason,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::http::{BackoffPolicy, ClientOptions};

    fn executor(max_attempts: u32) -> RequestExecutor {
        let options = ClientOptions::new(
            "http://127.0.0.1:9",
            Duration::from_secs(2),
            1,
            RetryPolicy::new(max_attempts, BackoffPolicy::Exponential, Duration::from_millis(1)),
        );
        RequestExecutor::new(Provider::Jina, &options).unwrap()
    }

    #[test]
    fn test_raw_response_text_is_lossy() {
        let response = RawResponse {
            status: 200,
            headers: HeaderMap::new(),
            body: vec![b'o', b'k', 0xff],
        };
        assert!(response.text().starts_with("ok"));
    }

    #[test]
    fn test_cancelled_before_start_sends_nothing() {
        let executor = executor(3);
        let ctx = CancellationToken::new();
        ctx.cancel();

        let result = tokio_test::block_on(executor.execute(&ctx, "http://127.0.0.1:9/x", |http| {
            http.get("http://127.0.0.1:9/x")
        }));
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(executor.gate().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_connection_refused_exhausts_retries() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/x", listener.local_addr().unwrap());
        drop(listener);

        let executor = executor(2);
        let ctx = CancellationToken::new();
        let error = executor
            .execute(&ctx, &url, |http| http.get(url.as_str()))
            .await
            .unwrap_err();

        match error {
            ClientError::RetriesExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, ClientError::Network { .. }));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(executor.gate().in_flight(), 0);
    }
}

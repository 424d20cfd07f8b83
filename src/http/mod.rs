//! Shared outbound HTTP infrastructure.
//!
//! Every provider client is built from the same three pieces:
//!
//! - [`ConcurrencyGate`] - fixed-capacity admission control per client
//! - [`RetryPolicy`] - attempt budget plus exponential or server-guided backoff
//! - [`RequestExecutor`] - the attempt loop tying the two to a pooled
//!   `reqwest::Client`, cancellable at every await point
//!
//! # Example
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use upstream_core::Provider;
//! use upstream_core::http::{ClientOptions, RequestExecutor, RetryPolicy, DEFAULT_TIMEOUT};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ClientOptions::new("https://r.jina.ai", DEFAULT_TIMEOUT, 5, RetryPolicy::default());
//! let executor = RequestExecutor::new(Provider::Jina, &options)?;
//! let ctx = CancellationToken::new();
//! let url = options.endpoint("https://example.com");
//! let response = executor.execute(&ctx, &url, |http| http.get(url.as_str())).await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

mod executor;
mod gate;
mod options;
mod retry;

pub use executor::{RawResponse, RequestExecutor};
pub use gate::{ConcurrencyGate, GateError, GatePermit};
pub use options::{
    BULK_DOWNLOAD_TIMEOUT, CONNECT_TIMEOUT, ClientOptions, DEFAULT_TIMEOUT, SLOW_PROVIDER_TIMEOUT,
    join_url,
};
pub(crate) use options::client_option_setters;
pub use retry::{
    BackoffPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, RetryDecision, RetryPolicy,
    RetryReason, StatusClass, classify_status, parse_retry_after,
};

use tokio_util::sync::CancellationToken;

/// Sleeps for `delay` unless `ctx` fires first.
///
/// Returns `false` when cancelled.
pub async fn sleep_or_cancel(ctx: &CancellationToken, delay: std::time::Duration) -> bool {
    tokio::select! {
        biased;
        () = ctx.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

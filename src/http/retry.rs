//! Retry policy with exponential or server-guided backoff.
//!
//! This module provides the [`RetryPolicy`] and [`BackoffPolicy`] types that the
//! request executor consults between attempts.
//!
//! # Overview
//!
//! Every HTTP status is first classified into a [`StatusClass`]:
//! - [`StatusClass::Success`] - 2xx, decode and return
//! - [`StatusClass::RateLimited`] - 429, retry with backoff (optionally server-guided)
//! - [`StatusClass::ServerError`] - 5xx, retry with backoff
//! - [`StatusClass::ClientError`] - everything else, return immediately
//!
//! The [`RetryPolicy`] then decides how long to wait before the next attempt.
//! Two backoff shapes are supported and selected per client:
//!
//! | Policy | Attempt 1 | Attempt 2 | 429 with `Retry-After: N` |
//! |--------|-----------|-----------|---------------------------|
//! | `Exponential` | 2 × base | 4 × base | 2 × base / 4 × base |
//! | `ServerGuided` | 1 × base | 2 × base | N seconds |
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use upstream_core::http::{BackoffPolicy, RetryDecision, RetryPolicy, RetryReason};
//!
//! let policy = RetryPolicy::new(3, BackoffPolicy::ServerGuided, Duration::from_secs(1));
//! let reason = RetryReason::RateLimited { retry_after: Some(Duration::from_secs(7)) };
//!
//! match policy.decide(reason, 1) {
//!     RetryDecision::Retry { delay, .. } => assert_eq!(delay, Duration::from_secs(7)),
//!     RetryDecision::GiveUp { .. } => unreachable!(),
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument, warn};

/// Default maximum attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff base delay (1 second).
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Maximum Retry-After value (1 hour) to prevent excessive delays.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Classification of an HTTP status for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx - the attempt succeeded.
    Success,
    /// 429 Too Many Requests.
    RateLimited,
    /// 5xx - the server may recover.
    ServerError,
    /// Any other status. Retrying will not help.
    ClientError,
}

/// Classifies an HTTP status code.
#[must_use]
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        429 => StatusClass::RateLimited,
        500..=599 => StatusClass::ServerError,
        _ => StatusClass::ClientError,
    }
}

/// How delays between attempts are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// `base * 2^attempt`: attempt 1 waits 2 × base, attempt 2 waits 4 × base.
    ///
    /// `Retry-After` is ignored.
    Exponential,

    /// On 429 the server's `Retry-After` wins when present and parseable.
    ///
    /// Otherwise, and always on 5xx or transport errors, a doubling backoff
    /// starting at `base` is used: attempt 1 waits base, attempt 2 waits 2 × base.
    ServerGuided,
}

/// Why the previous attempt failed, as far as backoff is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// Connection, DNS or body read failure.
    Transport,
    /// HTTP 5xx.
    ServerError,
    /// HTTP 429, with the parsed `Retry-After` header if any.
    RateLimited {
        /// Server-requested delay.
        retry_after: Option<Duration>,
    },
}

/// Decision on whether to make another attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then make attempt number `attempt` (0-indexed).
    Retry {
        /// How long to wait before the next attempt.
        delay: Duration,
        /// Index of the upcoming attempt.
        attempt: u32,
    },

    /// Stop; the retry budget is spent.
    GiveUp {
        /// Attempts made so far.
        attempts: u32,
    },
}

/// Retry configuration for one client.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `backoff`: [`BackoffPolicy::Exponential`]
/// - `base_delay`: 1 second
/// - `max_delay`: 32 seconds
/// - `max_jitter`: zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Backoff shape.
    backoff: BackoffPolicy,

    /// Unit delay the backoff shape multiplies.
    base_delay: Duration,

    /// Cap on computed (not server-requested) delays.
    max_delay: Duration,

    /// Upper bound of random jitter added to computed delays.
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffPolicy::Exponential,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget, shape and base delay.
    ///
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: BackoffPolicy, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            base_delay,
            ..Self::default()
        }
    }

    /// Exponential policy with default timings.
    #[must_use]
    pub fn exponential() -> Self {
        Self::default()
    }

    /// Server-guided policy with default timings.
    #[must_use]
    pub fn server_guided() -> Self {
        Self {
            backoff: BackoffPolicy::ServerGuided,
            ..Self::default()
        }
    }

    /// Replaces the attempt budget (minimum 1).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Replaces the base delay.
    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Replaces the cap on computed delays.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Adds up to `max_jitter` of random delay to computed backoffs.
    #[must_use]
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Returns the maximum number of attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the backoff shape.
    #[must_use]
    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    /// Returns the base delay.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Decides whether attempt `attempts_made` (count so far) should be followed
    /// by another one, and after what delay.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn decide(&self, reason: RetryReason, attempts_made: u32) -> RetryDecision {
        if attempts_made >= self.max_attempts {
            debug!(attempts_made, "max attempts reached");
            return RetryDecision::GiveUp {
                attempts: attempts_made,
            };
        }

        let delay = self.delay_for(reason, attempts_made);
        debug!(
            next_attempt = attempts_made,
            delay_ms = delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay,
            attempt: attempts_made,
        }
    }

    /// Computes the wait before 0-indexed attempt `attempt` (always >= 1).
    fn delay_for(&self, reason: RetryReason, attempt: u32) -> Duration {
        if self.backoff == BackoffPolicy::ServerGuided
            && let RetryReason::RateLimited {
                retry_after: Some(server_delay),
            } = reason
        {
            return server_delay;
        }

        let exponent = match self.backoff {
            BackoffPolicy::Exponential => attempt,
            BackoffPolicy::ServerGuided => attempt.saturating_sub(1),
        };
        self.scaled(exponent) + self.jitter()
    }

    /// `min(base * 2^exponent, max_delay)`.
    fn scaled(&self, exponent: u32) -> Duration {
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn jitter(&self) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = self.max_jitter.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

/// Parses a Retry-After header value into a Duration.
///
/// Supports two formats as per RFC 7231:
/// - Integer seconds: `Retry-After: 120`
/// - HTTP-date: `Retry-After: Wed, 21 Oct 2025 07:28:00 GMT`
///
/// Returns `None` if the value cannot be parsed. Caps excessive values at 1 hour.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use upstream_core::http::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
/// assert_eq!(parse_retry_after("soon"), None);
/// ```
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }
        return Some(duration);
    }

    let Ok(datetime) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After value");
        return None;
    };

    match datetime.duration_since(std::time::SystemTime::now()) {
        Ok(duration) => Some(duration.min(MAX_RETRY_AFTER)),
        Err(_) => {
            debug!(header_value, "Retry-After date is in the past, returning zero");
            Some(Duration::ZERO)
        }
    }
}

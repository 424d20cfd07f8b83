//! Bounded concurrency gate for outbound requests.
//!
//! A [`ConcurrencyGate`] is a fixed-capacity counting semaphore. Callers
//! acquire a [`GatePermit`] before sending a request; the permit returns its
//! slot when dropped, so early returns, `?` propagation and panics all release
//! it.
//!
//! # Example
//!
//! ```
//! use tokio_util::sync::CancellationToken;
//! use upstream_core::http::ConcurrencyGate;
//!
//! # async fn example() {
//! let gate = ConcurrencyGate::new(2);
//! let ctx = CancellationToken::new();
//!
//! let permit = gate.acquire(&ctx).await.expect("slot available");
//! assert_eq!(gate.in_flight(), 1);
//! drop(permit);
//! assert_eq!(gate.in_flight(), 0);
//! # }
//! ```

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Why a gate acquisition did not produce a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    /// The caller's token fired while waiting.
    #[error("cancelled while waiting for a concurrency slot")]
    Cancelled,

    /// The underlying semaphore was closed.
    #[error("concurrency gate closed")]
    Closed,
}

/// Fixed-capacity admission control shared by every call on one client.
///
/// Cloning is cheap and clones share the same slots.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// A held slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// Creates a gate with `capacity` slots (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Returns the configured number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns how many slots are currently held.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.semaphore.available_permits())
    }

    /// Waits for a free slot or for `ctx` to be cancelled, whichever comes first.
    ///
    /// An already-cancelled token never acquires, even if a slot is free.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Cancelled`] if `ctx` fires first, or
    /// [`GateError::Closed`] if the semaphore was closed.
    pub async fn acquire(&self, ctx: &CancellationToken) -> Result<GatePermit, GateError> {
        tokio::select! {
            biased;
            () = ctx.cancelled() => {
                trace!("gate acquisition cancelled");
                Err(GateError::Cancelled)
            }
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                let permit = permit.map_err(|_| GateError::Closed)?;
                trace!(in_flight = self.in_flight(), capacity = self.capacity, "gate acquired");
                Ok(GatePermit { _permit: permit })
            }
        }
    }
}

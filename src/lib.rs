//! Upstream Core Library
//!
//! Resilient clients for the third-party APIs a content platform leans on:
//! DataForSEO, PageSpeed Insights, a headless-browser rendering worker and the
//! Jina reader, plus extraction of H5P content packages.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`http`] - Concurrency gate, retry policy and the shared request executor
//! - [`error`] - Provider-prefixed error taxonomy
//! - [`json`] - Decoding helpers for fields with inconsistent JSON shapes
//! - [`dataforseo`] - DataForSEO v3 envelope decoding and typed endpoints
//! - [`cfbrowser`] - Browser-rendering worker client
//! - [`jina`] - Markdown reader client
//! - [`pagespeed`] - PageSpeed Insights client
//! - [`h5p`] - H5P package extraction and library storage
//!
//! Every network call takes a [`CancellationToken`](tokio_util::sync::CancellationToken);
//! cancelling it unwinds the call at whichever await point it is parked on.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cfbrowser;
pub mod dataforseo;
pub mod error;
pub mod h5p;
pub mod http;
pub mod jina;
pub mod json;
pub mod pagespeed;
mod user_agent;

// Re-export commonly used types
pub use cfbrowser::BrowserRenderingClient;
pub use dataforseo::DataForSeoClient;
pub use error::{ClientError, FailureType, Provider, classify_error};
pub use h5p::{ExtractedPackage, H5pError, extract_package};
pub use http::{BackoffPolicy, ClientOptions, ConcurrencyGate, RequestExecutor, RetryPolicy};
pub use jina::JinaClient;
pub use pagespeed::{PageSpeedClient, Strategy};

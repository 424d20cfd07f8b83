//! Headless-browser rendering worker client.
//!
//! Every endpoint takes one JSON object (not array-wrapped) naming either a
//! `url` or literal `html`. JSON endpoints answer with
//! `{ "success": bool, "result": ..., "errors": [...] }`; `/screenshot`
//! answers with image bytes.
//!
//! The worker rate-limits with 429 + `Retry-After`, so the default retry
//! policy is [`BackoffPolicy::ServerGuided`](crate::http::BackoffPolicy::ServerGuided).

mod client;
mod types;

pub use client::{BrowserRenderingClient, BrowserRenderingClientBuilder, DEFAULT_MAX_CONCURRENCY};
pub use types::{
    ApiEnvelope, ApiMessage, GotoOptions, RenderRequest, Screenshot, ScreenshotOptions, Viewport,
    WaitUntil,
};

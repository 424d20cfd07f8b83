//! DataForSEO v3 client.
//!
//! Requests go out as `POST <base>/v3/<path>` with HTTP Basic auth and a JSON
//! array holding exactly one task. Responses are decoded in one of two modes:
//!
//! - strict ([`DataForSeoClient::post`], [`DataForSeoClient::get`]): any
//!   envelope status other than `20000` is an error
//! - permissive ([`DataForSeoClient::post_raw`], [`DataForSeoClient::get_raw`]):
//!   the caller inspects the status, used where `40400` means "not ready"
//!
//! Typed endpoints read their payload through [`first_task_result`] only.

mod client;
mod envelope;
mod keywords;
mod on_page;
mod serp;

pub use client::{
    API_VERSION, DEFAULT_BASE_URL, DEFAULT_MAX_CONCURRENCY, DataForSeoClient,
    DataForSeoClientBuilder,
};
pub use envelope::{
    Envelope, STATUS_NOT_FOUND, STATUS_OK, STATUS_TASK_CREATED, Task, created_task_id,
    decode_envelope, decode_envelope_strict, first_task_result,
};
pub use keywords::{
    DEFAULT_LANGUAGE_CODE, DEFAULT_LOCATION_CODE, KeywordMetrics, KeywordPage, KeywordRequest,
    MAX_SEARCH_VOLUME_KEYWORDS, MonthlySearch, SearchVolume, SearchVolumeRequest,
};
pub use on_page::{
    CrawlStatus, DomainInfo, OnPageSummary, OnPageTaskRequest, PageMetrics,
};
pub use serp::{MAX_SERP_DEPTH, SerpItem, SerpPage, SerpRequest};

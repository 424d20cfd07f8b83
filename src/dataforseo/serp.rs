//! Google organic SERP (live, advanced).

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{ClientError, Provider};
use crate::json::null_as_default;

use super::client::DataForSeoClient;
use super::envelope::first_task_result;
use super::keywords::{DEFAULT_LANGUAGE_CODE, DEFAULT_LOCATION_CODE};

pub(crate) const SERP_ORGANIC_PATH: &str = "serp/google/organic/live/advanced";

/// Deepest SERP the live endpoint serves.
pub const MAX_SERP_DEPTH: u32 = 700;

/// Parameters for [`DataForSeoClient::serp_organic`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerpRequest {
    pub keyword: String,
    pub location_code: i64,
    pub language_code: String,
    /// Number of results to crawl; the provider bills per 100.
    pub depth: u32,
    /// `desktop` or `mobile`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl SerpRequest {
    #[must_use]
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            location_code: DEFAULT_LOCATION_CODE,
            language_code: DEFAULT_LANGUAGE_CODE.to_string(),
            depth: 100,
            device: None,
        }
    }

    #[must_use]
    pub fn location(mut self, location_code: i64, language_code: impl Into<String>) -> Self {
        self.location_code = location_code;
        self.language_code = language_code.into();
        self
    }

    #[must_use]
    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    #[must_use]
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    fn validate(&self) -> Result<(), ClientError> {
        if self.keyword.trim().is_empty() {
            return Err(ClientError::invalid_request(
                Provider::DataForSeo,
                "keyword must not be empty",
            ));
        }
        if self.depth == 0 || self.depth > MAX_SERP_DEPTH {
            return Err(ClientError::invalid_request(
                Provider::DataForSeo,
                format!("depth must be between 1 and {MAX_SERP_DEPTH}"),
            ));
        }
        Ok(())
    }
}

/// One element of a results page. Only `organic` items carry every field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerpItem {
    /// `organic`, `paid`, `featured_snippet`, `people_also_ask`, ...
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub rank_group: Option<i64>,
    #[serde(default)]
    pub rank_absolute: Option<i64>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub breadcrumb: Option<String>,
}

impl SerpItem {
    #[must_use]
    pub fn is_organic(&self) -> bool {
        self.item_type == "organic"
    }
}

/// A crawled results page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerpPage {
    pub keyword: String,
    #[serde(default)]
    pub check_url: Option<String>,
    /// Google's own "About N results" estimate.
    #[serde(rename = "se_results_count", default)]
    pub total_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<SerpItem>,
}

impl SerpPage {
    /// Organic results in rank order.
    pub fn organic(&self) -> impl Iterator<Item = &SerpItem> {
        self.items.iter().filter(|item| item.is_organic())
    }
}

impl DataForSeoClient {
    /// Live Google organic results for a keyword.
    ///
    /// A keyword with no results yields an empty page.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidRequest`] for a blank keyword or out-of-range
    /// depth, otherwise any error from [`post`](Self::post) or
    /// [`first_task_result`](super::first_task_result).
    #[instrument(skip(self, ctx, request), fields(keyword = %request.keyword, depth = request.depth))]
    pub async fn serp_organic(
        &self,
        ctx: &CancellationToken,
        request: &SerpRequest,
    ) -> Result<SerpPage, ClientError> {
        request.validate()?;
        let envelope = self.post(ctx, SERP_ORGANIC_PATH, request).await?;
        let pages: Vec<SerpPage> = first_task_result(&envelope)?;
        let page = pages.into_iter().next().unwrap_or_else(|| SerpPage {
            keyword: request.keyword.clone(),
            ..SerpPage::default()
        });
        debug!(items = page.items.len(), total = page.total_count, "serp page");
        Ok(page)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dataforseo::envelope::{decode_envelope_strict, ok_envelope_bytes};

    #[test]
    fn test_serp_page_decodes_mixed_items() {
        let page: SerpPage = serde_json::from_value(json!({
            "keyword": "rust",
            "type": "organic",
            "se_domain": "google.com",
            "check_url": "https://www.google.com/search?q=rust",
            "se_results_count": 1_250_000,
            "items_count": 2,
            "items": [
                {"type": "featured_snippet", "rank_group": 1, "rank_absolute": 1, "title": "Rust"},
                {"type": "organic", "rank_group": 1, "rank_absolute": 2, "domain": "www.rust-lang.org",
                 "title": "Rust Programming Language", "url": "https://www.rust-lang.org/", "description": "A language..."}
            ]
        }))
        .unwrap();

        assert_eq!(page.total_count, 1_250_000);
        assert_eq!(page.items.len(), 2);
        let organic: Vec<_> = page.organic().collect();
        assert_eq!(organic.len(), 1);
        assert_eq!(organic[0].domain.as_deref(), Some("www.rust-lang.org"));
    }

    #[test]
    fn test_null_items_decode_empty() {
        let page: SerpPage =
            serde_json::from_value(json!({"keyword": "zzqx", "se_results_count": 0, "items": null})).unwrap();
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_request_validation() {
        assert!(SerpRequest::new("rust").validate().is_ok());
        assert!(SerpRequest::new("").validate().is_err());
        assert!(SerpRequest::new("rust").depth(0).validate().is_err());
        assert!(SerpRequest::new("rust").depth(701).validate().is_err());
    }

    #[test]
    fn test_serp_result_survives_envelope() {
        let pages = vec![SerpPage {
            keyword: "rust web framework".into(),
            check_url: Some("https://www.google.com/search?q=rust+web+framework".into()),
            total_count: 48_200_000,
            items: vec![
                SerpItem {
                    item_type: "organic".into(),
                    rank_group: Some(1),
                    rank_absolute: Some(1),
                    domain: Some("www.arewewebyet.org".into()),
                    title: Some("Are we web yet?".into()),
                    url: Some("https://www.arewewebyet.org/".into()),
                    description: Some("Rust web frameworks".into()),
                    breadcrumb: Some("https://www.arewewebyet.org".into()),
                },
                SerpItem {
                    item_type: "people_also_ask".into(),
                    rank_absolute: Some(2),
                    ..SerpItem::default()
                },
            ],
        }];
        let envelope = decode_envelope_strict(&ok_envelope_bytes(&pages)).unwrap();
        let decoded: Vec<SerpPage> = first_task_result(&envelope).unwrap();
        assert_eq!(decoded, pages);
    }
}

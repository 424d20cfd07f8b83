//! Keyword research endpoints: Labs suggestions, Labs related keywords and
//! Google Ads search volume.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{ClientError, Provider};
use crate::json::{NumberOrText, null_as_default};

use super::client::DataForSeoClient;
use super::envelope::first_task_result;

pub(crate) const KEYWORD_SUGGESTIONS_PATH: &str = "dataforseo_labs/google/keyword_suggestions/live";
pub(crate) const RELATED_KEYWORDS_PATH: &str = "dataforseo_labs/google/related_keywords/live";
pub(crate) const SEARCH_VOLUME_PATH: &str = "keywords_data/google_ads/search_volume/live";

/// Location used when the caller does not pick one (United States).
pub const DEFAULT_LOCATION_CODE: i64 = 2840;

/// Language used when the caller does not pick one.
pub const DEFAULT_LANGUAGE_CODE: &str = "en";

/// Google Ads accepts at most this many keywords per search volume task.
pub const MAX_SEARCH_VOLUME_KEYWORDS: usize = 1000;

/// Parameters for the Labs keyword endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordRequest {
    /// Seed keyword.
    pub keyword: String,
    /// DataForSEO location code.
    pub location_code: i64,
    /// ISO language code.
    pub language_code: String,
    /// Maximum number of items to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Offset into the full result list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    /// Related keywords only: how many hops away from the seed to search (0-4).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u8>,
}

impl KeywordRequest {
    /// Request for `keyword` with the default location and language.
    #[must_use]
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            location_code: DEFAULT_LOCATION_CODE,
            language_code: DEFAULT_LANGUAGE_CODE.to_string(),
            limit: None,
            offset: None,
            depth: None,
        }
    }

    #[must_use]
    pub fn location(mut self, location_code: i64, language_code: impl Into<String>) -> Self {
        self.location_code = location_code;
        self.language_code = language_code.into();
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn depth(mut self, depth: u8) -> Self {
        self.depth = Some(depth);
        self
    }

    fn validate(&self) -> Result<(), ClientError> {
        if self.keyword.trim().is_empty() {
            return Err(ClientError::invalid_request(
                Provider::DataForSeo,
                "keyword must not be empty",
            ));
        }
        if self.depth.is_some_and(|depth| depth > 4) {
            return Err(ClientError::invalid_request(
                Provider::DataForSeo,
                "depth must be between 0 and 4",
            ));
        }
        Ok(())
    }
}

/// Parameters for the Google Ads search volume endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchVolumeRequest {
    pub keywords: Vec<String>,
    pub location_code: i64,
    pub language_code: String,
}

impl SearchVolumeRequest {
    #[must_use]
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            location_code: DEFAULT_LOCATION_CODE,
            language_code: DEFAULT_LANGUAGE_CODE.to_string(),
        }
    }

    #[must_use]
    pub fn location(mut self, location_code: i64, language_code: impl Into<String>) -> Self {
        self.location_code = location_code;
        self.language_code = language_code.into();
        self
    }

    fn validate(&self) -> Result<(), ClientError> {
        if self.keywords.is_empty() || self.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ClientError::invalid_request(
                Provider::DataForSeo,
                "at least one keyword is required",
            ));
        }
        if self.keywords.len() > MAX_SEARCH_VOLUME_KEYWORDS {
            return Err(ClientError::invalid_request(
                Provider::DataForSeo,
                format!(
                    "{} keywords given, at most {MAX_SEARCH_VOLUME_KEYWORDS} allowed",
                    self.keywords.len()
                ),
            ));
        }
        Ok(())
    }
}

/// One month of search volume history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySearch {
    /// Calendar year.
    pub year: i32,
    /// Month of the year, 1 to 12.
    pub month: u32,
    /// Searches that month, when reported.
    #[serde(default)]
    pub search_volume: Option<i64>,
}

/// A keyword with its metrics, flattened from the provider's nested layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordMetrics {
    /// The keyword text as returned.
    pub keyword: String,
    /// Average monthly searches.
    pub search_volume: Option<i64>,
    /// Average cost per click in USD.
    pub cpc: Option<f64>,
    /// Paid competition, 0.0 to 1.0.
    pub competition: Option<f64>,
    /// `LOW`, `MEDIUM` or `HIGH`.
    pub competition_level: Option<String>,
    /// Organic difficulty, 0 to 100.
    pub keyword_difficulty: Option<i64>,
    /// Dominant search intent, e.g. `informational`.
    pub main_intent: Option<String>,
    /// Hops from the seed keyword; set by `related_keywords` only.
    pub depth: Option<u32>,
    /// Per-month volume, newest first.
    pub monthly_searches: Vec<MonthlySearch>,
}

/// A page of keyword results plus the total available server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordPage {
    /// Matches available server-side, beyond this page.
    pub total_count: i64,
    /// Items on this page.
    pub items: Vec<KeywordMetrics>,
}

/// Search volume for one keyword from Google Ads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchVolume {
    /// The keyword text as returned.
    pub keyword: String,
    /// Location the volume applies to.
    #[serde(default)]
    pub location_code: Option<i64>,
    /// Language the volume applies to.
    #[serde(default)]
    pub language_code: Option<String>,
    /// Average monthly searches.
    #[serde(default)]
    pub search_volume: Option<i64>,
    /// Google Ads reports `"HIGH"`-style labels here, other sources a number.
    #[serde(default)]
    pub competition: Option<NumberOrText>,
    /// Paid competition, 0 to 100.
    #[serde(default)]
    pub competition_index: Option<i64>,
    /// Average cost per click in USD.
    #[serde(default)]
    pub cpc: Option<f64>,
    /// Low range of the top-of-page bid.
    #[serde(default)]
    pub low_top_of_page_bid: Option<f64>,
    /// High range of the top-of-page bid.
    #[serde(default)]
    pub high_top_of_page_bid: Option<f64>,
    /// Per-month volume, newest first.
    #[serde(default, deserialize_with = "null_as_default")]
    pub monthly_searches: Vec<MonthlySearch>,
}

// Wire shapes of the Labs endpoints.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "I: Deserialize<'de>"))]
pub(crate) struct LabsResult<I> {
    #[serde(default)]
    pub total_count: Option<i64>,
    #[serde(default)]
    pub items_count: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<I>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct KeywordInfo {
    #[serde(default)]
    pub search_volume: Option<i64>,
    #[serde(default)]
    pub cpc: Option<f64>,
    #[serde(default)]
    pub competition: Option<f64>,
    #[serde(default)]
    pub competition_level: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub monthly_searches: Vec<MonthlySearch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct KeywordProperties {
    #[serde(default)]
    pub keyword_difficulty: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct SearchIntentInfo {
    #[serde(default)]
    pub main_intent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct KeywordItem {
    pub keyword: String,
    #[serde(default)]
    pub keyword_info: Option<KeywordInfo>,
    #[serde(default)]
    pub keyword_properties: Option<KeywordProperties>,
    #[serde(default)]
    pub search_intent_info: Option<SearchIntentInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct RelatedItem {
    pub keyword_data: KeywordItem,
    #[serde(default)]
    pub depth: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub related_keywords: Vec<String>,
}

impl From<KeywordItem> for KeywordMetrics {
    fn from(item: KeywordItem) -> Self {
        let info = item.keyword_info.unwrap_or_default();
        Self {
            keyword: item.keyword,
            search_volume: info.search_volume,
            cpc: info.cpc,
            competition: info.competition,
            competition_level: info.competition_level,
            keyword_difficulty: item.keyword_properties.and_then(|p| p.keyword_difficulty),
            main_intent: item.search_intent_info.and_then(|i| i.main_intent),
            depth: None,
            monthly_searches: info.monthly_searches,
        }
    }
}

impl From<RelatedItem> for KeywordMetrics {
    fn from(item: RelatedItem) -> Self {
        Self {
            depth: item.depth,
            ..Self::from(item.keyword_data)
        }
    }
}

/// Collapses the one-element Labs result array into a page.
fn into_page<I>(results: Vec<LabsResult<I>>) -> KeywordPage
where
    KeywordMetrics: From<I>,
{
    let Some(result) = results.into_iter().next() else {
        return KeywordPage::default();
    };
    let items: Vec<KeywordMetrics> = result.items.into_iter().map(KeywordMetrics::from).collect();
    let total_count = result
        .total_count
        .unwrap_or_else(|| i64::try_from(items.len()).unwrap_or(i64::MAX));
    KeywordPage { total_count, items }
}

impl DataForSeoClient {
    /// Keyword ideas containing the seed keyword (DataForSEO Labs).
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidRequest`] for a blank keyword, otherwise any
    /// error from [`post`](Self::post) or
    /// [`first_task_result`](super::first_task_result).
    #[instrument(skip(self, ctx, request), fields(keyword = %request.keyword))]
    pub async fn keyword_suggestions(
        &self,
        ctx: &CancellationToken,
        request: &KeywordRequest,
    ) -> Result<KeywordPage, ClientError> {
        request.validate()?;
        let envelope = self.post(ctx, KEYWORD_SUGGESTIONS_PATH, request).await?;
        let results: Vec<LabsResult<KeywordItem>> = first_task_result(&envelope)?;
        let page = into_page(results);
        debug!(items = page.items.len(), total = page.total_count, "keyword suggestions");
        Ok(page)
    }

    /// Keywords appearing in Google's "searches related to" block for the seed.
    ///
    /// Each item's nested `keyword_data` is hoisted into a flat
    /// [`KeywordMetrics`].
    ///
    /// # Errors
    ///
    /// Same as [`keyword_suggestions`](Self::keyword_suggestions), plus
    /// [`ClientError::InvalidRequest`] for a depth above 4.
    #[instrument(skip(self, ctx, request), fields(keyword = %request.keyword))]
    pub async fn related_keywords(
        &self,
        ctx: &CancellationToken,
        request: &KeywordRequest,
    ) -> Result<KeywordPage, ClientError> {
        request.validate()?;
        let envelope = self.post(ctx, RELATED_KEYWORDS_PATH, request).await?;
        let results: Vec<LabsResult<RelatedItem>> = first_task_result(&envelope)?;
        let page = into_page(results);
        debug!(items = page.items.len(), total = page.total_count, "related keywords");
        Ok(page)
    }

    /// Google Ads search volume for up to 1000 keywords.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidRequest`] for an empty or oversized keyword list,
    /// otherwise any error from [`post`](Self::post) or
    /// [`first_task_result`](super::first_task_result).
    #[instrument(skip(self, ctx, request), fields(keywords = request.keywords.len()))]
    pub async fn search_volume(
        &self,
        ctx: &CancellationToken,
        request: &SearchVolumeRequest,
    ) -> Result<Vec<SearchVolume>, ClientError> {
        request.validate()?;
        let envelope = self.post(ctx, SEARCH_VOLUME_PATH, request).await?;
        let volumes: Vec<SearchVolume> = first_task_result(&envelope)?;
        debug!(volumes = volumes.len(), "search volume");
        Ok(volumes)
    }
}

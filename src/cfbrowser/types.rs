//! Request and response shapes for the browser-rendering worker.

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Provider};
use crate::json::null_as_default;

/// When navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitUntil {
    #[serde(rename = "load")]
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[serde(rename = "networkidle0")]
    NetworkIdle0,
    #[serde(rename = "networkidle2")]
    NetworkIdle2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GotoOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_until: Option<WaitUntil>,
    /// Navigation timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotOptions {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub full_page: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub omit_background: bool,
}

/// Body for every worker endpoint. Exactly one of `url` or `html` must be set.
///
/// Sent as a single JSON object, not array-wrapped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goto_options: Option<GotoOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reject_resource_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    /// `/links` only.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub visible_links_only: bool,
    /// `/screenshot` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_options: Option<ScreenshotOptions>,
}

impl RenderRequest {
    /// Render a live page.
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Render a literal HTML document.
    #[must_use]
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn wait_until(mut self, wait_until: WaitUntil) -> Self {
        let goto = self.goto_options.get_or_insert_with(GotoOptions::default);
        goto.wait_until = Some(wait_until);
        self
    }

    #[must_use]
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Some(Viewport { width, height });
        self
    }

    #[must_use]
    pub fn full_page(mut self) -> Self {
        self.screenshot_options.get_or_insert_with(ScreenshotOptions::default).full_page = true;
        self
    }

    #[must_use]
    pub fn visible_links_only(mut self) -> Self {
        self.visible_links_only = true;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        let has_url = self.url.as_deref().is_some_and(|u| !u.trim().is_empty());
        let has_html = self.html.as_deref().is_some_and(|h| !h.trim().is_empty());
        match (has_url, has_html) {
            (true, false) | (false, true) => {}
            (false, false) => {
                return Err(ClientError::invalid_request(
                    Provider::BrowserRendering,
                    "either url or html is required",
                ));
            }
            (true, true) => {
                return Err(ClientError::invalid_request(
                    Provider::BrowserRendering,
                    "url and html are mutually exclusive",
                ));
            }
        }
        if let Some(url) = self.url.as_deref()
            && let Err(e) = url::Url::parse(url.trim())
        {
            return Err(ClientError::invalid_request(
                Provider::BrowserRendering,
                format!("invalid url {url:?}: {e}"),
            ));
        }
        Ok(())
    }
}

/// One entry of the worker's `errors` list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

/// `{ success, result, errors }` wrapper around JSON endpoint results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<ApiMessage>,
}

impl<T> ApiEnvelope<T> {
    /// Unwraps the result.
    ///
    /// # Errors
    ///
    /// [`ClientError::Rejected`] with the joined error messages when
    /// `success` is false, [`ClientError::EmptyResult`] when `result` is absent.
    pub fn into_result(self) -> Result<T, ClientError> {
        if !self.success {
            let message = if self.errors.is_empty() {
                "unknown error".to_string()
            } else {
                self.errors
                    .iter()
                    .map(|e| match e.code {
                        Some(code) => format!("{code}: {}", e.message),
                        None => e.message.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            return Err(ClientError::Rejected {
                provider: Provider::BrowserRendering,
                message,
            });
        }
        self.result.ok_or(ClientError::EmptyResult {
            provider: Provider::BrowserRendering,
        })
    }
}

/// Raw screenshot bytes plus the reported content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

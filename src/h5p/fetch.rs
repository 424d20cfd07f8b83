//! Downloading `.h5p` archives over HTTP.

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::error::{ClientError, Provider};
use crate::http::{
    BULK_DOWNLOAD_TIMEOUT, ClientOptions, RequestExecutor, RetryPolicy, client_option_setters,
};

use super::error::H5pError;
use super::extractor::{ExtractedPackage, extract_package};

/// Default concurrency gate capacity.
pub const DEFAULT_MAX_CONCURRENCY: usize = 2;

const PROVIDER: Provider = Provider::H5p;

/// Fetches package archives through the shared retrying executor.
///
/// Packages can run to hundreds of megabytes, so the per-attempt timeout
/// defaults to five minutes.
#[derive(Debug, Clone)]
pub struct PackageDownloader {
    executor: RequestExecutor,
    options: ClientOptions,
}

#[derive(Debug, Clone)]
pub struct PackageDownloaderBuilder {
    options: ClientOptions,
}

impl PackageDownloaderBuilder {
    client_option_setters!();

    /// Builds the downloader.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidRequest`] when a base URL is set but is not an
    /// absolute http(s) URL, [`ClientError::ClientBuild`] if the HTTP client
    /// cannot be built.
    pub fn build(self) -> Result<PackageDownloader, ClientError> {
        if !self.options.base_url.is_empty() {
            self.options.validate_base_url(PROVIDER)?;
        }
        let executor = RequestExecutor::new(PROVIDER, &self.options)?;
        Ok(PackageDownloader {
            executor,
            options: self.options,
        })
    }
}

impl PackageDownloader {
    /// Starts a builder. Relative package paths are joined onto the base URL;
    /// absolute URLs are fetched as given.
    #[must_use]
    pub fn builder() -> PackageDownloaderBuilder {
        PackageDownloaderBuilder {
            options: ClientOptions::new(
                "",
                BULK_DOWNLOAD_TIMEOUT,
                DEFAULT_MAX_CONCURRENCY,
                RetryPolicy::exponential(),
            ),
        }
    }

    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    #[must_use]
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    fn resolve(&self, location: &str) -> Result<String, ClientError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(ClientError::invalid_request(PROVIDER, "package url is empty"));
        }
        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(location.to_string());
        }
        if self.options.base_url.is_empty() {
            return Err(ClientError::invalid_request(
                PROVIDER,
                format!("relative package path {location:?} without a base url"),
            ));
        }
        Ok(self.options.endpoint(location))
    }

    /// Downloads the archive bytes.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidRequest`] for an unusable location, otherwise any
    /// executor error.
    #[instrument(skip(self, ctx))]
    pub async fn download(
        &self,
        ctx: &CancellationToken,
        location: &str,
    ) -> Result<Vec<u8>, ClientError> {
        let url = self.resolve(location)?;
        let response = self
            .executor
            .execute(ctx, &url, |http| {
                http.get(url.as_str())
                    .header(reqwest::header::ACCEPT, "application/zip, application/octet-stream")
            })
            .await?;
        info!(bytes = response.body.len(), "package downloaded");
        Ok(response.body)
    }

    /// Downloads and extracts a package.
    ///
    /// # Errors
    ///
    /// [`H5pError::Download`] for download failures, otherwise any
    /// [`extract_package`] error.
    pub async fn fetch_package(
        &self,
        ctx: &CancellationToken,
        location: &str,
    ) -> Result<ExtractedPackage, H5pError> {
        let bytes = self.download(ctx, location).await?;
        extract_package(&bytes)
    }
}

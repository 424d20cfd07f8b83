//! CLI entry point for the upstream tool.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use upstream_core::cfbrowser::RenderRequest;
use upstream_core::dataforseo::{
    KeywordRequest, OnPageTaskRequest, SearchVolumeRequest, SerpRequest,
};
use upstream_core::h5p::{ExtractedPackage, PackageDownloader, extract_package};
use upstream_core::{BrowserRenderingClient, DataForSeoClient, JinaClient, PageSpeedClient};

mod cli;
mod config;

use cli::{
    Args, Command, H5pCommand, KeywordsCommand, OnPageCommand, RenderArgs, RenderCommand,
    ScreenshotArgs,
};
use config::{CliOverrides, Credentials, ProviderSettings, Settings, load_config};

/// Applies resolved settings to any provider builder.
///
/// Only the attempt budget of the provider's retry policy is overridden;
/// its backoff shape stays the provider default.
macro_rules! apply_settings {
    ($builder:expr, $settings:expr) => {{
        let settings: &ProviderSettings = $settings;
        let mut builder = $builder;
        if let Some(base_url) = &settings.base_url {
            builder = builder.base_url(base_url.clone());
        }
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(max_concurrency) = settings.max_concurrency {
            builder = builder.max_concurrency(max_concurrency);
        }
        if let Some(max_attempts) = settings.max_attempts {
            let retry = builder.options().retry.clone().with_max_attempts(max_attempts);
            builder = builder.retry_policy(retry);
        }
        builder
    }};
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = load_config(args.config.as_deref())?;

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => loaded.config.verbosity.map_or("info", |v| v.filter()),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");
    debug!(
        path = ?loaded.path,
        loaded_from_file = loaded.loaded_from_file,
        "configuration resolved"
    );

    let overrides = CliOverrides {
        timeout_secs: args.timeout,
        max_attempts: args.max_attempts,
        concurrency: args.concurrency,
    };
    let settings = Settings::resolve(overrides, &loaded.config);
    let credentials = Credentials::from_env();

    let ctx = CancellationToken::new();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling in-flight requests");
            interrupt.cancel();
        }
    });

    let runner = Runner {
        ctx,
        settings,
        credentials,
        pretty: args.pretty,
    };
    runner.run(args.command).await
}

struct Runner {
    ctx: CancellationToken,
    settings: Settings,
    credentials: Credentials,
    pretty: bool,
}

impl Runner {
    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Keywords { action } => self.keywords(action).await,
            Command::Serp(serp) => {
                let client = self.dataforseo()?;
                let mut request = SerpRequest::new(serp.keyword)
                    .location(serp.location.location, serp.location.language)
                    .depth(serp.depth);
                if let Some(device) = serp.device {
                    request = request.device(device.as_str());
                }
                let page = client.serp_organic(&self.ctx, &request).await?;
                info!(items = page.items.len(), "SERP fetched");
                self.emit(&page)
            }
            Command::Onpage { action } => self.on_page(action).await,
            Command::Render { action } => self.render(action).await,
            Command::Screenshot(screenshot) => self.screenshot(screenshot).await,
            Command::Read { url } => {
                let mut builder = apply_settings!(JinaClient::builder(), &self.settings.jina);
                if let Some(key) = &self.credentials.jina_api_key {
                    builder = builder.api_key(key.clone());
                }
                let markdown = builder.build()?.read_markdown(&self.ctx, &url).await?;
                self.emit(&json!({ "url": url, "markdown": markdown }))
            }
            Command::Pagespeed { url, strategy } => {
                let mut builder =
                    apply_settings!(PageSpeedClient::builder(), &self.settings.pagespeed);
                if let Some(key) = &self.credentials.pagespeed_api_key {
                    builder = builder.api_key(key.clone());
                }
                let report = builder
                    .build()?
                    .run(&self.ctx, &url, strategy.into())
                    .await?;
                self.emit(&report)
            }
            Command::H5p {
                action: H5pCommand::Inspect { source },
            } => self.inspect_package(&source).await,
        }
    }

    fn dataforseo(&self) -> Result<DataForSeoClient> {
        let (login, password) = self.credentials.dataforseo()?;
        let builder = apply_settings!(
            DataForSeoClient::builder(login, password),
            &self.settings.dataforseo
        );
        Ok(builder.build()?)
    }

    fn browser(&self) -> Result<BrowserRenderingClient> {
        let worker_url = self.credentials.cfbrowser_url()?;
        let mut builder = apply_settings!(
            BrowserRenderingClient::builder(worker_url),
            &self.settings.cfbrowser
        );
        if let Some(key) = &self.credentials.cfbrowser_api_key {
            builder = builder.api_key(key.clone());
        }
        Ok(builder.build()?)
    }

    async fn keywords(&self, action: KeywordsCommand) -> Result<()> {
        let client = self.dataforseo()?;
        match action {
            KeywordsCommand::Suggest {
                keyword,
                location,
                limit,
                offset,
            } => {
                let mut request =
                    KeywordRequest::new(keyword).location(location.location, location.language);
                if let Some(limit) = limit {
                    request = request.limit(limit);
                }
                if let Some(offset) = offset {
                    request = request.offset(offset);
                }
                let page = client.keyword_suggestions(&self.ctx, &request).await?;
                info!(items = page.items.len(), total = page.total_count, "suggestions fetched");
                self.emit(&page)
            }
            KeywordsCommand::Related {
                keyword,
                location,
                depth,
                limit,
            } => {
                let mut request =
                    KeywordRequest::new(keyword).location(location.location, location.language);
                if let Some(depth) = depth {
                    request = request.depth(depth);
                }
                if let Some(limit) = limit {
                    request = request.limit(limit);
                }
                let page = client.related_keywords(&self.ctx, &request).await?;
                info!(items = page.items.len(), total = page.total_count, "related keywords fetched");
                self.emit(&page)
            }
            KeywordsCommand::Volume { keywords, location } => {
                let request = SearchVolumeRequest::new(keywords)
                    .location(location.location, location.language);
                let volumes = client.search_volume(&self.ctx, &request).await?;
                self.emit(&volumes)
            }
        }
    }

    async fn on_page(&self, action: OnPageCommand) -> Result<()> {
        let client = self.dataforseo()?;
        match action {
            OnPageCommand::Post {
                target,
                max_pages,
                start_url,
                javascript,
            } => {
                let mut request =
                    OnPageTaskRequest::new(target, max_pages).enable_javascript(javascript);
                if let Some(start_url) = start_url {
                    request = request.start_url(start_url);
                }
                let task_id = client.on_page_task_post(&self.ctx, &request).await?;
                self.emit(&json!({ "task_id": task_id }))
            }
            OnPageCommand::Summary { task_id } => {
                let summary = client.on_page_summary(&self.ctx, &task_id).await?;
                self.emit(&summary)
            }
            OnPageCommand::Wait {
                task_id,
                interval,
                max_polls,
            } => {
                let summary = client
                    .wait_for_on_page_summary(
                        &self.ctx,
                        &task_id,
                        Duration::from_secs(interval),
                        max_polls,
                    )
                    .await?;
                self.emit(&summary)
            }
        }
    }

    async fn render(&self, action: RenderCommand) -> Result<()> {
        let client = self.browser()?;
        match action {
            RenderCommand::Content(render) => {
                let request = render_request(&render);
                let html = client.content(&self.ctx, &request).await?;
                self.emit(&json!({ "url": render.url, "content": html }))
            }
            RenderCommand::Markdown(render) => {
                let request = render_request(&render);
                let markdown = client.markdown(&self.ctx, &request).await?;
                self.emit(&json!({ "url": render.url, "markdown": markdown }))
            }
            RenderCommand::Links {
                render,
                visible_only,
            } => {
                let mut request = render_request(&render);
                if visible_only {
                    request = request.visible_links_only();
                }
                let links = client.links(&self.ctx, &request).await?;
                self.emit(&json!({ "url": render.url, "links": links }))
            }
        }
    }

    async fn screenshot(&self, args: ScreenshotArgs) -> Result<()> {
        let client = self.browser()?;
        let mut request = render_request(&args.render);
        if args.full_page {
            request = request.full_page();
        }
        if let (Some(width), Some(height)) = (args.width, args.height) {
            request = request.viewport(width, height);
        }

        let shot = client.screenshot(&self.ctx, &request).await?;
        tokio::fs::write(&args.output, &shot.bytes)
            .await
            .with_context(|| format!("Failed to write screenshot to '{}'", args.output.display()))?;
        info!(path = %args.output.display(), bytes = shot.bytes.len(), "screenshot saved");
        self.emit(&json!({
            "url": args.render.url,
            "path": args.output.display().to_string(),
            "content_type": shot.content_type,
            "bytes": shot.bytes.len(),
        }))
    }

    async fn inspect_package(&self, source: &str) -> Result<()> {
        let package = if source.starts_with("http://") || source.starts_with("https://") {
            let downloader =
                apply_settings!(PackageDownloader::builder(), &self.settings.h5p).build()?;
            downloader.fetch_package(&self.ctx, source).await?
        } else {
            let bytes = tokio::fs::read(source)
                .await
                .with_context(|| format!("Failed to read package '{source}'"))?;
            extract_package(&bytes)?
        };
        self.emit(&package_summary(&package))
    }

    fn emit<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let mut stdout = io::stdout().lock();
        if self.pretty {
            serde_json::to_writer_pretty(&mut stdout, value)?;
        } else {
            serde_json::to_writer(&mut stdout, value)?;
        }
        writeln!(stdout)?;
        Ok(())
    }
}

fn render_request(args: &RenderArgs) -> RenderRequest {
    let request = RenderRequest::url(args.url.clone());
    match args.wait_until {
        Some(wait_until) => request.wait_until(wait_until.into()),
        None => request,
    }
}

fn package_summary(package: &ExtractedPackage) -> serde_json::Value {
    let libraries: Vec<_> = package
        .libraries
        .iter()
        .map(|library| {
            let descriptor = &library.descriptor;
            let dependencies: Vec<_> = descriptor
                .dependencies()
                .map(|(kind, dependency)| json!({ "kind": kind, "library": dependency.to_string() }))
                .collect();
            json!({
                "directory": library.directory,
                "machine_name": descriptor.machine_name,
                "version": descriptor.version(),
                "runnable": descriptor.is_runnable(),
                "files": library.files.len(),
                "bytes": library.total_bytes(),
                "dependencies": dependencies,
            })
        })
        .collect();

    json!({
        "title": package.manifest.title,
        "main_library": package.manifest.main_library,
        "language": package.manifest.language,
        "preloaded_dependencies": package
            .manifest
            .preloaded_dependencies
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        "libraries": libraries,
    })
}

//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use upstream_core::cfbrowser::WaitUntil;
use upstream_core::dataforseo::{DEFAULT_LANGUAGE_CODE, DEFAULT_LOCATION_CODE, MAX_SERP_DEPTH};
use upstream_core::pagespeed::Strategy;

/// Query SEO, rendering and reader APIs, and inspect H5P packages.
///
/// Results are printed to stdout as JSON. Credentials come from the
/// environment; tuning comes from the config file and the flags below.
#[derive(Parser, Debug)]
#[command(name = "upstream")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/upstream/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Per-attempt request timeout in seconds (1-3600)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Attempts per request, the first one included (1-10)
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: Option<u32>,

    /// Maximum concurrent requests per provider (1-100)
    #[arg(short = 'c', long, global = true, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// DataForSEO keyword research
    Keywords {
        #[command(subcommand)]
        action: KeywordsCommand,
    },
    /// DataForSEO organic SERP for a keyword
    Serp(SerpArgs),
    /// DataForSEO On-Page crawls
    Onpage {
        #[command(subcommand)]
        action: OnPageCommand,
    },
    /// Render a page through the browser-rendering worker
    Render {
        #[command(subcommand)]
        action: RenderCommand,
    },
    /// Screenshot a page through the browser-rendering worker
    Screenshot(ScreenshotArgs),
    /// Fetch a page as Markdown through the Jina reader
    Read {
        /// Page URL
        url: String,
    },
    /// Run a PageSpeed Insights audit
    Pagespeed {
        /// Page URL
        url: String,

        /// Device profile to emulate
        #[arg(long, value_enum, default_value_t = StrategyArg::Mobile)]
        strategy: StrategyArg,
    },
    /// H5P package tools
    H5p {
        #[command(subcommand)]
        action: H5pCommand,
    },
}

/// Location and language targeting shared by DataForSEO commands.
#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct LocationArgs {
    /// DataForSEO location code (2840 = United States)
    #[arg(long, default_value_t = DEFAULT_LOCATION_CODE)]
    pub location: i64,

    /// ISO language code
    #[arg(long, default_value = DEFAULT_LANGUAGE_CODE)]
    pub language: String,
}

#[derive(Subcommand, Debug)]
pub enum KeywordsCommand {
    /// Keywords containing the seed keyword
    Suggest {
        keyword: String,
        #[command(flatten)]
        location: LocationArgs,
        /// Maximum items to return
        #[arg(long)]
        limit: Option<u32>,
        /// Offset into the full result list
        #[arg(long)]
        offset: Option<u32>,
    },
    /// Keywords related to the seed keyword
    Related {
        keyword: String,
        #[command(flatten)]
        location: LocationArgs,
        /// Search depth (0-4)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=4))]
        depth: Option<u8>,
        /// Maximum items to return
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Google Ads search volume for a keyword list
    Volume {
        #[arg(required = true)]
        keywords: Vec<String>,
        #[command(flatten)]
        location: LocationArgs,
    },
}

#[derive(clap::Args, Debug)]
pub struct SerpArgs {
    pub keyword: String,
    #[command(flatten)]
    pub location: LocationArgs,
    /// Number of results to crawl (1-700)
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_SERP_DEPTH)))]
    pub depth: u32,
    /// Device to emulate
    #[arg(long, value_enum)]
    pub device: Option<DeviceArg>,
}

#[derive(Subcommand, Debug)]
pub enum OnPageCommand {
    /// Queue a crawl and print its task id
    Post {
        /// Domain to crawl, without scheme
        target: String,
        /// Maximum pages to crawl
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
        max_pages: u32,
        /// First page to crawl
        #[arg(long)]
        start_url: Option<String>,
        /// Render pages with JavaScript
        #[arg(long)]
        javascript: bool,
    },
    /// Fetch the current crawl summary
    Summary { task_id: String },
    /// Poll until the crawl finishes
    Wait {
        task_id: String,
        /// Seconds between polls (1-3600)
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..=3600))]
        interval: u64,
        /// Maximum number of polls
        #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..))]
        max_polls: u32,
    },
}

/// Target and navigation options shared by render commands.
#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct RenderArgs {
    /// Page URL
    pub url: String,
    /// When navigation counts as finished
    #[arg(long, value_enum)]
    pub wait_until: Option<WaitUntilArg>,
}

#[derive(Subcommand, Debug)]
pub enum RenderCommand {
    /// Rendered HTML
    Content(RenderArgs),
    /// Rendered page as Markdown
    Markdown(RenderArgs),
    /// Links on the rendered page
    Links {
        #[command(flatten)]
        render: RenderArgs,
        /// Only links visible on the page
        #[arg(long)]
        visible_only: bool,
    },
}

#[derive(clap::Args, Debug)]
pub struct ScreenshotArgs {
    #[command(flatten)]
    pub render: RenderArgs,
    /// Where to write the image
    #[arg(short, long)]
    pub output: PathBuf,
    /// Capture the full scrollable page
    #[arg(long)]
    pub full_page: bool,
    /// Viewport width in pixels
    #[arg(long, requires = "height")]
    pub width: Option<u32>,
    /// Viewport height in pixels
    #[arg(long, requires = "width")]
    pub height: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum H5pCommand {
    /// List the manifest and libraries of a package
    Inspect {
        /// Local .h5p file, or an http(s) URL
        source: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyArg {
    Mobile,
    Desktop,
}

impl From<StrategyArg> for Strategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Mobile => Strategy::Mobile,
            StrategyArg::Desktop => Strategy::Desktop,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceArg {
    Desktop,
    Mobile,
}

impl DeviceArg {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntilArg {
    Load,
    #[value(name = "domcontentloaded")]
    DomContentLoaded,
    #[value(name = "networkidle0")]
    NetworkIdle0,
    #[value(name = "networkidle2")]
    NetworkIdle2,
}

impl From<WaitUntilArg> for WaitUntil {
    fn from(value: WaitUntilArg) -> Self {
        match value {
            WaitUntilArg::Load => WaitUntil::Load,
            WaitUntilArg::DomContentLoaded => WaitUntil::DomContentLoaded,
            WaitUntilArg::NetworkIdle0 => WaitUntil::NetworkIdle0,
            WaitUntilArg::NetworkIdle2 => WaitUntil::NetworkIdle2,
        }
    }
}

//! CLI parsing and batch orchestration. Parses args, validates each series
//! request, runs discovery and download per series with failures isolated,
//! and maps errors to exit codes.

use crate::archive::OutputFormat;
use crate::cancel::CancelToken;
use crate::config;
use crate::download::{download_series, DownloadError, DownloadOptions};
use crate::model::{ChapterEnd, QueueItem, SeriesRequest};
use crate::scraper::listing::DEFAULT_PAGE_DELAY_SECS;
use crate::scraper::{
    discover_chapters, extract_series_slug, parse_chapter_end, validate_chapter_range,
    DiscoverOptions, Fetcher, PoliteClient, ScraperError,
};
use crate::status::StatusChannel;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const WEBTOONS_BASE: &str = "https://www.webtoons.com";
const DEFAULT_COOLDOWN_SECS: u64 = 120;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Scraper(#[from] ScraperError),

    #[error("{0}")]
    Download(#[from] DownloadError),

    #[error("Cancelled.")]
    Cancelled,
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Scraper(_) => 2,
            CliRunError::Download(_) => 3,
            CliRunError::Cancelled => 130,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "wtscrape")]
#[command(about = "Download Webtoons series and package each episode as CBZ or PDF")]
#[command(
    after_help = "Config file keys (save_root, user_agent, page_delay_secs, request_delay_secs, timeout_secs, series_cooldown_secs, max_pages, format) are read from ./wtscrape.toml or the user config directory. CLI flags override config."
)]
pub struct Args {
    /// Series listing URLs, e.g. https://www.webtoons.com/en/fantasy/castle-swimmer/list?title_no=1499
    pub urls: Vec<String>,

    /// Reconstruct a listing URL from a series slug (requires --title-no).
    #[arg(long, requires = "title_no")]
    pub slug: Option<String>,

    /// Numeric title id used with --slug.
    #[arg(long)]
    pub title_no: Option<u64>,

    /// Genre path segment used with --slug. Default "canvas".
    #[arg(long, default_value = "canvas")]
    pub genre: String,

    /// JSON file with a batch of series requests: [{"url": ..., "start": 1, "end": "end"}, ...]
    #[arg(long)]
    pub queue: Option<PathBuf>,

    /// Directory to save series into. Default: config save_root or current directory.
    #[arg(short = 'o', long)]
    pub save_root: Option<PathBuf>,

    /// Output format: cbz or pdf.
    #[arg(long, value_parser = parse_format)]
    pub format: Option<OutputFormat>,

    /// First chapter to download (1-based, chronological).
    #[arg(long, default_value_t = 1)]
    pub start: u32,

    /// Last chapter to download, or the literal "end" for no limit.
    #[arg(long, default_value = "end", value_parser = parse_end)]
    pub end: ChapterEnd,

    /// Stop listing discovery after this many pages.
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Delay between listing-page fetches in seconds (overrides config; default 5).
    #[arg(long)]
    pub page_delay: Option<u64>,

    /// Politeness delay between any two requests in seconds (overrides config; default 0).
    #[arg(long)]
    pub request_delay: Option<u64>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Cooldown between series in seconds (overrides config; default 120).
    #[arg(long)]
    pub cooldown: Option<u64>,

    /// Suppress progress output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Print every status line instead of a spinner; also print error chains.
    #[arg(long)]
    pub verbose: bool,
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    match s.to_lowercase().as_str() {
        "cbz" => Ok(OutputFormat::Cbz),
        "pdf" => Ok(OutputFormat::Pdf),
        _ => Err(format!("Invalid --format value: '{}'. Use cbz or pdf.", s)),
    }
}

fn parse_end(s: &str) -> Result<ChapterEnd, String> {
    parse_chapter_end(s).map_err(|e| e.to_string())
}

/// Rebuild the canonical listing URL from slug, title id, and genre segment.
fn listing_url_from_parts(genre: &str, slug: &str, title_no: u64) -> String {
    format!(
        "{}/en/{}/{}/list?title_no={}",
        WEBTOONS_BASE, genre, slug, title_no
    )
}

/// Collect and validate the batch. Invalid entries are reported and skipped;
/// they never cost network activity. Errors only when nothing valid remains.
fn build_requests(args: &Args, config: Option<&config::Config>) -> Result<Vec<SeriesRequest>, CliRunError> {
    let save_root: PathBuf = args
        .save_root
        .clone()
        .or_else(|| config.and_then(|c| c.save_root.clone()))
        .unwrap_or_else(|| PathBuf::from("."));
    let format = args
        .format
        .or_else(|| {
            config
                .and_then(|c| c.format.as_deref())
                .and_then(|s| parse_format(s).ok())
        })
        .unwrap_or(OutputFormat::Cbz);

    validate_chapter_range(args.start, args.end)
        .map_err(|e| CliRunError::InvalidInput(e.to_string()))?;

    // (url, start, end) triples before slug validation.
    let mut candidates: Vec<(String, u32, ChapterEnd)> = Vec::new();
    for url in &args.urls {
        candidates.push((url.clone(), args.start, args.end));
    }
    if let (Some(slug), Some(title_no)) = (&args.slug, args.title_no) {
        candidates.push((
            listing_url_from_parts(&args.genre, slug, title_no),
            args.start,
            args.end,
        ));
    }
    if let Some(queue_path) = &args.queue {
        let file = std::fs::File::open(queue_path).map_err(|e| {
            CliRunError::InvalidInput(format!("Cannot read queue {}: {}", queue_path.display(), e))
        })?;
        let items: Vec<QueueItem> = serde_json::from_reader(file).map_err(|e| {
            CliRunError::InvalidInput(format!("Invalid queue {}: {}", queue_path.display(), e))
        })?;
        for item in items {
            let end = match parse_chapter_end(&item.end) {
                Ok(end) => end,
                Err(e) => {
                    eprintln!("Skipping queue entry {}: {}", item.url, e);
                    continue;
                }
            };
            if let Err(e) = validate_chapter_range(item.start, end) {
                eprintln!("Skipping queue entry {}: {}", item.url, e);
                continue;
            }
            candidates.push((item.url, item.start, end));
        }
    }

    let mut requests = Vec::with_capacity(candidates.len());
    for (url, start, end) in candidates {
        match extract_series_slug(&url) {
            Ok(slug) => requests.push(SeriesRequest {
                listing_url: url,
                slug,
                save_root: save_root.clone(),
                format,
                start_chapter: start,
                end_chapter: end,
            }),
            Err(e) => eprintln!("Skipping series: {}", e),
        }
    }

    if requests.is_empty() {
        return Err(CliRunError::InvalidInput(
            "No valid series requests. Pass listing URLs, --slug with --title-no, or --queue."
                .to_string(),
        ));
    }
    Ok(requests)
}

/// Sleep in one-second slices so Ctrl-C interrupts a cooldown promptly.
fn interruptible_sleep(duration: Duration, cancel: &CancelToken) {
    let mut remaining = duration;
    while !remaining.is_zero() && !cancel.is_cancelled() {
        let slice = remaining.min(Duration::from_secs(1));
        std::thread::sleep(slice);
        remaining -= slice;
    }
}

/// Spawn the status printer. Default shows a spinner with the latest line;
/// --verbose prints every line.
fn spawn_printer(
    status: &StatusChannel,
    verbose: bool,
) -> std::thread::JoinHandle<()> {
    let rx = status.subscribe();
    std::thread::spawn(move || {
        if verbose {
            for line in rx {
                eprintln!("[status] {}", line);
            }
            return;
        }
        let spinner = indicatif::ProgressBar::new_spinner();
        spinner.set_style(
            indicatif::ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .unwrap()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        for line in rx {
            spinner.set_message(line);
        }
        spinner.finish_and_clear();
    })
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let requests = build_requests(args, config.as_ref())?;

    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    let page_delay_secs = args
        .page_delay
        .or_else(|| config.as_ref().and_then(|c| c.page_delay_secs))
        .unwrap_or(DEFAULT_PAGE_DELAY_SECS);
    let request_delay_secs = args
        .request_delay
        .or_else(|| config.as_ref().and_then(|c| c.request_delay_secs))
        .unwrap_or(0);
    let timeout_secs = args
        .timeout
        .or_else(|| config.as_ref().and_then(|c| c.timeout_secs))
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let cooldown_secs = args
        .cooldown
        .or_else(|| config.as_ref().and_then(|c| c.series_cooldown_secs))
        .unwrap_or(DEFAULT_COOLDOWN_SECS);
    let max_pages = args
        .max_pages
        .or_else(|| config.as_ref().and_then(|c| c.max_pages));
    let user_agent = args
        .user_agent
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.user_agent.clone()));

    let mut builder = PoliteClient::builder()
        .delay_secs(request_delay_secs)
        .timeout_secs(timeout_secs);
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    let mut client = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    let cancel = CancelToken::new();
    {
        let handler_token = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
            eprintln!("Warning: could not install Ctrl-C handler: {}", e);
        }
    }

    let status = StatusChannel::new();
    let printer = if args.quiet {
        None
    } else {
        Some(spawn_printer(&status, args.verbose))
    };

    let discover_options = DiscoverOptions {
        max_pages,
        page_delay: Duration::from_secs(page_delay_secs),
    };

    let result = run_batch(
        &mut client,
        &requests,
        &discover_options,
        cooldown_secs,
        &status,
        &cancel,
    );

    drop(status);
    if let Some(printer) = printer {
        printer.join().ok();
    }
    result
}

fn run_batch<F: Fetcher>(
    client: &mut F,
    requests: &[SeriesRequest],
    discover_options: &DiscoverOptions,
    cooldown_secs: u64,
    status: &StatusChannel,
    cancel: &CancelToken,
) -> Result<(), CliRunError> {
    let mut completed = 0usize;
    let mut last_failure: Option<CliRunError> = None;

    for (index, request) in requests.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(CliRunError::Cancelled);
        }
        status.emit(format!("Processing: {}", request.slug));

        match discover_chapters(
            client,
            &request.listing_url,
            discover_options,
            status,
            cancel,
        ) {
            Ok(chapters) if chapters.is_empty() => {
                status.emit(format!("No chapters found for {}", request.slug));
                completed += 1;
            }
            Ok(chapters) => {
                status.emit(format!(
                    "Downloading {} chapters of {}...",
                    chapters.len(),
                    request.slug
                ));
                let options = DownloadOptions {
                    format: request.format,
                    start_chapter: request.start_chapter,
                    end_chapter: request.end_chapter,
                };
                match download_series(
                    client,
                    &request.save_root,
                    &request.slug,
                    &chapters,
                    &options,
                    status,
                    cancel,
                ) {
                    Ok(_) => {
                        status.emit(format!("Download complete for: {}", request.slug));
                        completed += 1;
                    }
                    Err(e) if e.is_cancelled() => return Err(CliRunError::Cancelled),
                    Err(e) => {
                        status.emit(format!("Download failed for {}: {}", request.slug, e));
                        last_failure = Some(CliRunError::Download(e));
                    }
                }
            }
            Err(ScraperError::Cancelled) => return Err(CliRunError::Cancelled),
            Err(e) => {
                status.emit(format!(
                    "Chapter discovery failed for {}: {}",
                    request.listing_url, e
                ));
                last_failure = Some(CliRunError::Scraper(e));
            }
        }

        // Cooldown between series, skipped after the final one.
        if index + 1 < requests.len() && cooldown_secs > 0 {
            status.emit(format!(
                "Waiting {} seconds before the next series...",
                cooldown_secs
            ));
            interruptible_sleep(Duration::from_secs(cooldown_secs), cancel);
        }
    }

    if cancel.is_cancelled() {
        return Err(CliRunError::Cancelled);
    }
    // Per-series failures do not abort the batch, but a run in which no
    // series completed exits with the last failure.
    if completed == 0 {
        if let Some(failure) = last_failure {
            return Err(failure);
        }
    }
    status.emit("All webtoon downloads completed.");
    Ok(())
}

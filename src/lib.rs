//! wtscrape: CLI scraper for Webtoons series, packaging each episode as CBZ or PDF.

pub mod archive;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod download;
pub mod model;
pub mod scraper;
pub mod status;

// Re-exports for CLI and consumers.
pub use archive::{package_chapter, ArchiveError, OutputFormat};
pub use cancel::CancelToken;
pub use download::{download_series, DownloadError, DownloadOptions};
pub use model::{ChapterEnd, ChapterEntry, DownloadOutcome, SeriesRequest};
pub use scraper::{
    discover_chapters, extract_series_slug, DiscoverOptions, Fetcher, PoliteClient,
    PoliteClientBuilder, ScraperError,
};
pub use status::StatusChannel;

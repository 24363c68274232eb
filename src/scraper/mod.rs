//! Site scraping: URL/range validation, the HTTP client seam, listing-page
//! discovery, and episode-page parsing.

pub mod client;
mod error;

pub mod episode;
pub mod listing;
pub mod validate;

pub use client::{Fetcher, PoliteClient, PoliteClientBuilder, CONSENT_COOKIE};
pub use error::ScraperError;
pub use listing::{discover_chapters, DiscoverOptions};
pub use validate::{extract_series_slug, parse_chapter_end, validate_chapter_range};

use scraper::Selector;

/// Parse a CSS selector or return a parse error (avoids panics from Selector::parse).
pub(crate) fn parse_selector(sel: &str) -> Result<Selector, ScraperError> {
    Selector::parse(sel).map_err(|e| ScraperError::ParseListing {
        message: format!("invalid selector {:?}: {}", sel, e),
    })
}

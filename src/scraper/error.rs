//! Shared error type for validation, HTTP, and page parsing.

use thiserror::Error;

/// Scraper error for URL/range validation, HTTP, and markup parsing.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Invalid listing URL: {input}: {reason}")]
    InvalidListingUrl { input: String, reason: String },

    #[error("Invalid chapter range: {reason}")]
    InvalidChapterRange { reason: String },

    #[error("Network error: could not reach {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead { url: String, source: reqwest::Error },

    #[error("Could not parse listing page: {message}")]
    ParseListing { message: String },

    #[error("Cancelled.")]
    Cancelled,
}

//! Listing-URL and chapter-range validation.
//!
//! The URL check is positional by design: the site's listing URLs have a
//! fixed shape (`https://www.webtoons.com/{lang}/{genre}/{slug}/list?title_no={n}`)
//! and anything with a different separator count is rejected outright.

use crate::model::ChapterEnd;
use crate::scraper::error::ScraperError;

const HOST_MARKER: &str = "https://www.webtoons.com/";
const LISTING_MARKER: &str = "/list?title_no=";
const EXPECTED_SEPARATORS: usize = 6;

/// Validate a listing URL and extract the series slug.
///
/// Accepts iff the URL contains both markers and exactly six `/` characters;
/// the slug is the segment between the fifth and sixth separator.
pub fn extract_series_slug(url: &str) -> Result<String, ScraperError> {
    if !url.contains(HOST_MARKER) {
        return Err(ScraperError::InvalidListingUrl {
            input: url.to_string(),
            reason: format!("expected a URL under {}", HOST_MARKER),
        });
    }
    if !url.contains(LISTING_MARKER) {
        return Err(ScraperError::InvalidListingUrl {
            input: url.to_string(),
            reason: format!("expected a listing URL containing {:?}", LISTING_MARKER),
        });
    }
    let separators = url.matches('/').count();
    if separators != EXPECTED_SEPARATORS {
        return Err(ScraperError::InvalidListingUrl {
            input: url.to_string(),
            reason: format!(
                "expected exactly {} path separators, found {}",
                EXPECTED_SEPARATORS, separators
            ),
        });
    }
    // Six separators split the URL into seven fields; the slug sits just
    // before the final one.
    let slug = url
        .split('/')
        .nth(EXPECTED_SEPARATORS - 1)
        .unwrap_or_default();
    if slug.is_empty() {
        return Err(ScraperError::InvalidListingUrl {
            input: url.to_string(),
            reason: "series slug segment is empty".to_string(),
        });
    }
    Ok(slug.to_string())
}

/// Parse the textual end bound: an integer or the literal `end`.
pub fn parse_chapter_end(s: &str) -> Result<ChapterEnd, ScraperError> {
    let s = s.trim();
    if s == "end" {
        return Ok(ChapterEnd::Open);
    }
    match s.parse::<u32>() {
        Ok(n) => Ok(ChapterEnd::Bounded(n)),
        Err(_) => Err(ScraperError::InvalidChapterRange {
            reason: format!("end must be a number or 'end', got '{}'", s),
        }),
    }
}

/// Validate a chapter window: start >= 1 and, when bounded, end >= start.
pub fn validate_chapter_range(start: u32, end: ChapterEnd) -> Result<(), ScraperError> {
    if start < 1 {
        return Err(ScraperError::InvalidChapterRange {
            reason: format!("start must be at least 1, got {}", start),
        });
    }
    if let ChapterEnd::Bounded(e) = end {
        if e < 1 {
            return Err(ScraperError::InvalidChapterRange {
                reason: format!("end must be at least 1, got {}", e),
            });
        }
        if e < start {
            return Err(ScraperError::InvalidChapterRange {
                reason: format!("end ({}) must not be below start ({})", e, start),
            });
        }
    }
    Ok(())
}

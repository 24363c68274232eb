//! Listing-page parsing and chapter-list discovery.
//!
//! Listings are paginated newest-first and the site repeats page 1's content
//! for out-of-range page numbers, so discovery terminates on content, not on
//! HTTP status: it stops when a page parses to no entries or when a page's
//! leading link matches the leading link of the very first page fetched.

use std::time::Duration;

use crate::cancel::CancelToken;
use crate::model::ChapterEntry;
use crate::scraper::client::Fetcher;
use crate::scraper::error::ScraperError;
use crate::scraper::parse_selector;
use crate::status::StatusChannel;
use scraper::Html;

/// Default wait between successive listing-page fetches.
pub const DEFAULT_PAGE_DELAY_SECS: u64 = 5;

/// Discovery settings: optional page cap and the mandatory inter-page delay.
#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    /// Stop after this many pages regardless of content. None walks until
    /// the termination predicate fires.
    pub max_pages: Option<u32>,
    /// Fixed delay between page fetches. Unconditional, not adaptive.
    pub page_delay: Duration,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self {
            max_pages: None,
            page_delay: Duration::from_secs(DEFAULT_PAGE_DELAY_SECS),
        }
    }
}

/// One raw listing entry: chapter link and label, newest-first page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedChapter {
    pub link: String,
    pub label: String,
}

/// Parse the chapter entries of one listing page, in document order.
///
/// The list container is `#_listUl`; each entry is an `li` whose link is its
/// `a[href]` and whose label is the `span.subj` text. Entries missing either
/// are dropped. A page without the container parses to an empty list.
pub fn parse_listing_page(html: &str) -> Result<Vec<ListedChapter>, ScraperError> {
    let doc = Html::parse_document(html);
    let entry_sel = parse_selector("#_listUl > li")?;
    let link_sel = parse_selector("a[href]")?;
    let label_sel = parse_selector("span.subj")?;

    let mut chapters = Vec::new();
    for entry in doc.select(&entry_sel) {
        let link = entry
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .filter(|href| !href.is_empty());
        let label = entry
            .select(&label_sel)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty());
        if let (Some(link), Some(label)) = (link, label) {
            chapters.push(ListedChapter {
                link: link.to_string(),
                label,
            });
        }
    }
    Ok(chapters)
}

/// Walk a series' listing pages and return its chapters oldest-first, with
/// 1-based ordinals assigned after the reversal.
///
/// Any fetch or parse failure aborts discovery for this URL only; the batch
/// driver reports it and moves on to the next series.
pub fn discover_chapters<F: Fetcher>(
    client: &mut F,
    listing_url: &str,
    options: &DiscoverOptions,
    status: &StatusChannel,
    cancel: &CancelToken,
) -> Result<Vec<ChapterEntry>, ScraperError> {
    let mut collected: Vec<ListedChapter> = Vec::new();
    if listing_url.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut first_link: Option<String> = None;
    let mut page: u32 = 1;
    loop {
        if cancel.is_cancelled() {
            return Err(ScraperError::Cancelled);
        }
        if let Some(cap) = options.max_pages {
            if page > cap {
                break;
            }
        }
        if page > 1 && !options.page_delay.is_zero() {
            std::thread::sleep(options.page_delay);
        }

        let page_url = format!("{}&page={}", listing_url, page);
        status.emit(format!("Getting page - {}", page_url));

        let html = client.get_text(&page_url)?;
        let entries = parse_listing_page(&html)?;
        if entries.is_empty() {
            break;
        }
        match &first_link {
            // Out-of-range pages serve page 1 again; seeing its leading
            // link a second time means the listing is exhausted.
            Some(first) if entries[0].link == *first => break,
            Some(_) => {}
            None => first_link = Some(entries[0].link.clone()),
        }
        collected.extend(entries);
        page += 1;
    }

    // Pages arrive newest-first; one reversal yields chronological order.
    collected.reverse();
    Ok(collected
        .into_iter()
        .zip(1u32..)
        .map(|(c, ordinal)| ChapterEntry {
            source_url: c.link,
            title: c.label,
            ordinal,
        })
        .collect())
}

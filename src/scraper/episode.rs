//! Chapter (episode) page parsing: ordered image URLs and episode numbers.

use crate::scraper::error::ScraperError;
use crate::scraper::parse_selector;
use reqwest::Url;
use scraper::Html;

/// Extract the ordered image URLs from a chapter page.
///
/// The image list lives in `#_imageList`; each entry's URL is in the
/// `data-url` attribute. Markup order is download order and defines page
/// order within the chapter, so it is preserved exactly. A missing
/// container or an empty list yields an empty Vec, not an error.
pub fn parse_image_urls(html: &str) -> Result<Vec<String>, ScraperError> {
    let doc = Html::parse_document(html);
    let img_sel = parse_selector("#_imageList img")?;
    let urls = doc
        .select(&img_sel)
        .filter_map(|img| img.value().attr("data-url"))
        .filter(|u| !u.is_empty())
        .map(String::from)
        .collect();
    Ok(urls)
}

/// Episode number from a chapter URL's `episode_no` query parameter.
///
/// Used only for on-disk naming; independent of the chronological ordinal.
pub fn episode_number(chapter_url: &str) -> Option<u32> {
    let url = Url::parse(chapter_url).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "episode_no")
        .and_then(|(_, v)| v.parse().ok())
}

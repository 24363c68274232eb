//! Chapter downloader: iterates the chronological chapter list, applies the
//! chapter window and the skip-if-already-downloaded policy, fetches each
//! in-range chapter's images strictly in order, and packages them into one
//! artifact per chapter.
//!
//! The downloader owns all filesystem side effects under the series' save
//! root. A chapter's temporary image directory never outlives the attempt:
//! it is removed on success, on failure, and on cancellation.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::archive::{package_chapter, ArchiveError, OutputFormat};
use crate::cancel::CancelToken;
use crate::model::{ChapterEnd, ChapterEntry, DownloadOutcome};
use crate::scraper::episode::{episode_number, parse_image_urls};
use crate::scraper::{Fetcher, ScraperError};
use crate::status::StatusChannel;

/// Errors from a series download. A chapter-level error aborts the series
/// run; the batch driver isolates it per series.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Scrape(#[from] ScraperError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("Filesystem error: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cancelled.")]
    Cancelled,
}

impl DownloadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            DownloadError::Cancelled | DownloadError::Scrape(ScraperError::Cancelled)
        )
    }
}

/// Per-run download settings: format plus the inclusive chapter window.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub format: OutputFormat,
    /// 1-based inclusive start position.
    pub start_chapter: u32,
    /// Inclusive end position, or open.
    pub end_chapter: ChapterEnd,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Cbz,
            start_chapter: 1,
            end_chapter: ChapterEnd::Open,
        }
    }
}

/// Replace characters invalid in file names on common filesystems with `_`.
pub fn make_file_name_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Download one series' chapters into `{save_root}/{series_name}/`.
///
/// Chapters are visited oldest-first; the 1-based position is the chapter's
/// ordinal. Out-of-window and already-downloaded chapters are skipped
/// without any network activity. Returns one [DownloadOutcome] per chapter,
/// in chapter order.
pub fn download_series<F: Fetcher>(
    client: &mut F,
    save_root: &Path,
    series_name: &str,
    chapters: &[ChapterEntry],
    options: &DownloadOptions,
    status: &StatusChannel,
    cancel: &CancelToken,
) -> Result<Vec<DownloadOutcome>, DownloadError> {
    let series_dir = save_root.join(series_name);
    std::fs::create_dir_all(&series_dir).map_err(|e| DownloadError::Io {
        path: series_dir.clone(),
        source: e,
    })?;

    status.emit(format!(
        "Downloading {} chapters {}..{}",
        series_name, options.start_chapter, options.end_chapter
    ));

    let mut outcomes = Vec::with_capacity(chapters.len());
    for entry in chapters {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let position = entry.ordinal;
        if position < options.start_chapter {
            status.emit(format!(
                "Skipping {} chapter {} because of start {}",
                series_name, position, options.start_chapter
            ));
            outcomes.push(DownloadOutcome::SkippedOutOfRange);
            continue;
        }
        if !options.end_chapter.contains(position) {
            status.emit(format!(
                "Skipping {} chapter {} because of end {}",
                series_name, position, options.end_chapter
            ));
            outcomes.push(DownloadOutcome::SkippedOutOfRange);
            continue;
        }

        // Episode number names the artifact; the ordinal stands in when the
        // source URL carries no episode_no parameter.
        let episode = episode_number(&entry.source_url).unwrap_or(position);
        let safe_title = make_file_name_safe(&entry.title);
        let artifact = series_dir.join(format!(
            "({}) {}.{}",
            episode,
            safe_title,
            options.format.extension()
        ));
        if artifact.exists() {
            status.emit(format!(
                "Skipping chapter {} of {}, already downloaded.",
                episode, series_name
            ));
            outcomes.push(DownloadOutcome::SkippedAlreadyExists);
            continue;
        }

        status.emit(format!("Downloading {} chapter {}", series_name, position));

        let images_dir = series_dir.join(format!("({}) {}", episode, safe_title));
        std::fs::create_dir_all(&images_dir).map_err(|e| DownloadError::Io {
            path: images_dir.clone(),
            source: e,
        })?;

        let result = fetch_and_package(
            client,
            series_name,
            entry,
            episode,
            &safe_title,
            &images_dir,
            &artifact,
            options,
            status,
            cancel,
        );
        // The temp directory must never persist past the attempt, whatever
        // the result.
        std::fs::remove_dir_all(&images_dir).ok();
        outcomes.push(result?);
    }

    Ok(outcomes)
}

#[allow(clippy::too_many_arguments)]
fn fetch_and_package<F: Fetcher>(
    client: &mut F,
    series_name: &str,
    entry: &ChapterEntry,
    episode: u32,
    safe_title: &str,
    images_dir: &Path,
    artifact: &Path,
    options: &DownloadOptions,
    status: &StatusChannel,
    cancel: &CancelToken,
) -> Result<DownloadOutcome, DownloadError> {
    let html = client.get_text(&entry.source_url)?;
    let image_urls = parse_image_urls(&html)?;
    if image_urls.is_empty() {
        status.emit(format!(
            "No images found in chapter {} of {}",
            episode, series_name
        ));
        return Ok(DownloadOutcome::SkippedNoImages);
    }

    for (index, image_url) in image_urls.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        status.emit(format!(
            "Downloading image {} of chapter {} of {}",
            index, episode, series_name
        ));
        // The origin rejects image requests without the consent cookie and
        // the owning chapter as referrer.
        let bytes = client.get_bytes(image_url, Some(&entry.source_url))?;
        let image_path = images_dir.join(format!(
            "{}_Ch{}_Img{:03}.jpg",
            series_name, episode, index
        ));
        std::fs::write(&image_path, &bytes).map_err(|e| DownloadError::Io {
            path: image_path.clone(),
            source: e,
        })?;
    }

    package_chapter(options.format, images_dir, safe_title, artifact)?;
    Ok(DownloadOutcome::Downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::testing::FakeFetcher;
    use std::fs::File;

    const SERIES: &str = "test-series";

    fn chapter_url(episode: u32) -> String {
        format!(
            "https://www.webtoons.com/en/fantasy/test/ep-{}/viewer?title_no=9&episode_no={}",
            episode, episode
        )
    }

    fn image_url(episode: u32, index: usize) -> String {
        format!("https://img.example/ep{}/{}.jpg", episode, index)
    }

    fn chapter_html(episode: u32, image_count: usize) -> String {
        let mut html = String::from(r#"<html><body><div id="_imageList">"#);
        for index in 0..image_count {
            html.push_str(&format!(r#"<img data-url="{}"/>"#, image_url(episode, index)));
        }
        html.push_str("</div></body></html>");
        html
    }

    fn entries(count: u32) -> Vec<ChapterEntry> {
        (1..=count)
            .map(|n| ChapterEntry {
                source_url: chapter_url(n),
                title: format!("Chapter {}", n),
                ordinal: n,
            })
            .collect()
    }

    fn fetcher_with_chapters(count: u32, images_per_chapter: usize) -> FakeFetcher {
        let mut fetcher = FakeFetcher::new();
        for n in 1..=count {
            fetcher = fetcher.page(&chapter_url(n), &chapter_html(n, images_per_chapter));
            for index in 0..images_per_chapter {
                fetcher = fetcher.bytes(&image_url(n, index), format!("jpeg-{}-{}", n, index).as_bytes());
            }
        }
        fetcher
    }

    fn scratch_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wtscrape_download_{}", name));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn run(
        fetcher: &mut FakeFetcher,
        root: &Path,
        chapters: &[ChapterEntry],
        options: &DownloadOptions,
    ) -> Result<Vec<DownloadOutcome>, DownloadError> {
        download_series(
            fetcher,
            root,
            SERIES,
            chapters,
            options,
            &StatusChannel::new(),
            &CancelToken::new(),
        )
    }

    #[test]
    fn make_file_name_safe_replaces_invalid_characters() {
        assert_eq!(make_file_name_safe("Ep 1: The \"End\"?"), "Ep 1_ The _End__");
        assert_eq!(make_file_name_safe("a/b\\c|d"), "a_b_c_d");
        assert_eq!(make_file_name_safe("plain title"), "plain title");
    }

    #[test]
    fn make_file_name_safe_replaces_control_characters() {
        assert_eq!(make_file_name_safe("a\tb\nc"), "a_b_c");
    }

    #[test]
    fn downloads_all_chapters_and_cleans_temp_dirs() {
        let root = scratch_root("all");
        let mut fetcher = fetcher_with_chapters(2, 3);
        let outcomes = run(&mut fetcher, &root, &entries(2), &DownloadOptions::default()).unwrap();
        assert_eq!(
            outcomes,
            vec![DownloadOutcome::Downloaded, DownloadOutcome::Downloaded]
        );

        let series_dir = root.join(SERIES);
        assert!(series_dir.join("(1) Chapter 1.cbz").exists());
        assert!(series_dir.join("(2) Chapter 2.cbz").exists());
        assert!(!series_dir.join("(1) Chapter 1").exists());
        assert!(!series_dir.join("(2) Chapter 2").exists());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn cbz_entries_follow_download_order() {
        let root = scratch_root("order");
        let mut fetcher = fetcher_with_chapters(1, 12);
        run(&mut fetcher, &root, &entries(1), &DownloadOptions::default()).unwrap();

        let artifact = root.join(SERIES).join("(1) Chapter 1.cbz");
        let mut archive = zip::ZipArchive::new(File::open(&artifact).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        let expected: Vec<String> = (0..12)
            .map(|i| format!("{}_Ch1_Img{:03}.jpg", SERIES, i))
            .collect();
        assert_eq!(names, expected);
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn image_requests_carry_the_chapter_referer() {
        let root = scratch_root("referer");
        let mut fetcher = fetcher_with_chapters(1, 2);
        run(&mut fetcher, &root, &entries(1), &DownloadOptions::default()).unwrap();
        assert_eq!(fetcher.referers.len(), 2);
        for referer in &fetcher.referers {
            assert_eq!(referer.as_deref(), Some(chapter_url(1).as_str()));
        }
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn window_skips_out_of_range_without_fetching() {
        let root = scratch_root("window");
        let mut fetcher = fetcher_with_chapters(5, 1);
        let options = DownloadOptions {
            format: OutputFormat::Cbz,
            start_chapter: 3,
            end_chapter: ChapterEnd::Bounded(4),
        };
        let outcomes = run(&mut fetcher, &root, &entries(5), &options).unwrap();
        assert_eq!(
            outcomes,
            vec![
                DownloadOutcome::SkippedOutOfRange,
                DownloadOutcome::SkippedOutOfRange,
                DownloadOutcome::Downloaded,
                DownloadOutcome::Downloaded,
                DownloadOutcome::SkippedOutOfRange,
            ]
        );
        // Only chapters 3 and 4 were touched: one page and one image each.
        assert!(fetcher.requests.iter().all(|u| u.contains("episode_no=3")
            || u.contains("episode_no=4")
            || u.contains("/ep3/")
            || u.contains("/ep4/")));
        assert_eq!(fetcher.requests.len(), 4);
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn rerun_is_idempotent_and_fetches_nothing() {
        let root = scratch_root("idempotent");
        let mut fetcher = fetcher_with_chapters(3, 2);
        let first = run(&mut fetcher, &root, &entries(3), &DownloadOptions::default()).unwrap();
        assert!(first.iter().all(|o| *o == DownloadOutcome::Downloaded));
        let requests_after_first = fetcher.requests.len();

        let second = run(&mut fetcher, &root, &entries(3), &DownloadOptions::default()).unwrap();
        assert!(second
            .iter()
            .all(|o| *o == DownloadOutcome::SkippedAlreadyExists));
        assert_eq!(fetcher.requests.len(), requests_after_first);
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn preexisting_artifact_is_skipped_and_others_download() {
        // Mirrors the two-page mock-site scenario: chapter 3's artifact is
        // already on disk, so only 1, 2, 4, 5 are fetched.
        let root = scratch_root("prefilled");
        let series_dir = root.join(SERIES);
        std::fs::create_dir_all(&series_dir).unwrap();
        std::fs::write(series_dir.join("(3) Chapter 3.cbz"), b"stub").unwrap();

        let mut fetcher = fetcher_with_chapters(5, 1);
        let outcomes = run(&mut fetcher, &root, &entries(5), &DownloadOptions::default()).unwrap();
        assert_eq!(
            outcomes,
            vec![
                DownloadOutcome::Downloaded,
                DownloadOutcome::Downloaded,
                DownloadOutcome::SkippedAlreadyExists,
                DownloadOutcome::Downloaded,
                DownloadOutcome::Downloaded,
            ]
        );
        assert!(!fetcher.requests.iter().any(|u| u.contains("episode_no=3")));
        assert_eq!(
            std::fs::read(series_dir.join("(3) Chapter 3.cbz")).unwrap(),
            b"stub"
        );
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn chapter_without_images_is_skipped_without_artifact() {
        let root = scratch_root("noimages");
        let mut fetcher = FakeFetcher::new().page(&chapter_url(1), &chapter_html(1, 0));
        let status = StatusChannel::new();
        let rx = status.subscribe();
        let outcomes = download_series(
            &mut fetcher,
            &root,
            SERIES,
            &entries(1),
            &DownloadOptions::default(),
            &status,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(outcomes, vec![DownloadOutcome::SkippedNoImages]);
        assert!(!root.join(SERIES).join("(1) Chapter 1.cbz").exists());
        assert!(!root.join(SERIES).join("(1) Chapter 1").exists());
        let lines: Vec<String> = rx.try_iter().collect();
        assert!(lines.iter().any(|l| l.contains("No images found")));
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn failed_image_fetch_aborts_chapter_and_cleans_up() {
        let root = scratch_root("imgfail");
        // Chapter page lists two images but only the first is served.
        let mut fetcher = FakeFetcher::new()
            .page(&chapter_url(1), &chapter_html(1, 2))
            .bytes(&image_url(1, 0), b"jpeg-1-0");
        let result = run(&mut fetcher, &root, &entries(1), &DownloadOptions::default());
        assert!(matches!(
            result,
            Err(DownloadError::Scrape(ScraperError::HttpStatus { status: 404, .. }))
        ));
        assert!(!root.join(SERIES).join("(1) Chapter 1.cbz").exists());
        assert!(!root.join(SERIES).join("(1) Chapter 1").exists());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn missing_episode_number_falls_back_to_ordinal() {
        let root = scratch_root("noep");
        let url = "https://www.webtoons.com/en/fantasy/test/ep-x/viewer?title_no=9";
        let chapters = vec![ChapterEntry {
            source_url: url.to_string(),
            title: "Unnumbered".to_string(),
            ordinal: 2,
        }];
        let mut fetcher = FakeFetcher::new()
            .page(url, &chapter_html(7, 1))
            .bytes(&image_url(7, 0), b"jpeg");
        let outcomes = run(&mut fetcher, &root, &chapters, &DownloadOptions::default()).unwrap();
        assert_eq!(outcomes, vec![DownloadOutcome::Downloaded]);
        assert!(root.join(SERIES).join("(2) Unnumbered.cbz").exists());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn unsafe_title_is_sanitized_in_artifact_name() {
        let root = scratch_root("unsafe");
        let chapters = vec![ChapterEntry {
            source_url: chapter_url(1),
            title: "Ep 1: a/b?".to_string(),
            ordinal: 1,
        }];
        let mut fetcher = fetcher_with_chapters(1, 1);
        run(&mut fetcher, &root, &chapters, &DownloadOptions::default()).unwrap();
        assert!(root.join(SERIES).join("(1) Ep 1_ a_b_.cbz").exists());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn cancellation_stops_before_any_fetch() {
        let root = scratch_root("cancel");
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut fetcher = fetcher_with_chapters(1, 1);
        let result = download_series(
            &mut fetcher,
            &root,
            SERIES,
            &entries(1),
            &DownloadOptions::default(),
            &StatusChannel::new(),
            &cancel,
        );
        assert!(matches!(result, Err(DownloadError::Cancelled)));
        assert!(fetcher.requests.is_empty());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn discovered_chapter_list_drives_the_downloader() {
        // Full pipeline against one fake site: a three-page listing (page 3
        // repeats page 1) discovered into C1..C5, then downloaded with
        // chapter 3's artifact already on disk.
        use crate::scraper::{discover_chapters, DiscoverOptions};
        use std::time::Duration;

        const LISTING: &str = "https://www.webtoons.com/en/fantasy/test/list?title_no=9";

        fn listing_html(episodes: &[u32]) -> String {
            let mut html = String::from(r#"<ul id="_listUl">"#);
            for n in episodes {
                html.push_str(&format!(
                    r#"<li><a href="{}"><span class="subj"><span>Chapter {}</span></span></a></li>"#,
                    chapter_url(*n),
                    n
                ));
            }
            html.push_str("</ul>");
            html
        }

        let root = scratch_root("pipeline");
        let series_dir = root.join(SERIES);
        std::fs::create_dir_all(&series_dir).unwrap();
        std::fs::write(series_dir.join("(3) Chapter 3.cbz"), b"stub").unwrap();

        let mut fetcher = fetcher_with_chapters(5, 1)
            .page(&format!("{}&page=1", LISTING), &listing_html(&[5, 4, 3]))
            .page(&format!("{}&page=2", LISTING), &listing_html(&[2, 1]))
            .page(&format!("{}&page=3", LISTING), &listing_html(&[5, 4, 3]));

        let options = DiscoverOptions {
            max_pages: None,
            page_delay: Duration::ZERO,
        };
        let chapters = discover_chapters(
            &mut fetcher,
            LISTING,
            &options,
            &StatusChannel::new(),
            &CancelToken::new(),
        )
        .unwrap();
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Chapter 1", "Chapter 2", "Chapter 3", "Chapter 4", "Chapter 5"]
        );
        let ordinals: Vec<u32> = chapters.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4, 5]);

        let outcomes = run(&mut fetcher, &root, &chapters, &DownloadOptions::default()).unwrap();
        assert_eq!(
            outcomes,
            vec![
                DownloadOutcome::Downloaded,
                DownloadOutcome::Downloaded,
                DownloadOutcome::SkippedAlreadyExists,
                DownloadOutcome::Downloaded,
                DownloadOutcome::Downloaded,
            ]
        );
        assert!(!fetcher.requests.iter().any(|u| u.contains("episode_no=3")));
        for n in [1u32, 2, 4, 5] {
            assert!(series_dir.join(format!("({}) Chapter {}.cbz", n, n)).exists());
        }
        assert_eq!(
            std::fs::read(series_dir.join("(3) Chapter 3.cbz")).unwrap(),
            b"stub"
        );
        std::fs::remove_dir_all(&root).ok();
    }
}

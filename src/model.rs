//! Canonical data model for discovered series and chapters.
//!
//! The discoverer produces `ChapterEntry` sequences; the downloader consumes
//! them and reports a `DownloadOutcome` per chapter.

use serde::Deserialize;
use std::path::PathBuf;

use crate::archive::OutputFormat;

/// Upper bound of a chapter window: a concrete chapter position or open-ended.
///
/// The textual form is an integer or the literal token `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterEnd {
    Bounded(u32),
    Open,
}

impl ChapterEnd {
    /// True if `position` lies at or below this bound.
    pub fn contains(&self, position: u32) -> bool {
        match self {
            ChapterEnd::Bounded(end) => position <= *end,
            ChapterEnd::Open => true,
        }
    }
}

impl std::fmt::Display for ChapterEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChapterEnd::Bounded(end) => write!(f, "{}", end),
            ChapterEnd::Open => write!(f, "end"),
        }
    }
}

/// One fully validated unit of work: a listing URL plus where and how to
/// save its chapters.
#[derive(Debug, Clone)]
pub struct SeriesRequest {
    pub listing_url: String,
    /// Derived from the listing URL; non-empty. Doubles as the on-disk
    /// series directory name.
    pub slug: String,
    pub save_root: PathBuf,
    pub format: OutputFormat,
    /// 1-based, inclusive. Default 1.
    pub start_chapter: u32,
    /// Inclusive upper bound. Default open.
    pub end_chapter: ChapterEnd,
}

/// One chapter in chronological order as produced by the discoverer.
///
/// Immutable once created; `ordinal` is assigned only after the discovered
/// sequence has been reversed into oldest-first order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterEntry {
    pub source_url: String,
    pub title: String,
    /// 1-based chronological position; oldest chapter is 1.
    pub ordinal: u32,
}

/// Per-chapter result of one downloader pass. Reported over the status
/// channel and returned to the caller; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded,
    SkippedAlreadyExists,
    SkippedOutOfRange,
    SkippedNoImages,
}

/// One entry of a `--queue` file: a JSON array of these.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueItem {
    pub url: String,
    #[serde(default = "default_start")]
    pub start: u32,
    /// Integer or the literal `end`.
    #[serde(default = "default_end")]
    pub end: String,
}

fn default_start() -> u32 {
    1
}

fn default_end() -> String {
    "end".to_string()
}

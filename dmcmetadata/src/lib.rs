//! Minimal media-metadata abstraction shared between DMC crates.
//!
//! This crate provides the shared [`MediaInfo`] record attached to resources in
//! the media tree, together with the capability traits the rest of the core
//! consumes: a [`MediaParser`] for container/stream introspection, a
//! [`MetadataEnricher`] for best-effort external lookups and a
//! [`SeriesCatalog`] for canonical show titles.
//!
//! # Design
//!
//! - **Shared once parsed**: a `MediaInfo` is handed out as `Arc<MediaInfo>`
//!   and shared between a resolved resource and any derived children cloned
//!   from it. The parsed payload (duration, mime type) is written during the
//!   parse and treated as immutable afterwards.
//! - **Bounded waits**: callers that need the duration synchronously use
//!   [`MediaInfo::wait_parsed`] with an explicit timeout instead of polling.
//! - **No I/O here**: filename-derived metadata ([`filename_metadata`]) is
//!   purely lexical; everything touching files lives behind the traits.
//!
//! # Examples
//!
//! ```rust
//! use dmcmetadata::MediaInfo;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let info = MediaInfo::new();
//! info.start_parsing();
//! info.set_duration(Some(130.0));
//! info.finish_parsing();
//!
//! assert!(info.wait_parsed(Duration::from_millis(10)).await);
//! assert_eq!(info.duration_secs(), Some(130.0));
//! # });
//! ```

mod filename;

pub use filename::{FilenameMetadata, filename_metadata, simplified_title};

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;

/// Errors produced by metadata capability providers.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The media file could not be opened or read.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An in-flight parse did not complete within the caller's deadline.
    #[error("parse timed out")]
    Timeout,

    /// An error occurred in a backend (catalog, enrichment API, ...).
    #[error("backend error: {0}")]
    Backend(String),
}

/// Convenience alias for metadata operations.
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Parse lifecycle of a [`MediaInfo`] record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Unparsed,
    Parsing,
    Parsed,
}

/// Coarse media type hint handed to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Image,
    Unknown,
}

/// Video-specific metadata, derived from the filename and possibly refined by
/// the catalog or the enrichment API.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoMetadata {
    /// Movie or show title.
    pub movie_or_show_name: Option<String>,
    /// Normalized form of the title, used for fuzzy matching.
    pub simplified_movie_or_show_name: Option<String>,
    /// Release year (movies).
    pub year: Option<String>,
    /// First-air year of the series (TV episodes).
    pub tv_series_start_year: Option<String>,
    pub tv_season: Option<String>,
    pub tv_episode_number: Option<String>,
    pub tv_episode_name: Option<String>,
    /// Edition tag such as "Extended" or "Remastered".
    pub extra_information: Option<String>,
    pub is_tv_episode: bool,
}

/// Mutable payload guarded by the record's lock.
#[derive(Debug, Default)]
struct MediaInfoInner {
    duration_secs: Option<f64>,
    mime_type: Option<String>,
    container: Option<String>,
    video: Option<VideoMetadata>,
}

/// Parsed information about one media file.
///
/// Shared as `Arc<MediaInfo>`; the parse state is published through a watch
/// channel so concurrent readers can await completion with a deadline.
#[derive(Debug)]
pub struct MediaInfo {
    state_tx: watch::Sender<ParseState>,
    inner: RwLock<MediaInfoInner>,
}

impl Default for MediaInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaInfo {
    /// Creates an empty, unparsed record.
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ParseState::Unparsed);
        Self {
            state_tx,
            inner: RwLock::new(MediaInfoInner::default()),
        }
    }

    pub fn parse_state(&self) -> ParseState {
        *self.state_tx.borrow()
    }

    pub fn is_parsed(&self) -> bool {
        self.parse_state() == ParseState::Parsed
    }

    /// Marks the record as being parsed. No-op if already past that state.
    pub fn start_parsing(&self) {
        self.state_tx.send_if_modified(|s| {
            if *s == ParseState::Unparsed {
                *s = ParseState::Parsing;
                true
            } else {
                false
            }
        });
    }

    /// Marks the parse as complete and wakes every waiter.
    pub fn finish_parsing(&self) {
        self.state_tx.send_if_modified(|s| {
            if *s != ParseState::Parsed {
                *s = ParseState::Parsed;
                true
            } else {
                false
            }
        });
    }

    /// Waits until the record is parsed, up to `timeout`.
    ///
    /// Returns `true` when the record reached [`ParseState::Parsed`] within
    /// the deadline, `false` on timeout. Never polls.
    pub async fn wait_parsed(&self, timeout: Duration) -> bool {
        if self.is_parsed() {
            return true;
        }
        let mut rx = self.state_tx.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|s| *s == ParseState::Parsed))
            .await
            .is_ok()
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.inner.read().unwrap().duration_secs
    }

    pub fn set_duration(&self, secs: Option<f64>) {
        self.inner.write().unwrap().duration_secs = secs;
    }

    pub fn mime_type(&self) -> Option<String> {
        self.inner.read().unwrap().mime_type.clone()
    }

    pub fn set_mime_type(&self, mime: Option<String>) {
        self.inner.write().unwrap().mime_type = mime;
    }

    pub fn container(&self) -> Option<String> {
        self.inner.read().unwrap().container.clone()
    }

    pub fn set_container(&self, container: Option<String>) {
        self.inner.write().unwrap().container = container;
    }

    pub fn has_video_metadata(&self) -> bool {
        self.inner.read().unwrap().video.is_some()
    }

    pub fn video_metadata(&self) -> Option<VideoMetadata> {
        self.inner.read().unwrap().video.clone()
    }

    /// Attaches video metadata, first write wins.
    ///
    /// Returns `false` (and leaves the record untouched) when metadata is
    /// already present; filename-derived metadata must never overwrite what
    /// an earlier pass or the enrichment API stored.
    pub fn set_video_metadata(&self, metadata: VideoMetadata) -> bool {
        let mut inner = self.inner.write().unwrap();
        if inner.video.is_some() {
            return false;
        }
        inner.video = Some(metadata);
        true
    }
}

/// Container/stream introspection capability.
///
/// The actual decoding lives outside this core; implementations typically
/// shell out to a probe tool or read tags directly.
#[async_trait]
pub trait MediaParser: Send + Sync {
    /// Parses `path` into `info`: duration, container, usually the mime type.
    ///
    /// Implementations drive the record's parse state themselves
    /// (`start_parsing` / `finish_parsing`) so concurrent readers can await
    /// completion.
    async fn parse(
        &self,
        info: &Arc<MediaInfo>,
        path: &Path,
        format_hint: Option<&str>,
        kind: MediaKind,
    ) -> Result<()>;

    /// Second pass filling anything the first pass left empty, notably the
    /// mime type.
    async fn post_parse(&self, info: &Arc<MediaInfo>, kind: MediaKind) -> Result<()>;
}

/// Best-effort external metadata enrichment.
///
/// Runs detached from the caller; failures are logged and swallowed by the
/// cache, never surfaced.
#[async_trait]
pub trait MetadataEnricher: Send + Sync {
    async fn enrich(&self, path: &Path, info: &Arc<MediaInfo>) -> Result<()>;
}

/// Canonical series-title catalog.
#[async_trait]
pub trait SeriesCatalog: Send + Sync {
    /// Looks up a stored series title similar to `name`, if any.
    async fn find_similar_series_title(&self, name: &str) -> Option<String>;

    /// Seeds a minimal series row with just the title, if absent.
    async fn seed_series(&self, name: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_parsed_returns_immediately_when_parsed() {
        let info = MediaInfo::new();
        info.finish_parsing();
        assert!(info.wait_parsed(Duration::from_millis(1)).await);
    }

    #[tokio::test]
    async fn wait_parsed_times_out_on_unparsed_record() {
        let info = MediaInfo::new();
        info.start_parsing();
        assert!(!info.wait_parsed(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn wait_parsed_wakes_up_when_parse_completes() {
        let info = Arc::new(MediaInfo::new());
        info.start_parsing();

        let waiter = info.clone();
        let handle =
            tokio::spawn(async move { waiter.wait_parsed(Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        info.set_duration(Some(42.0));
        info.finish_parsing();

        assert!(handle.await.unwrap());
    }

    #[test]
    fn video_metadata_first_write_wins() {
        let info = MediaInfo::new();
        let first = VideoMetadata {
            movie_or_show_name: Some("First".into()),
            ..Default::default()
        };
        let second = VideoMetadata {
            movie_or_show_name: Some("Second".into()),
            ..Default::default()
        };

        assert!(info.set_video_metadata(first));
        assert!(!info.set_video_metadata(second));
        assert_eq!(
            info.video_metadata().unwrap().movie_or_show_name.as_deref(),
            Some("First")
        );
    }

    #[test]
    fn parse_state_never_goes_backwards() {
        let info = MediaInfo::new();
        info.finish_parsing();
        info.start_parsing();
        assert_eq!(info.parse_state(), ParseState::Parsed);
    }
}

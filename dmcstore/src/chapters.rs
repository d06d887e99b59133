//! Chapter-split generator.
//!
//! A chapter folder examines the media item it wraps and synthesizes one
//! derived child per chapter interval, so a renderer can jump into the
//! middle of a long recording through plain container browsing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::resolver::media_kind_for_path;
use crate::store::{MediaStore, NodeResolver};
use crate::{Resource, ResourceId, Result, SplitRange};

/// Bounded wait for the source item's metadata parse.
const DURATION_WAIT: Duration = Duration::from_secs(5);

/// Synthesizes time-sliced derived children from one resolved media item.
///
/// With a duration of `d` seconds and an interval of `n` minutes, children
/// get split ranges `[60·n·1, d)`, `[60·n·2, d)`, ... — non-overlapping
/// starts, all ending at the original duration. A media shorter than one
/// interval resolves to an empty folder, which is a valid terminal state.
pub struct ChapterResolver {
    source: ResourceId,
    interval_minutes: u32,
    duration_wait: Duration,
}

impl ChapterResolver {
    /// `interval_minutes` is clamped to at least one minute.
    pub fn new(source: ResourceId, interval_minutes: u32) -> Self {
        Self {
            source,
            interval_minutes: interval_minutes.max(1),
            duration_wait: DURATION_WAIT,
        }
    }

    /// Changes the bounded wait on the source's in-flight parse.
    pub fn with_duration_wait(mut self, wait: Duration) -> Self {
        self.duration_wait = wait;
        self
    }
}

#[async_trait]
impl NodeResolver for ChapterResolver {
    async fn resolve(&self, store: &MediaStore, node: &Arc<Resource>) -> Result<()> {
        let Some(source) = store.get_node(self.source) else {
            tracing::warn!(node = %node.id(), source = %self.source, "chapter source vanished, folder resolves empty");
            return Ok(());
        };

        // The source must carry parsed metadata before slicing. When the
        // parent folder has not populated it yet, fetch it synchronously
        // through the cache (itself bounded by the parse timeout).
        if source.media().is_none() {
            if let Some(path) = source.path() {
                let filename = path.to_string_lossy().into_owned();
                if let Some(info) = store
                    .cache()
                    .get(&filename, path, None, media_kind_for_path(path))
                    .await
                {
                    source.set_media(info);
                }
            }
        }

        let Some(media) = source.media() else {
            tracing::warn!(source = %self.source, "no metadata available, chapter folder resolves empty");
            return Ok(());
        };

        if !media.is_parsed() && !media.wait_parsed(self.duration_wait).await {
            tracing::warn!(source = %self.source, "metadata parse timed out, chapter folder resolves empty");
            return Ok(());
        }

        let Some(duration) = media.duration_secs() else {
            tracing::warn!(source = %self.source, "parsed metadata has no duration, chapter folder resolves empty");
            return Ok(());
        };

        let nb_minutes = (duration / 60.0) as u64;
        let nb_intervals = nb_minutes / u64::from(self.interval_minutes);

        for i in 1..=nb_intervals {
            let start = 60.0 * i as f64 * f64::from(self.interval_minutes);
            let derived = store.clone_for_split(
                &source,
                SplitRange {
                    start,
                    end: duration,
                },
            );
            store.add_child(node.id(), derived.id())?;
        }
        Ok(())
    }
}

//! Filesystem-backed container resolution.

use async_trait::async_trait;
use dmcmetadata::MediaKind;
use std::path::Path;
use std::sync::Arc;

use crate::store::{MediaStore, NodeResolver};
use crate::{Resource, Result};

const AUDIO_EXTENSIONS: &[&str] = &["aac", "aiff", "flac", "m4a", "mp3", "ogg", "opus", "wav", "wma"];
const VIDEO_EXTENSIONS: &[&str] = &["avi", "m4v", "mkv", "mov", "mp4", "mpeg", "mpg", "ts", "webm", "wmv"];
const IMAGE_EXTENSIONS: &[&str] = &["bmp", "gif", "jpeg", "jpg", "png", "webp"];

/// Coarse media kind derived from the file extension.
pub fn media_kind_for_path(path: &Path) -> MediaKind {
    let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
        return MediaKind::Unknown;
    };
    if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Audio
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Video
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Image
    } else {
        MediaKind::Unknown
    }
}

/// Resolves a directory-backed container by listing its entries.
///
/// Children are registered in lexical name order. Media items get their
/// parsed metadata from the cache; a file the cache cannot parse is still
/// served as a bare resource (degraded, logged) rather than failing the
/// whole folder.
pub struct FolderResolver;

#[async_trait]
impl NodeResolver for FolderResolver {
    async fn resolve(&self, store: &MediaStore, node: &Arc<Resource>) -> Result<()> {
        let Some(dir) = node.path() else {
            return Ok(());
        };

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "unreadable directory entry, skipping");
                    None
                }
            })
            .collect();
        paths.sort();

        for path in paths {
            let child = match store.create_node_from_path(&path) {
                Ok(child) => child,
                Err(e) => {
                    // Scoped failure: one bad entry never aborts the folder.
                    tracing::warn!(path = %path.display(), error = %e, "cannot create resource, skipping");
                    continue;
                }
            };

            if !child.is_container() {
                attach_media(store, &child, &path).await;
            }
            store.add_child(node.id(), child.id())?;
        }
        Ok(())
    }
}

async fn attach_media(store: &MediaStore, child: &Arc<Resource>, path: &Path) {
    let kind = media_kind_for_path(path);
    if !matches!(kind, MediaKind::Audio | MediaKind::Video) {
        return;
    }

    let filename = path.to_string_lossy();
    let format_hint = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    match store
        .cache()
        .get(&filename, path, format_hint.as_deref(), kind)
        .await
    {
        Some(info) => {
            if kind == MediaKind::Video {
                store.cache().set_metadata_from_filename(path, &info).await;
            }
            child.set_media(info);
        }
        None => {
            tracing::warn!(path = %path.display(), "resource unavailable, serving without metadata");
        }
    }
}

//! # dmcstore
//!
//! Lazily-resolving tree of media resources served to UPnP renderers.
//!
//! The tree holds [`Resource`] nodes addressed by stable [`ResourceId`]s.
//! Containers are populated on demand by a [`NodeResolver`]: resolution runs
//! exactly once per node and per structural generation, concurrent callers
//! serialize on the node (never on the whole tree), and a failing subtree
//! degrades to an empty children set instead of aborting its siblings.
//!
//! Two resolvers ship with the crate:
//!
//! - [`FolderResolver`]: lists a backing directory and attaches parsed
//!   metadata fetched from the [`dmccache::MediaInfoCache`].
//! - [`ChapterResolver`]: synthesizes time-sliced derived children from an
//!   already-resolved media item, sharing its parsed metadata and engine
//!   assignment by reference.
//!
//! Every structural mutation bumps the parent container's update id and the
//! store-wide `SystemUpdateID`-style counter, so renderers can detect stale
//! browse results.

mod chapters;
mod resolver;
mod resource;
mod store;

pub use chapters::ChapterResolver;
pub use resolver::{FolderResolver, media_kind_for_path};
pub use resource::{
    EngineRef, ResolveState, Resource, ResourceId, SplitRange, TranscodeEngine,
};
pub use store::{MediaStore, NodeResolver, PLAYLIST_EXTENSIONS, is_playlist_path};

/// Errors surfaced by tree operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Resource not found: {0}")]
    NotFound(ResourceId),

    #[error("Resource is not a container: {0}")]
    NotAContainer(ResourceId),

    #[error("Resource has no backing path: {0}")]
    NoBackingPath(ResourceId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, StoreError>;

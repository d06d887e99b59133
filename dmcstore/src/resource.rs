//! Resource nodes of the media tree.

use dmcmetadata::MediaInfo;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::store::NodeResolver;

/// Opaque node identifier, unique within one server run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u64);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolution lifecycle of a container node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    Unresolved,
    Resolving,
    Resolved,
}

/// Time window `[start, end)` in seconds presented by a derived child in
/// place of the full media duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRange {
    pub start: f64,
    pub end: f64,
}

/// Transcoding engine assignment, shared by reference between a resolved
/// item and its derived children. The engine itself lives outside this core.
#[derive(Debug)]
pub struct TranscodeEngine {
    pub name: String,
}

pub type EngineRef = Arc<TranscodeEngine>;

/// Mutable per-node state, guarded by one short-lived mutex.
#[derive(Default)]
pub(crate) struct NodeState {
    pub(crate) name: Option<String>,
    pub(crate) no_name: bool,
    pub(crate) parent: Option<ResourceId>,
    pub(crate) children: Vec<ResourceId>,
    pub(crate) resolve_state: Option<ResolveState>,
    pub(crate) generation: u64,
    pub(crate) media: Option<Arc<MediaInfo>>,
    pub(crate) engine: Option<EngineRef>,
    pub(crate) audio_track: Option<u32>,
    pub(crate) subtitle_track: Option<u32>,
    pub(crate) split_range: Option<SplitRange>,
    pub(crate) last_error: Option<String>,
}

/// One element of the media hierarchy: file, folder or synthetic container.
///
/// Shared as `Arc<Resource>`; structural mutations go through the
/// [`crate::MediaStore`] so change counters stay consistent. The resolution
/// mutex serializes resolution per node: unrelated subtrees resolve fully in
/// parallel.
pub struct Resource {
    id: ResourceId,
    path: Option<PathBuf>,
    is_container: bool,
    pub(crate) resolver: Option<Arc<dyn NodeResolver>>,
    update_id: AtomicU32,
    pub(crate) resolve_lock: tokio::sync::Mutex<()>,
    pub(crate) state: Mutex<NodeState>,
}

impl Resource {
    pub(crate) fn new(
        id: ResourceId,
        name: Option<String>,
        path: Option<PathBuf>,
        is_container: bool,
        resolver: Option<Arc<dyn NodeResolver>>,
    ) -> Self {
        Self {
            id,
            path,
            is_container,
            resolver,
            update_id: AtomicU32::new(1),
            resolve_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(NodeState {
                name,
                ..Default::default()
            }),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_container(&self) -> bool {
        self.is_container
    }

    pub fn name(&self) -> Option<String> {
        self.state.lock().unwrap().name.clone()
    }

    /// Display name, falling back to the backing file name. Nodes flagged
    /// `no_name` are rendered by position/context in the serving layer.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name() {
            return name;
        }
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("#{}", self.id))
    }

    pub fn no_name(&self) -> bool {
        self.state.lock().unwrap().no_name
    }

    pub fn parent(&self) -> Option<ResourceId> {
        self.state.lock().unwrap().parent
    }

    /// Child ids in display order (insertion order).
    pub fn children(&self) -> Vec<ResourceId> {
        self.state.lock().unwrap().children.clone()
    }

    pub fn resolve_state(&self) -> ResolveState {
        self.state
            .lock()
            .unwrap()
            .resolve_state
            .unwrap_or(ResolveState::Unresolved)
    }

    /// Structural generation, bumped by [`crate::MediaStore::invalidate`].
    pub fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }

    pub fn media(&self) -> Option<Arc<MediaInfo>> {
        self.state.lock().unwrap().media.clone()
    }

    pub fn set_media(&self, media: Arc<MediaInfo>) {
        self.state.lock().unwrap().media = Some(media);
    }

    pub fn engine(&self) -> Option<EngineRef> {
        self.state.lock().unwrap().engine.clone()
    }

    pub fn set_engine(&self, engine: Option<EngineRef>) {
        self.state.lock().unwrap().engine = engine;
    }

    pub fn audio_track(&self) -> Option<u32> {
        self.state.lock().unwrap().audio_track
    }

    pub fn subtitle_track(&self) -> Option<u32> {
        self.state.lock().unwrap().subtitle_track
    }

    pub fn set_track_selection(&self, audio: Option<u32>, subtitle: Option<u32>) {
        let mut state = self.state.lock().unwrap();
        state.audio_track = audio;
        state.subtitle_track = subtitle;
    }

    pub fn split_range(&self) -> Option<SplitRange> {
        self.state.lock().unwrap().split_range
    }

    /// Error recorded by the last failed resolution, if any.
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().unwrap().last_error.clone()
    }

    /// Per-node change counter. Monotonically increasing, never wraps
    /// within a server run.
    pub fn update_id(&self) -> u32 {
        self.update_id.load(Ordering::SeqCst)
    }

    pub(crate) fn bump_update_id(&self) -> u32 {
        self.update_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("container", &self.is_container)
            .field("state", &self.resolve_state())
            .finish()
    }
}

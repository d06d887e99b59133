//! The media store: composition root holding nodes, ids and change counters.

use async_trait::async_trait;
use dmccache::MediaInfoCache;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::resource::{NodeState, ResolveState, Resource, ResourceId, SplitRange};
use crate::{FolderResolver, Result, StoreError};

/// Populates a container's children on demand.
///
/// Implementations register children through the store (`add_child`) so the
/// change counters stay consistent, and must collect everything they need
/// before mutating the node: on error the store rolls the children back to
/// the pre-resolution set.
#[async_trait]
pub trait NodeResolver: Send + Sync {
    async fn resolve(&self, store: &MediaStore, node: &Arc<Resource>) -> Result<()>;
}

/// Tree of media resources exposed to the protocol layer.
///
/// Node lookup is a read-mostly map guarded by an `RwLock`; per-node
/// resolution serializes on the node's own mutex, so resolving one subtree
/// never blocks an unrelated one.
pub struct MediaStore {
    nodes: RwLock<HashMap<ResourceId, Arc<Resource>>>,
    next_id: AtomicU64,
    system_update_id: AtomicU32,
    root_id: ResourceId,
    cache: Arc<MediaInfoCache>,
}

impl MediaStore {
    /// Creates a store with an empty root container.
    pub fn new(cache: Arc<MediaInfoCache>) -> Self {
        let store = Self {
            nodes: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            system_update_id: AtomicU32::new(1),
            root_id: ResourceId(0),
            cache,
        };
        let root = store.register(Some("root".into()), None, true, None);
        debug_assert_eq!(root.id(), store.root_id);
        store
    }

    pub fn root_id(&self) -> ResourceId {
        self.root_id
    }

    pub fn cache(&self) -> &Arc<MediaInfoCache> {
        &self.cache
    }

    /// Store-wide change counter (UPnP `SystemUpdateID` semantics).
    pub fn system_update_id(&self) -> u32 {
        self.system_update_id.load(Ordering::SeqCst)
    }

    pub fn get_node(&self, id: ResourceId) -> Option<Arc<Resource>> {
        self.nodes.read().unwrap().get(&id).cloned()
    }

    /// Creates and registers a node backed by a filesystem path.
    ///
    /// Directories become containers with a [`FolderResolver`], playlist
    /// files become containers (their children are registered by the
    /// playlist mutator), anything else becomes a plain item. The node is
    /// not attached to a parent yet.
    pub fn create_node_from_path(&self, path: &Path) -> Result<Arc<Resource>> {
        let is_dir = std::fs::metadata(path)?.is_dir();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        let resolver: Option<Arc<dyn NodeResolver>> = if is_dir {
            Some(Arc::new(FolderResolver))
        } else {
            None
        };
        let is_container = is_dir || is_playlist_path(path);
        Ok(self.register(name, Some(path.to_path_buf()), is_container, resolver))
    }

    /// Creates a synthetic (virtual) container with no backing path.
    pub fn create_container(
        &self,
        name: &str,
        resolver: Option<Arc<dyn NodeResolver>>,
    ) -> Arc<Resource> {
        self.register(Some(name.to_string()), None, true, resolver)
    }

    fn register(
        &self,
        name: Option<String>,
        path: Option<std::path::PathBuf>,
        is_container: bool,
        resolver: Option<Arc<dyn NodeResolver>>,
    ) -> Arc<Resource> {
        let id = ResourceId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let node = Arc::new(Resource::new(id, name, path, is_container, resolver));
        self.nodes.write().unwrap().insert(id, node.clone());
        node
    }

    /// Attaches `child` under `parent` and bumps the parent's change counter.
    pub fn add_child(&self, parent_id: ResourceId, child_id: ResourceId) -> Result<()> {
        let parent = self
            .get_node(parent_id)
            .ok_or(StoreError::NotFound(parent_id))?;
        if !parent.is_container() {
            return Err(StoreError::NotAContainer(parent_id));
        }
        let child = self
            .get_node(child_id)
            .ok_or(StoreError::NotFound(child_id))?;

        {
            let mut state = parent.state.lock().unwrap();
            state.children.push(child_id);
        }
        {
            let mut state = child.state.lock().unwrap();
            state.parent = Some(parent_id);
        }
        self.notify_container_updated(&parent);
        Ok(())
    }

    /// Detaches `child` from `parent`, drops its subtree and bumps the
    /// parent's change counter.
    pub fn remove_child(&self, parent_id: ResourceId, child_id: ResourceId) -> Result<()> {
        let parent = self
            .get_node(parent_id)
            .ok_or(StoreError::NotFound(parent_id))?;

        let removed = {
            let mut state = parent.state.lock().unwrap();
            let before = state.children.len();
            state.children.retain(|c| *c != child_id);
            state.children.len() != before
        };
        if !removed {
            return Err(StoreError::NotFound(child_id));
        }

        self.drop_subtree(child_id);
        self.notify_container_updated(&parent);
        Ok(())
    }

    /// Bumps a container's change counter without a structural edit (used
    /// when the backing file itself changed, e.g. a playlist rewrite).
    pub fn mark_updated(&self, id: ResourceId) -> Result<()> {
        let node = self.get_node(id).ok_or(StoreError::NotFound(id))?;
        self.notify_container_updated(&node);
        Ok(())
    }

    fn notify_container_updated(&self, node: &Arc<Resource>) {
        let node_update = node.bump_update_id();
        let system = self.system_update_id.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(
            container = %node.id(),
            update_id = node_update,
            system_update_id = system,
            "container updated"
        );
    }

    fn drop_subtree(&self, id: ResourceId) {
        let Some(node) = self.nodes.write().unwrap().remove(&id) else {
            return;
        };
        for child in node.children() {
            self.drop_subtree(child);
        }
    }

    /// Resolves a container's children, exactly once per structural
    /// generation.
    ///
    /// Concurrent callers on the same node serialize on its resolution
    /// mutex: one resolution executes, the others observe the completed
    /// children. A failing resolver is scoped to this node: the error is
    /// logged and recorded, the children roll back to the pre-resolution
    /// set, and the node still reaches `Resolved`.
    pub async fn resolve(&self, id: ResourceId) -> Result<Vec<ResourceId>> {
        let node = self.get_node(id).ok_or(StoreError::NotFound(id))?;

        let _guard = node.resolve_lock.lock().await;
        if node.resolve_state() == ResolveState::Resolved {
            return Ok(node.children());
        }

        let children_before = {
            let mut state = node.state.lock().unwrap();
            state.resolve_state = Some(ResolveState::Resolving);
            state.last_error = None;
            state.children.clone()
        };

        if let Some(resolver) = node.resolver.clone() {
            if let Err(e) = resolver.resolve(self, &node).await {
                tracing::warn!(node = %id, error = %e, "resolution failed, node degrades to empty");
                let added: Vec<ResourceId> = {
                    let mut state = node.state.lock().unwrap();
                    state.last_error = Some(e.to_string());
                    let keep = children_before.len().min(state.children.len());
                    state.children.split_off(keep)
                };
                for child in added {
                    self.drop_subtree(child);
                }
            }
        }

        node.state.lock().unwrap().resolve_state = Some(ResolveState::Resolved);
        Ok(node.children())
    }

    /// Invalidates a resolved container so the next [`MediaStore::resolve`]
    /// repopulates it. Its current children (derived ones included) are
    /// destroyed.
    pub async fn invalidate(&self, id: ResourceId) -> Result<()> {
        let node = self.get_node(id).ok_or(StoreError::NotFound(id))?;

        let _guard = node.resolve_lock.lock().await;
        let children = {
            let mut state = node.state.lock().unwrap();
            state.resolve_state = Some(ResolveState::Unresolved);
            state.generation += 1;
            state.last_error = None;
            std::mem::take(&mut state.children)
        };
        for child in children {
            self.drop_subtree(child);
        }
        self.notify_container_updated(&node);
        Ok(())
    }

    /// Clones an already-resolved item into a derived (chapter) child.
    ///
    /// Only per-instance state is copied: the no-name flag, the split range
    /// and the engine/track assignment handles. The parsed `MediaInfo` is
    /// shared by reference, never re-parsed.
    pub fn clone_for_split(&self, source: &Arc<Resource>, range: SplitRange) -> Arc<Resource> {
        let id = ResourceId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let node = Arc::new(Resource::new(
            id,
            source.name(),
            source.path().map(|p| p.to_path_buf()),
            false,
            None,
        ));
        {
            let mut state = node.state.lock().unwrap();
            let NodeState {
                no_name,
                media,
                engine,
                audio_track,
                subtitle_track,
                split_range,
                ..
            } = &mut *state;
            *no_name = true;
            *media = source.media();
            *engine = source.engine();
            *audio_track = source.audio_track();
            *subtitle_track = source.subtitle_track();
            *split_range = Some(range);
        }
        self.nodes.write().unwrap().insert(id, node.clone());
        node
    }
}

/// Extensions treated as playlist containers by the tree.
pub const PLAYLIST_EXTENSIONS: &[&str] = &["m3u", "m3u8", "pls"];

/// True when `path` names a supported on-disk playlist.
///
/// The extension match is case-sensitive: `list.M3U` is not a playlist.
pub fn is_playlist_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| PLAYLIST_EXTENSIONS.contains(&ext))
}

impl std::fmt::Debug for MediaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStore")
            .field("nodes", &self.nodes.read().unwrap().len())
            .field("system_update_id", &self.system_update_id())
            .finish()
    }
}

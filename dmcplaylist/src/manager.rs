//! Opérations de mutation des playlists.

use dmcstore::{MediaStore, Resource, ResourceId, is_playlist_path};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::relpath::relative_song_path;
use crate::{Error, Result};

/// Descripteur de création d'une playlist.
///
/// La sérialisation DIDL du nouvel objet est du ressort de la couche
/// protocole ; ce descripteur porte l'identité et le contenu initial.
#[derive(Debug, Clone)]
pub struct CreatedPlaylist {
    pub id: ResourceId,
    pub parent_id: ResourceId,
    pub name: String,
    /// Lignes du fichier fraîchement créé (en-tête comprise).
    pub entries: Vec<String>,
}

/// Mutateur de playlists adossé à l'arbre de ressources.
///
/// Le fichier sur disque fait autorité ; chaque mutation réussie le réécrit
/// atomiquement puis incrémente le compteur de changement du conteneur.
/// Une mutation refusée laisse le fichier intact octet pour octet.
pub struct PlaylistManager {
    store: Arc<MediaStore>,
}

impl PlaylistManager {
    pub fn new(store: Arc<MediaStore>) -> Self {
        Self { store }
    }

    /// Ajoute un morceau à une playlist.
    ///
    /// Le doublon est détecté sur les deux formes littérales du chemin,
    /// absolue et relative ; dans ce cas rien n'est modifié. Sinon l'entrée
    /// relative est ajoutée en fin de fichier, le morceau est enregistré
    /// comme nouvelle ressource sous le conteneur de la playlist et le
    /// compteur de changement est incrémenté.
    pub async fn add_song(&self, song_id: ResourceId, playlist_id: ResourceId) -> Result<ResourceId> {
        let playlist_path = self.playlist_path(playlist_id)?;
        let song_path = self.song_path(song_id)?;

        let absolute = song_path.to_string_lossy().into_owned();
        let relative = relative_song_path(&song_path, &playlist_path);
        let mut entries = read_playlist(&playlist_path)?;

        if entries.iter().any(|e| *e == absolute || *e == relative) {
            tracing::trace!(entry = %relative, "song already in playlist");
            return Err(Error::DuplicateEntry(format!("{song_id}")));
        }

        entries.push(relative);
        write_playlist_atomic(&playlist_path, &entries)?;

        let new_entry = self.store.create_node_from_path(&song_path)?;
        self.store.add_child(playlist_id, new_entry.id())?;
        tracing::debug!(playlist = %playlist_id, song = %new_entry.id(), "song added to playlist");
        Ok(new_entry.id())
    }

    /// Retire un morceau d'une playlist et retourne la liste mise à jour.
    ///
    /// Échoue avec [`Error::NotFound`] quand ni la forme absolue ni la
    /// forme relative du chemin n'apparaît dans le fichier.
    pub async fn remove_song(
        &self,
        song_id: ResourceId,
        playlist_id: ResourceId,
    ) -> Result<Vec<String>> {
        let playlist_path = self.playlist_path(playlist_id)?;
        let song_path = self.song_path(song_id)?;

        let absolute = song_path.to_string_lossy().into_owned();
        let relative = relative_song_path(&song_path, &playlist_path);
        let mut entries = read_playlist(&playlist_path)?;

        let position = entries
            .iter()
            .position(|e| *e == absolute || *e == relative)
            .ok_or_else(|| Error::NotFound(format!("{song_id}")))?;
        entries.remove(position);

        write_playlist_atomic(&playlist_path, &entries)?;
        self.store.mark_updated(playlist_id)?;
        tracing::debug!(playlist = %playlist_id, song = %song_id, "song removed from playlist");
        Ok(entries)
    }

    /// Crée une playlist vide sous un conteneur.
    ///
    /// Le fichier créé commence par la ligne `#EXTM3U` suivie d'une ligne
    /// vide, puis la ressource est enregistrée sous le parent.
    pub async fn create_playlist(&self, parent_id: ResourceId, name: &str) -> Result<CreatedPlaylist> {
        if name.trim().is_empty() {
            return Err(Error::InvalidName("no playlist name provided".into()));
        }
        if !is_playlist_path(Path::new(name)) {
            return Err(Error::InvalidName(format!(
                "playlist extension must be one of .m3u, .m3u8, .pls: {name}"
            )));
        }

        let parent = self.container(parent_id)?;
        let parent_path = parent
            .path()
            .ok_or_else(|| Error::NotFound(format!("{parent_id}")))?;
        let playlist_path = parent_path.join(name);
        if playlist_path.exists() {
            return Err(Error::AlreadyExists(playlist_path.display().to_string()));
        }

        std::fs::write(&playlist_path, "#EXTM3U\n\n")?;
        tracing::trace!(path = %playlist_path.display(), "empty playlist created");

        let node = self.store.create_node_from_path(&playlist_path)?;
        self.store.add_child(parent_id, node.id())?;
        tracing::debug!(playlist = %node.id(), parent = %parent_id, "playlist registered");

        Ok(CreatedPlaylist {
            id: node.id(),
            parent_id,
            name: name.to_string(),
            entries: read_playlist(&playlist_path)?,
        })
    }

    fn container(&self, id: ResourceId) -> Result<Arc<Resource>> {
        let node = self
            .store
            .get_node(id)
            .ok_or_else(|| Error::NotFound(format!("{id}")))?;
        if !node.is_container() {
            return Err(Error::NotFound(format!("{id}")));
        }
        Ok(node)
    }

    /// Chemin du fichier de playlist derrière un conteneur.
    fn playlist_path(&self, playlist_id: ResourceId) -> Result<PathBuf> {
        let playlist = self.container(playlist_id)?;
        playlist
            .path()
            .filter(|p| is_playlist_path(p))
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::NotFound(format!("{playlist_id}")))
    }

    fn song_path(&self, song_id: ResourceId) -> Result<PathBuf> {
        let song = self
            .store
            .get_node(song_id)
            .ok_or_else(|| Error::NotFound(format!("{song_id}")))?;
        song.path()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::NotFound(format!("{song_id}")))
    }
}

/// Relit les entrées courantes, en-tête et lignes vides comprises.
fn read_playlist(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(Error::NotFound(format!(
            "playlist does not exist: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().map(str::to_string).collect())
}

/// Réécriture atomique : fichier temporaire dans le même répertoire puis
/// rename par-dessus l'original, jamais d'écriture en place.
fn write_playlist_atomic(path: &Path, entries: &[String]) -> Result<()> {
    let mut content = entries.join("\n");
    content.push('\n');

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "playlist".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&tmp, content)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

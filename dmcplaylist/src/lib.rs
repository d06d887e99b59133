//! # dmcplaylist - Mutateur de playlists sur disque
//!
//! Cette crate manipule les playlists (`.m3u`, `.m3u8`, `.pls`) adossées à
//! l'arbre de ressources :
//! - ajout/retrait de morceaux avec calcul exact du chemin relatif au
//!   répertoire de la playlist
//! - réécriture atomique du fichier (fichier temporaire puis rename, jamais
//!   d'édition en place)
//! - enregistrement des nouvelles ressources dans l'arbre et incrément des
//!   compteurs de changement du conteneur
//!
//! Le format sur disque fait autorité : texte UTF-8, un chemin par ligne,
//! en-tête `#EXTM3U` suivi d'une ligne vide pour les fichiers créés ici.
//! Les chemins contenant un saut de ligne ne sont pas supportés.
//!
//! # Exemple d'utilisation
//!
//! ```rust,no_run
//! use dmcplaylist::PlaylistManager;
//! use dmcstore::MediaStore;
//! use std::sync::Arc;
//!
//! # async fn demo(store: Arc<MediaStore>, song_id: dmcstore::ResourceId, folder_id: dmcstore::ResourceId) -> dmcplaylist::Result<()> {
//! let manager = PlaylistManager::new(store);
//!
//! let created = manager.create_playlist(folder_id, "road-trip.m3u8").await?;
//! manager.add_song(song_id, created.id).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod manager;
mod relpath;

// Réexports publics
pub use error::{Error, Result};
pub use manager::{CreatedPlaylist, PlaylistManager};
pub use relpath::relative_song_path;

//! # dmccache - Cache de métadonnées médias à trois niveaux
//!
//! Cette crate fournit le service de cache consulté par le résolveur de
//! l'arbre de ressources :
//! - **Niveau 1** : map en mémoire `filename -> Weak<MediaInfo>`, valide tant
//!   qu'un propriétaire fort (une ressource résolue) référence l'enregistrement
//! - **Niveau 2** : store persistant SQLite indexé par `(filename, modified)`,
//!   source d'autorité — une entrée de niveau 1 peut disparaître à tout moment
//! - **Niveau 3** : parse frais via le [`MediaParser`] externe, avec
//!   enrichissement asynchrone best-effort détaché de l'appelant
//!
//! # Exemple d'utilisation
//!
//! ```rust,no_run
//! use dmccache::{ConnectionPool, MediaInfoCache};
//! use dmcmetadata::MediaKind;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn demo(parser: Arc<dyn dmcmetadata::MediaParser>) -> dmccache::Result<()> {
//! let pool = ConnectionPool::open(Path::new("media.db"), 4)?;
//! let cache = MediaInfoCache::new(pool, parser);
//!
//! let info = cache
//!     .get("/music/song.flac", Path::new("/music/song.flac"), None, MediaKind::Audio)
//!     .await;
//! if let Some(info) = info {
//!     println!("duration: {:?}", info.duration_secs());
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
pub mod db;
mod pool;
mod series;

// Réexports publics
pub use cache::MediaInfoCache;
pub use pool::{ConnectionPool, PooledConnection};
pub use series::SqliteSeriesCatalog;

/// Erreurs du cache de métadonnées
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata error: {0}")]
    Metadata(#[from] dmcmetadata::MetadataError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type Result spécialisé pour dmccache
pub type Result<T> = std::result::Result<T, Error>;

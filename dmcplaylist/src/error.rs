//! Types d'erreurs pour dmcplaylist

/// Erreurs de mutation de playlist
///
/// Toutes les variantes sont retournées typées à l'appelant, avec une clé de
/// message utilisateur via [`Error::message_key`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Song or playlist not found: {0}")]
    NotFound(String),

    #[error("Song already in playlist: {0}")]
    DuplicateEntry(String),

    #[error("Invalid playlist name: {0}")]
    InvalidName(String),

    #[error("Playlist already exists: {0}")]
    AlreadyExists(String),

    #[error("Store error: {0}")]
    Store(#[from] dmcstore::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Clé de message destinée à la couche de présentation.
    pub fn message_key(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "SongNotInPlaylist",
            Error::DuplicateEntry(_) => "SongAlreadyInPlaylist",
            Error::InvalidName(_) => "InvalidPlaylistName",
            Error::AlreadyExists(_) => "PlaylistAlreadyExists",
            Error::Store(_) => "InternalStoreError",
            Error::Io(_) => "PlaylistIoError",
        }
    }
}

/// Type Result spécialisé pour dmcplaylist
pub type Result<T> = std::result::Result<T, Error>;

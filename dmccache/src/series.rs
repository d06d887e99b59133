//! Catalogue de séries adossé au store persistant.

use async_trait::async_trait;
use dmcmetadata::{MetadataError, SeriesCatalog, simplified_title};

use crate::ConnectionPool;

/// Implémentation [`SeriesCatalog`] sur la table `TV_SERIES`.
///
/// La comparaison se fait sur la forme simplifiée du titre : "Word & Word"
/// et "word and word" désignent la même série.
#[derive(Debug, Clone)]
pub struct SqliteSeriesCatalog {
    pool: ConnectionPool,
}

impl SqliteSeriesCatalog {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SeriesCatalog for SqliteSeriesCatalog {
    async fn find_similar_series_title(&self, name: &str) -> Option<String> {
        let conn = self.pool.acquire_if_available()?;
        match crate::db::find_series_title(&conn, &simplified_title(name)) {
            Ok(title) => title,
            Err(e) => {
                tracing::debug!(name, error = %e, "series title lookup failed");
                None
            }
        }
    }

    async fn seed_series(&self, name: &str) -> dmcmetadata::Result<()> {
        let Some(conn) = self.pool.acquire_if_available() else {
            return Err(MetadataError::Backend("no database connection".into()));
        };
        crate::db::seed_series(&conn, name, &simplified_title(name))
            .map_err(|e| MetadataError::Backend(e.to_string()))
    }
}

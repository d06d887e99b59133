//! Service de cache des métadonnées médias.
//!
//! Construit explicitement au démarrage du serveur et passé par handle au
//! résolveur et à l'arbre de ressources. Pas de singleton global : le cycle
//! de vie est init au démarrage, [`MediaInfoCache::clear`] au rescan,
//! [`MediaInfoCache::shutdown`] à l'arrêt.

use dmcmetadata::{
    MediaInfo, MediaKind, MediaParser, MetadataEnricher, SeriesCatalog, VideoMetadata,
    filename_metadata, simplified_title,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::ConnectionPool;

/// Attente bornée par défaut sur un parse en cours.
const DEFAULT_PARSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Cache de métadonnées à trois niveaux.
///
/// Le niveau 1 (map mémoire à références faibles) est une pure optimisation :
/// une entrée n'est valide que tant qu'une ressource résolue détient encore
/// l'`Arc<MediaInfo>`. Le niveau 2 (SQLite) fait autorité. Le niveau 3 est le
/// parse frais via le [`MediaParser`] injecté.
///
/// La map est une section critique unique tenue sur toute la durée d'un
/// `get` : les opérations concurrentes sur le même fichier n'exécutent
/// jamais deux parses, au prix d'une sérialisation des lookups (limite de
/// scalabilité connue, acceptable à échelle modérée).
pub struct MediaInfoCache {
    store: Mutex<HashMap<String, Weak<MediaInfo>>>,
    pool: ConnectionPool,
    parser: Arc<dyn MediaParser>,
    enricher: Option<Arc<dyn MetadataEnricher>>,
    catalog: Option<Arc<dyn SeriesCatalog>>,
    parse_timeout: Duration,
    shutdown: CancellationToken,
}

impl MediaInfoCache {
    /// Crée le service de cache.
    pub fn new(pool: ConnectionPool, parser: Arc<dyn MediaParser>) -> Self {
        Self {
            store: Mutex::new(HashMap::new()),
            pool,
            parser,
            enricher: None,
            catalog: None,
            parse_timeout: DEFAULT_PARSE_TIMEOUT,
            shutdown: CancellationToken::new(),
        }
    }

    /// Attache l'API d'enrichissement externe (niveau 3 asynchrone).
    pub fn with_enricher(mut self, enricher: Arc<dyn MetadataEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Attache le catalogue de titres de séries.
    pub fn with_catalog(mut self, catalog: Arc<dyn SeriesCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Change l'attente bornée sur un parse en cours.
    pub fn with_parse_timeout(mut self, timeout: Duration) -> Self {
        self.parse_timeout = timeout;
        self
    }

    /// Récupère les métadonnées parsées d'un fichier.
    ///
    /// Niveaux consultés dans l'ordre : map mémoire, store persistant
    /// (une ligne dont l'horodatage ne correspond plus au fichier est
    /// périmée et re-parsée), parse frais. Le résultat est réécrit dans le
    /// store (transaction commit-ou-rollback, connexion toujours restituée)
    /// et dans la map.
    ///
    /// Retourne `None` quand le parse échoue sur une erreur d'E/S à
    /// l'ouverture du fichier ; l'échec est loggé, jamais propagé.
    pub async fn get(
        &self,
        filename: &str,
        path: &Path,
        format_hint: Option<&str>,
        kind: MediaKind,
    ) -> Option<Arc<MediaInfo>> {
        let mut store = self.store.lock().await;

        if let Some(info) = store.get(filename).and_then(Weak::upgrade) {
            return Some(info);
        }

        let modified = match mtime_millis(path) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(filename, error = %e, "cannot stat media file");
                return None;
            }
        };

        let mut info = self.load_cached(filename, modified);

        if let Some(rec) = &info {
            // Ligne de cache incomplète : terminer le travail et réécrire.
            let mut dirty = false;
            if !rec.is_parsed() {
                if let Err(e) = self.parser.parse(rec, path, format_hint, kind).await {
                    tracing::warn!(filename, error = %e, "media parse failed");
                    return None;
                }
                dirty = true;
            }
            if rec.mime_type().is_none() {
                match self.parser.post_parse(rec, kind).await {
                    Ok(()) => dirty = true,
                    Err(e) => {
                        tracing::debug!(filename, error = %e, "post-parse failed");
                    }
                }
            }
            if dirty {
                self.write_back(filename, modified, kind, rec);
            }
        }

        if info.is_none() {
            let rec = Arc::new(MediaInfo::new());
            if let Err(e) = self.parser.parse(&rec, path, format_hint, kind).await {
                tracing::warn!(filename, error = %e, "media parse failed");
                return None;
            }
            if !rec.wait_parsed(self.parse_timeout).await {
                tracing::debug!(
                    filename,
                    "parse still running after bounded wait, continuing with partial metadata"
                );
            }
            if rec.mime_type().is_none() {
                if let Err(e) = self.parser.post_parse(&rec, kind).await {
                    tracing::debug!(filename, error = %e, "post-parse failed");
                }
            }
            if rec.is_parsed() {
                self.write_back(filename, modified, kind, &rec);
            }
            info = Some(rec);
        }

        let rec = info.expect("media info populated above");
        store.insert(filename.to_string(), Arc::downgrade(&rec));
        Some(rec)
    }

    /// Relit les métadonnées vidéo seules (map mémoire puis store).
    pub async fn video_metadata(&self, filename: &str) -> Option<VideoMetadata> {
        {
            let store = self.store.lock().await;
            if let Some(info) = store.get(filename).and_then(Weak::upgrade) {
                return info.video_metadata();
            }
        }

        let conn = self.pool.acquire_if_available()?;
        match crate::db::get_video_metadata(&conn, filename) {
            Ok(video) => video,
            Err(e) => {
                tracing::debug!(filename, error = %e, "video metadata lookup failed");
                None
            }
        }
    }

    /// Dérive titre/année/saison/épisode du nom de fichier et les attache à
    /// l'enregistrement.
    ///
    /// Idempotent : ne fait rien quand des métadonnées vidéo sont déjà
    /// présentes. Pour un épisode TV, un titre du catalogue dont la forme
    /// simplifiée coïncide l'emporte sur le titre dérivé (politique de
    /// fusion floue), et une ligne de série minimale est semée si absente.
    /// Termine toujours par le déclenchement de l'enrichissement détaché.
    pub async fn set_metadata_from_filename(&self, path: &Path, info: &Arc<MediaInfo>) {
        if !info.has_video_metadata() {
            self.derive_from_filename(path, info).await;
        }
        // L'enrichissement tourne même quand la dérivation a été sautée.
        self.spawn_enrichment(path, info);
    }

    async fn derive_from_filename(&self, path: &Path, info: &Arc<MediaInfo>) {
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return;
        };
        let derived = filename_metadata(&file_name);
        let Some(title) = derived.title else {
            return;
        };

        let simplified = simplified_title(&title);
        let mut video = VideoMetadata {
            movie_or_show_name: Some(title.clone()),
            simplified_movie_or_show_name: Some(simplified.clone()),
            extra_information: derived.extra_information,
            ..Default::default()
        };

        if derived.tv_season.is_some() {
            video.tv_season = derived.tv_season;
            video.tv_episode_number = derived.tv_episode_number;
            video.tv_episode_name = derived.tv_episode_name;
            video.is_tv_episode = true;
        }

        if let Some(year) = derived.year {
            if video.is_tv_episode {
                video.tv_series_start_year = Some(year);
            } else {
                video.year = Some(year);
            }
        }

        if video.is_tv_episode {
            // Un titre déjà connu du catalogue l'emporte sur le titre dérivé
            // quand les formes simplifiées coïncident ("Word and Word" vs
            // "Word & Word" ne doivent pas créer deux séries).
            if let Some(catalog) = &self.catalog {
                if let Some(catalog_title) = catalog.find_similar_series_title(&title).await {
                    if simplified_title(&catalog_title) == simplified {
                        video.movie_or_show_name = Some(catalog_title);
                    }
                }
            }
        }

        let series_title = video.movie_or_show_name.clone();
        let is_tv_episode = video.is_tv_episode;

        if !info.set_video_metadata(video) {
            return;
        }

        let filename = path.to_string_lossy().into_owned();
        let modified = mtime_millis(path).unwrap_or(0);
        if let Some(mut conn) = self.pool.acquire_if_available() {
            let result = (|| {
                let tx = conn.transaction()?;
                if let Some(video) = info.video_metadata() {
                    crate::db::insert_video_metadata(&tx, &filename, modified, &video)?;
                }
                tx.commit()
            })();
            if let Err(e) = result {
                tracing::error!(filename, error = %e, "could not persist filename metadata");
            }
        }

        if is_tv_episode {
            if let (Some(catalog), Some(series_title)) = (&self.catalog, series_title) {
                if let Err(e) = catalog.seed_series(&series_title).await {
                    tracing::debug!(series_title, error = %e, "series seed failed");
                }
            }
        }
    }

    /// Vide la map mémoire (rescan de bibliothèque).
    ///
    /// Le store persistant reste intact : le niveau 2 fait autorité.
    pub async fn clear(&self) {
        self.store.lock().await.clear();
    }

    /// Annule les enrichissements détachés encore en vol.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn load_cached(&self, filename: &str, modified: i64) -> Option<Arc<MediaInfo>> {
        let mut conn = self.pool.acquire_if_available()?;
        let result = (|| {
            let tx = conn.transaction()?;
            let info = crate::db::get_media_info(&tx, filename, modified)?;
            tx.commit()?;
            Ok::<_, rusqlite::Error>(info)
        })();
        match result {
            Ok(info) => info,
            Err(e) => {
                tracing::debug!(
                    filename,
                    error = %e,
                    "error reading cached information, reparsing"
                );
                None
            }
        }
    }

    fn write_back(&self, filename: &str, modified: i64, kind: MediaKind, info: &MediaInfo) {
        let Some(mut conn) = self.pool.acquire_if_available() else {
            return;
        };
        let result = (|| {
            let tx = conn.transaction()?;
            crate::db::insert_or_update(&tx, filename, modified, kind, info)?;
            if let Some(video) = info.video_metadata() {
                crate::db::insert_video_metadata(&tx, filename, modified, &video)?;
            }
            tx.commit()
        })();
        if let Err(e) = result {
            tracing::error!(
                filename,
                error = %e,
                "database error while writing parsed information to the cache"
            );
        }
    }

    fn spawn_enrichment(&self, path: &Path, info: &Arc<MediaInfo>) {
        let Some(enricher) = self.enricher.clone() else {
            return;
        };
        let token = self.shutdown.clone();
        let path = path.to_path_buf();
        let info = info.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = enricher.enrich(&path, &info) => {
                    if let Err(e) = result {
                        tracing::debug!(path = %path.display(), error = %e, "metadata enrichment failed");
                    }
                }
            }
        });
    }
}

fn mtime_millis(path: &Path) -> std::io::Result<i64> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0))
}

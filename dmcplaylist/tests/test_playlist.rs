use async_trait::async_trait;
use dmccache::{ConnectionPool, MediaInfoCache};
use dmcmetadata::{MediaInfo, MediaKind, MediaParser};
use dmcplaylist::{Error, PlaylistManager};
use dmcstore::{MediaStore, ResourceId};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

struct NoopParser;

#[async_trait]
impl MediaParser for NoopParser {
    async fn parse(
        &self,
        info: &Arc<MediaInfo>,
        _path: &Path,
        _format_hint: Option<&str>,
        _kind: MediaKind,
    ) -> dmcmetadata::Result<()> {
        info.finish_parsing();
        Ok(())
    }

    async fn post_parse(&self, info: &Arc<MediaInfo>, _kind: MediaKind) -> dmcmetadata::Result<()> {
        info.set_mime_type(Some("audio/mpeg".into()));
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    store: Arc<MediaStore>,
    manager: PlaylistManager,
    music_id: ResourceId,
    song_id: ResourceId,
}

/// Arborescence de test :
/// ```text
/// <tmp>/music/rock/song.mp3
/// <tmp>/video/clip.mp4
/// ```
fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("music/rock")).unwrap();
    std::fs::create_dir_all(dir.path().join("video")).unwrap();
    std::fs::write(dir.path().join("music/rock/song.mp3"), b"song").unwrap();
    std::fs::write(dir.path().join("video/clip.mp4"), b"clip").unwrap();

    let pool = ConnectionPool::open(&dir.path().join("media.db"), 2).unwrap();
    let store = Arc::new(MediaStore::new(Arc::new(MediaInfoCache::new(
        pool,
        Arc::new(NoopParser),
    ))));

    let music = store.create_node_from_path(&dir.path().join("music")).unwrap();
    let song = store
        .create_node_from_path(&dir.path().join("music/rock/song.mp3"))
        .unwrap();
    store.add_child(store.root_id(), music.id()).unwrap();

    Fixture {
        store: store.clone(),
        manager: PlaylistManager::new(store),
        music_id: music.id(),
        song_id: song.id(),
        _dir: dir,
    }
}

#[tokio::test]
async fn created_playlist_starts_with_the_extm3u_header() {
    let fx = fixture();

    let created = fx
        .manager
        .create_playlist(fx.music_id, "mylist.m3u")
        .await
        .unwrap();

    assert_eq!(created.entries, vec!["#EXTM3U".to_string(), String::new()]);

    let playlist = fx.store.get_node(created.id).unwrap();
    assert!(playlist.is_container());
    assert_eq!(playlist.parent(), Some(fx.music_id));

    let content = std::fs::read_to_string(playlist.path().unwrap()).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "#EXTM3U");
    assert_eq!(lines[1], "");
}

#[tokio::test]
async fn playlist_name_must_carry_a_supported_extension() {
    let fx = fixture();

    let err = fx
        .manager
        .create_playlist(fx.music_id, "mylist.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidName(_)));
    assert_eq!(err.message_key(), "InvalidPlaylistName");

    let err = fx.manager.create_playlist(fx.music_id, "   ").await.unwrap_err();
    assert!(matches!(err, Error::InvalidName(_)));

    // L'extension est comparée sensible à la casse, comme le format
    // historique.
    let err = fx
        .manager
        .create_playlist(fx.music_id, "mylist.M3U")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidName(_)));
}

#[tokio::test]
async fn creating_the_same_playlist_twice_collides() {
    let fx = fixture();

    fx.manager.create_playlist(fx.music_id, "mylist.m3u8").await.unwrap();
    let err = fx
        .manager
        .create_playlist(fx.music_id, "mylist.m3u8")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));
    assert_eq!(err.message_key(), "PlaylistAlreadyExists");
}

#[tokio::test]
async fn added_song_is_stored_relative_to_the_playlist_directory() {
    let fx = fixture();
    let created = fx
        .manager
        .create_playlist(fx.music_id, "pl.m3u8")
        .await
        .unwrap();
    let playlist = fx.store.get_node(created.id).unwrap();
    let update_before = playlist.update_id();

    let entry_id = fx.manager.add_song(fx.song_id, created.id).await.unwrap();

    let content = std::fs::read_to_string(playlist.path().unwrap()).unwrap();
    assert!(content.ends_with("./rock/song.mp3\n"));
    assert!(playlist.children().contains(&entry_id));
    assert!(playlist.update_id() > update_before);
}

#[tokio::test]
async fn song_on_a_disjoint_branch_gets_a_parent_relative_entry() {
    let fx = fixture();
    let clip = fx
        .store
        .create_node_from_path(&fx._dir.path().join("video/clip.mp4"))
        .unwrap();
    let created = fx
        .manager
        .create_playlist(fx.music_id, "pl.m3u8")
        .await
        .unwrap();

    fx.manager.add_song(clip.id(), created.id).await.unwrap();

    let playlist = fx.store.get_node(created.id).unwrap();
    let content = std::fs::read_to_string(playlist.path().unwrap()).unwrap();
    assert!(content.ends_with("../video/clip.mp4\n"));
}

#[tokio::test]
async fn duplicate_add_fails_and_leaves_the_file_untouched() {
    let fx = fixture();
    let created = fx
        .manager
        .create_playlist(fx.music_id, "pl.m3u8")
        .await
        .unwrap();
    fx.manager.add_song(fx.song_id, created.id).await.unwrap();

    let playlist = fx.store.get_node(created.id).unwrap();
    let before = std::fs::read(playlist.path().unwrap()).unwrap();

    let err = fx.manager.add_song(fx.song_id, created.id).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateEntry(_)));
    assert_eq!(err.message_key(), "SongAlreadyInPlaylist");

    let after = std::fs::read(playlist.path().unwrap()).unwrap();
    assert_eq!(before, after, "failed mutation must not rewrite the file");
}

#[tokio::test]
async fn duplicate_is_also_detected_on_the_absolute_form() {
    let fx = fixture();
    let created = fx
        .manager
        .create_playlist(fx.music_id, "pl.m3u8")
        .await
        .unwrap();
    let playlist = fx.store.get_node(created.id).unwrap();
    let playlist_path = playlist.path().unwrap().to_path_buf();

    // Entrée écrite sous forme absolue par un autre outil.
    let song_abs = fx._dir.path().join("music/rock/song.mp3");
    let mut content = std::fs::read_to_string(&playlist_path).unwrap();
    content.push_str(&format!("{}\n", song_abs.display()));
    std::fs::write(&playlist_path, &content).unwrap();

    let err = fx.manager.add_song(fx.song_id, created.id).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateEntry(_)));
}

#[tokio::test]
async fn remove_song_rewrites_the_file_and_returns_the_entries() {
    let fx = fixture();
    let created = fx
        .manager
        .create_playlist(fx.music_id, "pl.m3u8")
        .await
        .unwrap();
    fx.manager.add_song(fx.song_id, created.id).await.unwrap();

    let entries = fx.manager.remove_song(fx.song_id, created.id).await.unwrap();
    assert_eq!(entries, vec!["#EXTM3U".to_string(), String::new()]);

    let playlist = fx.store.get_node(created.id).unwrap();
    let content = std::fs::read_to_string(playlist.path().unwrap()).unwrap();
    assert!(!content.contains("song.mp3"));
}

#[tokio::test]
async fn removing_an_absent_song_fails_with_not_found() {
    let fx = fixture();
    let created = fx
        .manager
        .create_playlist(fx.music_id, "pl.m3u8")
        .await
        .unwrap();

    let err = fx.manager.remove_song(fx.song_id, created.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(err.message_key(), "SongNotInPlaylist");
}

#[tokio::test]
async fn unknown_ids_fail_with_not_found() {
    let fx = fixture();
    let created = fx
        .manager
        .create_playlist(fx.music_id, "pl.m3u8")
        .await
        .unwrap();

    // Identifiant devenu invalide après retrait du nœud.
    let gone = fx
        .store
        .create_node_from_path(&fx._dir.path().join("video/clip.mp4"))
        .unwrap();
    fx.store.add_child(fx.music_id, gone.id()).unwrap();
    fx.store.remove_child(fx.music_id, gone.id()).unwrap();
    let stale = gone.id();

    assert!(matches!(
        fx.manager.add_song(stale, created.id).await.unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(matches!(
        fx.manager.add_song(fx.song_id, stale).await.unwrap_err(),
        Error::NotFound(_)
    ));
}

//! Algèbre de chemins relatifs des entrées de playlist.
//!
//! L'algorithme travaille sur les chaînes de chemins, volontairement sans
//! canonicalisation (pas de résolution de liens symboliques, pas de
//! normalisation de casse) : élargir la comparaison changerait les verdicts
//! doublon/absent du format historique.

use std::path::{MAIN_SEPARATOR, Path};

/// Calcule le chemin d'un morceau relatif au répertoire de la playlist.
///
/// Deux cas :
/// - le chemin du morceau commence par celui du répertoire de la playlist :
///   le résultat est `./` suivi du suffixe (séparateur de tête élidé)
/// - sinon on remonte d'un segment à la fois depuis le répertoire de la
///   playlist en accumulant un `../` par étape, jusqu'à ce que l'ancêtre
///   soit un préfixe du chemin du morceau ; le résultat est la séquence de
///   `../` suivie du suffixe au-delà de cet ancêtre
pub fn relative_song_path(song: &Path, playlist: &Path) -> String {
    let song_str = song.to_string_lossy();
    let playlist_dir = playlist.parent().unwrap_or_else(|| Path::new(""));
    let dir_str = playlist_dir.to_string_lossy();

    if song_str.starts_with(dir_str.as_ref()) {
        let suffix = &song_str[dir_str.len()..];
        let mut out = String::from(".");
        if !suffix.starts_with(MAIN_SEPARATOR) {
            out.push(MAIN_SEPARATOR);
        }
        out.push_str(suffix);
        return out;
    }

    let mut prefix = String::new();
    let mut ancestor = playlist_dir.to_path_buf();
    loop {
        prefix.push_str("..");
        prefix.push(MAIN_SEPARATOR);
        ancestor = ancestor
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        if song_str.starts_with(ancestor.to_string_lossy().as_ref()) {
            break;
        }
    }

    let ancestor_str = ancestor.to_string_lossy();
    let mut suffix = &song_str[ancestor_str.len()..];
    if suffix.starts_with(MAIN_SEPARATOR) {
        suffix = &suffix[MAIN_SEPARATOR.len_utf8()..];
    }
    prefix + suffix
}

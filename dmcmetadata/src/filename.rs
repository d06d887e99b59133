//! Lexical metadata extraction from file names.
//!
//! Everything here is pure string work: no filesystem access, no catalog
//! lookups. The patterns cover the common release-name shapes
//! (`Show.S01E02.Episode.Name.mkv`, `Show 1x02.avi`, `Movie (2009).mkv`,
//! `Movie.2009.Extended.mkv`).

use once_cell::sync::Lazy;
use regex::Regex;

/// Fields derivable from a file name alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilenameMetadata {
    pub title: Option<String>,
    pub year: Option<String>,
    pub extra_information: Option<String>,
    pub tv_season: Option<String>,
    pub tv_episode_number: Option<String>,
    pub tv_episode_name: Option<String>,
}

static TV_SEASON_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<title>.+?)[ ._-]+S(?P<season>\d{1,2})[ ._-]?E(?P<episode>\d{1,3})(?:[ ._-]+(?P<name>.+?))?$")
        .unwrap()
});

static TV_CROSS_NOTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<title>.+?)[ ._-]+(?P<season>\d{1,2})x(?P<episode>\d{2,3})(?:[ ._-]+(?P<name>.+?))?$")
        .unwrap()
});

static MOVIE_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<title>.+?)[ ._(\[]+(?P<year>(?:19|20)\d{2})[)\]]?(?:[ ._-]+(?P<rest>.+))?$")
        .unwrap()
});

static EXTRA_INFORMATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(extended|unrated|uncut|remastered|theatrical|imax|director'?s[ ._]cut)\b")
        .unwrap()
});

static MEDIA_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.[A-Za-z0-9]{2,4}$").unwrap());

/// Returns a normalized form of a show title for fuzzy comparison.
///
/// Lowercases, maps `&` to `and`, drops a leading article and every
/// non-alphanumeric character, so that "Word & Word" and "word and word"
/// compare equal.
pub fn simplified_title(name: &str) -> String {
    let lower = name.to_lowercase().replace('&', " and ");
    let trimmed = lower
        .strip_prefix("the ")
        .unwrap_or(&lower)
        .to_string();
    trimmed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Derives title, year, season/episode and edition tags from a file name.
///
/// Purely lexical and deterministic; an unrecognized name yields the cleaned
/// base name as title with every other field empty.
pub fn filename_metadata(file_name: &str) -> FilenameMetadata {
    let base = MEDIA_EXTENSION.replace(file_name, "");
    let mut meta = FilenameMetadata::default();

    if let Some(caps) = EXTRA_INFORMATION.captures(&base) {
        meta.extra_information = Some(clean_token(&caps[1]));
    }

    for pattern in [&*TV_SEASON_EPISODE, &*TV_CROSS_NOTATION] {
        if let Some(caps) = pattern.captures(&base) {
            meta.title = Some(clean_token(&caps["title"]));
            meta.tv_season = Some(strip_leading_zeros(&caps["season"]));
            meta.tv_episode_number = Some(strip_leading_zeros(&caps["episode"]));
            meta.tv_episode_name = caps
                .name("name")
                .map(|m| clean_token(m.as_str()))
                .filter(|n| !n.is_empty() && !looks_like_release_noise(n));
            return meta;
        }
    }

    if let Some(caps) = MOVIE_YEAR.captures(&base) {
        meta.title = Some(clean_token(&caps["title"]));
        meta.year = Some(caps["year"].to_string());
        return meta;
    }

    meta.title = Some(clean_token(&base)).filter(|t| !t.is_empty());
    meta
}

/// Dots and underscores are word separators in release names.
fn clean_token(token: &str) -> String {
    let spaced = token.replace(['.', '_'], " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_leading_zeros(value: &str) -> String {
    let stripped = value.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// Episode-name candidates that are really rip/codec tags, not names.
fn looks_like_release_noise(candidate: &str) -> bool {
    static NOISE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)^(\d{3,4}p|x26[45]|h26[45]|web[ -]?dl|webrip|bluray|hdtv|dvdrip|aac|ac3|proper|repack)\b")
            .unwrap()
    });
    NOISE.is_match(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_episode_with_name() {
        let meta = filename_metadata("The.Show.S01E02.The.Pilot.mkv");
        assert_eq!(meta.title.as_deref(), Some("The Show"));
        assert_eq!(meta.tv_season.as_deref(), Some("1"));
        assert_eq!(meta.tv_episode_number.as_deref(), Some("2"));
        assert_eq!(meta.tv_episode_name.as_deref(), Some("The Pilot"));
        assert_eq!(meta.year, None);
    }

    #[test]
    fn cross_notation() {
        let meta = filename_metadata("Some Show 3x07.avi");
        assert_eq!(meta.title.as_deref(), Some("Some Show"));
        assert_eq!(meta.tv_season.as_deref(), Some("3"));
        assert_eq!(meta.tv_episode_number.as_deref(), Some("7"));
        assert_eq!(meta.tv_episode_name, None);
    }

    #[test]
    fn episode_name_ignores_release_tags() {
        let meta = filename_metadata("Show.S02E05.1080p.WEB-DL.mkv");
        assert_eq!(meta.tv_episode_number.as_deref(), Some("5"));
        assert_eq!(meta.tv_episode_name, None);
    }

    #[test]
    fn movie_with_year_in_parens() {
        let meta = filename_metadata("A Movie (2009).mkv");
        assert_eq!(meta.title.as_deref(), Some("A Movie"));
        assert_eq!(meta.year.as_deref(), Some("2009"));
        assert!(meta.tv_season.is_none());
    }

    #[test]
    fn movie_with_edition_tag() {
        let meta = filename_metadata("A.Movie.2009.Extended.mkv");
        assert_eq!(meta.title.as_deref(), Some("A Movie"));
        assert_eq!(meta.year.as_deref(), Some("2009"));
        assert_eq!(meta.extra_information.as_deref(), Some("Extended"));
    }

    #[test]
    fn plain_name_falls_back_to_title_only() {
        let meta = filename_metadata("holiday_video.mp4");
        assert_eq!(meta.title.as_deref(), Some("holiday video"));
        assert_eq!(meta, FilenameMetadata {
            title: Some("holiday video".into()),
            ..Default::default()
        });
    }

    #[test]
    fn simplified_title_normalizes_punctuation_and_articles() {
        assert_eq!(simplified_title("Word & Word"), "wordandword");
        assert_eq!(simplified_title("word and word"), "wordandword");
        assert_eq!(simplified_title("The Show!"), "show");
    }
}

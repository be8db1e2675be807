//! Storage name allocation.
//!
//! A storage name is `<owner>_<sanitized stem>.<8 hex digits>.mp3`. It never
//! contains a path separator, so it can be joined to the blob directory as is.

use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;

pub const AUDIO_EXTENSION: &str = ".mp3";

/// Longest stem kept from the original name, in characters.
pub const MAX_STEM_LENGTH: usize = 100;

const FALLBACK_STEM: &str = "track";

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^A-Za-z0-9_\s.\-]").unwrap();
    static ref WHITESPACE_RUNS: Regex = Regex::new(r"\s+").unwrap();
    static ref ALLOCATED_NAME: Regex =
        Regex::new(r"^\d+_[A-Za-z0-9_.\-]+\.[0-9a-f]{8}\.mp3$").unwrap();
    static ref ALLOCATED_ARTWORK: Regex =
        Regex::new(r"^(\d+_[A-Za-z0-9_.\-]+\.[0-9a-f]{8})\.cover\.[A-Za-z0-9]+$").unwrap();
}

/// Derives a fresh storage name for a file uploaded by `owner_id`.
///
/// Two calls with the same arguments return different names with
/// overwhelming probability.
pub fn allocate_storage_name(owner_id: usize, original_name: &str) -> String {
    let suffix: u32 = rand::rng().random();
    format!(
        "{}_{}.{:08x}{}",
        owner_id,
        sanitize_stem(original_name),
        suffix,
        AUDIO_EXTENSION
    )
}

/// Reduces an untrusted file name to a short, filesystem-safe stem.
pub fn sanitize_stem(original_name: &str) -> String {
    let file_name = original_name.rsplit(['/', '\\']).next().unwrap_or("");
    let stem = file_name.strip_suffix(AUDIO_EXTENSION).unwrap_or(file_name);

    let cleaned = UNSAFE_CHARS.replace_all(stem, "");
    let collapsed = WHITESPACE_RUNS.replace_all(cleaned.trim(), "_");
    let stem: String = collapsed
        .trim_matches('.')
        .chars()
        .take(MAX_STEM_LENGTH)
        .collect();

    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}

/// The user id a storage name was allocated for, if it is well formed.
pub fn owner_of(storage_name: &str) -> Option<usize> {
    storage_name.split_once('_')?.0.parse().ok()
}

/// Whether `name` has the shape of a name returned by [`allocate_storage_name`].
pub fn is_allocated_name(name: &str) -> bool {
    ALLOCATED_NAME.is_match(name)
}

/// The storage name a cover image file was saved for, if `file_name` is the
/// artwork of an allocated name.
pub fn storage_name_of_artwork(file_name: &str) -> Option<String> {
    let stem = ALLOCATED_ARTWORK.captures(file_name)?.get(1)?.as_str();
    Some(format!("{}{}", stem, AUDIO_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    lazy_static! {
        static ref USER_7_MY_SONG: Regex = Regex::new(r"^7_My_Song\.[0-9a-f]{8}\.mp3$").unwrap();
    }

    #[test]
    fn allocates_owner_prefixed_name() {
        let name = allocate_storage_name(7, "My Song!!.mp3");
        assert!(USER_7_MY_SONG.is_match(&name), "unexpected name {}", name);
        assert_eq!(owner_of(&name), Some(7));
    }

    #[test]
    fn strips_path_traversal() {
        let name = allocate_storage_name(3, "../../etc/passwd.mp3");
        assert!(!name.contains('/'));
        assert!(!name.contains('\\'));
        assert!(name.starts_with("3_passwd."));
        assert!(name.ends_with(".mp3"));

        assert_eq!(sanitize_stem("..\\..\\windows\\evil.mp3"), "evil");
    }

    #[test]
    fn collapses_whitespace_and_drops_unsafe_chars() {
        assert_eq!(sanitize_stem("  a   b\tc  .mp3"), "a_b_c");
        assert_eq!(sanitize_stem("rock&roll (live) #1.mp3"), "rockroll_live_1");
        assert_eq!(sanitize_stem("dash-and.dot.mp3"), "dash-and.dot");
    }

    #[test]
    fn falls_back_when_nothing_survives() {
        assert_eq!(sanitize_stem("!!!.mp3"), FALLBACK_STEM);
        assert_eq!(sanitize_stem("..mp3"), FALLBACK_STEM);
        assert_eq!(sanitize_stem(""), FALLBACK_STEM);
    }

    #[test]
    fn truncates_long_stems() {
        let long_name = format!("{}.mp3", "x".repeat(500));
        assert_eq!(sanitize_stem(&long_name).len(), MAX_STEM_LENGTH);

        let name = allocate_storage_name(1, &long_name);
        assert!(name.len() < MAX_STEM_LENGTH + 20);
    }

    #[test]
    fn same_input_gives_distinct_names() {
        let a = allocate_storage_name(1, "song.mp3");
        let b = allocate_storage_name(1, "song.mp3");
        assert_ne!(a, b);
    }

    #[test]
    fn recognizes_allocated_names() {
        let name = allocate_storage_name(12, "Some Song (live).mp3");
        assert!(is_allocated_name(&name), "{} not recognized", name);
        assert!(is_allocated_name("1_x.cover.png.0000beef.mp3"));

        assert!(!is_allocated_name("song.mp3"));
        assert!(!is_allocated_name("My Song.mp3"));
        assert!(!is_allocated_name("1_song.mp3"));
        assert!(!is_allocated_name("1_song.0000BEEF.mp3"));
        assert!(!is_allocated_name("x_song.0000beef.mp3"));
    }

    #[test]
    fn maps_artwork_back_to_storage_name() {
        assert_eq!(
            storage_name_of_artwork("3_song.0000beef.cover.jpg"),
            Some("3_song.0000beef.mp3".to_string())
        );
        assert_eq!(storage_name_of_artwork("3_song.0000beef.mp3"), None);
        assert_eq!(storage_name_of_artwork("album.cover.jpg"), None);
        assert_eq!(storage_name_of_artwork("cover.jpg"), None);
    }
}

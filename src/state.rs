use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

use tracing::debug;

use crate::error::StateError;

/// Whether `file_name` ends with one of the `podcast_extensions` keys
pub fn has_podcast_extension(
    file_name: &str,
    podcast_extensions: &BTreeMap<String, String>,
) -> bool {
    podcast_extensions
        .keys()
        .any(|extension| file_name.ends_with(extension.as_str()))
}

/// List the episode files already present in a podcast directory
///
/// Only names ending in one of the configured extensions are returned, so
/// `.partial` files from interrupted transfers never count as downloaded.
/// The list is sorted by creation time (modification time where the
/// filesystem does not record creation), newest first. A directory that
/// does not exist yet simply holds no episodes.
pub fn downloaded_files(
    directory: &Path,
    podcast_extensions: &BTreeMap<String, String>,
) -> Result<Vec<String>, StateError> {
    if !directory.exists() {
        debug!(directory = %directory.display(), "podcast directory does not exist yet");
        return Ok(Vec::new());
    }

    let read_failed = |e| StateError::ReadDirectoryFailed {
        path: directory.to_path_buf(),
        source: e,
    };

    let mut files: Vec<(SystemTime, String)> = Vec::new();

    for entry in std::fs::read_dir(directory).map_err(read_failed)? {
        let entry = entry.map_err(read_failed)?;

        let Some(file_name) = entry.file_name().to_str().map(String::from) else {
            continue;
        };
        if !has_podcast_extension(&file_name, podcast_extensions) {
            continue;
        }

        let metadata = entry.metadata().map_err(read_failed)?;
        if !metadata.is_file() {
            continue;
        }

        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        files.push((created, file_name));
    }

    files.sort_by(|a, b| b.cmp(a));

    Ok(files.into_iter().map(|(_, name)| name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn extensions() -> BTreeMap<String, String> {
        BTreeMap::from([
            (".mp3".to_string(), "audio/mpeg".to_string()),
            (".m4a".to_string(), "audio/mp4".to_string()),
        ])
    }

    #[test]
    fn extension_predicate_matches_configured_suffixes() {
        assert!(has_podcast_extension("episode.mp3", &extensions()));
        assert!(has_podcast_extension("episode.m4a", &extensions()));
        assert!(!has_podcast_extension("episode.mp3.partial", &extensions()));
        assert!(!has_podcast_extension("cover.jpg", &extensions()));
    }

    #[test]
    fn missing_directory_has_no_files() {
        let dir = tempdir().unwrap();
        let files = downloaded_files(&dir.path().join("not-there"), &extensions()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn lists_only_episode_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("one.mp3"), b"audio").unwrap();
        std::fs::write(dir.path().join("two.m4a"), b"audio").unwrap();
        std::fs::write(dir.path().join("three.mp3.partial"), b"half").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"text").unwrap();
        std::fs::create_dir(dir.path().join("folder.mp3")).unwrap();

        let mut files = downloaded_files(dir.path(), &extensions()).unwrap();
        files.sort();

        assert_eq!(files, vec!["one.mp3", "two.m4a"]);
    }

    #[test]
    fn lists_newest_first() {
        let dir = tempdir().unwrap();
        for name in ["first.mp3", "second.mp3", "third.mp3"] {
            std::fs::write(dir.path().join(name), b"audio").unwrap();
            std::thread::sleep(Duration::from_millis(20));
        }

        let files = downloaded_files(dir.path(), &extensions()).unwrap();

        assert_eq!(files, vec!["third.mp3", "second.mp3", "first.mp3"]);
    }
}

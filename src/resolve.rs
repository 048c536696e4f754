//! Normalization-tolerant file lookup.
//!
//! Some filesystems store Hangul file names as decomposed jamo (NFD) while
//! others keep composed syllables (NFC). A name typed in source code is
//! almost always NFC, so a plain `dir.join(name)` misses files copied from
//! the other kind of filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Result, StudyError};

/// Returns the canonical composed (NFC) form of `s`.
pub fn nfc(s: &str) -> String {
    s.nfc().collect()
}

/// Returns the canonical decomposed (NFD) form of `s`.
pub fn nfd(s: &str) -> String {
    s.nfd().collect()
}

/// Finds the regular file in `dir` whose name equals `logical_name` under
/// NFC or NFD.
///
/// The first match in directory iteration order wins. If several entries
/// normalize to the same name the choice between them is unspecified.
///
/// # Errors
///
/// [`StudyError::NotFound`] when nothing matches, [`StudyError::Io`] when
/// the directory cannot be read.
pub fn resolve(dir: &Path, logical_name: &str) -> Result<PathBuf> {
    let target_nfc = nfc(logical_name);
    let target_nfd = nfd(logical_name);

    let entries = fs::read_dir(dir).map_err(|e| StudyError::io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| StudyError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            trace!(path = %path.display(), "Skipping non UTF-8 file name");
            continue;
        };

        if nfc(name) == target_nfc || nfd(name) == target_nfd {
            trace!(logical_name, path = %path.display(), "Resolved file");
            return Ok(path);
        }
    }

    Err(StudyError::NotFound {
        name: logical_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    const NAME: &str = "학교_데이터.csv";

    #[test]
    fn test_nfc_and_nfd_differ_for_hangul() {
        assert_ne!(nfc(NAME), nfd(NAME));
        assert_eq!(nfc(&nfd(NAME)), nfc(NAME));
    }

    #[test]
    fn test_resolves_decomposed_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let on_disk = dir.path().join(nfd(NAME));
        File::create(&on_disk).unwrap();

        let found = resolve(dir.path(), NAME).unwrap();
        assert_eq!(found, on_disk);
    }

    #[test]
    fn test_resolves_composed_file_name_from_decomposed_query() {
        let dir = tempfile::tempdir().unwrap();
        let on_disk = dir.path().join(nfc(NAME));
        File::create(&on_disk).unwrap();

        let found = resolve(dir.path(), &nfd(NAME)).unwrap();
        assert_eq!(found, on_disk);
    }

    #[test]
    fn test_same_entry_for_either_query_form() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join(nfd(NAME))).unwrap();
        File::create(dir.path().join("other.csv")).unwrap();

        let a = resolve(dir.path(), &nfc(NAME)).unwrap();
        let b = resolve(dir.path(), &nfd(NAME)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("다른_파일.csv")).unwrap();

        match resolve(dir.path(), NAME) {
            Err(StudyError::NotFound { name, .. }) => assert_eq!(name, NAME),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_directories_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(NAME)).unwrap();

        assert!(matches!(
            resolve(dir.path(), NAME),
            Err(StudyError::NotFound { .. })
        ));
    }

    #[test]
    fn test_unreadable_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        assert!(matches!(
            resolve(&missing, NAME),
            Err(StudyError::Io { .. })
        ));
    }
}

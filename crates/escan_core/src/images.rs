//! Source images for saved documents, kept under the scans directory.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{CoreError, Result};

const DEFAULT_EXTENSION: &str = "jpg";

#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write encoded image bytes as `<dir>/<file_name>.jpg`.
    pub fn save_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let target = self.reserve(file_name, DEFAULT_EXTENSION)?;
        std::fs::write(&target, bytes)?;
        debug!(path = %target.display(), bytes = bytes.len(), "Stored image");
        Ok(target)
    }

    /// Copy an existing image into the store, keeping its extension.
    pub fn import(&self, file_name: &str, source: &Path) -> Result<PathBuf> {
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        let target = self.reserve(file_name, &extension)?;
        std::fs::copy(source, &target)?;
        debug!(from = %source.display(), path = %target.display(), "Imported image");
        Ok(target)
    }

    /// Delete an image. Returns `false` when it was already gone.
    pub fn remove(&self, path: &Path) -> Result<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether `file_name` still has characters left once sanitized for the disk.
    pub fn is_usable_name(file_name: &str) -> bool {
        !sanitize_file_stem(file_name).is_empty()
    }

    /// Size on disk, if the file exists.
    pub fn size_of(path: &Path) -> Option<u64> {
        std::fs::metadata(path).ok().map(|m| m.len())
    }

    /// First free `<stem>.<ext>`, `<stem>_1.<ext>`, ... path in the store.
    fn reserve(&self, file_name: &str, extension: &str) -> Result<PathBuf> {
        let stem = sanitize_file_stem(file_name);
        if stem.is_empty() {
            return Err(CoreError::invalid_input("image file name must not be empty"));
        }
        std::fs::create_dir_all(&self.dir)?;

        let mut candidate = self.dir.join(format!("{}.{}", stem, extension));
        let mut suffix = 1;
        while candidate.exists() {
            candidate = self.dir.join(format!("{}_{}.{}", stem, suffix, extension));
            suffix += 1;
        }
        Ok(candidate)
    }
}

/// Replace path separators and control characters so a document name can be used
/// as a file name.
fn sanitize_file_stem(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn names_are_sanitized() {
        assert_eq!(sanitize_file_stem("Text_20240101_120000"), "Text_20240101_120000");
        assert_eq!(sanitize_file_stem("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_file_stem("../etc"), "_etc");
        assert_eq!(sanitize_file_stem("  "), "");
    }

    #[test]
    fn dot_only_names_are_not_usable() {
        assert!(ImageStore::is_usable_name("Receipt"));
        assert!(ImageStore::is_usable_name(".env"));
        assert!(!ImageStore::is_usable_name("..."));
        assert!(!ImageStore::is_usable_name(" . "));
    }

    #[test]
    fn collisions_get_a_suffix() {
        let tmp = TempDir::new().unwrap();
        let images = ImageStore::new(tmp.path().join("scans"));

        let first = images.save_bytes("Receipt", b"one").unwrap();
        let second = images.save_bytes("Receipt", b"two").unwrap();
        assert_eq!(first.file_name().unwrap(), "Receipt.jpg");
        assert_eq!(second.file_name().unwrap(), "Receipt_1.jpg");
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
    }

    #[test]
    fn import_keeps_extension_and_remove_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("photo.PNG");
        std::fs::write(&source, b"png").unwrap();
        let images = ImageStore::new(tmp.path().join("scans"));

        let stored = images.import("Notes", &source).unwrap();
        assert_eq!(stored.file_name().unwrap(), "Notes.png");
        assert_eq!(ImageStore::size_of(&stored), Some(3));

        assert!(images.remove(&stored).unwrap());
        assert!(!images.remove(&stored).unwrap());
        assert!(source.exists());
    }

    #[test]
    fn empty_names_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let images = ImageStore::new(tmp.path());
        assert!(matches!(
            images.save_bytes(" ", b"x"),
            Err(CoreError::InvalidInput(_))
        ));
    }
}

//! Uniquely named files that live only as long as their handle.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use uuid::Uuid;

/// A `<uuid>.xml` file in a scratch directory, removed on drop.
#[derive(Debug)]
pub struct TransientFile {
    path: PathBuf,
}

impl TransientFile {
    /// Reserve a fresh path in `dir` without creating the file.
    pub fn reserve(dir: &Path) -> Self {
        TransientFile {
            path: dir.join(format!("{}.xml", Uuid::new_v4())),
        }
    }

    /// Create a fresh file in `dir` holding `contents`.
    pub fn create(dir: &Path, contents: &[u8]) -> io::Result<Self> {
        let file = Self::reserve(dir);
        retry_once("write", &file.path, || fs::write(&file.path, contents))?;
        debug!("wrote transient file {}", file.path.display());
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_to_string(&self) -> io::Result<String> {
        retry_once("read", &self.path, || fs::read_to_string(&self.path))
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("removed transient file {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove transient file {}: {e}", self.path.display()),
        }
    }
}

fn retry_once<T>(operation: &str, path: &Path, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    op().or_else(|e| {
        warn!("{operation} of {} failed ({e}), retrying once", path.display());
        op()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let file = TransientFile::create(dir.path(), b"<Document />").unwrap();
            assert_eq!(file.read_to_string().unwrap(), "<Document />");
            assert_eq!(file.path().extension().unwrap(), "xml");
            file.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let a = TransientFile::create(dir.path(), b"a").unwrap();
        let b = TransientFile::create(dir.path(), b"b").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn reserved_path_may_never_exist() {
        let dir = tempfile::tempdir().unwrap();
        let file = TransientFile::reserve(dir.path());
        assert!(file.read_to_string().is_err());
        drop(file);
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = TransientFile::create(&dir.path().join("missing"), b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

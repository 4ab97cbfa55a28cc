//! Durable crawl checkpoints.
//!
//! Two JSON files in the output directory record how far a run got:
//! `progress.json` maps each in-flight account to its [`ProgressState`], and
//! `completed_accounts.json` lists accounts that are fully done. Both are
//! rewritten whole through a temporary file and a rename, so a crash leaves
//! either the old or the new content on disk.

mod completion;
mod progress;

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

pub use completion::CompletionRegistry;
pub use progress::{ProgressMap, ProgressState, ProgressStore};

/// Sibling path used while writing `path`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Replaces the file at `path` with `contents`.
///
/// Writes `<path>.tmp`, syncs it, then renames it over `path`. Missing
/// parent directories are created.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let tmp = temp_path(path);
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(contents).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await
}

/// Reads a file, treating absence as `None`.
async fn read_if_exists(path: &Path) -> io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_keeps_extension() {
        assert_eq!(
            temp_path(Path::new("/data/progress.json")),
            PathBuf::from("/data/progress.json.tmp")
        );
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("file.json");

        write_atomic(&path, b"first").await.unwrap();
        write_atomic(&path, b"second").await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"second");
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_read_if_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert_eq!(read_if_exists(&path).await.unwrap(), None);

        tokio::fs::write(&path, "[]").await.unwrap();
        assert_eq!(read_if_exists(&path).await.unwrap().as_deref(), Some("[]"));
    }
}

//! Per-item scratch directories and the local done-log.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::PipelineError;

/// A scratch directory that is removed, with everything in it, on drop.
///
/// Dropping runs on every exit path of the pipeline, including early returns
/// through `?`, so downloads and extracted audio never outlive the item.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    /// Creates `{root}/{name}`, clearing any leftovers from an earlier run.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if the directory cannot be cleared or created.
    pub fn create(root: &Path, name: &str) -> Result<Self, PipelineError> {
        let path = root.join(name);
        if path.exists() {
            std::fs::remove_dir_all(&path).map_err(|e| PipelineError::io(&path, e))?;
        }
        std::fs::create_dir_all(&path).map_err(|e| PipelineError::io(&path, e))?;
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates (or reuses) a subdirectory.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if it cannot be created.
    pub fn subdir(&self, name: &str) -> Result<PathBuf, PipelineError> {
        let dir = self.path.join(name);
        std::fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;
        Ok(dir)
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed work directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove work directory");
            }
        }
    }
}

/// Regular files directly inside `dir`, sorted by name.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if the directory cannot be listed.
pub async fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::io(dir, e))?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::io(dir, e))?
    {
        let is_file = entry
            .file_type()
            .await
            .map_err(|e| PipelineError::io(entry.path(), e))?
            .is_file();
        if is_file {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Newline-delimited file of shortcodes whose reports were produced here.
///
/// Guards against redoing the expensive stages when the store write after a
/// successful run was lost.
#[derive(Debug, Clone)]
pub struct DoneLog {
    path: PathBuf,
}

impl DoneLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `shortcode` is recorded. A missing file means nothing is.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if the file exists but cannot be read.
    pub async fn contains(&self, shortcode: &str) -> Result<bool, PipelineError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(contents.lines().any(|line| line.trim() == shortcode)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PipelineError::io(&self.path, e)),
        }
    }

    /// Appends `shortcode`, creating the file and its parent directory.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] on any filesystem failure.
    pub async fn append(&self, shortcode: &str) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::io(parent, e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| PipelineError::io(&self.path, e))?;
        file.write_all(format!("{shortcode}\n").as_bytes())
            .await
            .map_err(|e| PipelineError::io(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| PipelineError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_dir_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let work = WorkDir::create(root.path(), "reel_ABC").unwrap();
            std::fs::write(work.path().join("video.mp4"), b"data").unwrap();
            let frames = work.subdir("frames").unwrap();
            std::fs::write(frames.join("f1.png"), b"png").unwrap();
            work.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn work_dir_clears_leftovers() {
        let root = tempfile::tempdir().unwrap();
        let stale = root.path().join("post_XYZ");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("old.jpg"), b"old").unwrap();

        let work = WorkDir::create(root.path(), "post_XYZ").unwrap();
        assert!(work.path().exists());
        assert!(!work.path().join("old.jpg").exists());
    }

    #[tokio::test]
    async fn sorted_files_skips_directories() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("b.jpg"), b"b").unwrap();
        std::fs::write(root.path().join("a.mp4"), b"a").unwrap();
        std::fs::create_dir(root.path().join("c")).unwrap();

        let files = sorted_files(root.path()).await.unwrap();
        assert_eq!(
            files,
            vec![root.path().join("a.mp4"), root.path().join("b.jpg")]
        );
    }

    #[tokio::test]
    async fn done_log_records_appended_shortcodes() {
        let root = tempfile::tempdir().unwrap();
        let log = DoneLog::new(root.path().join("nested/done.log"));

        assert!(!log.contains("C1").await.unwrap());
        log.append("C1").await.unwrap();
        log.append("C2").await.unwrap();

        assert!(log.contains("C1").await.unwrap());
        assert!(log.contains("C2").await.unwrap());
        assert!(!log.contains("C").await.unwrap());
    }
}

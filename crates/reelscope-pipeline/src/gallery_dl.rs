//! [`MediaDownloader`] backed by the `gallery-dl` command-line tool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reelscope_core::ContentItem;
use tokio::process::Command;

use crate::collaborators::{is_media_file, MediaDownloader};
use crate::error::PipelineError;
use crate::process::run_tool;
use crate::workdir::sorted_files;

#[derive(Debug, Clone)]
pub struct GalleryDl {
    bin: String,
    cookies: Option<PathBuf>,
}

impl Default for GalleryDl {
    fn default() -> Self {
        Self::new("gallery-dl", None)
    }
}

impl GalleryDl {
    /// `cookies` is a Netscape cookie file for a logged-in session; some
    /// posts are only reachable with one.
    #[must_use]
    pub fn new(bin: impl Into<String>, cookies: Option<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            cookies,
        }
    }
}

#[async_trait]
impl MediaDownloader for GalleryDl {
    async fn download(
        &self,
        item: &ContentItem,
        work_dir: &Path,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("--quiet").arg("--directory").arg(work_dir);
        if let Some(cookies) = &self.cookies {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.arg(&item.source_url);

        tracing::info!(shortcode = %item.shortcode, url = %item.source_url, "downloading media");
        run_tool("gallery-dl", &mut cmd).await?;

        let media: Vec<PathBuf> = sorted_files(work_dir)
            .await?
            .into_iter()
            .filter(|p| is_media_file(p))
            .collect();
        tracing::debug!(shortcode = %item.shortcode, files = media.len(), "download finished");
        Ok(media)
    }
}

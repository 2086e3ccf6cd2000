//! Video download via yt-dlp.
//!
//! Each platform has its own format selector. If it fails, one more attempt
//! is made with the fallback selector before the download is reported as
//! failed.

use super::platform::SourcePlatform;
use crate::error::{ReelError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Something that can fetch a remote video into a local directory.
#[async_trait]
pub trait VideoDownloader: Send + Sync {
    /// Download `url` into `dest_dir` and return the written file.
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// yt-dlp backed downloader.
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    tiktok_format: String,
    youtube_format: String,
    fallback_format: String,
}

impl YtDlpDownloader {
    pub fn new(tiktok_format: &str, youtube_format: &str, fallback_format: &str) -> Self {
        Self {
            tiktok_format: tiktok_format.to_string(),
            youtube_format: youtube_format.to_string(),
            fallback_format: fallback_format.to_string(),
        }
    }

    fn format_for(&self, platform: SourcePlatform) -> Option<&str> {
        match platform {
            SourcePlatform::Tiktok => Some(self.tiktok_format.as_str()),
            SourcePlatform::Youtube => Some(self.youtube_format.as_str()),
            SourcePlatform::Unknown => None,
        }
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new(
            "best[ext=mp4]/best",
            "best[height<=1080][ext=mp4]/best[ext=mp4]",
            "best",
        )
    }
}

#[async_trait]
impl VideoDownloader for YtDlpDownloader {
    #[instrument(skip(self, dest_dir))]
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        let platform = SourcePlatform::detect(url);
        let format = self.format_for(platform).ok_or_else(|| {
            ReelError::DownloadFailed(format!("Unsupported platform for {}", url))
        })?;

        tokio::fs::create_dir_all(dest_dir).await?;

        // Unique stem so concurrent downloads into one directory never collide.
        let stem = format!("{}_{}", platform, uuid::Uuid::new_v4().simple());

        match run_yt_dlp(url, format, dest_dir, &stem).await {
            Ok(()) => {}
            Err(ReelError::ToolNotFound(tool)) => return Err(ReelError::ToolNotFound(tool)),
            Err(first) => {
                warn!(
                    "Download with '{}' failed, retrying once with '{}': {}",
                    format, self.fallback_format, first
                );
                run_yt_dlp(url, &self.fallback_format, dest_dir, &stem).await?;
            }
        }

        let path = find_video_file(dest_dir, &stem)?;
        info!("Downloaded {} to {:?}", url, path.file_name());
        Ok(path)
    }
}

async fn run_yt_dlp(url: &str, format: &str, dest_dir: &Path, stem: &str) -> Result<()> {
    let template = dest_dir.join(format!("{}.%(ext)s", stem));
    debug!("yt-dlp -f '{}' {}", format, url);

    let result = Command::new("yt-dlp")
        .arg("--format")
        .arg(format)
        .arg("--output")
        .arg(&template)
        .args(["--no-playlist", "--quiet", "--no-warnings"])
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ReelError::ToolNotFound("yt-dlp".into()));
        }
        Err(e) => {
            return Err(ReelError::DownloadFailed(format!("yt-dlp execution failed: {e}")));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ReelError::DownloadFailed(format!("yt-dlp failed: {}", stderr.trim())));
    }

    Ok(())
}

/// Locate the file yt-dlp wrote for `stem`, skipping partial downloads.
fn find_video_file(dir: &Path, stem: &str) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| ReelError::DownloadFailed(format!("Cannot read directory: {e}")))?;

    entries
        .flatten()
        .map(|entry| entry.path())
        .find(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            name.starts_with(stem) && !name.ends_with(".part") && !name.ends_with(".ytdl")
        })
        .ok_or_else(|| ReelError::DownloadFailed("Video file not found after download".into()))
}

/// Guess a MIME type from a video file extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        _ => "video/mp4",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_platform_fails_without_running_tool() {
        let dir = tempfile::tempdir().unwrap();
        let err = YtDlpDownloader::default()
            .download("https://vimeo.com/1234", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::DownloadFailed(_)));
    }

    #[test]
    fn test_find_video_file_skips_partials() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("youtube_abc.mp4.part"), b"").unwrap();
        std::fs::write(dir.path().join("tiktok_other.mp4"), b"").unwrap();
        assert!(find_video_file(dir.path(), "youtube_abc").is_err());

        std::fs::write(dir.path().join("youtube_abc.mp4"), b"").unwrap();
        let found = find_video_file(dir.path(), "youtube_abc").unwrap();
        assert_eq!(found.file_name().unwrap(), "youtube_abc.mp4");
    }

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for(Path::new("a.webm")), "video/webm");
        assert_eq!(mime_type_for(Path::new("a.MP4")), "video/mp4");
        assert_eq!(mime_type_for(Path::new("noext")), "video/mp4");
    }
}

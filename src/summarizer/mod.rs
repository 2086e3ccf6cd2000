//! Per-video viral pattern analysis.
//!
//! Each URL is downloaded into a request-scoped transient directory, uploaded
//! to the analysis service, polled until the service has processed it, then
//! analyzed. The output always has one entry per input URL, in input order;
//! an item that fails anywhere along the way gets a placeholder record and a
//! status naming the step that failed.

mod gemini;
mod record;

pub use gemini::GeminiFilesClient;
pub use record::{parse_analysis, AnalysisRecord, StorytellingBlueprint};

use crate::error::{ReelError, Result};
use crate::media::{mime_type_for, VideoDownloader};
use crate::poll::{poll_until_complete, PollConfig, PollOutcome, PollStatus};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// A file held by the analysis service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    pub name: String,
    pub uri: String,
    pub mime_type: String,
}

/// Processing state of an uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileState {
    Processing,
    Active,
    Failed(String),
}

/// Upload, inspect, analyze, and delete remote media.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn upload(&self, path: &Path, mime_type: &str) -> Result<RemoteFile>;

    async fn file_state(&self, name: &str) -> Result<FileState>;

    /// Run the instruction against an active file and return the raw model text.
    async fn analyze(&self, file: &RemoteFile, instruction: &str) -> Result<String>;

    async fn delete(&self, name: &str) -> Result<()>;
}

/// How processing of one input ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Ok,
    DownloadFailed,
    UploadFailed,
    AnalysisSchemaInvalid,
    AnalysisFailed,
    Cancelled,
}

/// Analysis for one input URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAnalysis {
    pub url: String,
    pub status: ItemStatus,
    pub analysis: AnalysisRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideoAnalysis {
    fn ok(url: &str, analysis: AnalysisRecord) -> Self {
        Self {
            url: url.to_string(),
            status: ItemStatus::Ok,
            analysis,
            error: None,
        }
    }

    fn failed(url: &str, status: ItemStatus, reason: &str) -> Self {
        Self {
            url: url.to_string(),
            status,
            analysis: AnalysisRecord::placeholder(reason),
            error: Some(reason.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ItemStatus::Ok
    }
}

/// Drives download, upload, processing wait, and analysis for a batch of URLs.
pub struct Summarizer {
    downloader: Arc<dyn VideoDownloader>,
    service: Arc<dyn AnalysisService>,
    instruction: String,
    temp_root: PathBuf,
    max_concurrent: usize,
    poll: PollConfig,
}

impl Summarizer {
    pub fn new(
        downloader: Arc<dyn VideoDownloader>,
        service: Arc<dyn AnalysisService>,
        instruction: &str,
        temp_root: PathBuf,
    ) -> Self {
        Self {
            downloader,
            service,
            instruction: instruction.to_string(),
            temp_root,
            max_concurrent: 2,
            poll: PollConfig::new("file processing"),
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Analyze every URL. The result is index-aligned with `urls`.
    #[instrument(skip(self, urls, cancel), fields(count = urls.len()))]
    pub async fn summarize(
        &self,
        urls: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<VideoAnalysis>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        tokio::fs::create_dir_all(&self.temp_root).await?;
        // Removed on drop, so every exit path clears the downloads.
        let workdir = tempfile::Builder::new()
            .prefix("summarize_")
            .tempdir_in(&self.temp_root)?;
        let workdir_path = workdir.path().to_path_buf();

        info!("Analyzing {} videos ({} concurrent)", urls.len(), self.max_concurrent);

        let mut results: Vec<(usize, VideoAnalysis)> = stream::iter(urls.iter().enumerate())
            .map(|(idx, url)| {
                let dir = workdir_path.clone();
                async move { (idx, self.process_one(url, &dir, cancel).await) }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        results.sort_by_key(|(idx, _)| *idx);
        let analyses: Vec<VideoAnalysis> = results.into_iter().map(|(_, a)| a).collect();

        let ok = analyses.iter().filter(|a| a.is_ok()).count();
        info!("Analysis complete: {}/{} succeeded", ok, analyses.len());

        drop(workdir);
        Ok(analyses)
    }

    async fn process_one(
        &self,
        url: &str,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> VideoAnalysis {
        if cancel.is_cancelled() {
            return VideoAnalysis::failed(url, ItemStatus::Cancelled, "Cancelled before download");
        }

        let local = match self.downloader.download(url, dir).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Download failed for {}: {}", url, e);
                return VideoAnalysis::failed(url, ItemStatus::DownloadFailed, &e.to_string());
            }
        };

        let uploaded = self.service.upload(&local, mime_type_for(&local)).await;
        if let Err(e) = tokio::fs::remove_file(&local).await {
            debug!("Could not remove {:?}: {}", local, e);
        }

        let remote = match uploaded {
            Ok(remote) => remote,
            Err(e) => {
                warn!("Upload failed for {}: {}", url, e);
                return VideoAnalysis::failed(url, ItemStatus::UploadFailed, &e.to_string());
            }
        };

        let result = self.analyze_remote(&remote, cancel).await;

        if let Err(e) = self.service.delete(&remote.name).await {
            warn!("Failed to delete remote file {}: {}", remote.name, e);
        }

        match result {
            Ok(record) => VideoAnalysis::ok(url, record),
            Err(e @ ReelError::AnalysisSchemaInvalid(_)) => {
                warn!("Schema mismatch for {}: {}", url, e);
                VideoAnalysis::failed(url, ItemStatus::AnalysisSchemaInvalid, &e.to_string())
            }
            Err(e @ ReelError::Cancelled(_)) => {
                VideoAnalysis::failed(url, ItemStatus::Cancelled, &e.to_string())
            }
            Err(e) => {
                warn!("Analysis failed for {}: {}", url, e);
                VideoAnalysis::failed(url, ItemStatus::AnalysisFailed, &e.to_string())
            }
        }
    }

    async fn analyze_remote(
        &self,
        remote: &RemoteFile,
        cancel: &CancellationToken,
    ) -> Result<AnalysisRecord> {
        let service = self.service.clone();
        let outcome = poll_until_complete(
            remote.name.clone(),
            move |name: String| {
                let service = service.clone();
                async move {
                    let status = match service.file_state(&name).await? {
                        FileState::Processing => PollStatus::Pending,
                        FileState::Active => PollStatus::Done(()),
                        FileState::Failed(reason) => PollStatus::Failed(reason),
                    };
                    Ok::<_, ReelError>(status)
                }
            },
            &self.poll,
            cancel,
        )
        .await;

        match outcome {
            PollOutcome::Succeeded(()) => {}
            PollOutcome::Failed(reason) => {
                return Err(ReelError::AnalysisFailed(format!(
                    "File processing failed: {}",
                    reason
                )));
            }
            PollOutcome::TimedOut { elapsed } => {
                return Err(ReelError::AnalysisFailed(format!(
                    "File processing did not finish within {}s",
                    elapsed.as_secs()
                )));
            }
            PollOutcome::Abandoned => {
                return Err(ReelError::Cancelled(format!("Stopped waiting on {}", remote.name)));
            }
        }

        let text = self.service.analyze(remote, &self.instruction).await?;
        parse_analysis(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    const GOOD: &str = r#"{"viral_ingredients":["twist"],"video_hooks":["cold open"],"hook_pattern":"question",
        "storytelling_blueprint":{"genre":"g","theme":"t","target_emotion":"e","pov":"p","setting":"s",
        "characters":["c"],"conflict":"c","escalating_stakes":"x","payoff":"y"}}"#;

    struct FakeDownloader {
        failing: HashSet<String>,
    }

    #[async_trait]
    impl VideoDownloader for FakeDownloader {
        async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
            if self.failing.contains(url) {
                return Err(ReelError::DownloadFailed("private video".to_string()));
            }
            let path = dest_dir.join(format!("{}.mp4", url.len()));
            tokio::fs::write(&path, b"data").await?;
            Ok(path)
        }
    }

    #[derive(Default)]
    struct FakeService {
        pending_checks: u32,
        response: Option<String>,
        deleted: Mutex<Vec<String>>,
        checks: Mutex<u32>,
    }

    #[async_trait]
    impl AnalysisService for FakeService {
        async fn upload(&self, path: &Path, mime_type: &str) -> Result<RemoteFile> {
            assert_eq!(mime_type, "video/mp4");
            Ok(RemoteFile {
                name: format!("files/{}", path.file_stem().unwrap().to_string_lossy()),
                uri: "https://files.example/1".to_string(),
                mime_type: mime_type.to_string(),
            })
        }

        async fn file_state(&self, _name: &str) -> Result<FileState> {
            let mut checks = self.checks.lock().unwrap();
            *checks += 1;
            if *checks <= self.pending_checks {
                Ok(FileState::Processing)
            } else {
                Ok(FileState::Active)
            }
        }

        async fn analyze(&self, _file: &RemoteFile, _instruction: &str) -> Result<String> {
            Ok(self.response.clone().unwrap_or_else(|| GOOD.to_string()))
        }

        async fn delete(&self, name: &str) -> Result<()> {
            self.deleted.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    fn summarizer(
        failing: &[&str],
        service: Arc<FakeService>,
        temp_root: &Path,
    ) -> Summarizer {
        let downloader = Arc::new(FakeDownloader {
            failing: failing.iter().map(|s| s.to_string()).collect(),
        });
        Summarizer::new(downloader, service, "analyze", temp_root.to_path_buf())
            .with_poll_config(PollConfig::new("test").with_interval(Duration::from_secs(1)))
    }

    fn urls() -> Vec<String> {
        vec![
            "https://youtu.be/a".to_string(),
            "https://youtu.be/bb".to_string(),
            "https://youtu.be/ccc".to_string(),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failed_download_keeps_alignment() {
        let temp = tempfile::tempdir().unwrap();
        let service = Arc::new(FakeService {
            pending_checks: 2,
            ..Default::default()
        });
        let summarizer = summarizer(&["https://youtu.be/bb"], service.clone(), temp.path());

        let results = summarizer.summarize(&urls(), &CancellationToken::new()).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, ItemStatus::Ok);
        assert_eq!(results[1].status, ItemStatus::DownloadFailed);
        assert!(results[1].analysis.is_placeholder());
        assert_eq!(results[1].url, "https://youtu.be/bb");
        assert_eq!(results[2].status, ItemStatus::Ok);
        assert_eq!(service.deleted.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schema_mismatch_still_deletes_remote() {
        let temp = tempfile::tempdir().unwrap();
        let service = Arc::new(FakeService {
            response: Some(r#"{"viral_ingredients": []}"#.to_string()),
            ..Default::default()
        });
        let summarizer = summarizer(&[], service.clone(), temp.path());

        let results = summarizer
            .summarize(&urls()[..1], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results[0].status, ItemStatus::AnalysisSchemaInvalid);
        assert!(results[0].analysis.is_placeholder());
        assert_eq!(service.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_directory_is_removed() {
        let temp = tempfile::tempdir().unwrap();
        let service = Arc::new(FakeService::default());
        let summarizer = summarizer(&["https://youtu.be/a"], service, temp.path());

        summarizer.summarize(&urls(), &CancellationToken::new()).await.unwrap();

        let leftover = std::fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn test_cancelled_batch_marks_every_item() {
        let temp = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let summarizer = summarizer(&[], Arc::new(FakeService::default()), temp.path());

        let results = summarizer.summarize(&urls(), &cancel).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.status == ItemStatus::Cancelled));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_value(ItemStatus::AnalysisSchemaInvalid).unwrap();
        assert_eq!(json, "analysis_schema_invalid");
    }
}

//! Video generation against an asynchronous generative-video service.
//!
//! Every prompt follows `submitted -> polling -> succeeded | failed | timed_out`.
//! Batches run a capped number of jobs at once and hand back one
//! [`GenerationJob`] per prompt, in prompt order, whatever order the jobs
//! finish in.

mod veo;

pub use veo::VeoClient;

use crate::config::ReferenceMode;
use crate::error::{ErrorReport, ReelError, Result};
use crate::poll::{await_completion, PollConfig, PollOutcome, PollStatus};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Immutable description of one clip to generate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub requester_id: String,
    pub target_filename: String,
    /// Sent to backends that deduplicate submissions.
    pub idempotency_key: String,
}

impl GenerationRequest {
    pub fn new(prompt: &str, requester_id: &str) -> Self {
        let id = uuid::Uuid::new_v4();
        Self {
            prompt: prompt.to_string(),
            requester_id: requester_id.to_string(),
            target_filename: format!("{}_{}.mp4", sanitize(requester_id), id.simple()),
            idempotency_key: id.to_string(),
        }
    }
}

/// Path-safe form of a requester id, shared by every stage that writes per-requester output.
pub(crate) fn sanitize(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "anonymous".to_string()
    } else {
        cleaned
    }
}

/// Opaque pointer to a stored video artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoReference(String);

impl VideoReference {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(format!("file://{}", path.display()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_storage(&self) -> bool {
        self.0.starts_with("gs://")
    }

    /// Local filesystem path for `file://` references.
    pub fn local_path(&self) -> Option<PathBuf> {
        self.0.strip_prefix("file://").map(PathBuf::from)
    }

    /// Whether the reference lives where output for `requester_id` is written:
    /// under a `<requester>/` directory, or as a `<requester>_<id>.mp4` clip.
    pub fn belongs_to(&self, requester_id: &str) -> bool {
        let owner = sanitize(requester_id);
        let Some((scheme, path)) = self.0.split_once("://") else {
            return false;
        };
        let mut segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|s| *s == "..") {
            return false;
        }
        let Some(file) = segments.pop() else {
            return false;
        };
        // The first storage segment is the bucket.
        let skip = usize::from(scheme == "gs");
        if segments.iter().skip(skip).any(|s| *s == owner) {
            return true;
        }

        file.strip_prefix(owner.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(|rest| rest.strip_suffix(".mp4"))
            .is_some_and(|id| id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit()))
    }
}

impl std::fmt::Display for VideoReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A finished video as reported by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedVideo {
    /// Storage URI or download URI.
    pub uri: String,
}

/// Generative-video service.
#[async_trait]
pub trait VideoBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Whether resubmitting with the same idempotency key is deduplicated.
    fn supports_idempotency(&self) -> bool;

    /// Submit a request and return the operation handle.
    async fn submit(&self, request: &GenerationRequest, output_uri: Option<&str>) -> Result<String>;

    async fn poll(&self, handle: &str) -> Result<PollStatus<GeneratedVideo>>;

    /// Download the bytes of a finished video.
    async fn fetch(&self, video: &GeneratedVideo) -> Result<Vec<u8>>;
}

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Done,
    Failed,
    TimedOut,
    Cancelled,
}

/// One submitted (or skipped) generation and how it ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub request: GenerationRequest,
    pub handle: Option<String>,
    pub status: JobStatus,
    pub result: Option<VideoReference>,
    pub error: Option<ErrorReport>,
    /// Seconds spent waiting on the handle before giving up.
    #[serde(default)]
    pub waited_seconds: u64,
}

impl GenerationJob {
    fn pending(request: GenerationRequest) -> Self {
        Self {
            request,
            handle: None,
            status: JobStatus::Pending,
            result: None,
            error: None,
            waited_seconds: 0,
        }
    }

    fn fail(&mut self, status: JobStatus, err: &ReelError) {
        self.status = status;
        self.error = Some(err.to_report());
    }

    /// A handle was issued but no terminal state was observed.
    pub fn is_unconfirmed(&self) -> bool {
        self.handle.is_some() && matches!(self.status, JobStatus::TimedOut | JobStatus::Cancelled)
    }

    pub fn into_result(self) -> Result<VideoReference> {
        match (self.status, self.result) {
            (JobStatus::Done, Some(reference)) => Ok(reference),
            (JobStatus::TimedOut, _) => Err(ReelError::GenerationTimedOut {
                handle: self.handle.unwrap_or_default(),
                seconds: self.waited_seconds,
            }),
            (JobStatus::Cancelled, _) => Err(ReelError::Cancelled(
                self.error.map(|e| e.message).unwrap_or_else(|| "generation cancelled".to_string()),
            )),
            _ => Err(ReelError::GenerationFailed(
                self.error.map(|e| e.message).unwrap_or_else(|| "unknown failure".to_string()),
            )),
        }
    }
}

/// Index-aligned outcome of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub jobs: Vec<GenerationJob>,
    /// Handles that were submitted but never confirmed terminal.
    pub unconfirmed: Vec<String>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.jobs.iter().all(|j| j.status == JobStatus::Done)
    }

    /// Every reference in prompt order, or the first per-item error.
    pub fn references(&self) -> Result<Vec<VideoReference>> {
        self.jobs
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, job)| {
                job.into_result().map_err(|e| match e {
                    ReelError::GenerationFailed(msg) => {
                        ReelError::GenerationFailed(format!("prompt {}: {}", i + 1, msg))
                    }
                    other => other,
                })
            })
            .collect()
    }
}

/// Runs generation jobs and resolves their output into references.
pub struct Generator {
    backend: Arc<dyn VideoBackend>,
    mode: ReferenceMode,
    storage_uri: Option<String>,
    output_dir: PathBuf,
    poll: PollConfig,
    max_concurrent: usize,
}

impl Generator {
    pub fn new(
        backend: Arc<dyn VideoBackend>,
        mode: ReferenceMode,
        storage_uri: Option<String>,
        output_dir: PathBuf,
    ) -> Result<Self> {
        if mode == ReferenceMode::Storage && storage_uri.is_none() {
            return Err(ReelError::Config(
                "generator.storage_uri is required in storage reference mode".to_string(),
            ));
        }
        if !backend.supports_idempotency() {
            info!(
                "{} ignores idempotency keys; resubmitting a prompt creates a new billable job",
                backend.name()
            );
        }
        Ok(Self {
            backend,
            mode,
            storage_uri,
            output_dir,
            poll: PollConfig::new("video generation"),
            max_concurrent: 2,
        })
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Generate a single video. Timeouts and failures are reported distinctly.
    #[instrument(skip(self, request, cancel), fields(requester = %request.requester_id))]
    pub async fn generate_one(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<VideoReference> {
        let job = self.run_job(request, cancel).await;
        if job.is_unconfirmed() {
            if let Some(handle) = &job.handle {
                warn!("Generation {} not confirmed terminal", handle);
            }
        }
        match job.status {
            JobStatus::TimedOut => Err(ReelError::GenerationTimedOut {
                handle: job.handle.unwrap_or_default(),
                seconds: self.poll.deadline.as_secs(),
            }),
            _ => job.into_result(),
        }
    }

    /// Generate one video per request, up to `max_concurrent` at once.
    #[instrument(skip(self, requests, cancel), fields(count = requests.len()))]
    pub async fn generate_batch(
        &self,
        requests: Vec<GenerationRequest>,
        cancel: &CancellationToken,
    ) -> BatchResult {
        info!("Generating {} videos ({} concurrent)", requests.len(), self.max_concurrent);

        let mut jobs: Vec<(usize, GenerationJob)> = stream::iter(requests.into_iter().enumerate())
            .map(|(idx, request)| async move { (idx, self.run_job(request, cancel).await) })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        jobs.sort_by_key(|(idx, _)| *idx);
        let jobs: Vec<GenerationJob> = jobs.into_iter().map(|(_, job)| job).collect();

        let unconfirmed: Vec<String> = jobs
            .iter()
            .filter(|j| j.is_unconfirmed())
            .filter_map(|j| j.handle.clone())
            .collect();
        for handle in &unconfirmed {
            warn!("Generation {} was not confirmed terminal and may still run remotely", handle);
        }

        let done = jobs.iter().filter(|j| j.status == JobStatus::Done).count();
        info!("Batch complete: {}/{} videos generated", done, jobs.len());

        BatchResult { jobs, unconfirmed }
    }

    fn output_uri_for(&self, request: &GenerationRequest) -> Option<String> {
        match self.mode {
            ReferenceMode::Storage => self.storage_uri.as_ref().map(|base| {
                format!("{}/{}/", base.trim_end_matches('/'), sanitize(&request.requester_id))
            }),
            ReferenceMode::Local => None,
        }
    }

    async fn run_job(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> GenerationJob {
        let mut job = GenerationJob::pending(request);
        let output_uri = self.output_uri_for(&job.request);
        let backend = self.backend.clone();

        let completion = await_completion(
            || self.backend.submit(&job.request, output_uri.as_deref()),
            move |handle: String| {
                let backend = backend.clone();
                async move { backend.poll(&handle).await }
            },
            &self.poll,
            cancel,
        )
        .await;

        let completion = match completion {
            Ok(c) => c,
            Err(e @ ReelError::Cancelled(_)) => {
                job.fail(JobStatus::Cancelled, &e);
                return job;
            }
            Err(e) => {
                warn!("Submission failed: {}", e);
                job.fail(JobStatus::Failed, &ReelError::GenerationFailed(e.to_string()));
                return job;
            }
        };

        let handle = completion.handle;
        job.handle = Some(handle.clone());

        match completion.outcome {
            PollOutcome::Succeeded(video) => match self.resolve(&video, &job.request).await {
                Ok(reference) => {
                    job.status = JobStatus::Done;
                    job.result = Some(reference);
                }
                Err(e) => job.fail(JobStatus::Failed, &ReelError::GenerationFailed(e.to_string())),
            },
            PollOutcome::Failed(reason) => {
                job.fail(
                    JobStatus::Failed,
                    &ReelError::GenerationFailed(format!("{}: {}", handle, reason)),
                );
            }
            PollOutcome::TimedOut { elapsed } => {
                job.waited_seconds = elapsed.as_secs();
                job.fail(
                    JobStatus::TimedOut,
                    &ReelError::GenerationTimedOut {
                        handle: handle.clone(),
                        seconds: elapsed.as_secs(),
                    },
                );
            }
            PollOutcome::Abandoned => {
                job.fail(
                    JobStatus::Cancelled,
                    &ReelError::Cancelled(format!("stopped polling {}", handle)),
                );
            }
        }
        job
    }

    /// Turn backend output into a reference of the configured mode.
    async fn resolve(
        &self,
        video: &GeneratedVideo,
        request: &GenerationRequest,
    ) -> Result<VideoReference> {
        match self.mode {
            ReferenceMode::Storage => {
                if video.uri.starts_with("gs://") {
                    Ok(VideoReference::new(video.uri.clone()))
                } else {
                    Err(ReelError::GenerationFailed(format!(
                        "{} did not write to storage (got {})",
                        self.backend.name(),
                        video.uri
                    )))
                }
            }
            ReferenceMode::Local => {
                let bytes = self.backend.fetch(video).await?;
                tokio::fs::create_dir_all(&self.output_dir).await?;
                let path = self.output_dir.join(&request.target_filename);
                tokio::fs::write(&path, &bytes).await?;
                info!("Saved {} ({} bytes)", path.display(), bytes.len());
                Ok(VideoReference::from_path(&path))
            }
        }
    }
}

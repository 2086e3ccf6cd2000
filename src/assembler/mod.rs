//! Merging generated clips into one video.
//!
//! The assembler submits one merge job per request and waits on it with the
//! same submit/poll primitive the generator uses. A merge either produces the
//! full combined video or fails as a whole.

mod ffmpeg;
mod transcoder;

pub use ffmpeg::FfmpegConcat;
pub use transcoder::TranscoderClient;

use crate::error::{ReelError, Result};
use crate::generator::VideoReference;
use crate::poll::{await_completion, PollConfig, PollOutcome, PollStatus};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// A merge job: inputs in playback order and where the result lands.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeJobSpec {
    pub requester_id: String,
    pub inputs: Vec<VideoReference>,
    pub output: VideoReference,
}

/// Transcoding/merge service.
#[async_trait]
pub trait MergeBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Deterministic output location for a requester.
    fn output_for(&self, requester_id: &str) -> Result<VideoReference>;

    async fn submit(&self, spec: &MergeJobSpec) -> Result<String>;

    async fn poll(&self, handle: &str) -> Result<PollStatus<()>>;

    /// Stop a job that will no longer be polled and release what it holds.
    async fn abandon(&self, _handle: &str) -> Result<()> {
        Ok(())
    }
}

pub struct Assembler {
    backend: Arc<dyn MergeBackend>,
    poll: PollConfig,
}

impl Assembler {
    pub fn new(backend: Arc<dyn MergeBackend>) -> Self {
        Self {
            backend,
            poll: PollConfig::new("merge").fixed(),
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Merge `references` in order into one video owned by `requester_id`.
    #[instrument(
        skip(self, references, cancel),
        fields(backend = self.backend.name(), inputs = references.len())
    )]
    pub async fn assemble(
        &self,
        requester_id: &str,
        references: &[VideoReference],
        cancel: &CancellationToken,
    ) -> Result<VideoReference> {
        if references.is_empty() {
            return Err(ReelError::InvalidInput("No videos to assemble".to_string()));
        }
        if let Some(foreign) = references.iter().find(|r| !r.belongs_to(requester_id)) {
            return Err(ReelError::InvalidInput(format!(
                "{} does not belong to requester {}",
                foreign, requester_id
            )));
        }

        let spec = MergeJobSpec {
            requester_id: requester_id.to_string(),
            inputs: references.to_vec(),
            output: self.backend.output_for(requester_id)?,
        };

        let backend = self.backend.clone();
        let completion = await_completion(
            || self.backend.submit(&spec),
            move |handle: String| {
                let backend = backend.clone();
                async move { backend.poll(&handle).await }
            },
            &self.poll,
            cancel,
        )
        .await
        .map_err(|e| match e {
            ReelError::Cancelled(msg) => ReelError::Cancelled(msg),
            other => ReelError::MergeFailed(other.to_string()),
        })?;

        match completion.outcome {
            PollOutcome::Succeeded(()) => {
                info!("Merged {} clips into {}", references.len(), spec.output);
                Ok(spec.output)
            }
            PollOutcome::Failed(reason) => Err(ReelError::MergeFailed(format!(
                "job {} failed: {}",
                completion.handle, reason
            ))),
            PollOutcome::TimedOut { elapsed } => {
                warn!("Merge job {} not confirmed terminal", completion.handle);
                self.release(&completion.handle).await;
                Err(ReelError::MergeFailed(format!(
                    "job {} did not finish within {}s",
                    completion.handle,
                    elapsed.as_secs()
                )))
            }
            PollOutcome::Abandoned => {
                warn!("Merge job {} abandoned before completion", completion.handle);
                self.release(&completion.handle).await;
                Err(ReelError::Cancelled(format!("merge job {} abandoned", completion.handle)))
            }
        }
    }

    async fn release(&self, handle: &str) {
        if let Err(e) = self.backend.abandon(handle).await {
            warn!("Could not stop merge job {}: {}", handle, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingBackend {
        specs: Mutex<Vec<MergeJobSpec>>,
        outcome: PollStatus<()>,
        abandoned: Mutex<Vec<String>>,
    }

    impl RecordingBackend {
        fn new(outcome: PollStatus<()>) -> Arc<Self> {
            Arc::new(Self {
                specs: Mutex::new(Vec::new()),
                outcome,
                abandoned: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MergeBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        fn output_for(&self, requester_id: &str) -> Result<VideoReference> {
            Ok(VideoReference::new(format!("gs://out/{}/final_combined.mp4", requester_id)))
        }

        async fn submit(&self, spec: &MergeJobSpec) -> Result<String> {
            self.specs.lock().unwrap().push(spec.clone());
            Ok("jobs/1".to_string())
        }

        async fn poll(&self, _handle: &str) -> Result<PollStatus<()>> {
            Ok(self.outcome.clone())
        }

        async fn abandon(&self, handle: &str) -> Result<()> {
            self.abandoned.lock().unwrap().push(handle.to_string());
            Ok(())
        }
    }

    fn refs(owner: &str, names: &[&str]) -> Vec<VideoReference> {
        names
            .iter()
            .map(|n| VideoReference::new(format!("gs://gen/{}/{}.mp4", owner, n)))
            .collect()
    }

    #[tokio::test]
    async fn test_inputs_keep_order() {
        let backend = RecordingBackend::new(PollStatus::Done(()));
        let assembler = Assembler::new(backend.clone());

        let merged = assembler
            .assemble("user-7", &refs("user-7", &["A", "B", "C"]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(merged.as_str(), "gs://out/user-7/final_combined.mp4");
        let specs = backend.specs.lock().unwrap();
        assert_eq!(specs[0].inputs, refs("user-7", &["A", "B", "C"]));
    }

    #[tokio::test]
    async fn test_failed_job_is_merge_failed() {
        let backend = RecordingBackend::new(PollStatus::Failed("codec mismatch".to_string()));
        let err = Assembler::new(backend)
            .assemble("u", &refs("u", &["A"]), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MergeFailed);
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let backend = RecordingBackend::new(PollStatus::Done(()));
        let err = Assembler::new(backend.clone())
            .assemble("u", &[], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::InvalidInput(_)));
        assert!(backend.specs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_requesters_clips_rejected() {
        let backend = RecordingBackend::new(PollStatus::Done(()));
        let mut inputs = refs("user-a", &["A"]);
        inputs.extend(refs("user-b", &["secret"]));

        let err = Assembler::new(backend.clone())
            .assemble("user-a", &inputs, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::InvalidInput(_)));
        assert!(err.to_string().contains("gs://gen/user-b/secret.mp4"));
        assert!(backend.specs.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_job_is_abandoned() {
        let backend = RecordingBackend::new(PollStatus::Pending);
        let assembler = Assembler::new(backend.clone()).with_poll_config(
            PollConfig::new("merge")
                .with_interval(Duration::from_secs(5))
                .with_deadline(Duration::from_secs(30))
                .fixed(),
        );

        let err = assembler
            .assemble("u", &refs("u", &["A", "B"]), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MergeFailed);
        assert_eq!(backend.abandoned.lock().unwrap().as_slice(), ["jobs/1"]);
    }
}

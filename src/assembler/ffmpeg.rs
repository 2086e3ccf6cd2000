//! Local merge backend using the ffmpeg concat demuxer.

use super::{MergeBackend, MergeJobSpec};
use crate::error::{ReelError, Result};
use crate::generator::{sanitize, VideoReference};
use crate::poll::PollStatus;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

struct RunningMerge {
    child: Child,
    list_path: PathBuf,
    log_path: PathBuf,
}

impl RunningMerge {
    /// Remove the job's concat list and log.
    async fn cleanup(&self) {
        for path in [&self.list_path, &self.log_path] {
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

/// Runs ffmpeg as a background child process per merge job.
pub struct FfmpegConcat {
    program: String,
    output_dir: PathBuf,
    output_filename: String,
    jobs: Mutex<HashMap<String, RunningMerge>>,
}

impl FfmpegConcat {
    pub fn new(output_dir: PathBuf, output_filename: &str) -> Self {
        Self {
            program: "ffmpeg".to_string(),
            output_dir,
            output_filename: output_filename.to_string(),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Use a different ffmpeg executable.
    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    fn requester_dir(&self, requester_id: &str) -> PathBuf {
        self.output_dir.join(sanitize(requester_id))
    }
}

/// Concat demuxer list, one `file` line per input in order.
fn concat_list(inputs: &[VideoReference]) -> Result<String> {
    let mut list = String::new();
    for reference in inputs {
        let path = reference.local_path().ok_or_else(|| {
            ReelError::InvalidInput(format!(
                "ffmpeg inputs must be file:// references, got {}",
                reference
            ))
        })?;
        let escaped = path.to_string_lossy().replace('\'', r"'\''");
        list.push_str(&format!("file '{}'\n", escaped));
    }
    Ok(list)
}

async fn read_log_tail(path: &Path) -> String {
    let log = tokio::fs::read_to_string(path).await.unwrap_or_default();
    let lines: Vec<&str> = log.lines().collect();
    lines[lines.len().saturating_sub(5)..].join("\n")
}

#[async_trait]
impl MergeBackend for FfmpegConcat {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn output_for(&self, requester_id: &str) -> Result<VideoReference> {
        Ok(VideoReference::from_path(
            &self.requester_dir(requester_id).join(&self.output_filename),
        ))
    }

    #[instrument(skip(self, spec), fields(requester = %spec.requester_id))]
    async fn submit(&self, spec: &MergeJobSpec) -> Result<String> {
        let list = concat_list(&spec.inputs)?;
        let output = spec
            .output
            .local_path()
            .ok_or_else(|| {
                ReelError::InvalidInput(format!("ffmpeg output must be local, got {}", spec.output))
            })?;

        let dir = self.requester_dir(&spec.requester_id);
        tokio::fs::create_dir_all(&dir).await?;

        let handle = uuid::Uuid::new_v4().simple().to_string();
        let list_path = dir.join(format!("concat_{}.txt", handle));
        let log_path = dir.join(format!("concat_{}.log", handle));
        tokio::fs::write(&list_path, list).await?;
        let log = std::fs::File::create(&log_path)?;

        let spawned = Command::new(&self.program)
            .args(["-y", "-loglevel", "error"])
            .args(["-f", "concat", "-safe", "0"])
            .arg("-i")
            .arg(&list_path)
            .args(["-c", "copy"])
            .arg(&output)
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let _ = tokio::fs::remove_file(&list_path).await;
                let _ = tokio::fs::remove_file(&log_path).await;
                if e.kind() == std::io::ErrorKind::NotFound {
                    return Err(ReelError::ToolNotFound(self.program.clone()));
                }
                return Err(ReelError::MergeFailed(format!("ffmpeg failed to start: {e}")));
            }
        };

        debug!("ffmpeg merge {} started for {} inputs", handle, spec.inputs.len());
        let running = RunningMerge {
            child,
            list_path,
            log_path,
        };
        self.jobs.lock().await.insert(handle.clone(), running);
        Ok(handle)
    }

    async fn poll(&self, handle: &str) -> Result<PollStatus<()>> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .get_mut(handle)
            .ok_or_else(|| ReelError::MergeFailed(format!("unknown merge job {}", handle)))?;

        let Some(status) = job.child.try_wait()? else {
            return Ok(PollStatus::Pending);
        };

        let Some(finished) = jobs.remove(handle) else {
            return Ok(PollStatus::Pending);
        };
        drop(jobs);

        let outcome = if status.success() {
            PollStatus::Done(())
        } else {
            let tail = read_log_tail(&finished.log_path).await;
            PollStatus::Failed(format!("ffmpeg exited with {}: {}", status, tail))
        };
        finished.cleanup().await;
        Ok(outcome)
    }

    async fn abandon(&self, handle: &str) -> Result<()> {
        let Some(mut running) = self.jobs.lock().await.remove(handle) else {
            return Ok(());
        };
        if let Err(e) = running.child.kill().await {
            warn!("Failed to stop ffmpeg merge {}: {}", handle, e);
        }
        running.cleanup().await;
        debug!("ffmpeg merge {} abandoned", handle);
        Ok(())
    }
}

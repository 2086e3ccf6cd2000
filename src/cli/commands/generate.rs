//! Generate command implementation.

use super::cancel_on_ctrl_c;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::generator::{GenerationRequest, JobStatus, VideoReference};
use crate::pipeline::{build_assembler, build_generator, build_http_client, build_store};
use crate::publisher::Publisher;
use anyhow::Result;

/// Generate one clip per prompt; with `series`, merge them in prompt order.
pub async fn run_generate(
    prompts: &[String],
    series: bool,
    requester: &str,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Generate, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }
    if series {
        preflight::check(Operation::Assemble, &settings)?;
    }

    let http = build_http_client()?;
    let generator = build_generator(&settings, &http)?;
    let publisher = Publisher::new(build_store(&settings)?);
    let cancel = cancel_on_ctrl_c();

    let requests: Vec<GenerationRequest> = prompts
        .iter()
        .map(|p| GenerationRequest::new(p, requester))
        .collect();
    let pb = Output::progress_bar(requests.len() as u64, "generating");
    pb.tick();
    let batch = generator.generate_batch(requests, &cancel).await;
    pb.finish_and_clear();

    for (i, job) in batch.jobs.iter().enumerate() {
        match (&job.status, &job.result, &job.error) {
            (JobStatus::Done, Some(reference), _) => {
                Output::list_item(&format!("{}. {}", i + 1, reference))
            }
            (status, _, Some(report)) => {
                Output::error(&format!("{}. {:?}: {}", i + 1, status, report.message));
            }
            (status, _, None) => Output::warning(&format!("{}. {:?}", i + 1, status)),
        }
    }
    for handle in &batch.unconfirmed {
        Output::warning(&format!("Operation {} was not confirmed finished", handle));
    }

    let references = batch.references()?;
    if !series {
        let series_id = record_outputs(&publisher, requester, &references, None).await?;
        Output::success(&format!(
            "Generated {} video(s), stored under {}",
            references.len(),
            series_id
        ));
        return Ok(());
    }

    let assembler = build_assembler(&settings, &http)?;
    let spinner = Output::spinner(&format!("Merging {} clips...", references.len()));
    let merged = assembler.assemble(requester, &references, &cancel).await;
    spinner.finish_and_clear();

    let merged = merged?;
    let series_id = record_outputs(&publisher, requester, &references, Some(&merged)).await?;
    Output::success(&format!("Merged series {}: {}", series_id, merged));
    Ok(())
}

/// Store the clips under a fresh series id and add any merged video to the
/// requester's history.
async fn record_outputs(
    publisher: &Publisher,
    requester: &str,
    clips: &[VideoReference],
    merged: Option<&VideoReference>,
) -> crate::Result<String> {
    let series_id = format!("series_{}", uuid::Uuid::new_v4().simple());
    publisher.publish_series(&series_id, clips).await?;
    if let Some(merged) = merged {
        publisher.publish_final(requester, merged).await?;
    }
    Ok(series_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::MemoryReferenceStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_generated_clips_are_retrievable() {
        let publisher = Publisher::new(Arc::new(MemoryReferenceStore::new()));
        let clips = vec![
            VideoReference::new("gs://gen/u/a.mp4"),
            VideoReference::new("gs://gen/u/b.mp4"),
        ];

        let single = record_outputs(&publisher, "u", &clips, None).await.unwrap();
        assert_eq!(publisher.lookup(&single).await.unwrap().unwrap().references, clips);
        assert!(publisher.lookup("u").await.unwrap().is_none());

        let merged = VideoReference::new("gs://out/u/final_combined.mp4");
        let series = record_outputs(&publisher, "u", &clips, Some(&merged)).await.unwrap();
        assert_ne!(series, single);
        assert_eq!(publisher.lookup("u").await.unwrap().unwrap().references, vec![merged]);
    }
}

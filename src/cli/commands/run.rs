//! Run command - full pipeline for one request.

use super::cancel_on_ctrl_c;
use crate::agents::JobRequest;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::{Pipeline, PipelineOutcome};
use anyhow::Result;

/// Run the pipeline for a free-form or structured request.
pub async fn run_pipeline(
    input: Option<String>,
    duration: Option<String>,
    category: Option<String>,
    requester: &str,
    json: bool,
    settings: Settings,
) -> Result<()> {
    let request = match (input, duration, category) {
        (_, Some(duration), Some(category)) => JobRequest::structured(&duration, &category),
        (Some(input), _, _) => JobRequest::classify(&input)?,
        _ => {
            Output::error("Provide an idea, a JSON request, or --duration with --category.");
            return Err(anyhow::anyhow!("no request given"));
        }
    };

    if let Err(e) = preflight::check(Operation::Run, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'reelsmith doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let pipeline = Pipeline::new(settings)?;
    let cancel = cancel_on_ctrl_c();

    let spinner = (!json).then(|| Output::spinner("Running pipeline..."));
    let result = pipeline.run_reported(&request, requester, &cancel).await;
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }

    match result {
        Ok(outcome) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
            Ok(())
        }
        Err(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                Output::report(&report);
            }
            Err(anyhow::anyhow!("{}", report.message))
        }
    }
}

fn print_outcome(outcome: &PipelineOutcome) {
    Output::success(&format!("Completed {} tasks", outcome.tasks.len()));
    Output::kv("Series", &outcome.series_id);
    if let Some(collection) = &outcome.collection {
        Output::kv("Search term", &collection.search_term);
    }
    if !outcome.analyses.is_empty() {
        let ok = outcome.analyses.iter().filter(|a| a.is_ok()).count();
        Output::kv("Analyzed", &format!("{}/{}", ok, outcome.analyses.len()));
    }
    if let Some(compiled) = &outcome.compiled {
        Output::kv("Prompts", &compiled.total_prompts.to_string());
    }
    if let Some(batch) = &outcome.generation {
        for handle in &batch.unconfirmed {
            Output::warning(&format!("Generation {} was not confirmed finished", handle));
        }
    }

    if !outcome.clips.is_empty() {
        Output::header("Clips");
        for clip in &outcome.clips {
            Output::list_item(clip.as_str());
        }
    }
    if let Some(reference) = &outcome.final_reference {
        println!();
        Output::kv("Final video", reference.as_str());
    }
}

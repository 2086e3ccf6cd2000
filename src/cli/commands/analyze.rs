//! Analyze command implementation.

use super::cancel_on_ctrl_c;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::pipeline::{build_http_client, build_summarizer};
use anyhow::Result;

/// Analyze videos and print one record per URL, in input order.
pub async fn run_analyze(urls: &[String], json: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Analyze, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'reelsmith doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let prompts = Prompts::for_settings(&settings)?;
    let summarizer = build_summarizer(&settings, &prompts, &build_http_client()?)?;
    let cancel = cancel_on_ctrl_c();

    let spinner = Output::spinner(&format!("Analyzing {} video(s)...", urls.len()));
    let analyses = summarizer.summarize(urls, &cancel).await;
    spinner.finish_and_clear();
    let analyses = analyses?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analyses)?);
        return Ok(());
    }

    for analysis in &analyses {
        Output::analysis(analysis);
    }
    let ok = analyses.iter().filter(|a| a.is_ok()).count();
    println!();
    if ok == analyses.len() {
        Output::success(&format!("Analyzed {} video(s)", ok));
    } else {
        Output::warning(&format!("Analyzed {}/{} video(s)", ok, analyses.len()));
    }

    Ok(())
}

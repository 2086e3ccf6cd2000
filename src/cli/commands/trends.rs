//! Trends command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::collector::CollectRequest;
use crate::config::Settings;
use crate::pipeline::{build_collector, build_http_client};
use anyhow::Result;

/// Collect and print ranked trending videos.
pub async fn run_trends(
    category: &str,
    region: Option<String>,
    timeframe: Option<String>,
    limit: Option<usize>,
    json: bool,
    mut settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Trends, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    if let Some(limit) = limit {
        settings.collector.limit = limit;
    }
    let collector = build_collector(&settings, &build_http_client()?)?;
    let request = CollectRequest {
        region: region.unwrap_or_else(|| settings.collector.region.clone()),
        timeframe: timeframe.unwrap_or_else(|| settings.collector.timeframe.clone()),
        category: category.to_string(),
    };

    let spinner = Output::spinner(&format!("Collecting '{}' videos...", category));
    let collection = collector.collect(&request).await;
    spinner.finish_and_clear();
    let collection = collection?;

    if json {
        println!("{}", serde_json::to_string_pretty(&collection)?);
        return Ok(());
    }

    for report in &collection.platforms {
        if let Some(error) = &report.error {
            Output::warning(&format!("{} failed: {}", report.platform, error));
        }
    }

    if collection.candidates.is_empty() {
        Output::info(&format!("No videos found for '{}'.", collection.search_term));
        return Ok(());
    }

    Output::header(&format!(
        "Trending for '{}' ({})",
        collection.search_term,
        collection.candidates.len()
    ));
    for (i, candidate) in collection.candidates.iter().enumerate() {
        Output::candidate(i + 1, candidate);
    }

    Ok(())
}

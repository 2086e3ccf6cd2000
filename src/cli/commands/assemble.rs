//! Assemble command implementation.

use super::cancel_on_ctrl_c;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::generator::VideoReference;
use crate::pipeline::{build_assembler, build_http_client, build_store};
use crate::publisher::Publisher;
use anyhow::Result;

/// Merge the given references, in order.
pub async fn run_assemble(
    references: &[String],
    requester: &str,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Assemble, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let assembler = build_assembler(&settings, &build_http_client()?)?;
    let publisher = Publisher::new(build_store(&settings)?);
    let references: Vec<VideoReference> = references.iter().map(VideoReference::new).collect();
    let cancel = cancel_on_ctrl_c();

    let spinner = Output::spinner(&format!("Merging {} clips...", references.len()));
    let merged = assembler.assemble(requester, &references, &cancel).await;
    spinner.finish_and_clear();

    match merged {
        Ok(reference) => {
            publisher.publish_final(requester, &reference).await?;
            Output::success(&format!("Merged: {}", reference));
            Ok(())
        }
        Err(e) => {
            Output::report(&e.to_report());
            Err(e.into())
        }
    }
}

//! Refs command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::build_store;
use crate::publisher::Publisher;
use anyhow::Result;

/// Show references stored under `key`, or every key.
pub async fn run_refs(key: Option<&str>, settings: Settings) -> Result<()> {
    let publisher = Publisher::new(build_store(&settings)?);

    let Some(key) = key else {
        let keys = publisher.store().list_keys().await?;
        if keys.is_empty() {
            Output::info(
                "Nothing published yet. Use 'reelsmith run' or 'reelsmith generate' to produce videos.",
            );
        } else {
            Output::header(&format!("Published keys ({})", keys.len()));
            for key in &keys {
                Output::list_item(key);
            }
        }
        return Ok(());
    };

    match publisher.lookup(key).await? {
        Some(stored) => {
            Output::header(key);
            Output::kv("Updated", &stored.updated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
            for (i, reference) in stored.references.iter().enumerate() {
                Output::list_item(&format!("{}. {}", i + 1, reference));
            }
        }
        None => Output::warning(&format!("No references stored under '{}'", key)),
    }

    Ok(())
}

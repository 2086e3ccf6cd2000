//! HTTP and OpenAI client construction with sensible defaults.
//!
//! Clients are built once by the pipeline runner and shared by handle.

use crate::error::{ReelError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for LLM API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client with the default timeout.
pub fn create_client() -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = create_http_client(timeout)?;
    Ok(Client::with_config(OpenAIConfig::default()).with_http_client(http_client))
}

/// Create a plain HTTP client for the scraping, analysis, video, and transcoding services.
pub fn create_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("reelsmith/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ReelError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Read a required secret from the environment.
pub fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        Ok(_) => Err(ReelError::Config(format!("{} is empty", name))),
        Err(_) => Err(ReelError::Config(format!("{} not set", name))),
    }
}

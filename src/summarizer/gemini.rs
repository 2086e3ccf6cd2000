//! Gemini Files API and generateContent client.

use super::{AnalysisService, FileState, RemoteFile};
use crate::error::{ReelError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::{debug, instrument};

/// Client for uploading media and running multimodal analysis.
#[derive(Clone)]
pub struct GeminiFilesClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<StatusMessage>,
}

#[derive(Debug, Deserialize)]
struct StatusMessage {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiFilesClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ReelError::AnalysisFailed(format!(
            "{} returned {}: {}",
            what,
            status,
            body.chars().take(200).collect::<String>()
        )))
    }
}

#[async_trait]
impl AnalysisService for GeminiFilesClient {
    #[instrument(skip(self))]
    async fn upload(&self, path: &Path, mime_type: &str) -> Result<RemoteFile> {
        let bytes = tokio::fs::read(path).await?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string());

        // Resumable protocol: one call to open the session, one to send and finalize.
        let start = self
            .http
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(|e| ReelError::UploadFailed(e.to_string()))?;

        if !start.status().is_success() {
            return Err(ReelError::UploadFailed(format!(
                "upload start returned {}",
                start.status()
            )));
        }

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| ReelError::UploadFailed("no upload URL in response".to_string()))?;

        let finish = self
            .http
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ReelError::UploadFailed(e.to_string()))?;

        if !finish.status().is_success() {
            return Err(ReelError::UploadFailed(format!(
                "upload finalize returned {}",
                finish.status()
            )));
        }

        let uploaded: UploadResponse = finish
            .json()
            .await
            .map_err(|e| ReelError::UploadFailed(format!("bad upload response: {}", e)))?;
        debug!("Uploaded {} as {}", display_name, uploaded.file.name);

        Ok(RemoteFile {
            name: uploaded.file.name,
            uri: uploaded.file.uri,
            mime_type: if uploaded.file.mime_type.is_empty() {
                mime_type.to_string()
            } else {
                uploaded.file.mime_type
            },
        })
    }

    async fn file_state(&self, name: &str) -> Result<FileState> {
        let response = self
            .http
            .get(format!("{}/v1beta/{}", self.base_url, name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        let file: FileResource = Self::check(response, "file lookup").await?.json().await?;

        Ok(match file.state.as_deref() {
            Some("ACTIVE") => FileState::Active,
            Some("FAILED") => FileState::Failed(
                file.error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "processing failed".to_string()),
            ),
            _ => FileState::Processing,
        })
    }

    #[instrument(skip(self, instruction), fields(file = %file.name))]
    async fn analyze(&self, file: &RemoteFile, instruction: &str) -> Result<String> {
        let body = json!({
            "contents": [{
                "parts": [
                    { "file_data": { "mime_type": file.mime_type, "file_uri": file.uri } },
                    { "text": instruction }
                ]
            }],
            "generationConfig": { "responseMimeType": "application/json" }
        });

        let response = self
            .http
            .post(format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let generated: GenerateResponse =
            Self::check(response, "generateContent").await?.json().await?;

        let text: String = generated
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ReelError::AnalysisFailed("Empty response from model".to_string()));
        }
        Ok(text)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/v1beta/{}", self.base_url, name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        Self::check(response, "file delete").await?;
        Ok(())
    }
}

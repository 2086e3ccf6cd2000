//! Veo long-running generation over the Gemini REST API.

use super::{GeneratedVideo, GenerationRequest, VideoBackend};
use crate::error::{ReelError, Result};
use crate::poll::PollStatus;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

/// Client for `predictLongRunning` video generation.
#[derive(Clone)]
pub struct VeoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    response: Option<OperationResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    #[serde(default)]
    generate_video_response: Option<VideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResponse {
    #[serde(default)]
    generated_samples: Vec<Sample>,
    #[serde(default)]
    rai_media_filtered_reasons: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Sample {
    video: Option<SampleVideo>,
}

#[derive(Debug, Deserialize)]
struct SampleVideo {
    uri: String,
}

impl VeoClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        api_key: &str,
        model: &str,
        aspect_ratio: &str,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            aspect_ratio: aspect_ratio.to_string(),
        }
    }

    async fn error_body(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        format!("{}: {}", status, body.chars().take(200).collect::<String>())
    }
}

#[async_trait]
impl VideoBackend for VeoClient {
    fn name(&self) -> &str {
        "veo"
    }

    fn supports_idempotency(&self) -> bool {
        false
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn submit(
        &self,
        request: &GenerationRequest,
        output_uri: Option<&str>,
    ) -> Result<String> {
        let mut parameters = json!({ "aspectRatio": self.aspect_ratio });
        if let Some(uri) = output_uri {
            parameters["storageUri"] = json!(uri);
        }
        let body = json!({
            "instances": [{ "prompt": request.prompt }],
            "parameters": parameters,
        });

        let response = self
            .http
            .post(format!("{}/v1beta/models/{}:predictLongRunning", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ReelError::GenerationFailed(format!(
                "submit rejected: {}",
                Self::error_body(response).await
            )));
        }

        let operation: Operation = response.json().await?;
        debug!("Submitted generation {}", operation.name);
        Ok(operation.name)
    }

    async fn poll(&self, handle: &str) -> Result<PollStatus<GeneratedVideo>> {
        let response = self
            .http
            .get(format!("{}/v1beta/{}", self.base_url, handle))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ReelError::GenerationFailed(format!(
                "operation lookup failed: {}",
                Self::error_body(response).await
            )));
        }

        let operation: Operation = response.json().await?;
        if !operation.done {
            return Ok(PollStatus::Pending);
        }
        if let Some(error) = operation.error {
            return Ok(PollStatus::Failed(error.message));
        }

        let video = operation.response.and_then(|r| r.generate_video_response);
        let filtered = video
            .as_ref()
            .map(|v| v.rai_media_filtered_reasons.join("; "))
            .unwrap_or_default();

        match video
            .and_then(|v| v.generated_samples.into_iter().next())
            .and_then(|s| s.video)
        {
            Some(v) => Ok(PollStatus::Done(GeneratedVideo { uri: v.uri })),
            None if !filtered.is_empty() => {
                Ok(PollStatus::Failed(format!("filtered: {}", filtered)))
            }
            None => Ok(PollStatus::Failed("operation finished without a video".to_string())),
        }
    }

    async fn fetch(&self, video: &GeneratedVideo) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(&video.uri)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ReelError::GenerationFailed(format!(
                "video download failed: {}",
                Self::error_body(response).await
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> VeoClient {
        VeoClient::new(reqwest::Client::new(), &server.uri(), "key", "veo-test", "9:16")
    }

    #[tokio::test]
    async fn test_submit_sends_storage_uri() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/veo-test:predictLongRunning"))
            .and(body_partial_json(json!({
                "instances": [{"prompt": "a kite at dusk"}],
                "parameters": {"aspectRatio": "9:16", "storageUri": "gs://b/u/"}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "models/veo-test/operations/op1"})),
            )
            .mount(&server)
            .await;

        let request = GenerationRequest::new("a kite at dusk", "u");
        let handle = client(&server).submit(&request, Some("gs://b/u/")).await.unwrap();
        assert_eq!(handle, "models/veo-test/operations/op1");
    }

    #[tokio::test]
    async fn test_poll_states() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/operations/running"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"name": "operations/running"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1beta/operations/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/ok",
                "done": true,
                "response": {"generateVideoResponse": {"generatedSamples": [{"video": {"uri": "gs://b/u/sample_0.mp4"}}]}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1beta/operations/bad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/bad", "done": true, "error": {"code": 3, "message": "prompt blocked"}
            })))
            .mount(&server)
            .await;

        let c = client(&server);
        assert_eq!(c.poll("operations/running").await.unwrap(), PollStatus::Pending);
        assert_eq!(
            c.poll("operations/ok").await.unwrap(),
            PollStatus::Done(GeneratedVideo { uri: "gs://b/u/sample_0.mp4".to_string() })
        );
        assert_eq!(
            c.poll("operations/bad").await.unwrap(),
            PollStatus::Failed("prompt blocked".to_string())
        );
    }

    #[tokio::test]
    async fn test_poll_server_error_is_err() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        assert!(client(&server).poll("operations/x").await.is_err());
    }
}

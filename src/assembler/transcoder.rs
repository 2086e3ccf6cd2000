//! Google Cloud Transcoder job backend.

use super::{MergeBackend, MergeJobSpec};
use crate::error::{ReelError, Result};
use crate::generator::{sanitize, VideoReference};
use crate::poll::PollStatus;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

pub struct TranscoderClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    project_id: String,
    location: String,
    bucket: String,
    output_filename: String,
}

#[derive(Debug, Deserialize)]
struct Job {
    name: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<JobError>,
}

#[derive(Debug, Deserialize)]
struct JobError {
    #[serde(default)]
    message: String,
}

impl TranscoderClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        access_token: &str,
        project_id: &str,
        location: &str,
        bucket: &str,
        output_filename: &str,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            project_id: project_id.to_string(),
            location: location.to_string(),
            bucket: bucket.trim_start_matches("gs://").trim_end_matches('/').to_string(),
            output_filename: output_filename.to_string(),
        }
    }

    fn output_dir(&self, requester_id: &str) -> String {
        format!("gs://{}/{}/", self.bucket, sanitize(requester_id))
    }

    /// Job body with one input and one edit atom per clip, in order.
    fn job_body(&self, spec: &MergeJobSpec) -> Result<Value> {
        if let Some(bad) = spec.inputs.iter().find(|r| !r.is_storage()) {
            return Err(ReelError::InvalidInput(format!(
                "Transcoder inputs must be gs:// references, got {}",
                bad
            )));
        }

        let inputs: Vec<Value> = spec
            .inputs
            .iter()
            .enumerate()
            .map(|(i, r)| json!({ "key": format!("input{}", i), "uri": r.as_str() }))
            .collect();
        let edit_list: Vec<Value> = (0..spec.inputs.len())
            .map(|i| json!({ "key": format!("atom{}", i), "inputs": [format!("input{}", i)] }))
            .collect();
        let mux_key = self.output_filename.trim_end_matches(".mp4");

        Ok(json!({
            "outputUri": self.output_dir(&spec.requester_id),
            "config": {
                "inputs": inputs,
                "editList": edit_list,
                "elementaryStreams": [
                    { "key": "video_stream", "videoStream": { "h264": {
                        "heightPixels": 1280, "widthPixels": 720, "frameRate": 30, "bitrateBps": 2500000
                    } } },
                    { "key": "audio_stream", "audioStream": { "codec": "aac", "bitrateBps": 64000 } }
                ],
                "muxStreams": [
                    { "key": mux_key, "container": "mp4", "elementaryStreams": ["video_stream", "audio_stream"] }
                ]
            }
        }))
    }

    async fn parse_job(response: reqwest::Response) -> Result<Job> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReelError::MergeFailed(format!(
                "transcoder returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MergeBackend for TranscoderClient {
    fn name(&self) -> &str {
        "transcoder"
    }

    fn output_for(&self, requester_id: &str) -> Result<VideoReference> {
        Ok(VideoReference::new(format!(
            "{}{}",
            self.output_dir(requester_id),
            self.output_filename
        )))
    }

    #[instrument(skip(self, spec), fields(requester = %spec.requester_id))]
    async fn submit(&self, spec: &MergeJobSpec) -> Result<String> {
        let body = self.job_body(spec)?;
        let url = format!(
            "{}/v1/projects/{}/locations/{}/jobs",
            self.base_url, self.project_id, self.location
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        let job = Self::parse_job(response).await?;
        debug!("Transcoder job created: {}", job.name);
        Ok(job.name)
    }

    async fn poll(&self, handle: &str) -> Result<PollStatus<()>> {
        let response = self
            .http
            .get(format!("{}/v1/{}", self.base_url, handle))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let job = Self::parse_job(response).await?;

        Ok(match job.state.as_deref() {
            Some("SUCCEEDED") => PollStatus::Done(()),
            Some("FAILED") => PollStatus::Failed(
                job.error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "transcoding failed".to_string()),
            ),
            _ => PollStatus::Pending,
        })
    }

    async fn abandon(&self, handle: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/v1/{}", self.base_url, handle))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ReelError::MergeFailed(format!(
                "deleting {} returned {}",
                handle,
                response.status()
            )));
        }
        debug!("Transcoder job deleted: {}", handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str) -> TranscoderClient {
        TranscoderClient::new(
            reqwest::Client::new(),
            base,
            "token",
            "proj",
            "us-central1",
            "gs://reels",
            "final_combined.mp4",
        )
    }

    fn spec(client: &TranscoderClient, names: &[&str]) -> MergeJobSpec {
        MergeJobSpec {
            requester_id: "user-7".to_string(),
            inputs: names
                .iter()
                .map(|n| VideoReference::new(format!("gs://in/{}.mp4", n)))
                .collect(),
            output: client.output_for("user-7").unwrap(),
        }
    }

    #[test]
    fn test_edit_list_follows_input_order() {
        let c = client("http://unused");
        let body = c.job_body(&spec(&c, &["A", "B", "C"])).unwrap();

        let uris: Vec<&str> = body["config"]["inputs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["uri"].as_str().unwrap())
            .collect();
        assert_eq!(uris, vec!["gs://in/A.mp4", "gs://in/B.mp4", "gs://in/C.mp4"]);

        let atoms = body["config"]["editList"].as_array().unwrap();
        assert_eq!(atoms[0]["key"], "atom0");
        assert_eq!(atoms[2]["inputs"][0], "input2");
        assert_eq!(body["outputUri"], "gs://reels/user-7/");
        assert_eq!(body["config"]["muxStreams"][0]["key"], "final_combined");
    }

    #[test]
    fn test_output_is_deterministic() {
        let c = client("http://unused");
        assert_eq!(
            c.output_for("user-7").unwrap().as_str(),
            "gs://reels/user-7/final_combined.mp4"
        );
    }

    #[test]
    fn test_requester_id_is_sanitized() {
        let c = client("http://unused");
        assert_eq!(
            c.output_for("../../etc").unwrap().as_str(),
            "gs://reels/______etc/final_combined.mp4"
        );
        assert_eq!(c.output_dir("user/1"), "gs://reels/user_1/");
    }

    #[tokio::test]
    async fn test_abandon_deletes_job() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/projects/proj/locations/us-central1/jobs/j9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let c = client(&server.uri());
        c.abandon("projects/proj/locations/us-central1/jobs/j9").await.unwrap();
    }

    #[test]
    fn test_local_inputs_rejected() {
        let c = client("http://unused");
        let mut s = spec(&c, &["A"]);
        s.inputs.push(VideoReference::new("file:///tmp/b.mp4"));
        assert!(matches!(c.job_body(&s), Err(ReelError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_submit_and_poll() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/proj/locations/us-central1/jobs"))
            .and(header("authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/proj/locations/us-central1/jobs/j1", "state": "PENDING"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/proj/locations/us-central1/jobs/j1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/proj/locations/us-central1/jobs/j1", "state": "SUCCEEDED"
            })))
            .mount(&server)
            .await;

        let c = client(&server.uri());
        let handle = c.submit(&spec(&c, &["A", "B"])).await.unwrap();
        assert_eq!(handle, "projects/proj/locations/us-central1/jobs/j1");
        assert_eq!(c.poll(&handle).await.unwrap(), PollStatus::Done(()));
    }
}

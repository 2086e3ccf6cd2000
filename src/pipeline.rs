//! Pipeline runner for Reelsmith.
//!
//! Owns every service client for the lifetime of the process and executes the
//! task plan the dispatch table produces for a request.

use crate::agents::{AgentRegistry, JobRequest, TaskKind};
use crate::assembler::{Assembler, FfmpegConcat, MergeBackend, TranscoderClient};
use crate::collector::{
    ApifyClient, CollectRequest, Collection, Collector, CollectorConfig, GoogleTrendsSource,
    Platform, TermSource, TikTokSource, TrendSource, YoutubeShortsSource,
};
use crate::config::{Prompts, Settings};
use crate::error::{ErrorReport, ReelError, Result};
use crate::generator::{BatchResult, GenerationRequest, Generator, VeoClient, VideoReference};
use crate::media::YtDlpDownloader;
use crate::openai::{create_client, create_http_client, require_env};
use crate::poll::PollConfig;
use crate::prompter::{
    parts_for_duration, CompiledSeries, OpenAiPromptWriter, PromptPart, PromptWriter,
    SeriesCompiler,
};
use crate::publisher::{MemoryReferenceStore, Publisher, ReferenceStore, SqliteReferenceStore};
use crate::summarizer::{GeminiFilesClient, Summarizer, VideoAnalysis};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Timeout applied to every HTTP request made by the shared client.
const HTTP_TIMEOUT_SECS: u64 = 300;

/// Build the shared HTTP client.
pub fn build_http_client() -> Result<reqwest::Client> {
    create_http_client(Duration::from_secs(HTTP_TIMEOUT_SECS))
}

/// Trend collector over the configured platforms.
pub fn build_collector(settings: &Settings, http: &reqwest::Client) -> Result<Collector> {
    let cfg = &settings.collector;
    let token = require_env("APIFY_API_TOKEN")?;
    let client = Arc::new(ApifyClient::new(http.clone(), &cfg.apify_base_url, &token));

    let mut sources: Vec<Arc<dyn TrendSource>> = Vec::new();
    for name in &cfg.platforms {
        match name.parse::<Platform>().map_err(ReelError::Config)? {
            Platform::Youtube => sources.push(Arc::new(YoutubeShortsSource::new(
                client.clone(),
                &cfg.youtube_actor,
            ))),
            Platform::Tiktok => {
                sources.push(Arc::new(TikTokSource::new(client.clone(), &cfg.tiktok_actor)))
            }
            Platform::GoogleTrends => warn!(
                "google_trends yields search terms, not videos; \
                 it is used automatically for trending requests"
            ),
        }
    }
    if sources.is_empty() {
        return Err(ReelError::Config("collector.platforms names no video platform".to_string()));
    }

    let terms: Arc<dyn TermSource> =
        Arc::new(GoogleTrendsSource::new(client, &cfg.google_trends_actor));
    Ok(Collector::new(
        sources,
        Some(terms),
        CollectorConfig {
            timeout: cfg.timeout(),
            max_concurrent: cfg.max_concurrent,
            per_platform_count: cfg.per_platform_count,
            limit: cfg.limit,
        },
    ))
}

/// Summarizer backed by yt-dlp and the Gemini files API.
pub fn build_summarizer(
    settings: &Settings,
    prompts: &Prompts,
    http: &reqwest::Client,
) -> Result<Summarizer> {
    let cfg = &settings.summarizer;
    let key = require_env("GEMINI_API_KEY")?;
    let downloader = Arc::new(YtDlpDownloader::new(
        &cfg.tiktok_format,
        &cfg.youtube_format,
        &cfg.fallback_format,
    ));
    let service = Arc::new(GeminiFilesClient::new(
        http.clone(),
        &cfg.api_base_url,
        &key,
        &cfg.model,
    ));

    Ok(Summarizer::new(downloader, service, &prompts.analysis.instruction, settings.temp_dir())
        .with_max_concurrent(cfg.max_concurrent)
        .with_poll_config(
            PollConfig::new("file processing")
                .with_interval(cfg.poll_interval())
                .with_deadline(cfg.poll_deadline())
                .fixed(),
        ))
}

pub fn build_prompt_writer(settings: &Settings, prompts: &Prompts) -> Result<OpenAiPromptWriter> {
    require_env("OPENAI_API_KEY")?;
    Ok(OpenAiPromptWriter::new(
        create_client()?,
        &settings.prompter.model,
        settings.prompter.clip_seconds,
        prompts.clone(),
    ))
}

/// Generator backed by Veo.
pub fn build_generator(settings: &Settings, http: &reqwest::Client) -> Result<Generator> {
    let cfg = &settings.generator;
    let key = require_env("GEMINI_API_KEY")?;
    let backend = Arc::new(VeoClient::new(
        http.clone(),
        &cfg.api_base_url,
        &key,
        &cfg.model,
        &cfg.aspect_ratio,
    ));

    Ok(Generator::new(backend, cfg.reference_mode, cfg.storage_uri.clone(), settings.output_dir())?
        .with_max_concurrent(cfg.max_concurrent)
        .with_poll_config(
            PollConfig::new("video generation")
                .with_interval(Duration::from_secs(cfg.poll_interval_seconds))
                .with_max_interval(Duration::from_secs(cfg.max_poll_interval_seconds))
                .with_deadline(Duration::from_secs(cfg.deadline_seconds)),
        ))
}

/// Assembler with the configured merge backend.
pub fn build_assembler(settings: &Settings, http: &reqwest::Client) -> Result<Assembler> {
    let cfg = &settings.assembler;
    let backend: Arc<dyn MergeBackend> = match cfg.backend.to_lowercase().as_str() {
        "transcoder" => {
            let project = cfg.project_id.as_deref().ok_or_else(|| {
                ReelError::Config("assembler.project_id is required for transcoder".to_string())
            })?;
            let bucket = cfg.bucket.as_deref().ok_or_else(|| {
                ReelError::Config("assembler.bucket is required for transcoder".to_string())
            })?;
            let token = require_env("GOOGLE_ACCESS_TOKEN")?;
            Arc::new(TranscoderClient::new(
                http.clone(),
                &cfg.api_base_url,
                &token,
                project,
                &cfg.location,
                bucket,
                &cfg.output_filename,
            ))
        }
        "ffmpeg" => Arc::new(
            FfmpegConcat::new(settings.output_dir(), &cfg.output_filename)
                .with_program(&cfg.ffmpeg_path),
        ),
        other => return Err(ReelError::Config(format!("Unknown assembler backend: {}", other))),
    };

    Ok(Assembler::new(backend).with_poll_config(
        PollConfig::new("merge")
            .with_interval(Duration::from_secs(cfg.poll_interval_seconds))
            .with_deadline(Duration::from_secs(cfg.deadline_seconds))
            .fixed(),
    ))
}

pub fn build_store(settings: &Settings) -> Result<Arc<dyn ReferenceStore>> {
    match settings.store.provider.to_lowercase().as_str() {
        "sqlite" => Ok(Arc::new(SqliteReferenceStore::new(&settings.sqlite_path())?)),
        "memory" => Ok(Arc::new(MemoryReferenceStore::new())),
        other => Err(ReelError::Config(format!("Unknown store provider: {}", other))),
    }
}

/// Injectable stage implementations.
pub struct PipelineComponents {
    pub collector: Arc<Collector>,
    pub summarizer: Arc<Summarizer>,
    pub writer: Arc<dyn PromptWriter>,
    pub generator: Arc<Generator>,
    pub assembler: Arc<Assembler>,
    pub store: Arc<dyn ReferenceStore>,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub status: &'static str,
    pub request: JobRequest,
    pub requester_id: String,
    pub series_id: String,
    pub tasks: Vec<TaskKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<Collection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub analyses: Vec<VideoAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiled: Option<CompiledSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<BatchResult>,
    pub clips: Vec<VideoReference>,
    pub final_reference: Option<VideoReference>,
}

/// Intermediate values handed from one task to the next.
struct RunState {
    request: JobRequest,
    requester_id: String,
    series_id: String,
    completed: Vec<TaskKind>,
    collection: Option<Collection>,
    analyses: Vec<VideoAnalysis>,
    parts: Vec<PromptPart>,
    compiled: Option<CompiledSeries>,
    generation: Option<BatchResult>,
    clips: Vec<VideoReference>,
    final_reference: Option<VideoReference>,
}

impl RunState {
    fn into_outcome(self) -> PipelineOutcome {
        PipelineOutcome {
            status: "success",
            request: self.request,
            requester_id: self.requester_id,
            series_id: self.series_id,
            tasks: self.completed,
            collection: self.collection,
            analyses: self.analyses,
            compiled: self.compiled,
            generation: self.generation,
            clips: self.clips,
            final_reference: self.final_reference,
        }
    }
}

/// The main runner for the Reelsmith pipeline.
pub struct Pipeline {
    settings: Settings,
    registry: AgentRegistry,
    collector: Arc<Collector>,
    summarizer: Arc<Summarizer>,
    writer: Arc<dyn PromptWriter>,
    generator: Arc<Generator>,
    assembler: Arc<Assembler>,
    publisher: Publisher,
}

impl Pipeline {
    /// Construct every client from settings and environment.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::for_settings(&settings)?;
        let http = build_http_client()?;

        let components = PipelineComponents {
            collector: Arc::new(build_collector(&settings, &http)?),
            summarizer: Arc::new(build_summarizer(&settings, &prompts, &http)?),
            writer: Arc::new(build_prompt_writer(&settings, &prompts)?),
            generator: Arc::new(build_generator(&settings, &http)?),
            assembler: Arc::new(build_assembler(&settings, &http)?),
            store: build_store(&settings)?,
        };

        Ok(Self::with_components(settings, &prompts, components))
    }

    /// Create a pipeline with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: &Prompts,
        components: PipelineComponents,
    ) -> Self {
        Self {
            settings,
            registry: AgentRegistry::standard(&prompts.agents),
            collector: components.collector,
            summarizer: components.summarizer,
            writer: components.writer,
            generator: components.generator,
            assembler: components.assembler,
            publisher: Publisher::new(components.store),
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Run and convert any failure into the structured error object.
    pub async fn run_reported(
        &self,
        request: &JobRequest,
        requester_id: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<PipelineOutcome, ErrorReport> {
        self.run(request, requester_id, cancel).await.map_err(|e| {
            warn!("Run failed: {}", e);
            e.to_report()
        })
    }

    /// Execute the routed task plan for `request`.
    #[instrument(skip_all, fields(requester = %requester_id))]
    pub async fn run(
        &self,
        request: &JobRequest,
        requester_id: &str,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome> {
        let plan: Vec<TaskKind> = self.registry.route(request).iter().map(|s| s.kind).collect();
        let series_id = format!("series_{}", uuid::Uuid::new_v4().simple());
        info!("Running {} tasks for {}", plan.len(), series_id);

        let mut state = RunState {
            request: request.clone(),
            requester_id: requester_id.to_string(),
            series_id,
            completed: Vec::with_capacity(plan.len()),
            collection: None,
            analyses: Vec::new(),
            parts: Vec::new(),
            compiled: None,
            generation: None,
            clips: Vec::new(),
            final_reference: None,
        };

        for kind in plan {
            if cancel.is_cancelled() {
                return Err(ReelError::Cancelled(format!("stopped before {}", kind)));
            }
            info!("Task: {}", kind);
            self.execute(kind, &mut state, cancel).await?;
            state.completed.push(kind);
        }

        Ok(state.into_outcome())
    }

    async fn execute(
        &self,
        kind: TaskKind,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match kind {
            TaskKind::TrendAnalysis => {
                let JobRequest::Structured { category, .. } = &state.request else {
                    return Err(ReelError::InvalidInput(
                        "trend analysis needs a category".to_string(),
                    ));
                };
                let collection = self
                    .collector
                    .collect(&CollectRequest {
                        region: self.settings.collector.region.clone(),
                        timeframe: self.settings.collector.timeframe.clone(),
                        category: category.clone(),
                    })
                    .await?;
                if collection.candidates.is_empty() {
                    return Err(ReelError::Collector(format!(
                        "no candidates found for '{}'",
                        collection.search_term
                    )));
                }
                state.collection = Some(collection);
            }
            TaskKind::Summarize => {
                let urls = state.collection.as_ref().map(|c| c.urls()).unwrap_or_default();
                state.analyses = self.summarizer.summarize(&urls, cancel).await?;
                if !state.analyses.iter().any(|a| a.is_ok()) {
                    return Err(ReelError::AnalysisFailed(
                        "no candidate video could be analyzed".to_string(),
                    ));
                }
            }
            TaskKind::StoryPrompt => {
                let duration = state
                    .request
                    .duration_seconds()?
                    .unwrap_or(self.settings.prompter.clip_seconds);
                let parts = parts_for_duration(
                    duration,
                    self.settings.prompter.clip_seconds,
                    self.settings.prompter.max_parts,
                );
                let usable: Vec<VideoAnalysis> =
                    state.analyses.iter().filter(|a| a.is_ok()).cloned().collect();
                state.parts = self.writer.write_series(&state.series_id, &usable, parts).await?;
            }
            TaskKind::SinglePrompt => {
                let JobRequest::FreeForm { prompt } = &state.request else {
                    return Err(ReelError::InvalidInput(
                        "single prompt needs a free-form prompt".to_string(),
                    ));
                };
                state.parts = vec![self.writer.write_single(&state.series_id, prompt).await?];
            }
            TaskKind::CompileSeries => {
                let mut compiler = SeriesCompiler::new();
                state.compiled = Some(compiler.compile_all(state.parts.clone())?);
            }
            TaskKind::GenerateVideo => {
                let part = state
                    .parts
                    .first()
                    .ok_or_else(|| ReelError::InvalidInput("no prompt to generate".to_string()))?;
                let request = GenerationRequest::new(&part.prompt_text, &state.requester_id);
                let reference = self.generator.generate_one(request, cancel).await?;
                state.clips = vec![reference.clone()];
                state.final_reference = Some(reference);
            }
            TaskKind::GenerateSeries => {
                let prompts = state
                    .compiled
                    .as_ref()
                    .map(|c| c.prompts())
                    .ok_or_else(|| ReelError::InvalidInput("series not compiled".to_string()))?;
                let requests = prompts
                    .iter()
                    .map(|p| GenerationRequest::new(p, &state.requester_id))
                    .collect();
                let batch = self.generator.generate_batch(requests, cancel).await;
                let references = batch.references();
                state.generation = Some(batch);
                state.clips = references?;
            }
            TaskKind::Assemble => {
                let merged = self
                    .assembler
                    .assemble(&state.requester_id, &state.clips, cancel)
                    .await?;
                state.final_reference = Some(merged);
            }
            TaskKind::Publish => {
                self.publisher.publish_series(&state.series_id, &state.clips).await?;
                if let Some(reference) = &state.final_reference {
                    self.publisher.publish_final(&state.requester_id, reference).await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::MergeJobSpec;
    use crate::collector::{SearchQuery, VideoCandidate};
    use crate::config::ReferenceMode;
    use crate::generator::{GeneratedVideo, VideoBackend};
    use crate::media::VideoDownloader;
    use crate::poll::PollStatus;
    use crate::prompter::ContinuityRef;
    use crate::summarizer::{AnalysisService, FileState, RemoteFile};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};

    struct StaticSource;

    #[async_trait]
    impl TrendSource for StaticSource {
        fn platform(&self) -> Platform {
            Platform::Youtube
        }

        async fn search(&self, query: &SearchQuery) -> Result<Vec<VideoCandidate>> {
            Ok((1..=2)
                .map(|i| VideoCandidate {
                    title: format!("{} {}", query.term, i),
                    url: format!("https://youtu.be/v{}", i),
                    view_count: i * 100,
                    platform: Platform::Youtube,
                })
                .collect())
        }
    }

    struct LocalDownloader;

    #[async_trait]
    impl VideoDownloader for LocalDownloader {
        async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
            let path = dest_dir.join(format!("{}.mp4", url.rsplit('/').next().unwrap()));
            tokio::fs::write(&path, b"v").await?;
            Ok(path)
        }
    }

    struct InstantAnalysis;

    #[async_trait]
    impl AnalysisService for InstantAnalysis {
        async fn upload(&self, path: &Path, mime_type: &str) -> Result<RemoteFile> {
            Ok(RemoteFile {
                name: format!("files/{}", path.file_stem().unwrap().to_string_lossy()),
                uri: "u".to_string(),
                mime_type: mime_type.to_string(),
            })
        }

        async fn file_state(&self, _name: &str) -> Result<FileState> {
            Ok(FileState::Active)
        }

        async fn analyze(&self, _file: &RemoteFile, _instruction: &str) -> Result<String> {
            Ok(r#"{"viral_ingredients":["a"],"video_hooks":["b"],"hook_pattern":"c",
                "storytelling_blueprint":{"genre":"g","theme":"t","target_emotion":"e","pov":"p",
                "setting":"s","characters":["x"],"conflict":"c","escalating_stakes":"s","payoff":"p"}}"#
                .to_string())
        }

        async fn delete(&self, _name: &str) -> Result<()> {
            Ok(())
        }
    }

    struct EchoWriter;

    #[async_trait]
    impl PromptWriter for EchoWriter {
        async fn write_series(
            &self,
            series_id: &str,
            _analyses: &[VideoAnalysis],
            parts: u32,
        ) -> Result<Vec<PromptPart>> {
            Ok((1..=parts)
                .map(|i| PromptPart {
                    series_id: series_id.to_string(),
                    prompt_index: i,
                    total_planned_prompts: parts,
                    prompt_text: format!("part{}", i),
                    continuity_ref: ContinuityRef {
                        previous_prompt_index: i - 1,
                        carry_over_elements: vec![],
                    },
                })
                .collect())
        }

        async fn write_single(&self, series_id: &str, idea: &str) -> Result<PromptPart> {
            Ok(PromptPart {
                series_id: series_id.to_string(),
                prompt_index: 1,
                total_planned_prompts: 1,
                prompt_text: idea.to_string(),
                continuity_ref: ContinuityRef {
                    previous_prompt_index: 0,
                    carry_over_elements: vec![],
                },
            })
        }
    }

    struct InstantVideo;

    #[async_trait]
    impl VideoBackend for InstantVideo {
        fn name(&self) -> &str {
            "instant"
        }

        fn supports_idempotency(&self) -> bool {
            true
        }

        async fn submit(
            &self,
            request: &GenerationRequest,
            output_uri: Option<&str>,
        ) -> Result<String> {
            Ok(format!("{}{}", output_uri.unwrap_or_default(), request.prompt))
        }

        async fn poll(&self, handle: &str) -> Result<PollStatus<GeneratedVideo>> {
            Ok(PollStatus::Done(GeneratedVideo {
                uri: format!("{}.mp4", handle),
            }))
        }

        async fn fetch(&self, _video: &GeneratedVideo) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    struct InstantMerge;

    #[async_trait]
    impl MergeBackend for InstantMerge {
        fn name(&self) -> &str {
            "instant"
        }

        fn output_for(&self, requester_id: &str) -> Result<VideoReference> {
            Ok(VideoReference::new(format!("gs://out/{}/final_combined.mp4", requester_id)))
        }

        async fn submit(&self, _spec: &MergeJobSpec) -> Result<String> {
            Ok("job".to_string())
        }

        async fn poll(&self, _handle: &str) -> Result<PollStatus<()>> {
            Ok(PollStatus::Done(()))
        }
    }

    fn pipeline(temp: &Path) -> Pipeline {
        let mut settings = Settings::default();
        settings.general.temp_dir = temp.join("tmp").to_string_lossy().to_string();
        settings.prompter.clip_seconds = 8;
        let prompts = Prompts::default();

        let components = PipelineComponents {
            collector: Arc::new(Collector::new(
                vec![Arc::new(StaticSource)],
                None,
                CollectorConfig::default(),
            )),
            summarizer: Arc::new(Summarizer::new(
                Arc::new(LocalDownloader),
                Arc::new(InstantAnalysis),
                "analyze",
                settings.temp_dir(),
            )),
            writer: Arc::new(EchoWriter),
            generator: Arc::new(
                Generator::new(
                    Arc::new(InstantVideo),
                    ReferenceMode::Storage,
                    Some("gs://gen".to_string()),
                    temp.to_path_buf(),
                )
                .unwrap(),
            ),
            assembler: Arc::new(Assembler::new(Arc::new(InstantMerge))),
            store: Arc::new(MemoryReferenceStore::new()),
        };
        Pipeline::with_components(settings, &prompts, components)
    }

    #[tokio::test]
    async fn test_structured_run_end_to_end() {
        let temp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(temp.path());

        let outcome = pipeline
            .run(&JobRequest::structured("24s", "cooking"), "user-1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.tasks.len(), 7);
        assert_eq!(outcome.analyses.len(), 2);
        assert_eq!(outcome.compiled.as_ref().unwrap().total_prompts, 3);
        let clips: Vec<&str> = outcome.clips.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            clips,
            vec![
                "gs://gen/user-1/part1.mp4",
                "gs://gen/user-1/part2.mp4",
                "gs://gen/user-1/part3.mp4"
            ]
        );
        assert_eq!(
            outcome.final_reference.as_ref().unwrap().as_str(),
            "gs://out/user-1/final_combined.mp4"
        );

        let published = pipeline.publisher().lookup(&outcome.series_id).await.unwrap().unwrap();
        assert_eq!(published.references, outcome.clips);
        let history = pipeline.publisher().lookup("user-1").await.unwrap().unwrap();
        assert_eq!(history.references.len(), 1);
    }

    #[tokio::test]
    async fn test_free_form_run() {
        let temp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(temp.path());

        let request = JobRequest::FreeForm {
            prompt: "kite".into(),
        };
        let outcome = pipeline
            .run(&request, "user-2", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            outcome.tasks,
            vec![TaskKind::SinglePrompt, TaskKind::GenerateVideo, TaskKind::Publish]
        );
        assert_eq!(outcome.final_reference.unwrap().as_str(), "gs://gen/user-2/kite.mp4");
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_error_object() {
        let temp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(temp.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = pipeline
            .run_reported(&JobRequest::FreeForm { prompt: "kite".into() }, "u", &cancel)
            .await
            .unwrap_err();
        assert_eq!(report.status, "error");
        assert_eq!(report.error_type, crate::error::ErrorKind::Cancelled);
    }
}

//! Configuration settings for Reelsmith.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub collector: CollectorSettings,
    pub summarizer: SummarizerSettings,
    pub prompter: PrompterSettings,
    pub generator: GeneratorSettings,
    pub assembler: AssemblerSettings,
    pub store: StoreSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory for temporary files (per-request subdirectories are created here).
    pub temp_dir: String,
    /// Directory where locally downloaded generations are written.
    pub output_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.reelsmith".to_string(),
            temp_dir: "/tmp/reelsmith".to_string(),
            output_dir: "~/.reelsmith/videos".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Trend collector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorSettings {
    /// Platforms to query (youtube, tiktok).
    pub platforms: Vec<String>,
    /// Default region code for searches and trending terms.
    pub region: String,
    /// Default trending timeframe.
    pub timeframe: String,
    /// Base URL of the scraping service.
    pub apify_base_url: String,
    /// Actor used for YouTube shorts search.
    pub youtube_actor: String,
    /// Actor used for TikTok search.
    pub tiktok_actor: String,
    /// Actor used for Google trending searches.
    pub google_trends_actor: String,
    /// Timeout for each external call in seconds.
    pub timeout_seconds: u64,
    /// Maximum platforms queried at once.
    pub max_concurrent: usize,
    /// Results requested per platform.
    pub per_platform_count: u32,
    /// Maximum candidates returned after ranking.
    pub limit: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            platforms: vec!["youtube".to_string(), "tiktok".to_string()],
            region: "US".to_string(),
            timeframe: "24".to_string(),
            apify_base_url: "https://api.apify.com".to_string(),
            youtube_actor: "streamers~youtube-scraper".to_string(),
            tiktok_actor: "GdWCkxBtKWOsKjdch".to_string(),
            google_trends_actor: "nWhM7vTPu16lcwuIg".to_string(),
            timeout_seconds: 120,
            max_concurrent: 3,
            per_platform_count: 3,
            limit: 5,
        }
    }
}

impl CollectorSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Video summarizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerSettings {
    /// Base URL of the generative-analysis service.
    pub api_base_url: String,
    /// Model used for video analysis.
    pub model: String,
    /// Maximum videos processed at once.
    pub max_concurrent: usize,
    /// Interval between file state checks in seconds.
    pub poll_interval_seconds: u64,
    /// Upper bound on waiting for an uploaded file to become ready.
    pub poll_deadline_seconds: u64,
    /// yt-dlp format for TikTok downloads.
    pub tiktok_format: String,
    /// yt-dlp format for YouTube downloads.
    pub youtube_format: String,
    /// Format tried once when the platform format fails.
    pub fallback_format: String,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            api_base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
            max_concurrent: 2,
            poll_interval_seconds: 2,
            poll_deadline_seconds: 300,
            tiktok_format: "best[ext=mp4]/best".to_string(),
            youtube_format: "best[height<=1080][ext=mp4]/best[ext=mp4]".to_string(),
            fallback_format: "best".to_string(),
        }
    }
}

impl SummarizerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn poll_deadline(&self) -> Duration {
        Duration::from_secs(self.poll_deadline_seconds)
    }
}

/// Prompt writer (LLM) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrompterSettings {
    /// LLM model for writing creative prompts.
    pub model: String,
    /// Seconds of footage produced per generated clip.
    pub clip_seconds: u32,
    /// Maximum parts in one series.
    pub max_parts: u32,
}

impl Default for PrompterSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            clip_seconds: 8,
            max_parts: 7,
        }
    }
}

/// How generated videos are handed to later stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceMode {
    /// Downloaded into the output directory, referenced as `file://`.
    #[default]
    Local,
    /// Written by the backend to a storage URI, referenced as `gs://`.
    Storage,
}

impl std::str::FromStr for ReferenceMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "file" => Ok(ReferenceMode::Local),
            "storage" | "gcs" => Ok(ReferenceMode::Storage),
            _ => Err(format!("Unknown reference mode: {}", s)),
        }
    }
}

impl std::fmt::Display for ReferenceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceMode::Local => write!(f, "local"),
            ReferenceMode::Storage => write!(f, "storage"),
        }
    }
}

/// Video generator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Base URL of the generative-video service.
    pub api_base_url: String,
    /// Video generation model.
    pub model: String,
    /// Aspect ratio requested for every clip.
    pub aspect_ratio: String,
    /// Reference mode (local, storage).
    pub reference_mode: ReferenceMode,
    /// Storage URI prefix used in storage mode (e.g. gs://bucket/generations).
    pub storage_uri: Option<String>,
    /// Interval between operation checks in seconds.
    pub poll_interval_seconds: u64,
    /// Longest interval the poll backoff may reach.
    pub max_poll_interval_seconds: u64,
    /// Deadline after which a generation is reported as timed out.
    pub deadline_seconds: u64,
    /// Maximum generations in flight at once.
    pub max_concurrent: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            api_base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "veo-3.0-generate-preview".to_string(),
            aspect_ratio: "9:16".to_string(),
            reference_mode: ReferenceMode::Local,
            storage_uri: None,
            poll_interval_seconds: 10,
            max_poll_interval_seconds: 20,
            deadline_seconds: 600,
            max_concurrent: 2,
        }
    }
}

/// Assembler (merge service) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerSettings {
    /// Merge backend (transcoder, ffmpeg).
    pub backend: String,
    /// Base URL of the transcoding service.
    pub api_base_url: String,
    /// Cloud project owning transcoding jobs.
    pub project_id: Option<String>,
    /// Transcoder region.
    pub location: String,
    /// Bucket receiving merged output.
    pub bucket: Option<String>,
    /// Fixed filename of the merged output.
    pub output_filename: String,
    /// ffmpeg executable for the local backend.
    pub ffmpeg_path: String,
    /// Interval between job checks in seconds.
    pub poll_interval_seconds: u64,
    /// Deadline after which a merge is abandoned.
    pub deadline_seconds: u64,
}

impl Default for AssemblerSettings {
    fn default() -> Self {
        Self {
            backend: "ffmpeg".to_string(),
            api_base_url: "https://transcoder.googleapis.com".to_string(),
            project_id: None,
            location: "us-central1".to_string(),
            bucket: None,
            output_filename: "final_combined.mp4".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            poll_interval_seconds: 10,
            deadline_seconds: 900,
        }
    }
}

/// Reference store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Store provider (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.reelsmith/references.db".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom agent instructions (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ReelError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reelsmith")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.output_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.store.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [generator]
            deadline_seconds = 300
            reference_mode = "storage"
            storage_uri = "gs://bucket/gen"
            "#,
        )
        .unwrap();

        assert_eq!(settings.generator.deadline_seconds, 300);
        assert_eq!(settings.generator.reference_mode, ReferenceMode::Storage);
        assert_eq!(settings.generator.model, "veo-3.0-generate-preview");
        assert_eq!(settings.collector.platforms, vec!["youtube", "tiktok"]);
        assert_eq!(settings.assembler.output_filename, "final_combined.mp4");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.summarizer.max_concurrent = 5;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.summarizer.max_concurrent, 5);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = PathBuf::from("/nonexistent/reelsmith/config.toml");
        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.store.provider, "sqlite");
    }

    #[test]
    fn test_reference_mode_parse() {
        assert_eq!("gcs".parse::<ReferenceMode>().unwrap(), ReferenceMode::Storage);
        assert_eq!("LOCAL".parse::<ReferenceMode>().unwrap(), ReferenceMode::Local);
        assert!("bytes".parse::<ReferenceMode>().is_err());
    }
}

//! Request classification and the task dispatch table.
//!
//! Each task is a plain function in the pipeline. The table maps a
//! [`TaskKind`] to its name, description, and the instruction text that is
//! attached when that task makes an LLM call. Routing a request yields the
//! ordered list of tasks to run.

use crate::config::AgentInstructions;
use crate::error::{ReelError, Result};
use serde::{Deserialize, Serialize};

/// Category value that selects generic trending content.
pub const TRENDING_CATEGORY: &str = "trending";

/// An incoming job, either a free-form idea or structured parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobRequest {
    FreeForm { prompt: String },
    Structured { duration: String, category: String },
}

/// Wire form: `{"initial_output": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub initial_output: JobRequest,
}

impl JobRequest {
    /// Classify raw input. JSON in either envelope or bare form is accepted;
    /// anything else is a free-form prompt, kept verbatim.
    pub fn classify(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ReelError::InvalidInput("Empty request".to_string()));
        }
        if trimmed.starts_with('{') {
            if let Ok(envelope) = serde_json::from_str::<JobEnvelope>(trimmed) {
                return Ok(envelope.initial_output);
            }
            if let Ok(request) = serde_json::from_str::<JobRequest>(trimmed) {
                return Ok(request);
            }
        }
        Ok(JobRequest::FreeForm {
            prompt: input.to_string(),
        })
    }

    pub fn structured(duration: &str, category: &str) -> Self {
        JobRequest::Structured {
            duration: duration.to_string(),
            category: category.to_string(),
        }
    }

    pub fn envelope(&self) -> JobEnvelope {
        JobEnvelope {
            initial_output: self.clone(),
        }
    }

    /// Requested duration in seconds, for structured requests.
    pub fn duration_seconds(&self) -> Result<Option<u32>> {
        match self {
            JobRequest::FreeForm { .. } => Ok(None),
            JobRequest::Structured { duration, .. } => parse_duration(duration).map(Some),
        }
    }

    /// True when the category asks for generic trending content.
    pub fn is_trending(&self) -> bool {
        matches!(self, JobRequest::Structured { category, .. }
            if category.trim().eq_ignore_ascii_case(TRENDING_CATEGORY))
    }
}

/// Parse "8s", "30", "1m", "1m30s" into seconds.
pub fn parse_duration(text: &str) -> Result<u32> {
    let invalid = || ReelError::InvalidInput(format!("Invalid duration: {}", text));
    let s = text.trim().to_lowercase();
    if s.is_empty() {
        return Err(invalid());
    }
    if let Ok(secs) = s.parse::<u32>() {
        return Ok(secs);
    }

    let mut total = 0u32;
    let mut digits = String::new();
    for c in s.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'm' | 's' => {
                let n: u32 = digits.parse().map_err(|_| invalid())?;
                let secs = if c == 'm' { n.checked_mul(60) } else { Some(n) };
                total = secs
                    .and_then(|secs| total.checked_add(secs))
                    .ok_or_else(invalid)?;
                digits.clear();
            }
            ' ' => {}
            _ => return Err(invalid()),
        }
    }
    if !digits.is_empty() {
        return Err(invalid());
    }
    Ok(total)
}

/// Capability tag for each task in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    TrendAnalysis,
    Summarize,
    SinglePrompt,
    StoryPrompt,
    CompileSeries,
    GenerateVideo,
    GenerateSeries,
    Assemble,
    Publish,
}

impl TaskKind {
    pub const ALL: [TaskKind; 9] = [
        TaskKind::TrendAnalysis,
        TaskKind::Summarize,
        TaskKind::SinglePrompt,
        TaskKind::StoryPrompt,
        TaskKind::CompileSeries,
        TaskKind::GenerateVideo,
        TaskKind::GenerateSeries,
        TaskKind::Assemble,
        TaskKind::Publish,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::TrendAnalysis => "trend_analysis",
            TaskKind::Summarize => "summarize",
            TaskKind::SinglePrompt => "single_prompt",
            TaskKind::StoryPrompt => "story_prompt",
            TaskKind::CompileSeries => "compile_series",
            TaskKind::GenerateVideo => "generate_video",
            TaskKind::GenerateSeries => "generate_series",
            TaskKind::Assemble => "assemble",
            TaskKind::Publish => "publish",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TaskKind::TrendAnalysis => "Collect ranked trending videos",
            TaskKind::Summarize => "Extract viral patterns from videos",
            TaskKind::SinglePrompt => "Write one prompt from an idea",
            TaskKind::StoryPrompt => "Write a multi-part series",
            TaskKind::CompileSeries => "Collect numbered parts into a series",
            TaskKind::GenerateVideo => "Generate one video",
            TaskKind::GenerateSeries => "Generate one video per prompt",
            TaskKind::Assemble => "Merge clips in order",
            TaskKind::Publish => "Persist final references",
        }
    }

    /// Whether this task makes an LLM call.
    pub fn uses_llm(&self) -> bool {
        matches!(self, TaskKind::Summarize | TaskKind::SinglePrompt | TaskKind::StoryPrompt)
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of the dispatch table.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSpec {
    pub kind: TaskKind,
    pub name: &'static str,
    pub description: &'static str,
    pub instruction: String,
}

/// Dispatch table keyed by task kind.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    manager: String,
    specs: Vec<AgentSpec>,
}

impl AgentRegistry {
    /// One entry per [`TaskKind`], instructions taken from the templates.
    pub fn standard(instructions: &AgentInstructions) -> Self {
        let specs = TaskKind::ALL
            .iter()
            .map(|&kind| {
                let instruction = match kind {
                    TaskKind::TrendAnalysis => &instructions.trend_analysis,
                    TaskKind::Summarize => &instructions.summarize,
                    TaskKind::SinglePrompt => &instructions.single_prompt,
                    TaskKind::StoryPrompt => &instructions.story_prompt,
                    TaskKind::CompileSeries => &instructions.compile_series,
                    TaskKind::GenerateVideo => &instructions.generate_video,
                    TaskKind::GenerateSeries => &instructions.generate_series,
                    TaskKind::Assemble => &instructions.assemble,
                    TaskKind::Publish => &instructions.publish,
                };
                AgentSpec {
                    kind,
                    name: kind.name(),
                    description: kind.description(),
                    instruction: instruction.clone(),
                }
            })
            .collect();

        Self {
            manager: instructions.manager.clone(),
            specs,
        }
    }

    pub fn manager_instruction(&self) -> &str {
        &self.manager
    }

    pub fn get(&self, kind: TaskKind) -> Option<&AgentSpec> {
        self.specs.iter().find(|s| s.kind == kind)
    }

    pub fn specs(&self) -> &[AgentSpec] {
        &self.specs
    }

    /// Ordered task plan for a request.
    pub fn route(&self, request: &JobRequest) -> Vec<&AgentSpec> {
        plan_for(request)
            .iter()
            .filter_map(|kind| self.get(*kind))
            .collect()
    }
}

/// Task order for each kind of request.
pub fn plan_for(request: &JobRequest) -> &'static [TaskKind] {
    match request {
        JobRequest::FreeForm { .. } => &[
            TaskKind::SinglePrompt,
            TaskKind::GenerateVideo,
            TaskKind::Publish,
        ],
        JobRequest::Structured { .. } => &[
            TaskKind::TrendAnalysis,
            TaskKind::Summarize,
            TaskKind::StoryPrompt,
            TaskKind::CompileSeries,
            TaskKind::GenerateSeries,
            TaskKind::Assemble,
            TaskKind::Publish,
        ],
    }
}

//! Viral-pattern analysis records and their schema validation.

use crate::error::{ReelError, Result};
use serde::{Deserialize, Serialize};

/// Narrative structure extracted from one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorytellingBlueprint {
    pub genre: String,
    pub theme: String,
    pub target_emotion: String,
    pub pov: String,
    pub setting: String,
    pub characters: Vec<String>,
    pub conflict: String,
    pub escalating_stakes: String,
    pub payoff: String,
}

impl StorytellingBlueprint {
    fn unknown() -> Self {
        Self {
            genre: "unknown".to_string(),
            theme: "unknown".to_string(),
            target_emotion: "unknown".to_string(),
            pov: "unknown".to_string(),
            setting: "unknown".to_string(),
            characters: vec!["unknown".to_string()],
            conflict: "unknown".to_string(),
            escalating_stakes: "unknown".to_string(),
            payoff: "unknown".to_string(),
        }
    }
}

/// Structured viral-pattern metadata for one source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub viral_ingredients: Vec<String>,
    pub video_hooks: Vec<String>,
    pub hook_pattern: String,
    pub storytelling_blueprint: StorytellingBlueprint,
}

impl AnalysisRecord {
    /// Deterministic stand-in used whenever a real analysis is unavailable.
    pub fn placeholder(reason: &str) -> Self {
        Self {
            viral_ingredients: vec!["analysis_failed".to_string()],
            video_hooks: vec!["unable_to_analyze".to_string()],
            hook_pattern: format!("Error: {}", reason),
            storytelling_blueprint: StorytellingBlueprint::unknown(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.viral_ingredients.len() == 1 && self.viral_ingredients[0] == "analysis_failed"
    }
}

// Loose mirror of the schema so missing fields can be named in the error.
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    viral_ingredients: Option<Vec<String>>,
    video_hooks: Option<Vec<String>>,
    hook_pattern: Option<String>,
    storytelling_blueprint: Option<RawBlueprint>,
}

#[derive(Debug, Deserialize)]
struct RawBlueprint {
    genre: Option<String>,
    theme: Option<String>,
    target_emotion: Option<String>,
    pov: Option<String>,
    setting: Option<String>,
    characters: Option<Vec<String>>,
    conflict: Option<String>,
    escalating_stakes: Option<String>,
    payoff: Option<String>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| {
        ReelError::AnalysisSchemaInvalid(format!("Missing required field: {}", field))
    })
}

fn non_empty(list: Vec<String>, field: &str) -> Result<Vec<String>> {
    let mut seen = std::collections::HashSet::new();
    let list: Vec<String> = list
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect();
    if list.is_empty() {
        return Err(ReelError::AnalysisSchemaInvalid(format!("Field {} must not be empty", field)));
    }
    Ok(list)
}

/// Extract the JSON object from a model response, tolerating a markdown fence.
fn json_body(text: &str) -> &str {
    let trimmed = text.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Parse and validate an analysis response.
pub fn parse_analysis(text: &str) -> Result<AnalysisRecord> {
    let raw: RawAnalysis = serde_json::from_str(json_body(text))
        .map_err(|e| ReelError::AnalysisSchemaInvalid(format!("Invalid JSON response: {}", e)))?;

    let blueprint = required(raw.storytelling_blueprint, "storytelling_blueprint")?;
    let field = |v: Option<String>, name: &str| {
        required(v, &format!("storytelling_blueprint.{}", name))
    };

    let viral_ingredients = required(raw.viral_ingredients, "viral_ingredients")?;
    let video_hooks = required(raw.video_hooks, "video_hooks")?;

    Ok(AnalysisRecord {
        viral_ingredients: non_empty(viral_ingredients, "viral_ingredients")?,
        video_hooks: non_empty(video_hooks, "video_hooks")?,
        hook_pattern: required(raw.hook_pattern, "hook_pattern")?,
        storytelling_blueprint: StorytellingBlueprint {
            genre: field(blueprint.genre, "genre")?,
            theme: field(blueprint.theme, "theme")?,
            target_emotion: field(blueprint.target_emotion, "target_emotion")?,
            pov: field(blueprint.pov, "pov")?,
            setting: field(blueprint.setting, "setting")?,
            characters: required(blueprint.characters, "storytelling_blueprint.characters")?,
            conflict: field(blueprint.conflict, "conflict")?,
            escalating_stakes: field(blueprint.escalating_stakes, "escalating_stakes")?,
            payoff: field(blueprint.payoff, "payoff")?,
        },
    })
}

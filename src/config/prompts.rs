//! Instruction templates for Reelsmith agents.
//!
//! Templates can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all instruction templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub analysis: AnalysisPrompts,
    pub prompter: PrompterPrompts,
    /// Role descriptions attached to each entry of the agent table.
    pub agents: AgentInstructions,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Instruction sent alongside an uploaded video.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisPrompts {
    pub instruction: String,
}

impl Default for AnalysisPrompts {
    fn default() -> Self {
        Self {
            instruction: r#"You are a Video Analysis & Viral Pattern Extraction Agent.

INSTRUCTIONS:
- Analyze the uploaded video directly (not summaries, not transcripts).
- Identify viral ingredients, storytelling DNA, emotional triggers, pacing, editing style, and hooks.
- Capture the genre, theme, target emotions, POV, setting, characters, conflict, stakes, and payoff.
- Output ONLY a single JSON object. Do not add any extra text, explanations, or formatting.
- All array fields must contain at least one value.
- If a field cannot be determined, fill it with "unknown" (never leave fields empty).
- Follow the schema exactly.

OUTPUT SCHEMA:
{
  "viral_ingredients": ["<ingredient_1>", "<ingredient_2>", "..."],
  "video_hooks": ["<hook_1>", "<hook_2>", "..."],
  "hook_pattern": "<concise_description>",
  "storytelling_blueprint": {
    "genre": "<genre>",
    "theme": "<theme>",
    "target_emotion": "<emotion>",
    "pov": "<point_of_view>",
    "setting": "<setting>",
    "characters": ["<char_1>", "<char_2>", "..."],
    "conflict": "<conflict>",
    "escalating_stakes": "<description>",
    "payoff": "<resolution_or_twist>"
  }
}"#
            .to_string(),
        }
    }
}

/// Prompts for writing video-generation prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrompterPrompts {
    pub system: String,
    pub story_user: String,
    pub single_user: String,
}

impl Default for PrompterPrompts {
    fn default() -> Self {
        Self {
            system: r#"You write cinematic prompts for a text-to-video model that produces short vertical clips.

Rules:
- Each prompt describes one continuous clip of about {{clip_seconds}} seconds.
- Open with a visual hook in the first two seconds.
- Describe environment, camera, lighting, transitions, and sound in plain prose.
- Never include real people's names, logos, or unsafe content.
- Respond with JSON only."#
                .to_string(),

            story_user: r#"Write a {{parts}}-part video series that reuses the viral patterns below.

Viral analyses (JSON):
{{analyses}}

Respond with a JSON object:
{
  "parts": [
    {
      "prompt_index": 1,
      "prompt_text": "<cinematic prompt>",
      "carry_over_elements": ["<element kept from the previous part>"]
    }
  ]
}

Rules:
1. Produce exactly {{parts}} parts with prompt_index 1..{{parts}}.
2. Part 1 has an empty carry_over_elements list.
3. Every later part names the characters, props, or settings it continues from the part before it."#
                .to_string(),

            single_user: r#"Expand this idea into a single cinematic prompt.

Idea: {{idea}}

Respond with a JSON object:
{
  "parts": [
    { "prompt_index": 1, "prompt_text": "<cinematic prompt>", "carry_over_elements": [] }
  ]
}"#
            .to_string(),
        }
    }
}

/// Role descriptions for the agent table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentInstructions {
    pub manager: String,
    pub trend_analysis: String,
    pub summarize: String,
    pub single_prompt: String,
    pub story_prompt: String,
    pub compile_series: String,
    pub generate_video: String,
    pub generate_series: String,
    pub assemble: String,
    pub publish: String,
}

impl Default for AgentInstructions {
    fn default() -> Self {
        Self {
            manager: "Classify the request as a free-form prompt or structured {duration, category} \
                parameters and delegate it. Never modify the user's text."
                .to_string(),
            trend_analysis: "Collect trending short videos for a region, timeframe, and category \
                from every configured platform and rank them by views."
                .to_string(),
            summarize: "Download each candidate video, have it analyzed, and return one viral-pattern \
                record per input URL in input order."
                .to_string(),
            single_prompt: "Turn a single idea into one cinematic video prompt.".to_string(),
            story_prompt: "Turn aggregated viral analyses into an N-part series of cinematic prompts \
                with explicit continuity references."
                .to_string(),
            compile_series: "Store series parts exactly as received and emit the compiled series once \
                every index has arrived. Report duplicate_index and series_mismatch."
                .to_string(),
            generate_video: "Generate one video for one prompt and return its reference.".to_string(),
            generate_series: "Generate one video per prompt, preserving prompt order in the returned \
                references."
                .to_string(),
            assemble: "Merge an ordered list of video references into one video.".to_string(),
            publish: "Persist the final references under the series or user id.".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let analysis_path = custom_path.join("analysis.toml");
            if analysis_path.exists() {
                let content = std::fs::read_to_string(&analysis_path)?;
                prompts.analysis = toml::from_str(&content)?;
            }

            let prompter_path = custom_path.join("prompter.toml");
            if prompter_path.exists() {
                let content = std::fs::read_to_string(&prompter_path)?;
                prompts.prompter = toml::from_str(&content)?;
            }

            let agents_path = custom_path.join("agents.toml");
            if agents_path.exists() {
                let content = std::fs::read_to_string(&agents_path)?;
                prompts.agents = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Load with the custom directory and variables named in `settings`.
    pub fn for_settings(settings: &super::Settings) -> crate::error::Result<Self> {
        Self::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a template with provided variables layered over the custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.analysis.instruction.contains("storytelling_blueprint"));
        assert!(!prompts.prompter.system.is_empty());
        assert!(!prompts.agents.compile_series.is_empty());
    }

    #[test]
    fn test_render_with_custom_prefers_call_vars() {
        let mut prompts = Prompts::default();
        prompts.variables.insert("parts".to_string(), "9".to_string());
        prompts.variables.insert("brand".to_string(), "Acme".to_string());

        let mut vars = HashMap::new();
        vars.insert("parts".to_string(), "3".to_string());

        let out = prompts.render_with_custom("{{parts}} parts for {{brand}}", &vars);
        assert_eq!(out, "3 parts for Acme");
    }

    #[test]
    fn test_custom_dir_overrides_analysis() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("analysis.toml"),
            "instruction = \"Describe the video.\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.analysis.instruction, "Describe the video.");
        assert!(prompts.prompter.story_user.contains("{{parts}}"));
    }
}

//! Chat-completions backed prompt writer.

use super::{ContinuityRef, PromptPart, PromptWriter};
use crate::config::Prompts;
use crate::error::{ReelError, Result};
use crate::summarizer::VideoAnalysis;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_openai::Client;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct WrittenParts {
    parts: Vec<WrittenPart>,
}

#[derive(Debug, Deserialize)]
struct WrittenPart {
    prompt_index: u32,
    prompt_text: String,
    #[serde(default)]
    carry_over_elements: Vec<String>,
}

/// Prompt writer using a JSON-mode chat completion.
pub struct OpenAiPromptWriter {
    client: Client<OpenAIConfig>,
    model: String,
    clip_seconds: u32,
    prompts: Prompts,
}

impl OpenAiPromptWriter {
    pub fn new(
        client: Client<OpenAIConfig>,
        model: &str,
        clip_seconds: u32,
        prompts: Prompts,
    ) -> Self {
        Self {
            client,
            model: model.to_string(),
            clip_seconds,
            prompts,
        }
    }

    async fn complete(&self, user_prompt: String) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("clip_seconds".to_string(), self.clip_seconds.to_string());
        let system = self.prompts.render_with_custom(&self.prompts.prompter.system, &vars);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| ReelError::Llm(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt)
                .build()
                .map_err(|e| ReelError::Llm(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.7)
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|e| ReelError::Llm(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| ReelError::Llm(format!("Prompt writing failed: {}", e)))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| ReelError::Llm("Empty response".to_string()))
    }
}

/// Turn the model's answer into exactly `expected` parts numbered `1..=expected`.
fn into_parts(series_id: &str, content: &str, expected: u32) -> Result<Vec<PromptPart>> {
    let mut written: WrittenParts = serde_json::from_str(content)
        .map_err(|e| ReelError::Llm(format!("Invalid prompt JSON: {}", e)))?;
    written.parts.sort_by_key(|p| p.prompt_index);

    let indices: Vec<u32> = written.parts.iter().map(|p| p.prompt_index).collect();
    let wanted: Vec<u32> = (1..=expected).collect();
    if indices != wanted {
        return Err(ReelError::Llm(format!(
            "Expected prompt indices {:?}, got {:?}",
            wanted, indices
        )));
    }

    Ok(written
        .parts
        .into_iter()
        .map(|p| PromptPart {
            series_id: series_id.to_string(),
            prompt_index: p.prompt_index,
            total_planned_prompts: expected,
            prompt_text: p.prompt_text,
            continuity_ref: ContinuityRef {
                previous_prompt_index: p.prompt_index - 1,
                carry_over_elements: if p.prompt_index == 1 {
                    Vec::new()
                } else {
                    p.carry_over_elements
                },
            },
        })
        .collect())
}

#[async_trait]
impl PromptWriter for OpenAiPromptWriter {
    #[instrument(skip(self, analyses), fields(analyses = analyses.len()))]
    async fn write_series(
        &self,
        series_id: &str,
        analyses: &[VideoAnalysis],
        parts: u32,
    ) -> Result<Vec<PromptPart>> {
        let records: Vec<_> = analyses.iter().map(|a| &a.analysis).collect();
        let mut vars = HashMap::new();
        vars.insert("parts".to_string(), parts.to_string());
        vars.insert("analyses".to_string(), serde_json::to_string_pretty(&records)?);
        let user = self.prompts.render_with_custom(&self.prompts.prompter.story_user, &vars);

        let content = self.complete(user).await?;
        debug!("Prompt writer returned {} bytes", content.len());
        into_parts(series_id, &content, parts)
    }

    #[instrument(skip(self, idea))]
    async fn write_single(&self, series_id: &str, idea: &str) -> Result<PromptPart> {
        let mut vars = HashMap::new();
        vars.insert("idea".to_string(), idea.to_string());
        let user = self.prompts.render_with_custom(&self.prompts.prompter.single_user, &vars);

        let content = self.complete(user).await?;
        into_parts(series_id, &content, 1)?
            .pop()
            .ok_or_else(|| ReelError::Llm("No prompt returned".to_string()))
    }
}

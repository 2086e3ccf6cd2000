//! Creative prompt writing and series compilation.
//!
//! A [`PromptWriter`] turns analyses (or a single idea) into numbered
//! [`PromptPart`]s; the [`SeriesCompiler`] gathers them into a
//! [`CompiledSeries`] once every part is present.

mod compiler;
mod writer;

pub use compiler::{CompiledPrompt, CompiledSeries, SeriesCompiler, StoreOutcome};
pub use writer::OpenAiPromptWriter;

use crate::error::Result;
use crate::summarizer::VideoAnalysis;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Link from a part to the one before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuityRef {
    /// Zero for the first part.
    pub previous_prompt_index: u32,
    #[serde(default)]
    pub carry_over_elements: Vec<String>,
}

/// One numbered prompt of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptPart {
    pub series_id: String,
    pub prompt_index: u32,
    pub total_planned_prompts: u32,
    pub prompt_text: String,
    pub continuity_ref: ContinuityRef,
}

/// Writes video-generation prompts.
#[async_trait]
pub trait PromptWriter: Send + Sync {
    /// Write `parts` prompts for one series from the given analyses.
    async fn write_series(
        &self,
        series_id: &str,
        analyses: &[VideoAnalysis],
        parts: u32,
    ) -> Result<Vec<PromptPart>>;

    /// Expand a free-form idea into one prompt.
    async fn write_single(&self, series_id: &str, idea: &str) -> Result<PromptPart>;
}

/// Number of clips needed to cover `duration_seconds`, between 1 and `max_parts`.
pub fn parts_for_duration(duration_seconds: u32, clip_seconds: u32, max_parts: u32) -> u32 {
    let clip = clip_seconds.max(1);
    duration_seconds.div_ceil(clip).clamp(1, max_parts.max(1))
}

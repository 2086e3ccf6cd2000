//! Series compiler: collects numbered prompt parts and emits the full series
//! once every index has arrived exactly once.

use super::{ContinuityRef, PromptPart};
use crate::error::{ReelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// One entry of a compiled series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPrompt {
    pub prompt_index: u32,
    pub prompt_text: String,
    pub continuity_ref: ContinuityRef,
}

/// Every part of a series in index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledSeries {
    pub series_id: String,
    pub total_prompts: u32,
    pub compiled_series: Vec<CompiledPrompt>,
}

impl CompiledSeries {
    /// Prompt texts in index order.
    pub fn prompts(&self) -> Vec<String> {
        self.compiled_series.iter().map(|p| p.prompt_text.clone()).collect()
    }
}

/// Result of accepting one part.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoreOutcome {
    Stored {
        series_id: String,
        received_prompt_index: u32,
        remaining_prompts_expected: u32,
    },
    Complete(CompiledSeries),
}

#[derive(Debug)]
struct Collecting {
    series_id: String,
    total: u32,
    parts: BTreeMap<u32, PromptPart>,
}

/// Per-series buffer. `collecting` until all `1..=N` parts are stored, then
/// the compiled series is emitted and the buffer resets.
#[derive(Debug, Default)]
pub struct SeriesCompiler {
    current: Option<Collecting>,
}

impl SeriesCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Series currently being collected, if any.
    pub fn series_id(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.series_id.as_str())
    }

    /// Number of parts stored for the series in progress.
    pub fn stored(&self) -> usize {
        self.current.as_ref().map(|c| c.parts.len()).unwrap_or(0)
    }

    /// Store one part. Rejections leave already-stored parts untouched.
    pub fn accept(&mut self, part: PromptPart) -> Result<StoreOutcome> {
        let total = part.total_planned_prompts;
        if total == 0 {
            return Err(ReelError::InvalidInput(format!(
                "Series {} declares zero planned prompts.",
                part.series_id
            )));
        }
        if part.prompt_index == 0 || part.prompt_index > total {
            return Err(ReelError::InvalidInput(format!(
                "Prompt index {} outside 1..={} for series_id {}.",
                part.prompt_index, total, part.series_id
            )));
        }

        let current = self.current.get_or_insert_with(|| Collecting {
            series_id: part.series_id.clone(),
            total,
            parts: BTreeMap::new(),
        });

        if current.series_id != part.series_id {
            return Err(ReelError::SeriesMismatch {
                expected: current.series_id.clone(),
                got: part.series_id,
            });
        }
        if current.total != total {
            return Err(ReelError::InvalidInput(format!(
                "Series {} expects {} prompts but part declares {}.",
                current.series_id, current.total, total
            )));
        }
        if current.parts.contains_key(&part.prompt_index) {
            return Err(ReelError::DuplicateIndex {
                series_id: part.series_id,
                index: part.prompt_index,
            });
        }

        let index = part.prompt_index;
        current.parts.insert(index, part);
        debug!("Stored part {} of {} for {}", index, current.total, current.series_id);

        if current.parts.len() as u32 == current.total {
            if let Some(done) = self.current.take() {
                return Ok(StoreOutcome::Complete(compile(done)));
            }
        }

        let current = self.current.as_ref().ok_or_else(|| {
            ReelError::InvalidInput("series buffer vanished while collecting".to_string())
        })?;
        Ok(StoreOutcome::Stored {
            series_id: current.series_id.clone(),
            received_prompt_index: index,
            remaining_prompts_expected: current.total - current.parts.len() as u32,
        })
    }

    /// Feed a full set of parts and return the compiled series.
    pub fn compile_all(&mut self, parts: Vec<PromptPart>) -> Result<CompiledSeries> {
        let mut compiled = None;
        for part in parts {
            if let StoreOutcome::Complete(series) = self.accept(part)? {
                compiled = Some(series);
            }
        }
        compiled.ok_or_else(|| {
            ReelError::InvalidInput(format!(
                "Series incomplete: {} part(s) stored, more expected",
                self.stored()
            ))
        })
    }
}

fn compile(done: Collecting) -> CompiledSeries {
    CompiledSeries {
        series_id: done.series_id,
        total_prompts: done.total,
        compiled_series: done
            .parts
            .into_values()
            .map(|p| CompiledPrompt {
                prompt_index: p.prompt_index,
                prompt_text: p.prompt_text,
                continuity_ref: p.continuity_ref,
            })
            .collect(),
    }
}

//! Configuration module for Reelsmith.
//!
//! Handles loading and managing application settings and agent instruction templates.

mod prompts;
mod settings;

pub use prompts::{AgentInstructions, AnalysisPrompts, PrompterPrompts, Prompts};
pub use settings::{
    AssemblerSettings, CollectorSettings, GeneralSettings, GeneratorSettings, PromptSettings,
    PrompterSettings, ReferenceMode, Settings, StoreSettings, SummarizerSettings,
};

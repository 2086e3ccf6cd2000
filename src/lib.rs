//! Reelsmith - trending short-form video in, generated series out
//!
//! A pipeline that collects trending short videos, extracts the patterns that
//! made them spread, writes a continuity-linked series of prompts, generates one
//! clip per prompt, merges the clips in order, and records the results.
//!
//! # Architecture
//!
//! - `agents` - Request classification and the task dispatch table
//! - `collector` - Trend collection across platforms
//! - `media` - Platform detection and video download
//! - `summarizer` - Per-video viral pattern analysis
//! - `prompter` - Prompt writing and series compilation
//! - `generator` - Long-running video generation
//! - `assembler` - Ordered merge of generated clips
//! - `publisher` - Persisted references
//! - `poll` - Submit-then-poll primitive shared by the long-running stages
//! - `pipeline` - Runs the routed task plan
//!
//! # Example
//!
//! ```rust,no_run
//! use reelsmith::agents::JobRequest;
//! use reelsmith::config::Settings;
//! use reelsmith::pipeline::Pipeline;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::new(Settings::load()?)?;
//!     let request = JobRequest::structured("24s", "trending");
//!
//!     let outcome = pipeline.run(&request, "user-1", &CancellationToken::new()).await?;
//!     println!("Final video: {:?}", outcome.final_reference);
//!
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod assembler;
pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod generator;
pub mod media;
pub mod openai;
pub mod pipeline;
pub mod poll;
pub mod prompter;
pub mod publisher;
pub mod summarizer;

pub use error::{ReelError, Result};

//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and credentials are available
//! before starting operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{ReelError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Trend collection needs the scraping token.
    Trends,
    /// Analysis downloads with yt-dlp and uploads to Gemini.
    Analyze,
    /// Generation needs the Gemini key.
    Generate,
    /// Merging needs ffmpeg or a Google access token, per backend.
    Assemble,
    /// A full run needs everything.
    Run,
    /// Reference lookup is local.
    Refs,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Trends => check_env("APIFY_API_TOKEN")?,
        Operation::Analyze => {
            check_env("GEMINI_API_KEY")?;
            check_tool("yt-dlp")?;
        }
        Operation::Generate => check_env("GEMINI_API_KEY")?,
        Operation::Assemble => check_assembler(settings)?,
        Operation::Run => {
            check_env("APIFY_API_TOKEN")?;
            check_env("GEMINI_API_KEY")?;
            check_env("OPENAI_API_KEY")?;
            check_tool("yt-dlp")?;
            check_assembler(settings)?;
        }
        Operation::Refs => {}
    }
    Ok(())
}

fn check_assembler(settings: &Settings) -> Result<()> {
    if settings.assembler.backend.eq_ignore_ascii_case("transcoder") {
        check_env("GOOGLE_ACCESS_TOKEN")
    } else {
        check_tool(&settings.assembler.ffmpeg_path)
    }
}

/// Check that a secret is present in the environment.
pub fn check_env(name: &str) -> Result<()> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(()),
        Ok(_) => Err(ReelError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            name, name
        ))),
        Err(_) => Err(ReelError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            name, name
        ))),
    }
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    // ffmpeg uses -version (single dash)
    let version_arg = if name.ends_with("ffmpeg") || name.ends_with("ffprobe") {
        "-version"
    } else {
        "--version"
    };
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(ReelError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ReelError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(ReelError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refs_has_no_requirements() {
        assert!(check(Operation::Refs, &Settings::default()).is_ok());
    }

    #[test]
    fn test_missing_tool_is_tool_not_found() {
        let err = check_tool("reelsmith-no-such-tool").unwrap_err();
        assert!(matches!(err, ReelError::ToolNotFound(_)));
    }

    #[test]
    fn test_missing_env_names_the_variable() {
        let err = check_env("REELSMITH_TEST_UNSET_VARIABLE").unwrap_err();
        assert!(err.to_string().contains("REELSMITH_TEST_UNSET_VARIABLE"));
    }
}

//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::{ReferenceMode, Settings};
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Reelsmith Doctor");
    println!();

    let sections = [
        ("External Tools", check_tools(settings)),
        ("Credentials", check_credentials(settings)),
        ("Pipeline Settings", check_settings(settings)),
        ("Storage", check_storage(settings)),
    ];

    let mut errors = 0;
    let mut warnings = 0;
    for (title, checks) in &sections {
        println!("{}", style(title).bold());
        for check in checks {
            check.print();
            match check.status {
                CheckStatus::Error => errors += 1,
                CheckStatus::Warning => warnings += 1,
                CheckStatus::Ok => {}
            }
        }
        println!();
    }

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before running the pipeline.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Reelsmith is ready to use.");
    }

    Ok(())
}

fn check_tools(settings: &Settings) -> Vec<CheckResult> {
    let mut checks = vec![check_tool("yt-dlp", "--version", install_hint_ytdlp())];
    if settings.assembler.backend.eq_ignore_ascii_case("ffmpeg") {
        checks.push(check_tool(
            &settings.assembler.ffmpeg_path,
            "-version",
            install_hint_ffmpeg(),
        ));
    }
    checks
}

/// Check if an external tool is available.
fn check_tool(name: &str, version_arg: &str, hint: &str) -> CheckResult {
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .chars()
                .take(50)
                .collect::<String>();
            CheckResult::ok(name, &version)
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

fn check_credentials(settings: &Settings) -> Vec<CheckResult> {
    let mut checks = vec![
        check_secret("APIFY_API_TOKEN", "Needed for trend collection"),
        check_secret("GEMINI_API_KEY", "Needed for analysis and generation"),
        check_secret("OPENAI_API_KEY", "Needed for prompt writing"),
    ];
    if settings.assembler.backend.eq_ignore_ascii_case("transcoder") {
        checks.push(check_secret(
            "GOOGLE_ACCESS_TOKEN",
            "Create with: gcloud auth print-access-token",
        ));
    }
    checks
}

fn check_secret(name: &str, hint: &str) -> CheckResult {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => CheckResult::error(name, "empty", hint),
        Ok(value) => CheckResult::ok(name, &format!("configured ({})", mask(&value))),
        Err(_) => CheckResult::error(name, "not set", hint),
    }
}

/// Show only the ends of a secret.
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn check_settings(settings: &Settings) -> Vec<CheckResult> {
    let mut checks = Vec::new();

    let platforms = &settings.collector.platforms;
    let unknown: Vec<&String> = platforms
        .iter()
        .filter(|p| p.parse::<crate::collector::Platform>().is_err())
        .collect();
    if unknown.is_empty() {
        checks.push(CheckResult::ok("Platforms", &platforms.join(", ")));
    } else {
        checks.push(CheckResult::error(
            "Platforms",
            &format!("unknown: {:?}", unknown),
            "Use youtube and/or tiktok",
        ));
    }

    let generator = &settings.generator;
    match (generator.reference_mode, &generator.storage_uri) {
        (ReferenceMode::Storage, None) => checks.push(CheckResult::error(
            "Reference mode",
            "storage mode without generator.storage_uri",
            "Set generator.storage_uri = \"gs://bucket/prefix\"",
        )),
        (ReferenceMode::Storage, Some(uri)) if !uri.starts_with("gs://") => {
            checks.push(CheckResult::warning(
                "Reference mode",
                &format!("storage URI {} is not gs://", uri),
                "The transcoder backend only reads gs:// inputs",
            ))
        }
        (mode, _) => checks.push(CheckResult::ok("Reference mode", &mode.to_string())),
    }

    let assembler = &settings.assembler;
    match assembler.backend.to_lowercase().as_str() {
        "ffmpeg" => {
            if generator.reference_mode == ReferenceMode::Storage {
                checks.push(CheckResult::warning(
                    "Assembler",
                    "ffmpeg cannot read gs:// clips",
                    "Use assembler.backend = \"transcoder\" with storage mode",
                ));
            } else {
                checks.push(CheckResult::ok("Assembler", "ffmpeg"));
            }
        }
        "transcoder" if assembler.project_id.is_none() || assembler.bucket.is_none() => {
            checks.push(CheckResult::error(
                "Assembler",
                "transcoder needs project_id and bucket",
                "Set assembler.project_id and assembler.bucket",
            ))
        }
        "transcoder" => checks.push(CheckResult::ok("Assembler", "transcoder")),
        other => checks.push(CheckResult::error(
            "Assembler",
            &format!("unknown backend {}", other),
            "Use ffmpeg or transcoder",
        )),
    }

    checks
}

fn check_storage(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let config_path = Settings::default_config_path();
    if config_path.exists() {
        results.push(CheckResult::ok("Config file", &config_path.display().to_string()));
    } else {
        results.push(CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: reelsmith config edit",
        ));
    }

    if settings.store.provider.eq_ignore_ascii_case("memory") {
        results.push(CheckResult::warning(
            "Reference store",
            "in-memory; references are lost on exit",
            "Set store.provider = \"sqlite\" to keep history",
        ));
        return results;
    }

    let db_path = settings.sqlite_path();
    if db_path.exists() {
        let size = std::fs::metadata(&db_path)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        let detail = format!("{} ({})", db_path.display(), size);
        results.push(CheckResult::ok("Reference store", &detail));
    } else {
        results.push(CheckResult::warning(
            "Reference store",
            &format!("{} (not created yet)", db_path.display()),
            "Database will be created on first publish",
        ));
    }

    results
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Platform-specific install hint for yt-dlp.
fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}

/// Platform-specific install hint for ffmpeg.
fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_hides_middle() {
        assert_eq!(mask("short"), "****");
        assert_eq!(mask("AIzaSyExampleKey1234"), "AIza...1234");
    }

    #[test]
    fn test_storage_mode_without_uri_is_error() {
        let mut settings = Settings::default();
        settings.generator.reference_mode = ReferenceMode::Storage;
        let checks = check_settings(&settings);
        let mode = checks.iter().find(|c| c.name == "Reference mode").unwrap();
        assert_eq!(mode.status, CheckStatus::Error);
    }

    #[test]
    fn test_default_settings_pass() {
        let checks = check_settings(&Settings::default());
        assert!(checks.iter().all(|c| c.status == CheckStatus::Ok));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
    }
}

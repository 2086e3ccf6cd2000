//! CLI output formatting utilities.

use crate::collector::VideoCandidate;
use crate::error::ErrorReport;
use crate::summarizer::VideoAnalysis;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a structured error object.
    pub fn report(report: &ErrorReport) {
        eprintln!(
            "{} [{}] {}",
            style(">>").red().bold(),
            style(report.error_type).red(),
            report.message
        );
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print one ranked trend candidate.
    pub fn candidate(rank: usize, candidate: &VideoCandidate) {
        println!(
            "  {} {} ({}, {} views)",
            style(format!("{}.", rank)).cyan(),
            style(content_preview(&candidate.title, 60)).bold(),
            style(candidate.platform).dim(),
            format_count(candidate.view_count)
        );
        println!("     {}", style(&candidate.url).dim());
    }

    /// Print one analysis slot.
    pub fn analysis(analysis: &VideoAnalysis) {
        if analysis.is_ok() {
            let blueprint = &analysis.analysis.storytelling_blueprint;
            println!(
                "\n{} {} ({} / {})",
                style(">>").green(),
                style(&analysis.url).bold(),
                blueprint.genre,
                blueprint.target_emotion
            );
            println!("   hook: {}", content_preview(&analysis.analysis.hook_pattern, 120));
            println!("   ingredients: {}", analysis.analysis.viral_ingredients.join(", "));
        } else {
            println!(
                "\n{} {} ({:?})",
                style(">>").red(),
                style(&analysis.url).bold(),
                analysis.status
            );
            if let Some(error) = &analysis.error {
                println!("   {}", style(error).dim());
            }
        }
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        let template = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(msg.to_string());
        pb
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        let template = "{spinner:.green} [{elapsed}] {msg}";
        if let Ok(style) = ProgressStyle::default_spinner().template(template) {
            pb.set_style(style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Format a view count compactly (1.2K, 3.4M).
fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_500), "1.5K");
        assert_eq!(format_count(2_000_000), "2.0M");
    }

    #[test]
    fn test_content_preview_is_char_safe() {
        assert_eq!(content_preview("héllo wörld", 5), "héllo...");
        assert_eq!(content_preview("a\nb", 10), "a b");
    }
}

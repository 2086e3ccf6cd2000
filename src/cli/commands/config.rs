//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Run the config command.
pub fn run_config(
    action: &ConfigAction,
    config_path: Option<PathBuf>,
    settings: Settings,
) -> Result<()> {
    let config_path = config_path.unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let text = toml::to_string_pretty(&settings).context("Failed to serialize config")?;
            println!("{}", text);
        }

        ConfigAction::Set { key, value } => {
            let updated = set_value(&settings, key, value)?;
            updated.save_to(&config_path)?;
            Output::success(&format!("{} = {}", key, value));
        }

        ConfigAction::Edit => {
            if !config_path.exists() {
                settings.save_to(&config_path)?;
                Output::info(&format!("Created default config at {}", config_path.display()));
            }

            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vim".to_string());
            Output::info(&format!("Opening config in {}...", editor));

            let status = std::process::Command::new(&editor)
                .arg(&config_path)
                .status();
            match status {
                Ok(s) if s.success() => match Settings::load_from(Some(&config_path)) {
                    Ok(_) => Output::success("Config saved."),
                    Err(e) => Output::error(&format!("Config no longer parses: {}", e)),
                },
                Ok(_) => Output::warning("Editor exited with non-zero status."),
                Err(e) => {
                    Output::error(&format!("Failed to open editor: {}", e));
                    Output::info(&format!("Config file is at: {}", config_path.display()));
                }
            }
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

/// Apply `section.field = value` to a copy of `settings`.
///
/// The value is read as a TOML literal first (numbers, booleans, arrays) and
/// falls back to a plain string.
fn set_value(settings: &Settings, key: &str, raw: &str) -> Result<Settings> {
    let Some((section, field)) = key.split_once('.') else {
        bail!("Key must look like section.field (e.g. generator.deadline_seconds)");
    };

    let mut root = toml::Value::try_from(settings).context("Failed to serialize config")?;
    let table = root
        .get_mut(section)
        .and_then(|v| v.as_table_mut())
        .with_context(|| format!("Unknown config section: {}", section))?;

    let value = toml::from_str::<toml::Table>(&format!("v = {}", raw))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()));
    table.insert(field.to_string(), value);

    let text = toml::to_string(&root).context("Failed to serialize config")?;
    let updated: Settings =
        toml::from_str(&text).with_context(|| format!("Invalid value for {}", key))?;

    if toml::Value::try_from(&updated)?.get(section).and_then(|s| s.get(field)).is_none() {
        bail!("Unknown config key: {}", key);
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_number_and_string() {
        let defaults = Settings::default();
        let settings = set_value(&defaults, "generator.deadline_seconds", "300").unwrap();
        assert_eq!(settings.generator.deadline_seconds, 300);

        let settings = set_value(&settings, "generator.storage_uri", "gs://bucket/gen").unwrap();
        assert_eq!(settings.generator.storage_uri.as_deref(), Some("gs://bucket/gen"));
        assert_eq!(settings.generator.deadline_seconds, 300);
    }

    #[test]
    fn test_set_array() {
        let defaults = Settings::default();
        let settings = set_value(&defaults, "collector.platforms", r#"["tiktok"]"#).unwrap();
        assert_eq!(settings.collector.platforms, vec!["tiktok"]);
    }

    #[test]
    fn test_set_rejects_bad_keys_and_values() {
        assert!(set_value(&Settings::default(), "deadline", "1").is_err());
        assert!(set_value(&Settings::default(), "nope.field", "1").is_err());
        assert!(set_value(&Settings::default(), "generator.deadline_seconds", "soon").is_err());
        assert!(set_value(&Settings::default(), "generator.not_a_field", "1").is_err());
    }
}

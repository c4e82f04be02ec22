// ABOUTME: Configuration management for the stencil application
// ABOUTME: Handles loading and merging configuration from files and environment variables

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::template::{DefaultFormatter, ForceReplace, TemplateEngine};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Text written for placeholders without a value; empty removes them
    #[serde(default)]
    pub force_replace: Option<String>,

    #[serde(default = "default_arg_separator")]
    pub arg_separator: char,

    #[serde(default)]
    pub template_root: Option<PathBuf>,

    #[serde(default = "default_log_errors")]
    pub log_errors: bool,

    #[serde(default)]
    pub template_vars: HashMap<String, String>,

    #[serde(default)]
    pub formatting: DefaultFormatter,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn default_arg_separator() -> char {
    ';'
}

fn default_log_errors() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            force_replace: None,
            arg_separator: default_arg_separator(),
            template_root: None,
            log_errors: default_log_errors(),
            template_vars: HashMap::new(),
            formatting: DefaultFormatter::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Map the configured replacement text onto the engine's policy
pub fn force_replace_policy(text: Option<&str>) -> ForceReplace {
    match text {
        None => ForceReplace::Off,
        Some("") => ForceReplace::Empty,
        Some(text) => ForceReplace::Literal(text.to_string()),
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => Some(p),
            None => Self::find_config_file(),
        };

        let mut config = match config_path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Config::default(),
        };

        // Merge with environment variables
        config.merge_env(|name| std::env::var(name).ok())?;

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let possible_paths = [
            PathBuf::from("stencil.yaml"),
            PathBuf::from("stencil.yml"),
            PathBuf::from(".stencil.yaml"),
            PathBuf::from(".stencil.yml"),
        ];

        // Check current directory
        if let Some(path) = possible_paths.into_iter().find(|path| path.exists()) {
            return Some(path);
        }

        // Check home directory
        dirs::home_dir()
            .map(|home_dir| home_dir.join(".stencil").join("config.yaml"))
            .filter(|path| path.exists())
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(text) = lookup("STENCIL_FORCE_REPLACE") {
            self.force_replace = Some(text);
        }
        if let Some(separator) = lookup("STENCIL_ARG_SEPARATOR") {
            let mut chars = separator.chars();
            self.arg_separator = match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => anyhow::bail!(
                    "STENCIL_ARG_SEPARATOR must be a single character, got '{}'",
                    separator
                ),
            };
        }
        if let Some(root) = lookup("STENCIL_TEMPLATE_ROOT") {
            self.template_root = Some(PathBuf::from(root));
        }
        if let Some(log_errors) = lookup("STENCIL_LOG_ERRORS") {
            self.log_errors = log_errors
                .parse()
                .with_context(|| format!("STENCIL_LOG_ERRORS must be true or false, got '{}'", log_errors))?;
        }

        // Logging configuration
        if let Some(level) = lookup("STENCIL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("STENCIL_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Merge additional variables into template variables
    pub fn merge_variables(&mut self, vars: HashMap<String, String>) {
        self.template_vars.extend(vars);
    }

    /// Template engine configured from these settings
    pub fn template_engine(&self) -> TemplateEngine {
        let engine = TemplateEngine::new()
            .with_force_replace(force_replace_policy(self.force_replace.as_deref()))
            .with_arg_separator(self.arg_separator)
            .with_log_errors(self.log_errors)
            .with_formatter(self.formatting.clone());
        match &self.template_root {
            Some(root) => engine.with_template_root(root),
            None => engine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.arg_separator, ';');
        assert!(config.log_errors);
        assert_eq!(config.logging.level, "warn");
        assert!(config.force_replace.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("stencil.yaml");

        let config_content = r#"
force_replace: "-"
arg_separator: ","
template_root: ./templates
template_vars:
  company: ACME
formatting:
  decimal_separator: ","
  thousands_separator: " "
logging:
  level: debug
  format: compact
"#;
        fs::write(&config_path, config_content).unwrap();

        let config = Config::from_file(&config_path).unwrap();
        assert_eq!(config.force_replace.as_deref(), Some("-"));
        assert_eq!(config.arg_separator, ',');
        assert_eq!(config.template_root, Some(PathBuf::from("./templates")));
        assert_eq!(config.template_vars.get("company"), Some(&"ACME".to_string()));
        assert_eq!(config.formatting.decimal_separator, ',');
        assert_eq!(config.formatting.thousands_separator, Some(' '));
        assert_eq!(config.formatting.utc_offset_minutes, 0);
        assert!(config.log_errors);
        assert_eq!(config.logging.format, "compact");
    }

    #[test]
    fn test_merge_env() {
        let env: HashMap<&str, &str> = [
            ("STENCIL_FORCE_REPLACE", ""),
            ("STENCIL_ARG_SEPARATOR", "|"),
            ("STENCIL_LOG_ERRORS", "false"),
            ("STENCIL_LOG_LEVEL", "trace"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .merge_env(|name| env.get(name).map(|value| value.to_string()))
            .unwrap();

        assert_eq!(config.force_replace.as_deref(), Some(""));
        assert_eq!(config.arg_separator, '|');
        assert!(!config.log_errors);
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_merge_env_rejects_bad_separator() {
        let mut config = Config::default();
        let result = config.merge_env(|name| (name == "STENCIL_ARG_SEPARATOR").then(|| ";;".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_force_replace_policy() {
        assert_eq!(force_replace_policy(None), ForceReplace::Off);
        assert_eq!(force_replace_policy(Some("")), ForceReplace::Empty);
        assert_eq!(
            force_replace_policy(Some("N/A")),
            ForceReplace::Literal("N/A".to_string())
        );
    }

    #[test]
    fn test_template_engine_uses_settings() {
        let config = Config {
            force_replace: Some(String::new()),
            arg_separator: ',',
            ..Config::default()
        };
        let engine = config.template_engine();
        assert_eq!(engine.force_replace(), &ForceReplace::Empty);
        assert_eq!(engine.arg_separator(), ',');
    }
}

//! Toolkit configuration.
//!
//! Matches the key=value format of `.toolkit/config`.
//! Precedence: CLI flags > `--config` file > `.toolkit/config` > defaults.

use crate::render::RenderOptions;
use crate::templates::TemplateLayout;
use crate::validate::ManifestRules;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up under the repository root when none is given.
pub const DEFAULT_CONFIG_FILE: &str = ".toolkit/config";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config line: {0}")]
    InvalidLine(String),
    #[error("invalid integer value for {key}: {value}")]
    InvalidInt { key: String, value: String },
    #[error("invalid rate for {key}: {value} (expected a number between 0 and 1)")]
    InvalidRate { key: String, value: String },
    #[error("unknown config key: {0}")]
    UnknownKey(String),
}

/// Paths, naming rules, expected canonical sets and budgets.
///
/// Field names match the config keys. Paths are relative to the repository
/// root.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolkitConfig {
    // Files
    pub manifest_file: PathBuf,
    pub registry_file: PathBuf,
    pub schema_file: PathBuf,
    pub install_script: PathBuf,
    pub readme_file: PathBuf,
    pub cases_dir: PathBuf,
    pub templates_dir: String,
    pub orchestrator_files: Vec<PathBuf>,

    // Manifest rules
    pub schema_version: String,
    pub required_platforms: Vec<String>,

    // Naming
    pub command_namespace: String,
    pub agent_namespace: String,

    // Expected canonical sets; empty means unchecked.
    pub expected_agents: Vec<String>,
    pub expected_skills: Vec<String>,
    pub expected_commands: Vec<String>,

    // Prompt budgets
    pub agent_required_tags: Vec<String>,
    pub agent_max_lines: usize,
    pub agent_total_lines: usize,
    pub skill_max_lines: usize,
    pub skill_total_lines: usize,

    /// Pass-rate gate used when a cases file does not set its own.
    pub min_pass_rate: f64,

    /// Directory names skipped when scanning for markdown files.
    pub scan_exclude: Vec<String>,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            manifest_file: PathBuf::from("toolkit/manifest.json"),
            registry_file: PathBuf::from("toolkit/registry.json"),
            schema_file: PathBuf::from("toolkit/manifest.schema.json"),
            install_script: PathBuf::from("install.sh"),
            readme_file: PathBuf::from("README.md"),
            cases_dir: PathBuf::from("toolkit/cases"),
            templates_dir: "templates/shared".to_string(),
            orchestrator_files: vec![
                PathBuf::from("templates/claude/CLAUDE.md"),
                PathBuf::from("templates/opencode/crewai-orchestrator.md"),
            ],
            schema_version: "1.0".to_string(),
            required_platforms: vec!["claude".to_string(), "opencode".to_string()],
            command_namespace: "crew".to_string(),
            agent_namespace: "crewai".to_string(),
            expected_agents: Vec::new(),
            expected_skills: Vec::new(),
            expected_commands: Vec::new(),
            agent_required_tags: vec![
                "<ownership>".to_string(),
                "<scope>".to_string(),
                "<output_contract>".to_string(),
            ],
            agent_max_lines: 140,
            agent_total_lines: 700,
            skill_max_lines: 70,
            skill_total_lines: 600,
            min_pass_rate: 0.95,
            scan_exclude: vec![
                ".git".to_string(),
                "target".to_string(),
                "node_modules".to_string(),
            ],
        }
    }
}

impl ToolkitConfig {
    /// Load config from a file, merging with defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.load_file(path)?;
        Ok(config)
    }

    /// Resolve the config for a repository.
    ///
    /// An explicit path must exist. Otherwise `.toolkit/config` under `root`
    /// is used when present, and defaults when not.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let implicit = root.join(DEFAULT_CONFIG_FILE);
        if implicit.is_file() {
            tracing::debug!(path = %implicit.display(), "loading repository config");
            Self::from_file(&implicit)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and merge values from a config file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_content(&content)
    }

    /// Parse config content (key=value format).
    pub fn parse_content(&mut self, content: &str) -> Result<(), ConfigError> {
        for line in content.lines() {
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine(line.to_string()));
            };

            let key = key.trim();
            let value = Self::unquote(value.trim());

            self.apply_value(key, &value)?;
        }
        Ok(())
    }

    /// Remove surrounding quotes from a value.
    fn unquote(value: &str) -> String {
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            return value[1..value.len() - 1].to_string();
        }
        value.to_string()
    }

    /// Comma-separated list; blank items are dropped.
    fn parse_list(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    fn parse_count(key: &str, value: &str) -> Result<usize, ConfigError> {
        value.parse().map_err(|_| ConfigError::InvalidInt {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    fn parse_rate(key: &str, value: &str) -> Result<f64, ConfigError> {
        let invalid = || ConfigError::InvalidRate {
            key: key.to_string(),
            value: value.to_string(),
        };
        let rate: f64 = value.parse().map_err(|_| invalid())?;
        if (0.0..=1.0).contains(&rate) {
            Ok(rate)
        } else {
            Err(invalid())
        }
    }

    /// Apply a single config value.
    fn apply_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "manifest_file" => self.manifest_file = PathBuf::from(value),
            "registry_file" => self.registry_file = PathBuf::from(value),
            "schema_file" => self.schema_file = PathBuf::from(value),
            "install_script" => self.install_script = PathBuf::from(value),
            "readme_file" => self.readme_file = PathBuf::from(value),
            "cases_dir" => self.cases_dir = PathBuf::from(value),
            "templates_dir" => self.templates_dir = value.trim_end_matches('/').to_string(),
            "orchestrator_files" => {
                self.orchestrator_files = Self::parse_list(value)
                    .into_iter()
                    .map(PathBuf::from)
                    .collect();
            }
            "schema_version" => self.schema_version = value.to_string(),
            "required_platforms" => self.required_platforms = Self::parse_list(value),
            "command_namespace" => self.command_namespace = value.to_string(),
            "agent_namespace" => self.agent_namespace = value.to_string(),
            "expected_agents" => self.expected_agents = Self::parse_list(value),
            "expected_skills" => self.expected_skills = Self::parse_list(value),
            "expected_commands" => self.expected_commands = Self::parse_list(value),
            "agent_required_tags" => self.agent_required_tags = Self::parse_list(value),
            "agent_max_lines" => self.agent_max_lines = Self::parse_count(key, value)?,
            "agent_total_lines" => self.agent_total_lines = Self::parse_count(key, value)?,
            "skill_max_lines" => self.skill_max_lines = Self::parse_count(key, value)?,
            "skill_total_lines" => self.skill_total_lines = Self::parse_count(key, value)?,
            "min_pass_rate" => self.min_pass_rate = Self::parse_rate(key, value)?,
            "scan_exclude" => self.scan_exclude = Self::parse_list(value),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn manifest_rules(&self) -> ManifestRules {
        ManifestRules {
            schema_version: self.schema_version.clone(),
            required_platforms: self.required_platforms.clone(),
        }
    }

    pub fn template_layout(&self) -> TemplateLayout {
        TemplateLayout {
            templates_dir: self.templates_dir.clone(),
            command_namespace: self.command_namespace.clone(),
            agent_namespace: self.agent_namespace.clone(),
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            command_namespace: self.command_namespace.clone(),
            agent_namespace: self.agent_namespace.clone(),
            ..RenderOptions::default()
        }
    }

    /// Routing regression cases.
    pub fn agent_routing_cases(&self) -> PathBuf {
        self.cases_dir.join("agent-routing.json")
    }

    pub fn command_smoke_cases(&self) -> PathBuf {
        self.cases_dir.join("command-smoke.json")
    }

    pub fn e2e_scenarios(&self) -> PathBuf {
        self.cases_dir.join("e2e-scenarios.json")
    }
}

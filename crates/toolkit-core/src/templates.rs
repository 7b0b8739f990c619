//! Template reference resolution.
//!
//! Every canonical entity records the path of its template. The path is fully
//! determined by the entity kind and name, so a recorded path that differs
//! from the computed one is reported separately from a correct path whose file
//! is missing.

use crate::manifest::Manifest;
use crate::report::{ErrorKind, Finding};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Per-kind template naming rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLayout {
    /// Root of the shared templates, relative to the repository root.
    pub templates_dir: String,
    /// Folder that groups command templates, e.g. `crew`.
    pub command_namespace: String,
    /// Folder that groups agent templates, e.g. `crewai`.
    pub agent_namespace: String,
}

impl Default for TemplateLayout {
    fn default() -> Self {
        Self {
            templates_dir: "templates/shared".to_string(),
            command_namespace: "crew".to_string(),
            agent_namespace: "crewai".to_string(),
        }
    }
}

impl TemplateLayout {
    pub fn commands_dir(&self) -> String {
        format!("{}/commands/{}", self.templates_dir, self.command_namespace)
    }

    pub fn agents_dir(&self) -> String {
        format!("{}/agents/{}", self.templates_dir, self.agent_namespace)
    }

    pub fn skills_dir(&self) -> String {
        format!("{}/skills", self.templates_dir)
    }

    pub fn workflows_dir(&self) -> String {
        format!("{}/workflows", self.templates_dir)
    }

    pub fn command_path(&self, name: &str) -> String {
        format!("{}/{name}.md", self.commands_dir())
    }

    pub fn agent_path(&self, name: &str) -> String {
        format!("{}/{name}.md", self.agents_dir())
    }

    pub fn skill_path(&self, name: &str) -> String {
        format!("{}/{name}/SKILL.md", self.skills_dir())
    }

    pub fn workflow_path(&self, name: &str) -> String {
        format!("{}/{name}/SKILL.md", self.workflows_dir())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateViolation {
    #[error(
        "`{entry}` template mismatch: expected `{expected}`, got `{}`",
        .recorded.as_deref().unwrap_or("<none>")
    )]
    Mismatch {
        entry: String,
        expected: String,
        recorded: Option<String>,
    },
    #[error("missing referenced template file: {0}")]
    MissingTemplate(String),
    #[error("installation.system_files.{platform} references missing file: {path}")]
    MissingSystemFile { platform: String, path: String },
}

impl Finding for TemplateViolation {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Mismatch { .. } => ErrorKind::ReferentialIntegrity,
            Self::MissingTemplate(_) | Self::MissingSystemFile { .. } => ErrorKind::Filesystem,
        }
    }
}

/// Check every declared template path and system file under `root`.
pub fn resolve_templates(
    root: &Path,
    manifest: &Manifest,
    layout: &TemplateLayout,
) -> Vec<TemplateViolation> {
    let mut violations = Vec::new();
    let mut verify = |entry: String, recorded: Option<&String>, expected: String| {
        if recorded != Some(&expected) {
            violations.push(TemplateViolation::Mismatch {
                entry,
                expected,
                recorded: recorded.cloned(),
            });
        } else if !root.join(&expected).exists() {
            violations.push(TemplateViolation::MissingTemplate(expected));
        }
    };

    for (name, command) in manifest.commands.iter() {
        verify(
            format!("commands.canonical.{name}"),
            command.template.as_ref(),
            layout.command_path(name),
        );
    }
    for (name, agent) in manifest.agents.iter() {
        verify(
            format!("agents.canonical.{name}"),
            agent.template.as_ref(),
            layout.agent_path(name),
        );
    }
    for (name, skill) in manifest.skills.iter() {
        verify(
            format!("skills.canonical.{name}"),
            skill.template.as_ref(),
            layout.skill_path(name),
        );
    }
    for (name, workflow) in manifest.workflows.iter() {
        verify(
            format!("workflows.canonical.{name}"),
            workflow.template.as_ref(),
            layout.workflow_path(name),
        );
    }

    for (platform, entries) in manifest.system_files.iter() {
        for entry in entries {
            if !root.join(entry).exists() {
                violations.push(TemplateViolation::MissingSystemFile {
                    platform: platform.to_string(),
                    path: entry.clone(),
                });
            }
        }
    }

    debug!(root = %root.display(), count = violations.len(), "template references resolved");
    violations
}

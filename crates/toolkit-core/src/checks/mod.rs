//! Repository checks.
//!
//! Each check reads the repository through a [`Workspace`], never writes, and
//! produces a [`CheckOutcome`]. Expected bad content becomes issues in the
//! outcome; `Err` is reserved for files that cannot be read or parsed at all.

mod agent_routing;
mod budgets;
mod links;
mod manifest;
mod references;
mod scenarios;
mod skill_routing;
mod smoke;
mod surface;

pub use agent_routing::check_agent_routing;
pub use budgets::{check_agent_budget, check_skill_budget};
pub use links::check_markdown_links;
pub use manifest::check_manifest;
pub use references::check_command_references;
pub use scenarios::check_e2e_scenarios;
pub use skill_routing::check_skill_routing;
pub use smoke::check_smoke_pass_rate;
pub use surface::check_command_surface;

use crate::config::ToolkitConfig;
use crate::drift::DriftError;
use crate::frontmatter::FrontmatterError;
use crate::manifest::{load_manifest_value, Manifest, ManifestError};
use crate::render::RegistryDocument;
use crate::report::{CheckOutcome, Issue};
use crate::validate::parse_manifest;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("manifest is not well formed ({0} structural error(s)); run `toolkitctl validate`")]
    MalformedManifest(usize),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is not valid: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Drift(#[from] DriftError),
    #[error(transparent)]
    Frontmatter(#[from] FrontmatterError),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, CheckError>;

/// Repository root plus the configuration every check reads.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: ToolkitConfig,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, config: ToolkitConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    /// `path` relative to the root, for reports.
    pub fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    pub fn read(&self, rel: impl AsRef<Path>) -> Result<String> {
        let path = self.path(rel);
        fs::read_to_string(&path).map_err(|source| CheckError::Io { path, source })
    }

    pub fn read_json<T: DeserializeOwned>(&self, rel: impl AsRef<Path>) -> Result<T> {
        let path = self.path(rel);
        let text = fs::read_to_string(&path).map_err(|source| CheckError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| CheckError::Json { path, source })
    }

    /// The generated registry as written on disk.
    pub fn registry(&self) -> Result<RegistryDocument> {
        self.read_json(&self.config.registry_file)
    }

    /// The typed manifest. Referential problems are left to the manifest check.
    pub fn manifest(&self) -> Result<Manifest> {
        let value = load_manifest_value(&self.path(&self.config.manifest_file))?;
        parse_manifest(&value).map_err(|violations| CheckError::MalformedManifest(violations.len()))
    }

    /// Every `*.md` file under the root, sorted, skipping excluded directories.
    pub fn markdown_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        self.collect_markdown(&self.root, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn collect_markdown(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        let io_err = |source| CheckError::Io {
            path: dir.to_path_buf(),
            source,
        };
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let file_type = entry.file_type().map_err(io_err)?;
            let path = entry.path();
            if file_type.is_dir() {
                let name = entry.file_name();
                if self
                    .config
                    .scan_exclude
                    .iter()
                    .any(|excluded| name.to_str() == Some(excluded.as_str()))
                {
                    continue;
                }
                self.collect_markdown(&path, files)?;
            } else if path.extension().is_some_and(|ext| ext == "md") {
                files.push(path);
            }
        }
        Ok(())
    }

    /// Stems of the `*.md` files directly inside `rel`; `None` if it is not a directory.
    pub fn template_stems(&self, rel: &str) -> Result<Option<BTreeSet<String>>> {
        let dir = self.path(rel);
        if !dir.is_dir() {
            return Ok(None);
        }
        let io_err = |source| CheckError::Io {
            path: dir.clone(),
            source,
        };
        let mut stems = BTreeSet::new();
        for entry in fs::read_dir(&dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    stems.insert(stem.to_string());
                }
            }
        }
        Ok(Some(stems))
    }

    /// Matches `/<namespace> <command>` at the start of an invocation.
    pub fn invocation_pattern(&self) -> Result<Regex> {
        Ok(Regex::new(&format!(
            r"^/{}\s+([a-z][a-z-]*)\b",
            regex::escape(&self.config.command_namespace)
        ))?)
    }
}

/// Command named by an invocation such as `/crew init --fast`.
pub(crate) fn invoked_command(pattern: &Regex, invocation: &str) -> Option<String> {
    pattern
        .captures(invocation.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Names in `expected` but not `actual`, and the reverse.
pub(crate) fn set_difference<'a>(
    expected: &BTreeSet<&'a str>,
    actual: &BTreeSet<&'a str>,
) -> (Vec<&'a str>, Vec<&'a str>) {
    (
        expected.difference(actual).copied().collect(),
        actual.difference(expected).copied().collect(),
    )
}

/// Compare a canonical name set against a configured expectation.
///
/// An empty expectation is not checked.
pub(crate) fn expected_set_issue(
    kind: &str,
    expected: &[String],
    actual: &[String],
) -> Option<Issue> {
    if expected.is_empty() {
        return None;
    }
    let mut expected: Vec<&str> = expected.iter().map(String::as_str).collect();
    let mut actual: Vec<&str> = actual.iter().map(String::as_str).collect();
    expected.sort_unstable();
    actual.sort_unstable();
    (expected != actual).then(|| {
        Issue::new(
            crate::report::ErrorKind::ReferentialIntegrity,
            format!(
                "canonical {kind} set mismatch: expected [{}], got [{}]",
                expected.join(", "),
                actual.join(", ")
            ),
        )
    })
}

/// Per-case results folded into a pass-rate gate.
#[derive(Debug, Default)]
pub(crate) struct PassRateGate {
    results: Vec<(String, std::result::Result<(), String>)>,
}

impl PassRateGate {
    pub(crate) fn record(
        &mut self,
        id: impl Into<String>,
        result: std::result::Result<(), String>,
    ) {
        self.results.push((id.into(), result));
    }

    pub(crate) fn outcome(self, title: &str, minimum: f64) -> CheckOutcome {
        let total = self.results.len();
        let passed = self.results.iter().filter(|(_, r)| r.is_ok()).count();
        let rate = if total == 0 {
            0.0
        } else {
            passed as f64 / total as f64
        };
        let issues = self
            .results
            .into_iter()
            .filter_map(|(id, result)| result.err().map(|message| (id, message)))
            .map(|(id, message)| {
                Issue::new(crate::report::ErrorKind::Alignment, format!("{id}: {message}"))
            })
            .collect();
        let mut outcome = CheckOutcome::from_issues(title, issues).with_details([
            format!("Total scenarios: {total}"),
            format!("Passed: {passed}"),
            format!("Failed: {}", total - passed),
            format!("Pass rate: {:.2}%", rate * 100.0),
            format!("Required minimum: {:.2}%", minimum * 100.0),
        ]);
        outcome.passed = rate + 1e-9 >= minimum;
        outcome
    }
}

/// The harness checks, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckId {
    Manifest,
    CommandReferences,
    MarkdownLinks,
    CommandSurface,
    CommandSmoke,
    E2eScenarios,
    AgentBudget,
    AgentRouting,
    SkillBudget,
    SkillRouting,
}

impl CheckId {
    pub const ALL: [Self; 10] = [
        Self::Manifest,
        Self::CommandReferences,
        Self::MarkdownLinks,
        Self::CommandSurface,
        Self::CommandSmoke,
        Self::E2eScenarios,
        Self::AgentBudget,
        Self::AgentRouting,
        Self::SkillBudget,
        Self::SkillRouting,
    ];

    /// Harness display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Manifest => "Manifest sync and asset integrity",
            Self::CommandReferences => "Command references",
            Self::MarkdownLinks => "Markdown links",
            Self::CommandSurface => "Command surface contracts",
            Self::CommandSmoke => "Command smoke pass-rate gate",
            Self::E2eScenarios => "Representative E2E scenarios",
            Self::AgentBudget => "Agent prompt budgets",
            Self::AgentRouting => "Agent routing regressions",
            Self::SkillBudget => "Skill prompt budgets",
            Self::SkillRouting => "Skill routing coverage",
        }
    }

    /// CLI subcommand name.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Manifest => "validate",
            Self::CommandReferences => "command-refs",
            Self::MarkdownLinks => "links",
            Self::CommandSurface => "command-surface",
            Self::CommandSmoke => "smoke",
            Self::E2eScenarios => "e2e",
            Self::AgentBudget => "agent-budget",
            Self::AgentRouting => "agent-routing",
            Self::SkillBudget => "skill-budget",
            Self::SkillRouting => "skill-routing",
        }
    }

    pub fn run(&self, workspace: &Workspace) -> Result<CheckOutcome> {
        match self {
            Self::Manifest => check_manifest(workspace),
            Self::CommandReferences => check_command_references(workspace),
            Self::MarkdownLinks => check_markdown_links(workspace),
            Self::CommandSurface => check_command_surface(workspace),
            Self::CommandSmoke => check_smoke_pass_rate(workspace),
            Self::E2eScenarios => check_e2e_scenarios(workspace),
            Self::AgentBudget => check_agent_budget(workspace),
            Self::AgentRouting => check_agent_routing(workspace),
            Self::SkillBudget => check_skill_budget(workspace),
            Self::SkillRouting => check_skill_routing(workspace),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixture;

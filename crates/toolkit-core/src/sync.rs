//! Regenerate artifacts from the manifest.
//!
//! This is the only module that writes generated files. A manifest that
//! fails validation or template resolution is never rendered.

use crate::config::ToolkitConfig;
use crate::manifest::{load_manifest_value, ManifestCounts, ManifestError};
use crate::render::{apply_doc_blocks, apply_install_block, render_registry_json, MarkerError};
use crate::report::Issue;
use crate::templates::resolve_templates;
use crate::validate::validate_manifest;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("manifest has {} validation error(s)", .0.len())]
    Invalid(Vec<Issue>),
    #[error("failed to access {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("{path}: {source}")]
    Marker { path: PathBuf, source: MarkerError },
    #[error("failed to render registry: {0}")]
    Render(#[from] serde_json::Error),
}

/// What a sync run touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub counts: ManifestCounts,
    /// Artifacts whose content changed, relative to the repository root.
    pub written: Vec<PathBuf>,
    /// Artifacts already up to date.
    pub unchanged: Vec<PathBuf>,
}

impl SyncSummary {
    pub fn render(&self, config: &ToolkitConfig) -> String {
        let mut lines = vec![
            format!("Synced from {}:", config.manifest_file.display()),
            format!("- Runtime registry: {}", config.registry_file.display()),
            format!("- Installer package lists: {}", config.install_script.display()),
            format!("- README generated blocks: {}", config.readme_file.display()),
            format!(
                "- Counts: skills={}, agents={}, commands={}, workflows={}",
                self.counts.skills, self.counts.agents, self.counts.commands, self.counts.workflows
            ),
        ];
        if self.written.is_empty() {
            lines.push("- No changes".to_string());
        } else {
            lines.extend(
                self.written
                    .iter()
                    .map(|path| format!("- Updated: {}", path.display())),
            );
        }
        lines.join("\n")
    }
}

fn read(path: &Path) -> Result<String, SyncError> {
    fs::read_to_string(path).map_err(|source| SyncError::Io {
        path: path.to_path_buf(),
        source,
    })
}

struct Writer<'a> {
    root: &'a Path,
    summary: SyncSummary,
}

impl Writer<'_> {
    /// Write `content` to `rel` unless it is already identical.
    fn put(&mut self, rel: &Path, current: Option<&str>, content: &str) -> Result<(), SyncError> {
        if current == Some(content) {
            self.summary.unchanged.push(rel.to_path_buf());
            return Ok(());
        }
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SyncError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, content).map_err(|source| SyncError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %rel.display(), "generated artifact updated");
        self.summary.written.push(rel.to_path_buf());
        Ok(())
    }
}

/// Validate the manifest, then rewrite the registry and every marker block.
///
/// The installer script and README must already exist and carry their
/// markers; the registry file is created when absent.
pub fn sync_artifacts(root: &Path, config: &ToolkitConfig) -> Result<SyncSummary, SyncError> {
    let value = load_manifest_value(&root.join(&config.manifest_file))?;
    let validation = validate_manifest(&value, &config.manifest_rules());
    let mut issues: Vec<Issue> = validation.violations.iter().map(Issue::from).collect();
    let Some(manifest) = validation.manifest else {
        return Err(SyncError::Invalid(issues));
    };
    issues.extend(
        resolve_templates(root, &manifest, &config.template_layout())
            .iter()
            .map(Issue::from),
    );
    if !issues.is_empty() {
        return Err(SyncError::Invalid(issues));
    }

    let options = config.render_options();

    // Render everything before touching disk so a marker failure writes nothing.
    let registry_path = root.join(&config.registry_file);
    let registry_current = match fs::read_to_string(&registry_path) {
        Ok(text) => Some(text),
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(source) => {
            return Err(SyncError::Io {
                path: registry_path,
                source,
            })
        }
    };
    let registry = render_registry_json(&manifest)?;

    let install_current = read(&root.join(&config.install_script))?;
    let install = apply_install_block(&install_current, &manifest, &options).map_err(|source| {
        SyncError::Marker {
            path: config.install_script.clone(),
            source,
        }
    })?;

    let readme_current = read(&root.join(&config.readme_file))?;
    let readme = apply_doc_blocks(&readme_current, &manifest, &options).map_err(|source| {
        SyncError::Marker {
            path: config.readme_file.clone(),
            source,
        }
    })?;

    let mut writer = Writer {
        root,
        summary: SyncSummary {
            counts: manifest.counts(),
            written: Vec::new(),
            unchanged: Vec::new(),
        },
    };
    writer.put(&config.registry_file, registry_current.as_deref(), &registry)?;
    writer.put(&config.install_script, Some(&install_current), &install)?;
    writer.put(&config.readme_file, Some(&readme_current), &readme)?;

    debug!(written = writer.summary.written.len(), "sync finished");
    Ok(writer.summary)
}

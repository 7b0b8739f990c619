//! Drift detection for generated artifacts.
//!
//! Re-renders every artifact from the manifest and compares it with what is
//! on disk, using the same marker extraction as the write path. Nothing here
//! writes; regeneration lives in [`crate::sync`].

use crate::config::ToolkitConfig;
use crate::manifest::Manifest;
use crate::render::{
    extract_block, render_doc_blocks, render_install_block, render_registry_json, BlockMarkers,
    MarkerError,
};
use crate::report::{ErrorKind, Finding};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DriftError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to render registry: {0}")]
    Render(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriftViolation {
    #[error("manifest schema file missing: {0}")]
    SchemaFileMissing(String),
    #[error("{artifact} missing: {path}")]
    ArtifactMissing { artifact: &'static str, path: String },
    #[error("{path}: {source}")]
    MarkerMissing { path: String, source: MarkerError },
    #[error(
        "{artifact} is out of sync with {manifest} (expected sha256:{expected_digest}, found sha256:{actual_digest})"
    )]
    OutOfSync {
        artifact: String,
        manifest: String,
        expected_digest: String,
        actual_digest: String,
    },
}

impl Finding for DriftViolation {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::SchemaFileMissing(_) | Self::ArtifactMissing { .. } => ErrorKind::Filesystem,
            Self::MarkerMissing { .. } | Self::OutOfSync { .. } => ErrorKind::Drift,
        }
    }
}

/// First 12 hex digits of the SHA-256 of `text`.
pub fn short_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let mut digest = format!("{:x}", hasher.finalize());
    digest.truncate(12);
    digest
}

/// Read a file, treating absence as `None`.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>, DriftError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(DriftError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

struct Comparison<'a> {
    manifest: String,
    violations: &'a mut Vec<DriftViolation>,
}

impl Comparison<'_> {
    fn compare(&mut self, artifact: String, expected: &str, actual: &str) {
        if expected != actual {
            self.violations.push(DriftViolation::OutOfSync {
                artifact,
                manifest: self.manifest.clone(),
                expected_digest: short_digest(expected),
                actual_digest: short_digest(actual),
            });
        }
    }

    fn compare_block(
        &mut self,
        artifact: String,
        path: &str,
        text: &str,
        markers: &BlockMarkers,
        expected: &str,
    ) {
        match extract_block(text, markers) {
            Ok(actual) => self.compare(artifact, expected, actual),
            Err(source) => self.violations.push(DriftViolation::MarkerMissing {
                path: path.to_string(),
                source,
            }),
        }
    }
}

/// Compare every generated artifact under `root` with a fresh rendering.
pub fn detect_drift(
    root: &Path,
    manifest: &Manifest,
    config: &ToolkitConfig,
) -> Result<Vec<DriftViolation>, DriftError> {
    let options = config.render_options();
    let mut violations = Vec::new();

    if !root.join(&config.schema_file).exists() {
        violations.push(DriftViolation::SchemaFileMissing(
            config.schema_file.display().to_string(),
        ));
    }

    let mut comparison = Comparison {
        manifest: config.manifest_file.display().to_string(),
        violations: &mut violations,
    };

    let registry_path = config.registry_file.display().to_string();
    match read_optional(&root.join(&config.registry_file))? {
        None => comparison.violations.push(DriftViolation::ArtifactMissing {
            artifact: "generated registry",
            path: registry_path,
        }),
        Some(actual) => {
            let expected = render_registry_json(manifest)?;
            comparison.compare(registry_path, &expected, &actual);
        }
    }

    let install_path = config.install_script.display().to_string();
    match read_optional(&root.join(&config.install_script))? {
        None => comparison.violations.push(DriftViolation::ArtifactMissing {
            artifact: "install script",
            path: install_path,
        }),
        Some(text) => comparison.compare_block(
            format!("{install_path} generated package block"),
            &install_path,
            &text,
            &options.markers.install,
            &render_install_block(manifest, &options),
        ),
    }

    let readme_path = config.readme_file.display().to_string();
    match read_optional(&root.join(&config.readme_file))? {
        None => comparison.violations.push(DriftViolation::ArtifactMissing {
            artifact: "README file",
            path: readme_path,
        }),
        Some(text) => {
            for (block, expected) in render_doc_blocks(manifest, &options) {
                comparison.compare_block(
                    format!("{readme_path} {}", block.label()),
                    &readme_path,
                    &text,
                    options.markers.doc(block),
                    &expected,
                );
            }
        }
    }

    debug!(root = %root.display(), count = violations.len(), "drift detection finished");
    Ok(violations)
}

use super::{Result, Workspace};
use crate::drift::detect_drift;
use crate::manifest::load_manifest_value;
use crate::report::{CheckOutcome, Issue};
use crate::templates::resolve_templates;
use crate::validate::validate_manifest;

/// Manifest structure, template references and generated-artifact drift.
pub fn check_manifest(workspace: &Workspace) -> Result<CheckOutcome> {
    let config = &workspace.config;
    let value = load_manifest_value(&workspace.path(&config.manifest_file))?;
    let validation = validate_manifest(&value, &config.manifest_rules());
    let mut issues: Vec<Issue> = validation.violations.iter().map(Issue::from).collect();

    let mut counts = None;
    if let Some(manifest) = &validation.manifest {
        issues.extend(
            resolve_templates(&workspace.root, manifest, &config.template_layout())
                .iter()
                .map(Issue::from),
        );
        issues.extend(
            detect_drift(&workspace.root, manifest, config)?
                .iter()
                .map(Issue::from),
        );
        counts = Some(manifest.counts());
    }

    let mut outcome = CheckOutcome::from_issues("Toolkit manifest validation", issues)
        .with_hint("run `toolkitctl sync` after manifest edits.");
    if let (true, Some(counts)) = (outcome.passed, counts) {
        outcome = outcome.with_detail(format!(
            "Validated assets: skills={}, agents={}, commands={}, workflows={}",
            counts.skills, counts.agents, counts.commands, counts.workflows
        ));
    }
    Ok(outcome)
}

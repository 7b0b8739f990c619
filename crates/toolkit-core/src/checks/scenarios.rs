use super::{invoked_command, PassRateGate, Result, Workspace};
use crate::manifest::Manifest;
use crate::report::{CheckOutcome, ErrorKind, Issue};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    minimum_pass_rate: Option<f64>,
    #[serde(default)]
    scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, Deserialize)]
struct Scenario {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    invocation: String,
    #[serde(default)]
    expected_command: Option<String>,
    #[serde(default)]
    expected_owner: Option<String>,
    #[serde(default)]
    expected_primary_skill: Option<String>,
    #[serde(default)]
    required_optional_skills: Vec<String>,
    /// Legacy routing mode. Rejected when present.
    #[serde(default)]
    mode: Option<Value>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

fn template_exists(root: &Path, template: Option<&String>) -> bool {
    template.is_some_and(|rel| root.join(rel).exists())
}

/// Resolve one scenario end to end: command, owner, skills, templates.
fn run_scenario(
    scenario: &Scenario,
    manifest: &Manifest,
    pattern: &Regex,
    root: &Path,
) -> std::result::Result<(), String> {
    let Some(command) = invoked_command(pattern, &scenario.invocation) else {
        return Err("invalid invocation".to_string());
    };
    let Some(entry) = manifest.commands.get(&command) else {
        return Err(format!("expected canonical command, got `{command}`"));
    };
    if let Some(expected) = non_empty(scenario.expected_command.as_ref()) {
        if expected != command {
            return Err(format!("resolved `{command}` != expected `{expected}`"));
        }
    }
    if let Some(expected) = non_empty(scenario.expected_owner.as_ref()) {
        if expected != entry.owner {
            return Err(format!("owner `{}` != expected `{expected}`", entry.owner));
        }
    }

    let Some(policy) = manifest.command_policy.get(&command) else {
        return Err(format!("no command policy for `{command}`"));
    };
    if let Some(expected) = non_empty(scenario.expected_primary_skill.as_ref()) {
        if expected != policy.primary {
            return Err(format!(
                "primary skill `{}` != expected `{expected}`",
                policy.primary
            ));
        }
    }
    let missing: Vec<&str> = scenario
        .required_optional_skills
        .iter()
        .filter(|skill| !policy.optional.contains(*skill))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing optional skills: {}", missing.join(", ")));
    }

    if !template_exists(root, entry.template.as_ref()) {
        return Err(format!("missing command template for `{command}`"));
    }
    let owner_template = manifest.agents.get(&entry.owner).and_then(|a| a.template.as_ref());
    if !template_exists(root, owner_template) {
        return Err(format!("missing owner agent template for `{}`", entry.owner));
    }
    let skill_template = manifest
        .skills
        .get(&policy.primary)
        .and_then(|s| s.template.as_ref());
    if !template_exists(root, skill_template) {
        return Err(format!("missing primary skill template for `{}`", policy.primary));
    }
    Ok(())
}

/// Representative invocations resolved against the manifest, gated on pass rate.
pub fn check_e2e_scenarios(workspace: &Workspace) -> Result<CheckOutcome> {
    let config = &workspace.config;
    let title = "Representative E2E scenario gate";
    let manifest = workspace.manifest()?;
    let file: ScenarioFile = workspace.read_json(config.e2e_scenarios())?;
    if file.scenarios.is_empty() {
        return Ok(CheckOutcome::from_issues(
            title,
            vec![Issue::new(
                ErrorKind::Structural,
                "`scenarios` must be a non-empty array",
            )],
        ));
    }

    let pattern = workspace.invocation_pattern()?;
    let mut gate = PassRateGate::default();
    for scenario in &file.scenarios {
        let id = non_empty(scenario.id.as_ref()).unwrap_or("unknown");
        let result = if scenario.mode.is_some() {
            Err("`mode` is not supported; scenarios must be canonical-only".to_string())
        } else {
            run_scenario(scenario, &manifest, &pattern, &workspace.root)
        };
        gate.record(id, result);
    }

    let minimum = file.minimum_pass_rate.unwrap_or(config.min_pass_rate);
    Ok(gate.outcome(title, minimum))
}

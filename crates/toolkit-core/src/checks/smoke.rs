use super::{invoked_command, PassRateGate, Result, Workspace};
use crate::render::RegistryDocument;
use crate::report::CheckOutcome;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;

/// Contents of the command smoke-case file.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SmokeCases {
    #[serde(default)]
    pub minimum_pass_rate: Option<f64>,
    #[serde(default)]
    pub canonical_cases: Vec<SmokeCase>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SmokeCase {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub invocation: String,
    #[serde(default)]
    pub expected_command: Option<String>,
    #[serde(default)]
    pub expected_owner: Option<String>,
}

impl SmokeCase {
    pub(crate) fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub(crate) fn expected_command(&self) -> Option<&str> {
        self.expected_command.as_deref().filter(|c| !c.is_empty())
    }

    pub(crate) fn expected_owner(&self) -> Option<&str> {
        self.expected_owner.as_deref().filter(|o| !o.is_empty())
    }
}

/// Shared evaluation of one smoke case against the registry.
pub(crate) struct SmokeEvaluator<'a> {
    pub registry: &'a RegistryDocument,
    pub pattern: Regex,
    pub templates: BTreeSet<String>,
}

impl SmokeEvaluator<'_> {
    /// The invoked command when the case holds, otherwise why it does not.
    pub(crate) fn evaluate(&self, case: &SmokeCase) -> std::result::Result<String, String> {
        let Some(invoked) = invoked_command(&self.pattern, &case.invocation) else {
            return Err(format!("invalid invocation: {:?}", case.invocation));
        };
        let Some(entry) = self.registry.commands.canonical.get(&invoked) else {
            return Err(format!("expected canonical invocation, got `{invoked}`"));
        };
        if let Some(expected) = case.expected_command() {
            if expected != invoked {
                return Err(format!("invoked command `{invoked}` != expected `{expected}`"));
            }
        }
        if let Some(expected) = case.expected_owner() {
            if expected != entry.owner {
                return Err(format!("owner `{}` != expected `{expected}`", entry.owner));
            }
        }
        if !self.templates.contains(&invoked) {
            return Err(format!("missing template `{invoked}.md`"));
        }
        Ok(invoked)
    }
}

/// Evaluate every smoke case and gate on the pass rate.
pub fn check_smoke_pass_rate(workspace: &Workspace) -> Result<CheckOutcome> {
    let config = &workspace.config;
    let registry = workspace.registry()?;
    let cases: SmokeCases = workspace.read_json(config.command_smoke_cases())?;
    let evaluator = SmokeEvaluator {
        registry: &registry,
        pattern: workspace.invocation_pattern()?,
        templates: workspace
            .template_stems(&config.template_layout().commands_dir())?
            .unwrap_or_default(),
    };

    let mut gate = PassRateGate::default();
    for case in &cases.canonical_cases {
        let id = case.id().unwrap_or("canonical.unknown");
        let result = match case.id() {
            None => Err("case missing `id`".to_string()),
            Some(_) => evaluator.evaluate(case).map(|_| ()),
        };
        gate.record(id, result);
    }

    let minimum = cases.minimum_pass_rate.unwrap_or(config.min_pass_rate);
    Ok(gate.outcome("Command smoke pass-rate gate", minimum))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::fixture::{repository, write};
    use serde_json::json;

    #[test]
    fn fixture_cases_pass() {
        let (_dir, ws) = repository();
        let outcome = check_smoke_pass_rate(&ws).unwrap();
        assert!(outcome.passed, "{}", outcome.render());
        assert!(outcome.render().contains("Pass rate: 100.00%"));
    }

    #[test]
    fn failures_below_threshold_fail_the_gate() {
        let (dir, ws) = repository();
        write(
            dir.path(),
            "toolkit/cases/command-smoke.json",
            &json!({
                "canonical_cases": [
                    {"id": "ok", "invocation": "/crew init"},
                    {"id": "owner", "invocation": "/crew inspect", "expected_owner": "builder"},
                    {"id": "legacy", "invocation": "/crew deploy"},
                    {"invocation": "/crew init"}
                ]
            })
            .to_string(),
        );
        let outcome = check_smoke_pass_rate(&ws).unwrap();
        assert!(!outcome.passed);
        let messages: Vec<&str> = outcome.issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "owner: owner `auditor` != expected `builder`",
                "legacy: expected canonical invocation, got `deploy`",
                "canonical.unknown: case missing `id`",
            ]
        );
        assert!(outcome.render().contains("Pass rate: 25.00%"));
    }

    #[test]
    fn file_threshold_overrides_config() {
        let (dir, ws) = repository();
        write(
            dir.path(),
            "toolkit/cases/command-smoke.json",
            &json!({
                "minimum_pass_rate": 0.5,
                "canonical_cases": [
                    {"id": "ok", "invocation": "/crew init"},
                    {"id": "bad", "invocation": "crew init"}
                ]
            })
            .to_string(),
        );
        let outcome = check_smoke_pass_rate(&ws).unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.issues.len(), 1);
    }
}

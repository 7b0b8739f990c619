use super::{Result, Workspace};
use crate::report::{CheckOutcome, ErrorKind, Issue};
use crate::routing::{
    check_case_expectations, check_orchestrator_agents, evaluate_cases, RoutingCases,
};

/// Text of each configured orchestrator file, or an issue for the missing ones.
pub(super) fn orchestrator_texts(
    workspace: &Workspace,
    issues: &mut Vec<Issue>,
) -> Result<Vec<(String, String)>> {
    let mut texts = Vec::new();
    for rel in &workspace.config.orchestrator_files {
        let display = rel.display().to_string();
        if !workspace.path(rel).is_file() {
            issues.push(Issue::new(
                ErrorKind::Filesystem,
                format!("missing orchestrator file: {display}"),
            ));
            continue;
        }
        texts.push((display, workspace.read(rel)?));
    }
    Ok(texts)
}

/// Keyword routing regressions plus command ownership recorded in the cases file.
pub fn check_agent_routing(workspace: &Workspace) -> Result<CheckOutcome> {
    let registry = workspace.registry()?;
    let cases: RoutingCases = workspace.read_json(workspace.config.agent_routing_cases())?;

    let mut issues = Vec::new();
    if cases.cases.is_empty() {
        issues.push(Issue::new(ErrorKind::Structural, "routing cases file has no `cases`"));
    }
    let findings = check_case_expectations(&cases, &registry)
        .into_iter()
        .chain(evaluate_cases(&cases));
    issues.extend(findings.map(|v| Issue::from(&v)));
    for (file, text) in orchestrator_texts(workspace, &mut issues)? {
        issues.extend(
            check_orchestrator_agents(&cases, &file, &text)
                .iter()
                .map(Issue::from),
        );
    }

    let mut outcome = CheckOutcome::from_issues("Agent routing regression", issues);
    if outcome.passed {
        outcome = outcome.with_details([
            format!("Validated routing cases: {}", cases.cases.len()),
            format!(
                "Validated command ownership checks: {}",
                cases.command_expectations.len()
            ),
        ]);
    }
    Ok(outcome)
}

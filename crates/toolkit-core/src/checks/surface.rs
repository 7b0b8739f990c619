use super::smoke::{SmokeCases, SmokeEvaluator};
use super::{expected_set_issue, set_difference, Result, Workspace};
use crate::frontmatter::parse_document;
use crate::render::RegistryDocument;
use crate::report::{CheckOutcome, ErrorKind, Issue};
use std::collections::BTreeSet;

const CONTRACT_TOKENS: [&str; 4] = [
    "1. `findings`",
    "2. `plan`",
    "3. `proposed changes`",
    "4. `validation steps`",
];

fn template_issues(
    workspace: &Workspace,
    registry: &RegistryDocument,
    issues: &mut Vec<Issue>,
) -> Result<()> {
    let config = &workspace.config;
    let layout = config.template_layout();
    let ns = &config.command_namespace;
    let commands_dir = layout.commands_dir();
    let Some(existing) = workspace.template_stems(&commands_dir)? else {
        issues.push(Issue::new(
            ErrorKind::Filesystem,
            format!("command template directory missing: {commands_dir}"),
        ));
        return Ok(());
    };

    let canonical = registry.commands.canonical.name_set();
    let existing_names: BTreeSet<&str> = existing.iter().map(String::as_str).collect();
    let (missing, unexpected) = set_difference(&canonical, &existing_names);
    if !missing.is_empty() {
        issues.push(Issue::new(
            ErrorKind::Filesystem,
            format!("missing command templates: {}", missing.join(", ")),
        ));
    }
    if !unexpected.is_empty() {
        issues.push(Issue::new(
            ErrorKind::Alignment,
            format!("unexpected command templates: {}", unexpected.join(", ")),
        ));
    }

    for name in registry.commands.canonical.names() {
        if !existing.contains(name) {
            continue;
        }
        let rel = layout.command_path(name);
        let text = workspace.read(&rel)?;
        let mut problem = |message: String| {
            issues.push(Issue::new(ErrorKind::Structural, format!("{rel} {message}")));
        };
        let doc = match parse_document(&text) {
            Ok(doc) => doc,
            Err(err) => {
                problem(format!("has invalid front matter: {err}"));
                continue;
            }
        };

        if !doc
            .frontmatter
            .scalar("canonical")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            problem("missing `canonical: true`".to_string());
        }
        let expected_id = format!("{ns}.{name}.v1");
        let actual_id = doc.frontmatter.scalar("command_id").unwrap_or_default();
        if actual_id != expected_id {
            problem(format!(
                "command_id mismatch: expected `{expected_id}`, got `{actual_id}`"
            ));
        }
        let heading = format!("# /{ns} {name}");
        if !doc.body.contains(&heading) {
            problem(format!("missing canonical heading `{heading}`"));
        }
        for section in ["## Syntax", "## Response Contract (Required)"] {
            if !doc.body.contains(section) {
                problem(format!("missing `{section}` section"));
            }
        }
        for token in CONTRACT_TOKENS {
            if !doc.body.contains(token) {
                problem(format!("missing response contract token `{token}`"));
            }
        }
    }
    Ok(())
}

fn smoke_case_issues(
    workspace: &Workspace,
    registry: &RegistryDocument,
    cases: &SmokeCases,
    issues: &mut Vec<Issue>,
) -> Result<()> {
    let config = &workspace.config;
    if cases.canonical_cases.is_empty() {
        issues.push(Issue::new(
            ErrorKind::Structural,
            "smoke case file missing non-empty `canonical_cases` list",
        ));
    }

    let evaluator = SmokeEvaluator {
        registry,
        pattern: workspace.invocation_pattern()?,
        templates: workspace
            .template_stems(&config.template_layout().commands_dir())?
            .unwrap_or_default(),
    };
    let mut seen = BTreeSet::new();
    let mut covered = BTreeSet::new();
    for case in &cases.canonical_cases {
        let Some(id) = case.id() else {
            issues.push(Issue::new(ErrorKind::Structural, "canonical smoke case missing `id`"));
            continue;
        };
        if !seen.insert(id) {
            issues.push(Issue::new(
                ErrorKind::Structural,
                format!("duplicate smoke case id: {id}"),
            ));
            continue;
        }
        match evaluator.evaluate(case) {
            Ok(command) => {
                covered.insert(command);
            }
            Err(reason) => issues.push(Issue::new(
                ErrorKind::ReferentialIntegrity,
                format!("smoke case `{id}`: {reason}"),
            )),
        }
    }

    let uncovered: Vec<&str> = registry
        .commands
        .canonical
        .names()
        .filter(|name| !covered.contains(*name))
        .collect();
    if !uncovered.is_empty() {
        issues.push(Issue::new(
            ErrorKind::Alignment,
            format!(
                "canonical commands not covered by smoke cases: {}",
                uncovered.join(", ")
            ),
        ));
    }
    Ok(())
}

/// Command set, template front matter and body contract, and smoke-case shape.
pub fn check_command_surface(workspace: &Workspace) -> Result<CheckOutcome> {
    let config = &workspace.config;
    let registry = workspace.registry()?;
    let cases: SmokeCases = workspace.read_json(config.command_smoke_cases())?;
    let mut issues = Vec::new();

    issues.extend(expected_set_issue(
        "command",
        &config.expected_commands,
        &registry.commands.canonical.name_list(),
    ));
    let agents = registry.agents.canonical.name_set();
    for (command, entry) in registry.commands.canonical.iter() {
        if !agents.contains(entry.owner.as_str()) {
            issues.push(Issue::new(
                ErrorKind::ReferentialIntegrity,
                format!("canonical command `{command}` has unknown owner `{}`", entry.owner),
            ));
        }
    }

    template_issues(workspace, &registry, &mut issues)?;
    smoke_case_issues(workspace, &registry, &cases, &mut issues)?;

    let mut outcome = CheckOutcome::from_issues("Command surface validation", issues);
    if outcome.passed {
        outcome = outcome.with_details([
            format!("Validated canonical commands: {}", registry.commands.canonical.len()),
            format!("Validated smoke cases: {}", cases.canonical_cases.len()),
        ]);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::fixture::{repository, write};
    use crate::config::ToolkitConfig;
    use serde_json::json;

    #[test]
    fn fixture_surface_passes() {
        let (_dir, ws) = repository();
        let outcome = check_command_surface(&ws).unwrap();
        assert!(outcome.passed, "{}", outcome.render());
    }

    #[test]
    fn template_contract_violations() {
        let (dir, ws) = repository();
        write(
            dir.path(),
            "templates/shared/commands/crew/inspect.md",
            "---\ncommand_id: crew.inspect.v2\n---\n# /crew inspect\n\n## Syntax\n\n1. `findings`\n2. `plan`\n",
        );
        write(dir.path(), "templates/shared/commands/crew/deploy.md", "# deploy\n");

        let outcome = check_command_surface(&ws).unwrap();
        let messages: Vec<String> = outcome.issues.iter().map(|i| i.message.clone()).collect();
        let path = "templates/shared/commands/crew/inspect.md";
        assert_eq!(
            messages,
            vec![
                "unexpected command templates: deploy".to_string(),
                format!("{path} missing `canonical: true`"),
                format!("{path} command_id mismatch: expected `crew.inspect.v1`, got `crew.inspect.v2`"),
                format!("{path} missing `## Response Contract (Required)` section"),
                format!("{path} missing response contract token `3. `proposed changes``"),
                format!("{path} missing response contract token `4. `validation steps``"),
            ]
        );
    }

    #[test]
    fn expected_command_set_is_enforced_when_configured() {
        let (dir, _) = repository();
        let config = ToolkitConfig {
            expected_commands: vec!["init".into(), "inspect".into(), "fix".into()],
            ..ToolkitConfig::default()
        };
        let ws = Workspace::new(dir.path(), config);
        let outcome = check_command_surface(&ws).unwrap();
        assert_eq!(
            outcome.issues[0].message,
            "canonical command set mismatch: expected [fix, init, inspect], got [init, inspect]"
        );
    }

    #[test]
    fn smoke_file_shape_problems() {
        let (dir, ws) = repository();
        write(
            dir.path(),
            "toolkit/cases/command-smoke.json",
            &json!({
                "canonical_cases": [
                    {"id": "a", "invocation": "/crew init"},
                    {"id": "a", "invocation": "/crew inspect"},
                    {"id": "b", "invocation": "hello"}
                ]
            })
            .to_string(),
        );
        let outcome = check_command_surface(&ws).unwrap();
        let messages: Vec<&str> = outcome.issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "duplicate smoke case id: a",
                "smoke case `b`: invalid invocation: \"hello\"",
                "canonical commands not covered by smoke cases: inspect",
            ]
        );
    }
}

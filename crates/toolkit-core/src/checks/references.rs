use super::{Result, Workspace};
use crate::report::{CheckOutcome, ErrorKind, Issue};
use regex::Regex;
use std::collections::BTreeSet;
use tracing::debug;

/// Every `/<namespace> <name>` reference in docs and runtime assets must name
/// an existing command template.
pub fn check_command_references(workspace: &Workspace) -> Result<CheckOutcome> {
    let config = &workspace.config;
    let title = "Command reference validation";
    let commands_dir = config.template_layout().commands_dir();
    let Some(valid) = workspace.template_stems(&commands_dir)? else {
        return Ok(CheckOutcome::from_issues(
            title,
            vec![Issue::new(
                ErrorKind::Filesystem,
                format!("command directory not found: {commands_dir}"),
            )],
        ));
    };

    let mut files: BTreeSet<_> = workspace.markdown_files()?.into_iter().collect();
    for extra in [&config.install_script, &config.registry_file] {
        let path = workspace.path(extra);
        if path.is_file() {
            files.insert(path);
        }
    }

    let pattern = Regex::new(&format!(
        r"/{}\s+([a-z][a-z-]*)",
        regex::escape(&config.command_namespace)
    ))?;

    let mut issues = Vec::new();
    for file in &files {
        let text = workspace.read(file)?;
        for (number, line) in text.lines().enumerate() {
            for caps in pattern.captures_iter(line) {
                let name = &caps[1];
                if !valid.contains(name) {
                    issues.push(Issue::new(
                        ErrorKind::ReferentialIntegrity,
                        format!(
                            "{}:{}: /{} {name}\n  {}",
                            workspace.display(file),
                            number + 1,
                            config.command_namespace,
                            line.trim()
                        ),
                    ));
                }
            }
        }
    }
    debug!(files = files.len(), invalid = issues.len(), "command references scanned");

    let valid_list = valid.iter().cloned().collect::<Vec<_>>().join(", ");
    let mut outcome = CheckOutcome::from_issues(title, issues);
    if outcome.passed {
        outcome = outcome.with_detail(format!("Validated files: {}", files.len()));
    }
    Ok(outcome.with_detail(format!("Valid commands: {valid_list}")))
}

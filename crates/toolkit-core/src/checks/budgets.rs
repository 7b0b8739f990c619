//! Prompt-size budgets and canonical template sets for agents and skills.

use super::{expected_set_issue, CheckError, Result, Workspace};
use crate::frontmatter::parse_document;
use crate::report::{CheckOutcome, ErrorKind, Issue};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;

fn line_count(text: &str) -> usize {
    text.lines().count()
}

fn total_budget_issue(kind: &str, total: usize, budget: usize) -> Option<Issue> {
    (total > budget).then(|| {
        Issue::new(
            ErrorKind::Structural,
            format!("total {kind} prompt budget exceeded: {total} > {budget} lines"),
        )
    })
}

/// Canonical agent prompts stay within budget and carry the required tags.
pub fn check_agent_budget(workspace: &Workspace) -> Result<CheckOutcome> {
    let config = &workspace.config;
    let layout = config.template_layout();
    let registry = workspace.registry()?;
    let mut agents = registry.agents.canonical.name_list();
    agents.sort();

    let mut issues = Vec::new();
    issues.extend(expected_set_issue("agent", &config.expected_agents, &agents));

    let mut total = 0;
    for name in &agents {
        let rel = layout.agent_path(name);
        if !workspace.path(&rel).is_file() {
            issues.push(Issue::new(
                ErrorKind::Filesystem,
                format!("missing canonical agent file: {rel}"),
            ));
            continue;
        }
        let text = workspace.read(&rel)?;
        let lines = line_count(&text);
        total += lines;
        if lines > config.agent_max_lines {
            issues.push(Issue::new(
                ErrorKind::Structural,
                format!("canonical agent prompt too large ({lines} lines): {rel}"),
            ));
        }
        for tag in &config.agent_required_tags {
            if !text.contains(tag.as_str()) {
                issues.push(Issue::new(
                    ErrorKind::Structural,
                    format!("canonical agent missing {tag}: {rel}"),
                ));
            }
        }
    }
    issues.extend(total_budget_issue("agent", total, config.agent_total_lines));

    let existing = workspace
        .template_stems(&layout.agents_dir())?
        .unwrap_or_default();
    let unexpected: Vec<&str> = existing
        .iter()
        .map(String::as_str)
        .filter(|stem| !agents.iter().any(|a| a.as_str() == *stem))
        .collect();
    if !unexpected.is_empty() {
        issues.push(Issue::new(
            ErrorKind::Alignment,
            format!(
                "unexpected non-canonical agent templates present: {}",
                unexpected.join(", ")
            ),
        ));
    }

    let mut outcome = CheckOutcome::from_issues("Agent consolidation validation", issues);
    if outcome.passed {
        outcome = outcome.with_details([
            format!("Canonical agents: {}", agents.len()),
            format!("Canonical prompt lines: {total}"),
        ]);
    }
    Ok(outcome)
}

/// Values of a `NAME=( "a" "b" )` shell array; empty when the array is absent.
fn shell_array(script: &str, name: &str) -> Result<Vec<String>> {
    let array = Regex::new(&format!(r"(?s){}=\((.*?)\)", regex::escape(name)))?;
    let item = Regex::new(r#""([^"]+)""#)?;
    Ok(array
        .captures(script)
        .and_then(|caps| caps.get(1))
        .map(|body| {
            item.captures_iter(body.as_str())
                .map(|c| c[1].to_string())
                .collect()
        })
        .unwrap_or_default())
}

/// Canonical skill packs stay within budget, name themselves, and are all
/// listed by the installer.
pub fn check_skill_budget(workspace: &Workspace) -> Result<CheckOutcome> {
    let config = &workspace.config;
    let layout = config.template_layout();
    let registry = workspace.registry()?;
    let canonical = &registry.skills.canonical;

    let mut issues = Vec::new();
    issues.extend(expected_set_issue(
        "skill",
        &config.expected_skills,
        &canonical.name_list(),
    ));

    let mut total = 0;
    for (name, entry) in canonical.iter() {
        let rel = layout.skill_path(name);
        if !workspace.path(&rel).is_file() {
            issues.push(Issue::new(
                ErrorKind::Filesystem,
                format!("missing canonical skill file: {rel}"),
            ));
            continue;
        }
        let text = workspace.read(&rel)?;
        let declared = parse_document(&text)?
            .frontmatter
            .scalar("name")
            .unwrap_or_default()
            .to_string();
        if declared != name {
            issues.push(Issue::new(
                ErrorKind::Structural,
                format!("{rel} name mismatch: expected `{name}`, got `{declared}`"),
            ));
        }
        let lines = line_count(&text);
        total += lines;
        if lines > config.skill_max_lines {
            issues.push(Issue::new(
                ErrorKind::Structural,
                format!("canonical skill prompt too large ({lines} lines): {rel}"),
            ));
        }
        if entry.triggers.is_empty() {
            issues.push(Issue::new(
                ErrorKind::Structural,
                format!("canonical skill `{name}` has no triggers"),
            ));
        }
    }

    let skills_dir = workspace.path(layout.skills_dir());
    let mut packs = BTreeSet::new();
    if skills_dir.is_dir() {
        let io_err = |source| CheckError::Io {
            path: skills_dir.clone(),
            source,
        };
        for entry in fs::read_dir(&skills_dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.join("SKILL.md").is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    packs.insert(name.to_string());
                }
            }
        }
    }
    let unexpected: Vec<&str> = packs
        .iter()
        .map(String::as_str)
        .filter(|pack| !canonical.contains(pack))
        .collect();
    if !unexpected.is_empty() {
        issues.push(Issue::new(
            ErrorKind::Alignment,
            format!(
                "unexpected non-canonical skill packs present: {}",
                unexpected.join(", ")
            ),
        ));
    }

    let script_rel = config.install_script.display().to_string();
    let script = workspace.read(&config.install_script)?;
    let installed: BTreeSet<String> = shell_array(&script, "PKG_SKILLS")?.into_iter().collect();
    let missing: Vec<&str> = canonical.names().filter(|s| !installed.contains(*s)).collect();
    if !missing.is_empty() {
        issues.push(Issue::new(
            ErrorKind::Drift,
            format!("{script_rel} missing skill package entries: {}", missing.join(", ")),
        ));
    }
    let extra: Vec<&str> = installed
        .iter()
        .map(String::as_str)
        .filter(|s| !canonical.contains(s))
        .collect();
    if !extra.is_empty() {
        issues.push(Issue::new(
            ErrorKind::Drift,
            format!("{script_rel} has unexpected skill package entries: {}", extra.join(", ")),
        ));
    }

    issues.extend(total_budget_issue("skill", total, config.skill_total_lines));

    let mut outcome = CheckOutcome::from_issues("Skill consolidation validation", issues);
    if outcome.passed {
        outcome = outcome.with_details([
            format!("Canonical skill packs: {}", canonical.len()),
            format!("Canonical prompt lines: {total}"),
        ]);
    }
    Ok(outcome)
}

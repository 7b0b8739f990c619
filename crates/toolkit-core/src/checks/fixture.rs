//! A complete, passing repository for check tests.

use super::Workspace;
use crate::config::ToolkitConfig;
use crate::render::Markers;
use crate::sync::sync_artifacts;
use crate::validate::tests::sample_manifest_value;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub(crate) fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn command_template(name: &str) -> String {
    format!(
        "---\ncanonical: true\ncommand_id: crew.{name}.v1\n---\n# /crew {name}\n\n## Syntax\n\n`/crew {name} [target]`\n\n## Response Contract (Required)\n\n1. `findings`\n2. `plan`\n3. `proposed changes`\n4. `validation steps`\n"
    )
}

fn agent_template(name: &str, skills: &[&str]) -> String {
    let skills: String = skills.iter().map(|s| format!("  - {s}\n")).collect();
    format!(
        "---\nname: {name}\nskills:\n{skills}---\n# {name}\n\n<ownership>\nOwns its commands.\n</ownership>\n\n<scope>\nStays in scope.\n</scope>\n\n<output_contract>\nFindings first.\n</output_contract>\n"
    )
}

fn skill_template(name: &str) -> String {
    format!("---\nname: {name}\ndescription: The {name} pack\n---\n# {name}\n")
}

/// Write every file of the sample repository, then sync generated artifacts.
pub(crate) fn populate(root: &Path) {
    let markers = Markers::default();
    write(
        root,
        "toolkit/manifest.json",
        &serde_json::to_string_pretty(&sample_manifest_value()).unwrap(),
    );
    write(root, "toolkit/manifest.schema.json", "{}\n");

    for name in ["init", "inspect"] {
        write(
            root,
            &format!("templates/shared/commands/crew/{name}.md"),
            &command_template(name),
        );
    }
    write(
        root,
        "templates/shared/agents/crewai/builder.md",
        &agent_template("builder", &["core-build"]),
    );
    write(
        root,
        "templates/shared/agents/crewai/auditor.md",
        &agent_template("auditor", &["governance", "core-build"]),
    );
    for name in ["core-build", "governance"] {
        write(
            root,
            &format!("templates/shared/skills/{name}/SKILL.md"),
            &skill_template(name),
        );
    }
    write(
        root,
        "templates/shared/workflows/getting-started/SKILL.md",
        &skill_template("getting-started"),
    );

    let orchestrator = "# Orchestrator\n\nRoute build work to builder with core-build.\nRoute audits to auditor with governance.\n";
    write(root, "templates/claude/CLAUDE.md", orchestrator);
    write(root, "templates/opencode/crewai-orchestrator.md", orchestrator);

    write(
        root,
        "install.sh",
        &format!(
            "#!/usr/bin/env bash\nset -euo pipefail\n\n{}\n{}\n\ninstall_packages\n",
            markers.install.begin, markers.install.end
        ),
    );
    write(
        root,
        "README.md",
        &format!(
            "# Crew Toolkit\n\n{}\n{}\n\nStart with `/crew init`, then run `/crew inspect`.\nSee [the init command](templates/shared/commands/crew/init.md) and [usage](#usage).\n\n## Install\n\n{}\n{}\n\n## Index\n\n{}\n{}\n\n## Usage\n\nRead [the guide](<docs/getting%20started.md>).\n",
            markers.whats_inside.begin,
            markers.whats_inside.end,
            markers.installer_counts.begin,
            markers.installer_counts.end,
            markers.index.begin,
            markers.index.end,
        ),
    );
    write(
        root,
        "docs/getting started.md",
        "# Getting started\n\nBack to [the readme](/README.md) or [the site](https://example.com).\n",
    );

    write(
        root,
        "toolkit/cases/agent-routing.json",
        &serde_json::to_string_pretty(&json!({
            "canonical_agents": ["builder", "auditor"],
            "command_expectations": {"init": "builder", "inspect": "auditor"},
            "keyword_map": {
                "builder": ["build", "scaffold", "create"],
                "auditor": ["audit", "review", "inspect"]
            },
            "cases": [
                {"id": "build-01", "query": "Scaffold and build a new crew", "expected_primary": "builder"},
                {"id": "audit-01", "query": "Please audit and review my crew", "expected_primary": "auditor"}
            ]
        }))
        .unwrap(),
    );
    write(
        root,
        "toolkit/cases/command-smoke.json",
        &serde_json::to_string_pretty(&json!({
            "minimum_pass_rate": 0.95,
            "canonical_cases": [
                {"id": "smoke-init", "invocation": "/crew init my-crew", "expected_command": "init", "expected_owner": "builder"},
                {"id": "smoke-inspect", "invocation": "/crew inspect", "expected_command": "inspect", "expected_owner": "auditor"}
            ]
        }))
        .unwrap(),
    );
    write(
        root,
        "toolkit/cases/e2e-scenarios.json",
        &serde_json::to_string_pretty(&json!({
            "scenarios": [
                {
                    "id": "e2e-init",
                    "invocation": "/crew init support-crew",
                    "expected_command": "init",
                    "expected_owner": "builder",
                    "expected_primary_skill": "core-build"
                },
                {
                    "id": "e2e-inspect",
                    "invocation": "/crew inspect",
                    "expected_owner": "auditor",
                    "expected_primary_skill": "governance",
                    "required_optional_skills": ["core-build"]
                }
            ]
        }))
        .unwrap(),
    );

    sync_artifacts(root, &ToolkitConfig::default()).unwrap();
}

/// A synced sample repository and a workspace over it.
pub(crate) fn repository() -> (TempDir, Workspace) {
    let dir = TempDir::new().unwrap();
    populate(dir.path());
    let workspace = Workspace::new(dir.path(), ToolkitConfig::default());
    (dir, workspace)
}

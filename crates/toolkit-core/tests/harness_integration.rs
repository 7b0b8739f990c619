//! End-to-end: sync a repository with a non-default namespace config, run the
//! harness, then break individual artifacts and check which checks notice.

use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use toolkit_core::render::Markers;
use toolkit_core::{run_harness, sync_artifacts, CheckId, HarnessReport, ToolkitConfig, Workspace};

const CONFIG: &str = "\
# Ops toolkit
command_namespace = ops
agent_namespace = \"opsai\"
expected_agents = planner, reviewer
expected_commands = plan, review
expected_skills = planning, review-gates
min_pass_rate = 1.0
";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn write_json(root: &Path, rel: &str, value: &Value) {
    write(root, rel, &serde_json::to_string_pretty(value).unwrap());
}

fn manifest() -> Value {
    json!({
        "schema_version": "1.0",
        "phase": {"name": "ops-rollout", "stage": 2},
        "commands": {
            "canonical": {
                "plan": {"owner": "planner", "template": "templates/shared/commands/ops/plan.md"},
                "review": {"owner": "reviewer", "template": "templates/shared/commands/ops/review.md"}
            }
        },
        "agents": {
            "canonical": {
                "planner": {"description": "Plans releases", "template": "templates/shared/agents/opsai/planner.md"},
                "reviewer": {"description": "Reviews changes", "template": "templates/shared/agents/opsai/reviewer.md"}
            }
        },
        "skills": {
            "canonical": {
                "planning": {
                    "owners": ["planner"],
                    "triggers": ["plan release", "draft roadmap"],
                    "template": "templates/shared/skills/planning/SKILL.md"
                },
                "review-gates": {
                    "owners": ["reviewer"],
                    "triggers": ["review change"],
                    "template": "templates/shared/skills/review-gates/SKILL.md"
                }
            },
            "command_policy": {
                "plan": {"primary": "planning"},
                "review": {"primary": "review-gates", "optional": ["planning"]}
            }
        },
        "workflows": {
            "canonical": {
                "onboarding": {"template": "templates/shared/workflows/onboarding/SKILL.md"}
            }
        },
        "installation": {
            "system_files": {
                "claude": ["templates/claude/CLAUDE.md"],
                "opencode": ["templates/opencode/crewai-orchestrator.md"]
            }
        }
    })
}

fn command_template(name: &str) -> String {
    format!(
        "---\ncanonical: true\ncommand_id: ops.{name}.v1\n---\n# /ops {name}\n\n## Syntax\n\n`/ops {name} <target>`\n\n## Response Contract (Required)\n\n1. `findings`\n2. `plan`\n3. `proposed changes`\n4. `validation steps`\n"
    )
}

fn agent_template(skills: &[&str]) -> String {
    let skills = skills.join(", ");
    format!(
        "---\nskills: [{skills}]\n---\n<ownership>\nOwned commands only.\n</ownership>\n<scope>\nRelease work.\n</scope>\n<output_contract>\nFindings, then plan.\n</output_contract>\n"
    )
}

fn build_repository(root: &Path) -> Workspace {
    let markers = Markers::default();
    write(root, ".toolkit/config", CONFIG);
    write_json(root, "toolkit/manifest.json", &manifest());
    write(root, "toolkit/manifest.schema.json", "{\"type\": \"object\"}\n");

    for name in ["plan", "review"] {
        write(root, &format!("templates/shared/commands/ops/{name}.md"), &command_template(name));
    }
    write(root, "templates/shared/agents/opsai/planner.md", &agent_template(&["planning"]));
    write(
        root,
        "templates/shared/agents/opsai/reviewer.md",
        &agent_template(&["review-gates", "planning"]),
    );
    for name in ["planning", "review-gates"] {
        write(
            root,
            &format!("templates/shared/skills/{name}/SKILL.md"),
            &format!("---\nname: {name}\n---\n# {name}\n"),
        );
    }
    write(
        root,
        "templates/shared/workflows/onboarding/SKILL.md",
        "---\nname: onboarding\n---\n# onboarding\n",
    );
    let orchestrator =
        "# Routing\n\n- planner: planning\n- reviewer: review-gates, planning\n";
    write(root, "templates/claude/CLAUDE.md", orchestrator);
    write(root, "templates/opencode/crewai-orchestrator.md", orchestrator);

    write(
        root,
        "install.sh",
        &format!("#!/usr/bin/env bash\n\n{}\n{}\n", markers.install.begin, markers.install.end),
    );
    write(
        root,
        "README.md",
        &format!(
            "# Ops toolkit\n\n{}\n{}\n\n{}\n{}\n\n{}\n{}\n\nRun `/ops plan` before `/ops review`. See [the guide](docs/guide.md#setup).\n",
            markers.whats_inside.begin,
            markers.whats_inside.end,
            markers.installer_counts.begin,
            markers.installer_counts.end,
            markers.index.begin,
            markers.index.end,
        ),
    );
    write(root, "docs/guide.md", "# Guide\n\n## Setup\n\nBack to the [README](../README.md).\n");

    write_json(
        root,
        "toolkit/cases/agent-routing.json",
        &json!({
            "canonical_agents": ["planner", "reviewer"],
            "command_expectations": {"plan": "planner", "review": "reviewer"},
            "keyword_map": {
                "planner": ["plan", "roadmap"],
                "reviewer": ["review", "diff"]
            },
            "cases": [
                {"id": "plan-01", "query": "Draft a roadmap and plan the release", "expected_primary": "planner"},
                {"id": "review-01", "query": "Review this diff", "expected_primary": "reviewer"}
            ]
        }),
    );
    write_json(
        root,
        "toolkit/cases/command-smoke.json",
        &json!({
            "canonical_cases": [
                {"id": "smoke-plan", "invocation": "/ops plan q3", "expected_owner": "planner"},
                {"id": "smoke-review", "invocation": "/ops review", "expected_command": "review"}
            ]
        }),
    );
    write_json(
        root,
        "toolkit/cases/e2e-scenarios.json",
        &json!({
            "scenarios": [
                {"id": "e2e-plan", "invocation": "/ops plan q3", "expected_primary_skill": "planning"},
                {
                    "id": "e2e-review",
                    "invocation": "/ops review",
                    "expected_owner": "reviewer",
                    "required_optional_skills": ["planning"]
                }
            ]
        }),
    );

    let config = ToolkitConfig::load(root, None).unwrap();
    assert_eq!(config.command_namespace, "ops");
    let summary = sync_artifacts(root, &config).unwrap();
    assert_eq!(summary.counts.commands, 2);
    Workspace::new(root, config)
}

fn failing(report: &HarnessReport) -> Vec<&str> {
    report
        .records
        .iter()
        .filter(|r| !r.passed)
        .map(|r| r.name.as_str())
        .collect()
}

#[test]
fn synced_repository_passes_every_check() {
    let dir = TempDir::new().unwrap();
    let workspace = build_repository(dir.path());

    let report = run_harness(&workspace);
    assert!(report.success(), "{}", report.render());
    assert_eq!(report.passed(), CheckId::ALL.len());
    assert!(report.render().ends_with("Reliability harness passed."));

    let again = sync_artifacts(dir.path(), &workspace.config).unwrap();
    assert!(again.written.is_empty());
}

#[test]
fn manifest_edit_without_sync_is_drift() {
    let dir = TempDir::new().unwrap();
    let workspace = build_repository(dir.path());
    let mut edited = manifest();
    edited["agents"]["canonical"]["planner"]["description"] = json!("Plans quarterly releases");
    write_json(dir.path(), "toolkit/manifest.json", &edited);

    let report = run_harness(&workspace);
    assert_eq!(failing(&report), vec![CheckId::Manifest.name()]);
    assert!(report.records[0].output.contains("is out of sync with"));

    sync_artifacts(dir.path(), &workspace.config).unwrap();
    assert!(run_harness(&workspace).success());
}

#[test]
fn missing_command_template_fails_dependent_checks() {
    let dir = TempDir::new().unwrap();
    let workspace = build_repository(dir.path());
    fs::remove_file(dir.path().join("templates/shared/commands/ops/review.md")).unwrap();

    let report = run_harness(&workspace);
    let failed = failing(&report);
    for id in [
        CheckId::Manifest,
        CheckId::CommandReferences,
        CheckId::CommandSurface,
        CheckId::CommandSmoke,
        CheckId::E2eScenarios,
    ] {
        assert!(failed.contains(&id.name()), "{} should fail:\n{}", id.name(), report.render());
    }
    for id in [CheckId::AgentRouting, CheckId::SkillRouting, CheckId::AgentBudget] {
        assert!(!failed.contains(&id.name()), "{} should pass", id.name());
    }
}

#[test]
fn routing_tie_fails_only_agent_routing() {
    let dir = TempDir::new().unwrap();
    let workspace = build_repository(dir.path());
    let path = dir.path().join("toolkit/cases/agent-routing.json");
    let mut cases: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    cases["cases"][1]["query"] = json!("plan the review");
    write_json(dir.path(), "toolkit/cases/agent-routing.json", &cases);

    let report = run_harness(&workspace);
    assert_eq!(failing(&report), vec![CheckId::AgentRouting.name()]);
    let record = &report.records[7];
    assert!(record
        .output
        .contains("routing unresolved for case `review-01`: scores={planner: 1, reviewer: 1}"));
}

#[test]
fn unreadable_registry_is_isolated_per_check() {
    let dir = TempDir::new().unwrap();
    let workspace = build_repository(dir.path());
    write(dir.path(), "toolkit/registry.json", "{ not json");

    let report = run_harness(&workspace);
    assert_eq!(report.records.len(), CheckId::ALL.len());
    let surface = &report.records[3];
    assert!(!surface.passed);
    assert!(surface.output.starts_with("error: "), "{}", surface.output);
    let links = &report.records[2];
    assert!(links.passed, "{}", links.output);
    assert!(report.render().ends_with("Reliability harness failed."));
}

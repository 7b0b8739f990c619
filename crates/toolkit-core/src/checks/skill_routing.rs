use super::agent_routing::orchestrator_texts;
use super::{Result, Workspace};
use crate::alignment::{check_alignment, check_orchestrator_mentions, TemplateAgentSkills};
use crate::report::{CheckOutcome, Issue};

/// Skills, command policy, agent capabilities and orchestrators agree.
pub fn check_skill_routing(workspace: &Workspace) -> Result<CheckOutcome> {
    let registry = workspace.registry()?;
    let source = TemplateAgentSkills::new(&workspace.root, workspace.config.template_layout());

    let mut issues: Vec<Issue> = check_alignment(&registry, &source)
        .iter()
        .map(Issue::from)
        .collect();
    for (file, text) in orchestrator_texts(workspace, &mut issues)? {
        issues.extend(
            check_orchestrator_mentions(&registry, &file, &text)
                .iter()
                .map(Issue::from),
        );
    }

    let triggers: usize = registry
        .skills
        .canonical
        .iter()
        .map(|(_, skill)| skill.triggers.len())
        .sum();
    let mut outcome = CheckOutcome::from_issues("Skill routing validation", issues);
    if outcome.passed {
        outcome = outcome.with_details([
            format!(
                "Validated command policies: {}",
                registry.skills.command_policy.len()
            ),
            format!("Validated skill triggers: {triggers}"),
        ]);
    }
    Ok(outcome)
}

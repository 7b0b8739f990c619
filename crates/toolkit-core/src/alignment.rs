//! Cross-entity alignment: command ownership against agent capabilities,
//! skill coverage by command policies, and trigger-phrase uniqueness.
//!
//! Agent capabilities come from outside the manifest. [`AgentSkillSource`]
//! abstracts that lookup so the checks run against agent template front
//! matter in production and against in-memory maps in tests.

use crate::frontmatter::{read_frontmatter, FrontmatterError};
use crate::render::RegistryDocument;
use crate::report::{ErrorKind, Finding};
use crate::templates::TemplateLayout;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Lowercase and collapse whitespace runs to single spaces.
pub fn normalize_trigger(trigger: &str) -> String {
    trigger
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A trigger phrase claimed by two different skills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateTrigger {
    /// The phrase as written in the later skill.
    pub trigger: String,
    /// Skill that claimed the phrase first.
    pub first: String,
    /// Skill that repeated it.
    pub second: String,
}

impl fmt::Display for DuplicateTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "duplicate trigger `{}` shared by `{}` and `{}`",
            self.trigger, self.second, self.first
        )
    }
}

/// Duplicates across different skills, in declaration order.
///
/// A skill repeating its own trigger is not reported here.
pub fn find_duplicate_triggers<'a, I>(skills: I) -> Vec<DuplicateTrigger>
where
    I: IntoIterator<Item = (&'a str, &'a [String])>,
{
    let mut seen: HashMap<String, &'a str> = HashMap::new();
    let mut duplicates = Vec::new();
    for (skill, triggers) in skills {
        // One report per phrase per skill, however often the skill repeats it.
        let mut reported = HashSet::new();
        for trigger in triggers {
            let normalized = normalize_trigger(trigger);
            match seen.get(normalized.as_str()) {
                Some(first) if *first != skill => {
                    if reported.insert(normalized) {
                        duplicates.push(DuplicateTrigger {
                            trigger: trigger.clone(),
                            first: (*first).to_string(),
                            second: skill.to_string(),
                        });
                    }
                }
                Some(_) => {}
                None => {
                    seen.insert(normalized, skill);
                }
            }
        }
    }
    duplicates
}

/// Lookup of the skills an agent declares in its own metadata.
pub trait AgentSkillSource {
    /// `Ok(None)` when the agent has no metadata at all.
    fn declared_skills(&self, agent: &str) -> Result<Option<BTreeSet<String>>, FrontmatterError>;

    /// Human-readable location of the agent's metadata, used in reports.
    fn location(&self, agent: &str) -> String {
        format!("agent `{agent}`")
    }
}

/// Reads `skills:` from each agent template's front matter.
#[derive(Debug, Clone)]
pub struct TemplateAgentSkills {
    pub root: PathBuf,
    pub layout: TemplateLayout,
}

impl TemplateAgentSkills {
    pub fn new(root: impl Into<PathBuf>, layout: TemplateLayout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }
}

impl AgentSkillSource for TemplateAgentSkills {
    fn declared_skills(&self, agent: &str) -> Result<Option<BTreeSet<String>>, FrontmatterError> {
        let path = self.root.join(self.layout.agent_path(agent));
        if !path.is_file() {
            return Ok(None);
        }
        let frontmatter = read_frontmatter(&path)?;
        let skills = frontmatter
            .list("skills")?
            .map(|items| items.iter().cloned().collect())
            .unwrap_or_default();
        Ok(Some(skills))
    }

    fn location(&self, agent: &str) -> String {
        self.layout.agent_path(agent)
    }
}

impl AgentSkillSource for HashMap<String, BTreeSet<String>> {
    fn declared_skills(&self, agent: &str) -> Result<Option<BTreeSet<String>>, FrontmatterError> {
        Ok(self.get(agent).cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignmentViolation {
    #[error("{0}")]
    DuplicateTrigger(DuplicateTrigger),
    #[error("canonical skills not used by any command policy: {}", .0.join(", "))]
    UncoveredSkills(Vec<String>),
    #[error("missing canonical agent file: {0}")]
    MissingAgentFile(String),
    #[error("agent `{agent}` has invalid skills frontmatter: {reason}")]
    InvalidSkillsFrontmatter { agent: String, reason: String },
    #[error("agent `{agent}` uses non-canonical skills: {}", .skills.join(", "))]
    NonCanonicalAgentSkills { agent: String, skills: Vec<String> },
    #[error("command `{command}` owner `{owner}` missing primary skill `{skill}`")]
    OwnerMissingPrimary {
        command: String,
        owner: String,
        skill: String,
    },
    #[error("command `{command}` owner `{owner}` missing optional skill `{skill}`")]
    OwnerMissingOptional {
        command: String,
        owner: String,
        skill: String,
    },
    #[error("canonical skill `{skill}` references unknown owner `{owner}`")]
    UnknownSkillOwner { skill: String, owner: String },
    #[error("orchestrator file missing canonical skill `{skill}`: {file}")]
    OrchestratorMissingSkill { skill: String, file: String },
}

impl Finding for AlignmentViolation {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingAgentFile(_) => ErrorKind::Filesystem,
            Self::InvalidSkillsFrontmatter { .. } => ErrorKind::Structural,
            Self::UnknownSkillOwner { .. } => ErrorKind::ReferentialIntegrity,
            Self::DuplicateTrigger(_)
            | Self::UncoveredSkills(_)
            | Self::NonCanonicalAgentSkills { .. }
            | Self::OwnerMissingPrimary { .. }
            | Self::OwnerMissingOptional { .. }
            | Self::OrchestratorMissingSkill { .. } => ErrorKind::Alignment,
        }
    }
}

pub fn check_trigger_uniqueness(registry: &RegistryDocument) -> Vec<AlignmentViolation> {
    let skills = registry
        .skills
        .canonical
        .iter()
        .map(|(name, skill)| (name, skill.triggers.as_slice()));
    find_duplicate_triggers(skills)
        .into_iter()
        .map(AlignmentViolation::DuplicateTrigger)
        .collect()
}

/// Every canonical skill must be primary or optional for some command.
pub fn check_skill_coverage(registry: &RegistryDocument) -> Vec<AlignmentViolation> {
    let covered: BTreeSet<&str> = registry
        .skills
        .command_policy
        .iter()
        .flat_map(|(_, policy)| policy.skills())
        .collect();
    let uncovered: Vec<String> = registry
        .skills
        .canonical
        .name_set()
        .into_iter()
        .filter(|skill| !covered.contains(skill))
        .map(String::from)
        .collect();
    if uncovered.is_empty() {
        Vec::new()
    } else {
        vec![AlignmentViolation::UncoveredSkills(uncovered)]
    }
}

/// Build the agent -> declared skills map, reporting unreadable metadata.
pub fn collect_agent_skills(
    registry: &RegistryDocument,
    source: &dyn AgentSkillSource,
) -> (BTreeMap<String, BTreeSet<String>>, Vec<AlignmentViolation>) {
    let canonical_skills = registry.skills.canonical.name_set();
    let mut declared = BTreeMap::new();
    let mut violations = Vec::new();

    for agent in registry.agents.canonical.names() {
        let skills = match source.declared_skills(agent) {
            Ok(Some(skills)) => skills,
            Ok(None) => {
                violations.push(AlignmentViolation::MissingAgentFile(source.location(agent)));
                continue;
            }
            Err(err) => {
                violations.push(AlignmentViolation::InvalidSkillsFrontmatter {
                    agent: agent.to_string(),
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let unknown: Vec<String> = skills
            .iter()
            .filter(|skill| !canonical_skills.contains(skill.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            violations.push(AlignmentViolation::NonCanonicalAgentSkills {
                agent: agent.to_string(),
                skills: unknown,
            });
        }
        declared.insert(agent.to_string(), skills);
    }

    (declared, violations)
}

/// A command's owner must declare every skill its policy names.
pub fn check_owner_capabilities(
    registry: &RegistryDocument,
    declared: &BTreeMap<String, BTreeSet<String>>,
) -> Vec<AlignmentViolation> {
    let empty = BTreeSet::new();
    let mut violations = Vec::new();
    for (command, policy) in registry.skills.command_policy.iter() {
        let owner = registry.owner_of(command).unwrap_or_default();
        let owner_skills = declared.get(owner).unwrap_or(&empty);
        if !owner_skills.contains(&policy.primary) {
            violations.push(AlignmentViolation::OwnerMissingPrimary {
                command: command.to_string(),
                owner: owner.to_string(),
                skill: policy.primary.clone(),
            });
        }
        for skill in &policy.optional {
            if !owner_skills.contains(skill) {
                violations.push(AlignmentViolation::OwnerMissingOptional {
                    command: command.to_string(),
                    owner: owner.to_string(),
                    skill: skill.clone(),
                });
            }
        }
    }
    violations
}

fn check_skill_owners(registry: &RegistryDocument) -> Vec<AlignmentViolation> {
    let agents = registry.agents.canonical.name_set();
    registry
        .skills
        .canonical
        .iter()
        .flat_map(|(skill, entry)| {
            entry
                .owners
                .iter()
                .filter(|owner| !agents.contains(owner.as_str()))
                .map(move |owner| AlignmentViolation::UnknownSkillOwner {
                    skill: skill.to_string(),
                    owner: owner.clone(),
                })
        })
        .collect()
}

/// Run every alignment check against the registry.
pub fn check_alignment(
    registry: &RegistryDocument,
    source: &dyn AgentSkillSource,
) -> Vec<AlignmentViolation> {
    let mut violations = check_trigger_uniqueness(registry);
    violations.extend(check_skill_coverage(registry));
    let (declared, agent_violations) = collect_agent_skills(registry, source);
    violations.extend(agent_violations);
    violations.extend(check_owner_capabilities(registry, &declared));
    violations.extend(check_skill_owners(registry));
    debug!(count = violations.len(), "alignment checked");
    violations
}

/// Every canonical skill must be named somewhere in an orchestrator file.
pub fn check_orchestrator_mentions(
    registry: &RegistryDocument,
    file: &str,
    text: &str,
) -> Vec<AlignmentViolation> {
    registry
        .skills
        .canonical
        .name_set()
        .into_iter()
        .filter(|skill| !text.contains(skill))
        .map(|skill| AlignmentViolation::OrchestratorMissingSkill {
            skill: skill.to_string(),
            file: file.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render_registry;
    use crate::validate::tests::sample_manifest;
    use std::fs;
    use tempfile::TempDir;

    fn registry() -> RegistryDocument {
        render_registry(&sample_manifest())
    }

    fn capable_agents() -> HashMap<String, BTreeSet<String>> {
        HashMap::from([
            ("builder".to_string(), BTreeSet::from(["core-build".to_string()])),
            (
                "auditor".to_string(),
                BTreeSet::from(["governance".to_string(), "core-build".to_string()]),
            ),
        ])
    }

    fn triggers(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_trigger("  Scaffold\t  PROJECT "), "scaffold project");
    }

    #[test]
    fn duplicate_trigger_names_both_skills_once() {
        let a = triggers(&["scaffold project", "create crew"]);
        let b = triggers(&["Scaffold  Project"]);
        let found =
            find_duplicate_triggers([("core-build", a.as_slice()), ("flows", b.as_slice())]);
        assert_eq!(
            found,
            vec![DuplicateTrigger {
                trigger: "Scaffold  Project".into(),
                first: "core-build".into(),
                second: "flows".into(),
            }]
        );
        assert_eq!(
            found[0].to_string(),
            "duplicate trigger `Scaffold  Project` shared by `flows` and `core-build`"
        );
    }

    #[test]
    fn normalized_repeats_in_later_skill_report_once() {
        let a = triggers(&["scaffold project"]);
        let b = triggers(&["Scaffold Project", "scaffold  project"]);
        let found = find_duplicate_triggers([("alpha", a.as_slice()), ("beta", b.as_slice())]);
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].first.as_str(), found[0].second.as_str()), ("alpha", "beta"));
        assert_eq!(found[0].trigger, "Scaffold Project");
    }

    #[test]
    fn third_skill_sharing_a_trigger_is_its_own_pair() {
        let a = triggers(&["audit crew"]);
        let b = triggers(&["Audit crew"]);
        let c = triggers(&["audit  CREW", "audit crew"]);
        let pairs: Vec<(String, String)> = find_duplicate_triggers([
            ("governance", a.as_slice()),
            ("review", b.as_slice()),
            ("compliance", c.as_slice()),
        ])
        .into_iter()
        .map(|d| (d.first, d.second))
        .collect();
        assert_eq!(
            pairs,
            vec![
                ("governance".to_string(), "review".to_string()),
                ("governance".to_string(), "compliance".to_string()),
            ]
        );
    }

    #[test]
    fn repeats_within_one_skill_are_ignored() {
        let a = triggers(&["audit crew", "Audit Crew"]);
        assert!(find_duplicate_triggers([("governance", a.as_slice())]).is_empty());
    }

    #[test]
    fn aligned_registry_passes() {
        let violations = check_alignment(&registry(), &capable_agents());
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[test]
    fn uncovered_skill_is_reported() {
        let mut registry = registry();
        let mut policy = registry.skills.command_policy.get("inspect").unwrap().clone();
        policy.optional.clear();
        registry.skills.command_policy.insert("inspect", policy);
        let mut policy = registry.skills.command_policy.get("init").unwrap().clone();
        policy.primary = "governance".into();
        registry.skills.command_policy.insert("init", policy);

        assert_eq!(
            check_skill_coverage(&registry),
            vec![AlignmentViolation::UncoveredSkills(vec!["core-build".into()])]
        );
    }

    #[test]
    fn owner_must_declare_policy_skills() {
        let mut agents = capable_agents();
        agents.insert("auditor".into(), BTreeSet::from(["governance".to_string()]));
        agents.insert("builder".into(), BTreeSet::new());
        let violations = check_alignment(&registry(), &agents);
        assert_eq!(
            violations,
            vec![
                AlignmentViolation::OwnerMissingPrimary {
                    command: "init".into(),
                    owner: "builder".into(),
                    skill: "core-build".into(),
                },
                AlignmentViolation::OwnerMissingOptional {
                    command: "inspect".into(),
                    owner: "auditor".into(),
                    skill: "core-build".into(),
                },
            ]
        );
        assert!(violations.iter().all(|v| v.kind() == ErrorKind::Alignment));
    }

    #[test]
    fn missing_and_non_canonical_agents() {
        let mut agents = capable_agents();
        agents.remove("builder");
        agents
            .get_mut("auditor")
            .unwrap()
            .insert("telepathy".to_string());
        let (_, violations) = collect_agent_skills(&registry(), &agents);
        assert_eq!(
            violations,
            vec![
                AlignmentViolation::MissingAgentFile("agent `builder`".into()),
                AlignmentViolation::NonCanonicalAgentSkills {
                    agent: "auditor".into(),
                    skills: vec!["telepathy".into()],
                },
            ]
        );
    }

    #[test]
    fn template_source_reads_front_matter() {
        let dir = TempDir::new().unwrap();
        let layout = TemplateLayout::default();
        let agents = dir.path().join(layout.agents_dir());
        fs::create_dir_all(&agents).unwrap();
        fs::write(
            agents.join("builder.md"),
            "---\nname: builder\nskills:\n  - core-build\n---\n# Builder\n",
        )
        .unwrap();
        fs::write(agents.join("auditor.md"), "---\nskills: governance\n---\n").unwrap();

        let source = TemplateAgentSkills::new(dir.path(), layout);
        assert_eq!(
            source.declared_skills("builder").unwrap(),
            Some(BTreeSet::from(["core-build".to_string()]))
        );
        assert!(matches!(
            source.declared_skills("auditor"),
            Err(FrontmatterError::ExpectedList(_))
        ));
        assert_eq!(source.declared_skills("ghost").unwrap(), None);
        assert_eq!(
            source.location("ghost"),
            "templates/shared/agents/crewai/ghost.md"
        );
    }

    #[test]
    fn orchestrator_must_mention_every_skill() {
        let violations =
            check_orchestrator_mentions(&registry(), "CLAUDE.md", "Use core-build first.");
        assert_eq!(
            violations,
            vec![AlignmentViolation::OrchestratorMissingSkill {
                skill: "governance".into(),
                file: "CLAUDE.md".into(),
            }]
        );
    }
}

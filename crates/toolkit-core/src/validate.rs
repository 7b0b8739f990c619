//! Structural and referential validation of the manifest.
//!
//! Parsing happens in three stages. Missing top-level keys and malformed
//! sections stop validation immediately since nothing below them can be
//! trusted. Once the shape is sound, every field and cross-reference problem
//! is accumulated so a single run reports all of them.

use crate::alignment::{find_duplicate_triggers, DuplicateTrigger};
use crate::manifest::{
    CanonicalAgent, CanonicalCommand, CanonicalSkill, CommandPolicy, Manifest, NamedEntries,
    Workflow,
};
use crate::report::{ErrorKind, Finding};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

/// Keys every manifest must carry at the top level.
pub const REQUIRED_TOP_LEVEL_KEYS: [&str; 7] = [
    "schema_version",
    "phase",
    "commands",
    "agents",
    "skills",
    "workflows",
    "installation",
];

/// Validation parameters that would otherwise be hard-coded constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRules {
    /// The only accepted `schema_version` literal.
    pub schema_version: String,
    /// Platforms that must list at least one system file.
    pub required_platforms: Vec<String>,
}

impl Default for ManifestRules {
    fn default() -> Self {
        Self {
            schema_version: "1.0".to_string(),
            required_platforms: vec!["claude".to_string(), "opencode".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestViolation {
    #[error("manifest missing top-level key `{0}`")]
    MissingTopLevelKey(&'static str),
    #[error("manifest `{0}` must be an object")]
    SectionNotObject(&'static str),
    #[error("manifest missing `{0}` object")]
    MissingSectionObject(String),
    #[error("`{path}` must be {expected}")]
    InvalidField {
        path: String,
        expected: &'static str,
    },
    #[error("unsupported schema_version `{found}`; expected `{expected}`")]
    UnsupportedSchemaVersion { found: String, expected: String },
    #[error("command `{command}` owner `{owner}` is not a canonical agent")]
    UnknownCommandOwner { command: String, owner: String },
    #[error("skill `{0}` must define non-empty `owners` list")]
    EmptySkillOwners(String),
    #[error("skill `{skill}` has unknown owners: {}", .owners.join(", "))]
    UnknownSkillOwners { skill: String, owners: Vec<String> },
    #[error("skill `{0}` must define non-empty `triggers` list")]
    EmptySkillTriggers(String),
    #[error(
        "`skills.command_policy` keys must match canonical commands: expected [{}], got [{}]",
        .expected.join(", "),
        .actual.join(", ")
    )]
    CommandPolicyKeysMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error("command policy `{command}` references unknown primary skill `{skill}`")]
    UnknownPrimarySkill { command: String, skill: String },
    #[error("command policy `{command}` references unknown optional skill `{skill}`")]
    UnknownOptionalSkill { command: String, skill: String },
    #[error("command policy `{command}` optional includes primary skill `{skill}`")]
    OptionalIncludesPrimary { command: String, skill: String },
    #[error("command policy `{command}` optional repeats skill `{skill}`")]
    DuplicateOptionalSkill { command: String, skill: String },
    #[error("{0}")]
    DuplicateTrigger(DuplicateTrigger),
    #[error("installation.system_files.{0} must be a non-empty string list")]
    MissingPlatformFiles(String),
}

impl Finding for ManifestViolation {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingTopLevelKey(_)
            | Self::SectionNotObject(_)
            | Self::MissingSectionObject(_)
            | Self::InvalidField { .. }
            | Self::UnsupportedSchemaVersion { .. }
            | Self::EmptySkillOwners(_)
            | Self::EmptySkillTriggers(_)
            | Self::MissingPlatformFiles(_) => ErrorKind::Structural,
            Self::UnknownCommandOwner { .. }
            | Self::UnknownSkillOwners { .. }
            | Self::CommandPolicyKeysMismatch { .. }
            | Self::UnknownPrimarySkill { .. }
            | Self::UnknownOptionalSkill { .. }
            | Self::OptionalIncludesPrimary { .. }
            | Self::DuplicateOptionalSkill { .. } => ErrorKind::ReferentialIntegrity,
            Self::DuplicateTrigger(_) => ErrorKind::Alignment,
        }
    }
}

/// Outcome of validating a manifest document.
#[derive(Debug, Clone)]
pub struct ManifestValidation {
    /// Typed manifest, present whenever the shape and field types were sound.
    pub manifest: Option<Manifest>,
    pub violations: Vec<ManifestViolation>,
}

impl ManifestValidation {
    pub fn is_valid(&self) -> bool {
        self.manifest.is_some() && self.violations.is_empty()
    }
}

/// Validate a raw manifest document against `rules`.
pub fn validate_manifest(value: &Value, rules: &ManifestRules) -> ManifestValidation {
    let missing = missing_top_level_keys(value);
    if !missing.is_empty() {
        return ManifestValidation {
            manifest: None,
            violations: missing,
        };
    }

    let mut violations = Vec::new();
    let found = value.get("schema_version").map_or_else(String::new, display_value);
    if found != rules.schema_version {
        violations.push(ManifestViolation::UnsupportedSchemaVersion {
            found,
            expected: rules.schema_version.clone(),
        });
    }

    match parse_manifest(value) {
        Ok(manifest) => {
            violations.extend(check_references(&manifest, rules));
            debug!(count = violations.len(), "manifest validated");
            ManifestValidation {
                manifest: Some(manifest),
                violations,
            }
        }
        Err(parse_violations) => {
            violations.extend(parse_violations);
            ManifestValidation {
                manifest: None,
                violations,
            }
        }
    }
}

/// Parse a raw document into a typed [`Manifest`], or every shape/type error.
pub fn parse_manifest(value: &Value) -> Result<Manifest, Vec<ManifestViolation>> {
    let missing = missing_top_level_keys(value);
    if !missing.is_empty() {
        return Err(missing);
    }
    let sections = sections(value)?;

    let mut violations = Vec::new();
    let commands = parse_entries(sections.commands, "commands.canonical", &mut violations, |r| {
        let owner = r.string("owner");
        let template = r.optional_string("template");
        Some(CanonicalCommand {
            owner: owner?,
            template: template?,
        })
    });
    let agents = parse_entries(sections.agents, "agents.canonical", &mut violations, |r| {
        let description = r.string("description");
        let template = r.optional_string("template");
        Some(CanonicalAgent {
            description: description?,
            template: template?,
        })
    });
    let skills = parse_entries(sections.skills, "skills.canonical", &mut violations, |r| {
        let owners = r.string_list("owners");
        let triggers = r.string_list("triggers");
        let template = r.optional_string("template");
        Some(CanonicalSkill {
            owners: owners?,
            triggers: triggers?,
            template: template?,
        })
    });
    let command_policy = parse_entries(
        sections.command_policy,
        "skills.command_policy",
        &mut violations,
        |r| {
            let primary = r.string("primary");
            let optional = r.string_list("optional");
            Some(CommandPolicy {
                primary: primary?,
                optional: optional?,
            })
        },
    );
    let workflows = parse_entries(sections.workflows, "workflows.canonical", &mut violations, |r| {
        Some(Workflow {
            template: r.optional_string("template")?,
        })
    });

    let mut system_files = NamedEntries::new();
    for (platform, entries) in sections.system_files {
        match string_list(entries) {
            Some(list) => system_files.insert(platform.clone(), list),
            None => violations.push(ManifestViolation::InvalidField {
                path: format!("installation.system_files.{platform}"),
                expected: "a list of strings",
            }),
        }
    }

    if !violations.is_empty() {
        return Err(violations);
    }

    Ok(Manifest {
        schema_version: value.get("schema_version").map_or_else(String::new, display_value),
        phase: value.get("phase").cloned().unwrap_or(Value::Null),
        commands,
        agents,
        skills,
        command_policy,
        workflows,
        system_files,
    })
}

/// Cross-reference checks over an already typed manifest.
pub fn check_references(manifest: &Manifest, rules: &ManifestRules) -> Vec<ManifestViolation> {
    let mut violations = Vec::new();
    let agents = manifest.agents.name_set();
    let skills = manifest.skills.name_set();

    for (command, config) in manifest.commands.iter() {
        if !agents.contains(config.owner.as_str()) {
            violations.push(ManifestViolation::UnknownCommandOwner {
                command: command.to_string(),
                owner: config.owner.clone(),
            });
        }
    }

    for (skill, config) in manifest.skills.iter() {
        if config.owners.is_empty() {
            violations.push(ManifestViolation::EmptySkillOwners(skill.to_string()));
        } else {
            let unknown: BTreeSet<&str> = config
                .owners
                .iter()
                .map(String::as_str)
                .filter(|owner| !agents.contains(owner))
                .collect();
            if !unknown.is_empty() {
                violations.push(ManifestViolation::UnknownSkillOwners {
                    skill: skill.to_string(),
                    owners: unknown.into_iter().map(String::from).collect(),
                });
            }
        }
        if config.triggers.is_empty() {
            violations.push(ManifestViolation::EmptySkillTriggers(skill.to_string()));
        }
    }

    let commands = manifest.commands.name_set();
    let policy_keys = manifest.command_policy.name_set();
    if commands != policy_keys {
        violations.push(ManifestViolation::CommandPolicyKeysMismatch {
            expected: commands.iter().map(|s| (*s).to_string()).collect(),
            actual: policy_keys.iter().map(|s| (*s).to_string()).collect(),
        });
    }

    for (command, policy) in manifest.command_policy.iter() {
        if !skills.contains(policy.primary.as_str()) {
            violations.push(ManifestViolation::UnknownPrimarySkill {
                command: command.to_string(),
                skill: policy.primary.clone(),
            });
        }
        let mut seen = BTreeSet::new();
        for skill in &policy.optional {
            if !skills.contains(skill.as_str()) {
                violations.push(ManifestViolation::UnknownOptionalSkill {
                    command: command.to_string(),
                    skill: skill.clone(),
                });
            }
            if *skill == policy.primary {
                violations.push(ManifestViolation::OptionalIncludesPrimary {
                    command: command.to_string(),
                    skill: skill.clone(),
                });
            } else if !seen.insert(skill.as_str()) {
                violations.push(ManifestViolation::DuplicateOptionalSkill {
                    command: command.to_string(),
                    skill: skill.clone(),
                });
            }
        }
    }

    let triggers = manifest
        .skills
        .iter()
        .map(|(name, skill)| (name, skill.triggers.as_slice()));
    violations.extend(
        find_duplicate_triggers(triggers)
            .into_iter()
            .map(ManifestViolation::DuplicateTrigger),
    );

    for platform in &rules.required_platforms {
        if !manifest.system_files.contains(platform) {
            violations.push(ManifestViolation::MissingPlatformFiles(platform.clone()));
        }
    }
    for (platform, entries) in manifest.system_files.iter() {
        if entries.is_empty() {
            violations.push(ManifestViolation::MissingPlatformFiles(platform.to_string()));
        }
    }

    violations
}

fn missing_top_level_keys(value: &Value) -> Vec<ManifestViolation> {
    REQUIRED_TOP_LEVEL_KEYS
        .iter()
        .filter(|key| value.get(**key).is_none())
        .map(|key| ManifestViolation::MissingTopLevelKey(*key))
        .collect()
}

struct Sections<'a> {
    commands: &'a Map<String, Value>,
    agents: &'a Map<String, Value>,
    skills: &'a Map<String, Value>,
    command_policy: &'a Map<String, Value>,
    workflows: &'a Map<String, Value>,
    system_files: &'a Map<String, Value>,
}

fn sections(value: &Value) -> Result<Sections<'_>, Vec<ManifestViolation>> {
    let mut violations = Vec::new();

    let commands = canonical_section(value, "commands", &mut violations);
    let agents = canonical_section(value, "agents", &mut violations);
    let workflows = canonical_section(value, "workflows", &mut violations);

    let (skills, command_policy) = if value.get("skills").is_some_and(Value::is_object) {
        let skills = object_at(value, &["skills", "canonical"]);
        if skills.is_none() {
            violations.push(ManifestViolation::MissingSectionObject(
                "skills.canonical".to_string(),
            ));
        }
        let policy = object_at(value, &["skills", "command_policy"]);
        if policy.is_none() {
            violations.push(ManifestViolation::MissingSectionObject(
                "skills.command_policy".to_string(),
            ));
        }
        (skills, policy)
    } else {
        violations.push(ManifestViolation::SectionNotObject("skills"));
        (None, None)
    };

    let system_files = object_at(value, &["installation", "system_files"]);
    if system_files.is_none() {
        violations.push(ManifestViolation::MissingSectionObject(
            "installation.system_files".to_string(),
        ));
    }

    match (commands, agents, skills, command_policy, workflows, system_files) {
        (
            Some(commands),
            Some(agents),
            Some(skills),
            Some(command_policy),
            Some(workflows),
            Some(system_files),
        ) if violations.is_empty() => Ok(Sections {
            commands,
            agents,
            skills,
            command_policy,
            workflows,
            system_files,
        }),
        _ => Err(violations),
    }
}

fn canonical_section<'a>(
    value: &'a Value,
    name: &'static str,
    violations: &mut Vec<ManifestViolation>,
) -> Option<&'a Map<String, Value>> {
    if !value.get(name).is_some_and(Value::is_object) {
        violations.push(ManifestViolation::SectionNotObject(name));
        return None;
    }
    let canonical = object_at(value, &[name, "canonical"]);
    if canonical.is_none() {
        violations.push(ManifestViolation::MissingSectionObject(format!(
            "{name}.canonical"
        )));
    }
    canonical
}

fn object_at<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Map<String, Value>> {
    keys.iter()
        .try_fold(value, |current, key| current.get(*key))?
        .as_object()
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(String::from))
        .collect()
}

/// Render a JSON scalar the way it appears in messages (strings unquoted).
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Field access on one entity record, recording type errors as it goes.
struct RecordReader<'a> {
    path: String,
    record: &'a Map<String, Value>,
    violations: &'a mut Vec<ManifestViolation>,
}

impl RecordReader<'_> {
    fn string(&mut self, key: &str) -> Option<String> {
        if let Some(Value::String(s)) = self.record.get(key) {
            return Some(s.clone());
        }
        self.invalid(key, "a string");
        None
    }

    /// Outer `None` means the field is present but not a string.
    fn optional_string(&mut self, key: &str) -> Option<Option<String>> {
        match self.record.get(key) {
            None | Some(Value::Null) => Some(None),
            Some(Value::String(s)) => Some(Some(s.clone())),
            Some(_) => {
                self.invalid(key, "a string");
                None
            }
        }
    }

    /// A missing list reads as empty; emptiness is a referential concern.
    fn string_list(&mut self, key: &str) -> Option<Vec<String>> {
        match self.record.get(key) {
            None => Some(Vec::new()),
            Some(value) => {
                let list = string_list(value);
                if list.is_none() {
                    self.invalid(key, "a list of strings");
                }
                list
            }
        }
    }

    fn invalid(&mut self, key: &str, expected: &'static str) {
        self.violations.push(ManifestViolation::InvalidField {
            path: format!("{}.{key}", self.path),
            expected,
        });
    }
}

fn parse_entries<T>(
    section: &Map<String, Value>,
    path: &str,
    violations: &mut Vec<ManifestViolation>,
    parse: impl Fn(&mut RecordReader<'_>) -> Option<T>,
) -> NamedEntries<T> {
    let mut entries = NamedEntries::new();
    for (name, value) in section {
        let entry_path = format!("{path}.{name}");
        let Some(record) = value.as_object() else {
            violations.push(ManifestViolation::InvalidField {
                path: entry_path,
                expected: "an object",
            });
            continue;
        };
        let mut reader = RecordReader {
            path: entry_path,
            record,
            violations: &mut *violations,
        };
        if let Some(parsed) = parse(&mut reader) {
            entries.insert(name.clone(), parsed);
        }
    }
    entries
}

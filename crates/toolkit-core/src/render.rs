//! Artifact rendering from the manifest.
//!
//! Every function here is pure: the same manifest always renders the same
//! bytes, and entries are emitted in manifest declaration order because the
//! generated text is compared verbatim by the drift detector.
//!
//! Embedded blocks are delimited by a begin/end marker pair and include the
//! markers themselves. [`replace_block`] is the only primitive that splices a
//! block into existing text; [`extract_block`] is its read-only counterpart.

use crate::manifest::{CommandPolicy, Manifest, NamedEntries};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkerError {
    #[error("missing start marker: {0}")]
    MissingBegin(String),
    #[error("missing end marker: {0}")]
    MissingEnd(String),
}

/// A begin/end marker pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMarkers {
    pub begin: String,
    pub end: String,
}

impl BlockMarkers {
    fn shell(id: &str) -> Self {
        Self {
            begin: format!("# BEGIN GENERATED: {id}"),
            end: format!("# END GENERATED: {id}"),
        }
    }

    fn html(id: &str) -> Self {
        Self {
            begin: format!("<!-- BEGIN GENERATED: {id} -->"),
            end: format!("<!-- END GENERATED: {id} -->"),
        }
    }
}

/// Marker pairs for every generated block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub install: BlockMarkers,
    pub whats_inside: BlockMarkers,
    pub installer_counts: BlockMarkers,
    pub index: BlockMarkers,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            install: BlockMarkers::shell("TOOLKIT_PACKAGE_LISTS"),
            whats_inside: BlockMarkers::html("TOOLKIT_WHATS_INSIDE"),
            installer_counts: BlockMarkers::html("TOOLKIT_INSTALLER_COUNTS"),
            index: BlockMarkers::html("TOOLKIT_INDEX"),
        }
    }
}

impl Markers {
    pub fn doc(&self, block: DocBlock) -> &BlockMarkers {
        match block {
            DocBlock::WhatsInside => &self.whats_inside,
            DocBlock::InstallerCounts => &self.installer_counts,
            DocBlock::Index => &self.index,
        }
    }
}

/// The documentation blocks embedded in the README.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocBlock {
    WhatsInside,
    InstallerCounts,
    Index,
}

impl DocBlock {
    pub const ALL: [Self; 3] = [Self::WhatsInside, Self::InstallerCounts, Self::Index];

    pub fn label(&self) -> &'static str {
        match self {
            Self::WhatsInside => "what's-inside block",
            Self::InstallerCounts => "installer-count block",
            Self::Index => "index block",
        }
    }
}

/// Naming and marker settings shared by every renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Prefix for command packages and index entries, e.g. `crew`.
    pub command_namespace: String,
    /// Prefix for agent packages, e.g. `crewai`.
    pub agent_namespace: String,
    pub markers: Markers,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            command_namespace: "crew".to_string(),
            agent_namespace: "crewai".to_string(),
            markers: Markers::default(),
        }
    }
}

// --- Registry ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEntry {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillEntry {
    pub owners: Vec<String>,
    pub triggers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section<T> {
    pub canonical: NamedEntries<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSection {
    pub canonical: NamedEntries<SkillEntry>,
    pub command_policy: NamedEntries<CommandPolicy>,
}

/// Read-optimized projection of the manifest consumed by runtime tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    pub schema_version: String,
    pub phase: Value,
    pub commands: Section<CommandEntry>,
    pub agents: Section<AgentEntry>,
    pub skills: SkillSection,
}

impl RegistryDocument {
    /// Owner of a canonical command.
    pub fn owner_of(&self, command: &str) -> Option<&str> {
        self.commands
            .canonical
            .get(command)
            .map(|entry| entry.owner.as_str())
    }
}

pub fn render_registry(manifest: &Manifest) -> RegistryDocument {
    RegistryDocument {
        schema_version: manifest.schema_version.clone(),
        phase: manifest.phase.clone(),
        commands: Section {
            canonical: manifest.commands.map(|c| CommandEntry {
                owner: c.owner.clone(),
            }),
        },
        agents: Section {
            canonical: manifest.agents.map(|a| AgentEntry {
                description: a.description.clone(),
            }),
        },
        skills: SkillSection {
            canonical: manifest.skills.map(|s| SkillEntry {
                owners: s.owners.clone(),
                triggers: s.triggers.clone(),
            }),
            command_policy: manifest.command_policy.clone(),
        },
    }
}

/// Registry file contents: two-space indented JSON with a trailing newline.
pub fn render_registry_json(manifest: &Manifest) -> Result<String, serde_json::Error> {
    let mut text = serde_json::to_string_pretty(&render_registry(manifest))?;
    text.push('\n');
    Ok(text)
}

// --- Installer block ---

/// Package lists embedded in the installer script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLists {
    pub skills: Vec<String>,
    pub agents: Vec<String>,
    pub workflows: Vec<String>,
    pub commands: Vec<String>,
}

pub fn package_lists(manifest: &Manifest, options: &RenderOptions) -> PackageLists {
    PackageLists {
        skills: manifest.skills.name_list(),
        agents: manifest
            .agents
            .names()
            .map(|name| format!("{}/{name}", options.agent_namespace))
            .collect(),
        workflows: manifest.workflows.name_list(),
        commands: manifest
            .commands
            .names()
            .map(|name| format!("{}/{name}", options.command_namespace))
            .collect(),
    }
}

fn render_shell_array(name: &str, values: &[String]) -> String {
    let mut lines = vec![format!("{name}=(")];
    lines.extend(values.iter().map(|value| format!("    \"{value}\"")));
    lines.push(")".to_string());
    lines.join("\n")
}

pub fn render_install_block(manifest: &Manifest, options: &RenderOptions) -> String {
    let lists = package_lists(manifest, options);
    let markers = &options.markers.install;
    [
        markers.begin.clone(),
        render_shell_array("PKG_SKILLS", &lists.skills),
        String::new(),
        render_shell_array("PKG_AGENTS", &lists.agents),
        String::new(),
        render_shell_array("PKG_WORKFLOWS", &lists.workflows),
        String::new(),
        render_shell_array("PKG_COMMANDS", &lists.commands),
        markers.end.clone(),
    ]
    .join("\n")
}

// --- Documentation blocks ---

fn code_list<'a>(items: impl IntoIterator<Item = &'a str>, prefix: &str) -> String {
    items
        .into_iter()
        .map(|item| format!("`{prefix}{item}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_doc_block(manifest: &Manifest, options: &RenderOptions, block: DocBlock) -> String {
    let counts = manifest.counts();
    let markers = options.markers.doc(block);
    let body = match block {
        DocBlock::WhatsInside => vec![
            format!("- **{} Skill Packs**", counts.skills),
            format!("- **{} Core Agents**", counts.agents),
            format!("- **{} Canonical Commands**", counts.commands),
            format!(
                "- **{} Workflows** that guide you step by step",
                counts.workflows
            ),
        ],
        DocBlock::InstallerCounts => vec![
            format!("- {} Skills", counts.skills),
            format!("- {} Agents", counts.agents),
            format!("- {} Workflows", counts.workflows),
            format!("- {} Commands", counts.commands),
        ],
        DocBlock::Index => {
            let command_prefix = format!("/{} ", options.command_namespace);
            vec![
                format!(
                    "- **Canonical commands ({}):** {}",
                    counts.commands,
                    code_list(manifest.commands.names(), &command_prefix)
                ),
                format!(
                    "- **Canonical agents ({}):** {}",
                    counts.agents,
                    code_list(manifest.agents.names(), "")
                ),
                format!(
                    "- **Canonical skill packs ({}):** {}",
                    counts.skills,
                    code_list(manifest.skills.names(), "")
                ),
                format!(
                    "- **Workflows ({}):** {}",
                    counts.workflows,
                    code_list(manifest.workflows.names(), "")
                ),
            ]
        }
    };

    let mut lines = Vec::with_capacity(body.len() + 2);
    lines.push(markers.begin.clone());
    lines.extend(body);
    lines.push(markers.end.clone());
    lines.join("\n")
}

/// All documentation blocks, keyed by block.
pub fn render_doc_blocks(manifest: &Manifest, options: &RenderOptions) -> Vec<(DocBlock, String)> {
    DocBlock::ALL
        .iter()
        .map(|block| (*block, render_doc_block(manifest, options, *block)))
        .collect()
}

// --- Marker primitives ---

fn block_span(text: &str, markers: &BlockMarkers) -> Result<(usize, usize), MarkerError> {
    let start = text
        .find(&markers.begin)
        .ok_or_else(|| MarkerError::MissingBegin(markers.begin.clone()))?;
    let end = text[start..]
        .find(&markers.end)
        .map(|offset| start + offset + markers.end.len())
        .ok_or_else(|| MarkerError::MissingEnd(markers.end.clone()))?;
    Ok((start, end))
}

/// The span from the begin marker through the first end marker after it.
pub fn extract_block<'a>(text: &'a str, markers: &BlockMarkers) -> Result<&'a str, MarkerError> {
    let (start, end) = block_span(text, markers)?;
    Ok(&text[start..end])
}

/// Replace the marker-delimited span with `block`, byte for byte.
///
/// `block` is expected to carry the same markers, which makes the operation
/// idempotent.
pub fn replace_block(
    text: &str,
    markers: &BlockMarkers,
    block: &str,
) -> Result<String, MarkerError> {
    let (start, end) = block_span(text, markers)?;
    let mut out = String::with_capacity(text.len() - (end - start) + block.len());
    out.push_str(&text[..start]);
    out.push_str(block);
    out.push_str(&text[end..]);
    Ok(out)
}

pub fn apply_install_block(
    text: &str,
    manifest: &Manifest,
    options: &RenderOptions,
) -> Result<String, MarkerError> {
    replace_block(
        text,
        &options.markers.install,
        &render_install_block(manifest, options),
    )
}

pub fn apply_doc_blocks(
    text: &str,
    manifest: &Manifest,
    options: &RenderOptions,
) -> Result<String, MarkerError> {
    render_doc_blocks(manifest, options)
        .into_iter()
        .try_fold(text.to_string(), |current, (block, rendered)| {
            replace_block(&current, options.markers.doc(block), &rendered)
        })
}

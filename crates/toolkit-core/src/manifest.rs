//! Typed model of the toolkit manifest.
//!
//! The manifest is the single source of truth for canonical commands, agents,
//! skill packs and workflows. Canonical sections keep the manifest's own key
//! order because every generated artifact lists entries in that order.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("manifest {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Ordered `name -> record` mapping.
///
/// Serializes as a JSON object in insertion order and deserializes from one
/// without re-sorting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedEntries<T>(Vec<(String, T)>);

impl<T> Default for NamedEntries<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> NamedEntries<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: T) {
        let name = name.into();
        if let Some(slot) = self.0.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.0.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    /// Names in declaration order, owned.
    pub fn name_list(&self) -> Vec<String> {
        self.names().map(String::from).collect()
    }

    pub fn name_set(&self) -> BTreeSet<&str> {
        self.names().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Project every record, keeping names and order.
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> NamedEntries<U> {
        NamedEntries(self.0.iter().map(|(n, v)| (n.clone(), f(v))).collect())
    }
}

impl<T> FromIterator<(String, T)> for NamedEntries<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut entries = Self::new();
        for (name, value) in iter {
            entries.insert(name, value);
        }
        entries
    }
}

impl<T: Serialize> Serialize for NamedEntries<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct NamedEntriesVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for NamedEntriesVisitor<T> {
    type Value = NamedEntries<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object of named entries")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = NamedEntries::new();
        while let Some((name, value)) = access.next_entry::<String, T>()? {
            entries.insert(name, value);
        }
        Ok(entries)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for NamedEntries<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(NamedEntriesVisitor(PhantomData))
    }
}

/// A canonical command. `owner` names the responsible canonical agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalCommand {
    pub owner: String,
    pub template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalAgent {
    pub description: String,
    pub template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSkill {
    pub owners: Vec<String>,
    pub triggers: Vec<String>,
    pub template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    pub template: Option<String>,
}

/// Primary and optional skills attached to a canonical command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPolicy {
    pub primary: String,
    #[serde(default)]
    pub optional: Vec<String>,
}

impl CommandPolicy {
    /// Primary followed by optional skills.
    pub fn skills(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.optional.iter().map(String::as_str))
    }
}

/// Fully typed manifest. Only produced by [`crate::validate::parse_manifest`].
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub schema_version: String,
    /// Opaque phase tag, echoed verbatim into the registry.
    pub phase: Value,
    pub commands: NamedEntries<CanonicalCommand>,
    pub agents: NamedEntries<CanonicalAgent>,
    pub skills: NamedEntries<CanonicalSkill>,
    pub command_policy: NamedEntries<CommandPolicy>,
    pub workflows: NamedEntries<Workflow>,
    /// `installation.system_files`: platform name to file paths.
    pub system_files: NamedEntries<Vec<String>>,
}

/// Entity counts used by the documentation blocks and check summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestCounts {
    pub skills: usize,
    pub agents: usize,
    pub commands: usize,
    pub workflows: usize,
}

impl Manifest {
    pub fn counts(&self) -> ManifestCounts {
        ManifestCounts {
            skills: self.skills.len(),
            agents: self.agents.len(),
            commands: self.commands.len(),
            workflows: self.workflows.len(),
        }
    }
}

/// Read the manifest file as an untyped JSON document.
///
/// Only I/O and JSON syntax failures are errors here; shape problems are
/// reported by the validator.
pub fn load_manifest_value(path: &Path) -> Result<Value, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ManifestError::Json {
        path: path.to_path_buf(),
        source,
    })
}

//! Restricted front-matter parser for template metadata.
//!
//! Grammar, line oriented:
//!
//! ```text
//! ---
//! key: scalar value
//! quoted: "scalar value"
//! list:
//!   - item
//!   - "item"
//! inline: [item, "item"]
//! ---
//! body...
//! ```
//!
//! A key with an empty value collects the `- item` lines that follow it,
//! possibly none. Blank lines and lines without `:` are skipped. Nested lists
//! and multi-line scalars are not supported.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontmatterError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("front matter opened with `---` is never closed")]
    Unterminated,
    #[error("front matter key `{0}` must be a list")]
    ExpectedList(String),
}

pub type Result<T> = std::result::Result<T, FrontmatterError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontmatterValue {
    Scalar(String),
    List(Vec<String>),
}

/// Front-matter entries in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    entries: Vec<(String, FrontmatterValue)>,
}

impl Frontmatter {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Last value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&FrontmatterValue> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            FrontmatterValue::Scalar(value) => Some(value),
            FrontmatterValue::List(_) => None,
        }
    }

    /// List value for `key`; `Ok(None)` when absent, an error when it is a scalar.
    pub fn list(&self, key: &str) -> Result<Option<&[String]>> {
        match self.get(key) {
            None => Ok(None),
            Some(FrontmatterValue::List(items)) => Ok(Some(items)),
            Some(FrontmatterValue::Scalar(_)) => {
                Err(FrontmatterError::ExpectedList(key.to_string()))
            }
        }
    }
}

/// A parsed template: metadata plus the text after the closing delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document<'a> {
    pub frontmatter: Frontmatter,
    pub body: &'a str,
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').to_string()
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == "---"
}

fn parse_entries(lines: &[&str]) -> Frontmatter {
    let mut entries = Vec::new();
    let mut index = 0;
    while index < lines.len() {
        let line = lines[index].trim();
        index += 1;
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_string();
        let value = value.trim();
        if let Some(inline) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
            let items = inline
                .split(',')
                .map(unquote)
                .filter(|item| !item.is_empty())
                .collect();
            entries.push((key, FrontmatterValue::List(items)));
            continue;
        }
        let value = unquote(value);
        if !value.is_empty() {
            entries.push((key, FrontmatterValue::Scalar(value)));
            continue;
        }

        let mut items = Vec::new();
        while let Some(item) = lines.get(index).and_then(|l| l.trim().strip_prefix("- ")) {
            items.push(unquote(item));
            index += 1;
        }
        entries.push((key, FrontmatterValue::List(items)));
    }
    Frontmatter { entries }
}

/// Split a document into front matter and body.
///
/// Text that does not open with a `---` line has empty front matter and is
/// returned whole as the body.
pub fn parse_document(text: &str) -> Result<Document<'_>> {
    let mut lines = text.split_inclusive('\n');
    match lines.next() {
        Some(first) if is_delimiter(first) => {}
        _ => {
            return Ok(Document {
                frontmatter: Frontmatter::default(),
                body: text,
            })
        }
    }

    let mut offset = text.find('\n').map_or(text.len(), |pos| pos + 1);
    let mut block = Vec::new();
    for line in lines {
        let next = offset + line.len();
        if is_delimiter(line) {
            return Ok(Document {
                frontmatter: parse_entries(&block),
                body: &text[next..],
            });
        }
        block.push(line.trim_end_matches(['\n', '\r']));
        offset = next;
    }
    Err(FrontmatterError::Unterminated)
}

/// Read and parse only the front matter of a file.
pub fn read_frontmatter(path: &Path) -> Result<Frontmatter> {
    let text = std::fs::read_to_string(path).map_err(|source| FrontmatterError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&text).map(|doc| doc.frontmatter)
}

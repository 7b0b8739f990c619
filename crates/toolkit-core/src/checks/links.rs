use super::{Result, Workspace};
use crate::report::{CheckOutcome, ErrorKind, Issue};
use regex::Regex;
use std::path::{Path, PathBuf};

const SKIP_PREFIXES: [&str; 4] = ["http://", "https://", "mailto:", "tel:"];

/// Strip whitespace and `<...>` wrapping, then percent-decode.
fn normalize_target(raw: &str) -> String {
    let mut target = raw.trim();
    if let Some(inner) = target.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        target = inner.trim();
    }
    urlencoding::decode(target).map_or_else(|_| target.to_string(), |decoded| decoded.into_owned())
}

fn is_external(target: &str) -> bool {
    target.is_empty()
        || target.starts_with('#')
        || SKIP_PREFIXES.iter().any(|prefix| target.starts_with(prefix))
}

fn resolve_target(root: &Path, file: &Path, target: &str) -> PathBuf {
    let path_part = target.split('#').next().unwrap_or_default().trim();
    if let Some(absolute) = path_part.strip_prefix('/') {
        root.join(absolute.trim_start_matches('/'))
    } else {
        file.parent().unwrap_or(root).join(path_part)
    }
}

/// Every local markdown link must point at an existing file or directory.
pub fn check_markdown_links(workspace: &Workspace) -> Result<CheckOutcome> {
    let pattern = Regex::new(r"\[[^\]]+\]\(([^)]+)\)")?;
    let files = workspace.markdown_files()?;
    let mut checked = 0usize;
    let mut issues = Vec::new();

    for file in &files {
        let text = workspace.read(file)?;
        for (number, line) in text.lines().enumerate() {
            for caps in pattern.captures_iter(line) {
                let target = normalize_target(&caps[1]);
                if is_external(&target) {
                    continue;
                }
                checked += 1;
                if !resolve_target(&workspace.root, file, &target).exists() {
                    issues.push(Issue::new(
                        ErrorKind::Filesystem,
                        format!("{}:{}: {target}", workspace.display(file), number + 1),
                    ));
                }
            }
        }
    }

    let mut outcome = CheckOutcome::from_issues("Markdown link validation", issues);
    if outcome.passed {
        outcome = outcome.with_details([
            format!("Validated markdown files: {}", files.len()),
            format!("Validated local links: {checked}"),
        ]);
    }
    Ok(outcome)
}

//! Report types shared by every check.
//!
//! Validators never fail on bad input; they return findings. A finding knows
//! its [`ErrorKind`] so reports can be grouped by failure family, and every
//! check folds its findings into a [`CheckOutcome`] for printing.

use std::fmt;

/// Failure family of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing manifest keys.
    Structural,
    /// Dangling name reference between manifest sections.
    ReferentialIntegrity,
    /// Declared template or system file missing.
    Filesystem,
    /// Generated artifact differs from the freshly rendered expectation.
    Drift,
    /// Ownership, coverage, or trigger disagreement.
    Alignment,
    /// Zero or tied keyword scores, or a routed agent other than expected.
    RoutingAmbiguity,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::ReferentialIntegrity => "referential",
            Self::Filesystem => "filesystem",
            Self::Drift => "drift",
            Self::Alignment => "alignment",
            Self::RoutingAmbiguity => "routing",
        }
    }
}

/// A classified violation produced by one of the validators.
pub trait Finding: fmt::Display {
    fn kind(&self) -> ErrorKind;
}

/// A finding flattened to its message, as carried in a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub kind: ErrorKind,
    pub message: String,
}

impl Issue {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl<F: Finding> From<&F> for Issue {
    fn from(finding: &F) -> Self {
        Self::new(finding.kind(), finding.to_string())
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of running a single check.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    /// Report heading, e.g. "Toolkit manifest validation".
    pub title: String,
    /// Whether the check passed. Pass-rate gates may pass with failing cases.
    pub passed: bool,
    /// Violations that caused (or, for gates, contributed to) failure.
    pub issues: Vec<Issue>,
    /// Informational lines printed after the verdict.
    pub details: Vec<String>,
    /// Remediation hint printed only on failure.
    pub hint: Option<String>,
}

impl CheckOutcome {
    /// Build an outcome that passes iff `issues` is empty.
    pub fn from_issues(title: impl Into<String>, issues: Vec<Issue>) -> Self {
        Self {
            title: title.into(),
            passed: issues.is_empty(),
            issues,
            details: Vec::new(),
            hint: None,
        }
    }

    /// Collect findings of a single type into issues.
    pub fn from_findings<F: Finding>(title: impl Into<String>, findings: &[F]) -> Self {
        Self::from_issues(title, findings.iter().map(Issue::from).collect())
    }

    pub fn with_detail(mut self, line: impl Into<String>) -> Self {
        self.details.push(line.into());
        self
    }

    pub fn with_details<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.details.extend(lines.into_iter().map(Into::into));
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Itemized human-readable report.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if self.passed {
            lines.push(format!("{} passed.", self.title));
        } else {
            lines.push(format!("{} failed:", self.title));
        }
        lines.extend(self.issues.iter().map(|issue| format!("- {issue}")));
        lines.extend(self.details.iter().cloned());
        if !self.passed {
            if let Some(ref hint) = self.hint {
                lines.push(format!("Hint: {hint}"));
            }
        }
        lines.join("\n")
    }
}

//! Deterministic keyword routing.
//!
//! A query routes to the agent whose keywords occur most often in it. There
//! is no tie-break: a zero maximum or a shared maximum leaves the query
//! unresolved.

use crate::manifest::NamedEntries;
use crate::render::RegistryDocument;
use crate::report::{ErrorKind, Finding};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Ordered `agent -> keywords` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordTable(pub NamedEntries<Vec<String>>);

impl KeywordTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent<I, S>(mut self, agent: &str, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(agent, keywords.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentScore {
    pub agent: String,
    pub score: usize,
}

/// Per-agent scores in keyword-table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scores(pub Vec<AgentScore>);

impl Scores {
    pub fn get(&self, agent: &str) -> Option<usize> {
        self.0.iter().find(|s| s.agent == agent).map(|s| s.score)
    }
}

impl fmt::Display for Scores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", entry.agent, entry.score)?;
        }
        f.write_str("}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    /// `None` when the query is unresolved.
    pub winner: Option<String>,
    pub scores: Scores,
}

impl RoutingDecision {
    pub fn is_resolved(&self) -> bool {
        self.winner.is_some()
    }
}

fn keyword_hits(query: &str, keyword: &str) -> usize {
    if keyword.is_empty() {
        return 0;
    }
    query.matches(keyword.to_lowercase().as_str()).count()
}

pub fn score(query: &str, table: &KeywordTable) -> RoutingDecision {
    let query = query.to_lowercase();
    let scores: Vec<AgentScore> = table
        .0
        .iter()
        .map(|(agent, keywords)| AgentScore {
            agent: agent.to_string(),
            score: keywords.iter().map(|k| keyword_hits(&query, k)).sum(),
        })
        .collect();

    let best = scores.iter().map(|s| s.score).max().unwrap_or(0);
    let mut leaders = scores.iter().filter(|s| s.score == best);
    let winner = match (best, leaders.next(), leaders.next()) {
        (0, _, _) | (_, None, _) | (_, Some(_), Some(_)) => None,
        (_, Some(only), None) => Some(only.agent.clone()),
    };

    RoutingDecision {
        winner,
        scores: Scores(scores),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingCase {
    pub id: String,
    pub query: String,
    pub expected_primary: String,
}

/// Contents of the routing regression file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingCases {
    pub canonical_agents: Vec<String>,
    #[serde(default)]
    pub command_expectations: NamedEntries<String>,
    pub keyword_map: KeywordTable,
    pub cases: Vec<RoutingCase>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingViolation {
    #[error(
        "canonical agent mismatch between routing cases and registry: cases=[{}], registry=[{}]",
        .cases.join(", "),
        .registry.join(", ")
    )]
    AgentSetMismatch {
        cases: Vec<String>,
        registry: Vec<String>,
    },
    #[error(
        "command owner mismatch for `{command}`: expected `{expected}`, got `{}`",
        .actual.as_deref().unwrap_or("<none>")
    )]
    OwnerMismatch {
        command: String,
        expected: String,
        actual: Option<String>,
    },
    #[error("routing unresolved for case `{case}`: scores={scores}")]
    Unresolved { case: String, scores: Scores },
    #[error(
        "routing mismatch for case `{case}`: expected `{expected}`, got `{actual}` (scores={scores})"
    )]
    Mismatch {
        case: String,
        expected: String,
        actual: String,
        scores: Scores,
    },
    #[error("orchestrator routing missing `{agent}` in {file}")]
    OrchestratorMissingAgent { agent: String, file: String },
}

impl Finding for RoutingViolation {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::AgentSetMismatch { .. } | Self::OwnerMismatch { .. } => {
                ErrorKind::ReferentialIntegrity
            }
            Self::OrchestratorMissingAgent { .. } => ErrorKind::Alignment,
            Self::Unresolved { .. } | Self::Mismatch { .. } => ErrorKind::RoutingAmbiguity,
        }
    }
}

/// Route every case and compare against its expected agent.
pub fn evaluate_cases(cases: &RoutingCases) -> Vec<RoutingViolation> {
    let mut violations = Vec::new();
    for case in &cases.cases {
        let decision = score(&case.query, &cases.keyword_map);
        match decision.winner {
            None => violations.push(RoutingViolation::Unresolved {
                case: case.id.clone(),
                scores: decision.scores,
            }),
            Some(winner) if winner != case.expected_primary => {
                violations.push(RoutingViolation::Mismatch {
                    case: case.id.clone(),
                    expected: case.expected_primary.clone(),
                    actual: winner,
                    scores: decision.scores,
                });
            }
            Some(_) => {}
        }
    }
    debug!(
        cases = cases.cases.len(),
        failures = violations.len(),
        "routing cases evaluated"
    );
    violations
}

/// Agent set and command ownership recorded in the cases file must agree
/// with the registry.
pub fn check_case_expectations(
    cases: &RoutingCases,
    registry: &RegistryDocument,
) -> Vec<RoutingViolation> {
    let mut violations = Vec::new();

    let mut case_agents = cases.canonical_agents.clone();
    case_agents.sort();
    let mut registry_agents = registry.agents.canonical.name_list();
    registry_agents.sort();
    if case_agents != registry_agents {
        violations.push(RoutingViolation::AgentSetMismatch {
            cases: case_agents,
            registry: registry_agents,
        });
    }

    for (command, expected) in cases.command_expectations.iter() {
        let actual = registry.owner_of(command);
        if actual != Some(expected.as_str()) {
            violations.push(RoutingViolation::OwnerMismatch {
                command: command.to_string(),
                expected: expected.clone(),
                actual: actual.map(String::from),
            });
        }
    }
    violations
}

/// Every routing agent must be named somewhere in an orchestrator file.
pub fn check_orchestrator_agents(
    cases: &RoutingCases,
    file: &str,
    text: &str,
) -> Vec<RoutingViolation> {
    let mut agents: Vec<&String> = cases.canonical_agents.iter().collect();
    agents.sort();
    agents
        .into_iter()
        .filter(|agent| !text.contains(agent.as_str()))
        .map(|agent| RoutingViolation::OrchestratorMissingAgent {
            agent: agent.clone(),
            file: file.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render_registry;
    use crate::validate::tests::sample_manifest;

    fn table() -> KeywordTable {
        KeywordTable::new()
            .with_agent("builder", ["build", "scaffold"])
            .with_agent("auditor", ["audit", "review"])
    }

    fn cases() -> RoutingCases {
        serde_json::from_str(
            r#"{
                "canonical_agents": ["builder", "auditor"],
                "command_expectations": {"init": "builder", "inspect": "auditor"},
                "keyword_map": {"builder": ["build", "scaffold"], "auditor": ["audit", "review"]},
                "cases": [
                    {"id": "scaffold-01", "query": "Scaffold a new crew", "expected_primary": "builder"},
                    {"id": "audit-01", "query": "please audit and review this build", "expected_primary": "auditor"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn highest_score_wins() {
        let decision = score("please audit and review this build", &table());
        assert_eq!(decision.winner.as_deref(), Some("auditor"));
        assert_eq!(decision.scores.get("builder"), Some(1));
        assert_eq!(decision.scores.get("auditor"), Some(2));
    }

    #[test]
    fn tie_is_unresolved() {
        let decision = score("build and audit equally", &table());
        assert_eq!(decision.winner, None);
        assert_eq!(decision.scores.to_string(), "{builder: 1, auditor: 1}");
    }

    #[test]
    fn zero_score_is_unresolved() {
        let decision = score("what time is it", &table());
        assert!(!decision.is_resolved());
    }

    #[test]
    fn matching_is_case_insensitive_and_counts_repeats() {
        let decision = score("BUILD it, then Build it again", &table());
        assert_eq!(decision.scores.get("builder"), Some(2));
        assert_eq!(decision.winner.as_deref(), Some("builder"));
    }

    #[test]
    fn occurrences_do_not_overlap() {
        let table = KeywordTable::new().with_agent("echo", ["aa"]);
        assert_eq!(score("aaaa", &table).scores.get("echo"), Some(2));
    }

    #[test]
    fn empty_keyword_scores_nothing() {
        let table = KeywordTable::new()
            .with_agent("blank", [""])
            .with_agent("builder", ["build"]);
        let decision = score("build", &table);
        assert_eq!(decision.scores.get("blank"), Some(0));
        assert_eq!(decision.winner.as_deref(), Some("builder"));
    }

    #[test]
    fn empty_table_is_unresolved() {
        assert_eq!(score("anything", &KeywordTable::new()).winner, None);
    }

    #[test]
    fn cases_file_keeps_keyword_order() {
        let cases = cases();
        assert_eq!(cases.keyword_map.0.name_list(), vec!["builder", "auditor"]);
        assert!(evaluate_cases(&cases).is_empty());
    }

    #[test]
    fn failing_cases_carry_scores() {
        let mut cases = cases();
        cases.cases.push(RoutingCase {
            id: "tie-01".into(),
            query: "build and audit".into(),
            expected_primary: "builder".into(),
        });
        cases.cases.push(RoutingCase {
            id: "wrong-01".into(),
            query: "review the review".into(),
            expected_primary: "builder".into(),
        });
        let violations = evaluate_cases(&cases);
        assert_eq!(violations.len(), 2);
        assert_eq!(
            violations[0].to_string(),
            "routing unresolved for case `tie-01`: scores={builder: 1, auditor: 1}"
        );
        assert_eq!(
            violations[1].to_string(),
            "routing mismatch for case `wrong-01`: expected `builder`, got `auditor` (scores={builder: 0, auditor: 2})"
        );
        assert_eq!(violations[0].kind(), ErrorKind::RoutingAmbiguity);
    }

    #[test]
    fn expectations_match_registry() {
        let registry = render_registry(&sample_manifest());
        assert!(check_case_expectations(&cases(), &registry).is_empty());

        let mut cases = cases();
        cases.canonical_agents.push("ghost".into());
        cases.command_expectations.insert("inspect", "builder".to_string());
        cases.command_expectations.insert("deploy", "builder".to_string());
        let violations = check_case_expectations(&cases, &registry);
        assert_eq!(violations.len(), 3);
        assert!(violations[2].to_string().ends_with("got `<none>`"));
    }

    #[test]
    fn orchestrator_mentions_agents() {
        let violations = check_orchestrator_agents(&cases(), "CLAUDE.md", "route to builder");
        assert_eq!(
            violations,
            vec![RoutingViolation::OrchestratorMissingAgent {
                agent: "auditor".into(),
                file: "CLAUDE.md".into(),
            }]
        );
    }
}

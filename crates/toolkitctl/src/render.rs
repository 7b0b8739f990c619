//! Output rendering for toolkitctl.

use toolkit_core::{CheckOutcome, Issue, RoutingDecision};

/// Print a check report.
pub fn print_outcome(outcome: &CheckOutcome) {
    println!("{}", outcome.render());
}

/// Print the validation issues that stopped a sync.
pub fn print_sync_rejected(issues: &[Issue]) {
    println!("Sync aborted: manifest is invalid:");
    for issue in issues {
        println!("- [{}] {issue}", issue.kind.as_str());
    }
    println!("Hint: fix the manifest, then rerun `toolkitctl sync`.");
}

/// Print a routing decision with its per-agent scores.
pub fn print_route(query: &str, decision: &RoutingDecision) {
    println!("Query:  {query}");
    match decision.winner {
        Some(ref agent) => println!("Agent:  {agent}"),
        None => println!("Agent:  <unresolved>"),
    }
    println!("Scores: {}", decision.scores);
}

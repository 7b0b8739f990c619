pub mod alignment;
pub mod checks;
pub mod config;
pub mod drift;
pub mod frontmatter;
pub mod harness;
pub mod manifest;
pub mod render;
pub mod report;
pub mod routing;
pub mod sync;
pub mod templates;
pub mod validate;

pub use checks::{CheckError, CheckId, Workspace};
pub use config::ToolkitConfig;
pub use harness::{run_harness, CheckRecord, HarnessReport};
pub use manifest::Manifest;
pub use report::{CheckOutcome, ErrorKind, Finding, Issue};
pub use routing::{score, KeywordTable, RoutingDecision};
pub use sync::{sync_artifacts, SyncSummary};

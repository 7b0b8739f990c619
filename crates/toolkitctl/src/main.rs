//! toolkitctl - maintenance CLI for the agent toolkit repository
//!
//! Each check is a subcommand that prints an itemized report and exits 1 on
//! failure. `sync` is the only subcommand that writes files.

mod render;

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use std::path::{Path, PathBuf};
use toolkit_core::routing::RoutingCases;
use toolkit_core::sync::SyncError;
use toolkit_core::{run_harness, score, sync_artifacts, CheckId, ToolkitConfig, Workspace};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

/// Validate, sync, and route the canonical toolkit manifest.
#[derive(Parser)]
#[command(name = "toolkitctl")]
#[command(about = "Manifest validation, artifact sync, and routing checks for the agent toolkit")]
#[command(version)]
struct Cli {
    /// Repository root
    #[arg(long, global = true, env = "TOOLKIT_ROOT", default_value = ".")]
    root: PathBuf,

    /// Config file path (overrides <root>/.toolkit/config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the manifest, its templates, and generated artifact drift
    Validate,
    /// Check `/<namespace> <command>` references in docs and scripts
    CommandRefs,
    /// Check local markdown links
    Links,
    /// Check command templates and smoke-case shape
    CommandSurface,
    /// Run the command smoke pass-rate gate
    Smoke,
    /// Run representative end-to-end scenarios
    E2e,
    /// Check agent prompt budgets and required sections
    AgentBudget,
    /// Run agent routing regression cases
    AgentRouting,
    /// Check skill prompt budgets and installer entries
    SkillBudget,
    /// Check skill coverage and agent capabilities
    SkillRouting,
    /// Regenerate the registry, installer lists, and README blocks
    Sync,
    /// Score a free-text query against the routing keyword table
    Route {
        /// Query to route
        query: String,

        /// Routing cases file (defaults to <cases_dir>/agent-routing.json)
        #[arg(long)]
        cases: Option<PathBuf>,
    },
    /// Run every check and print a summary
    Harness,
}

impl Command {
    fn check(&self) -> Option<CheckId> {
        Some(match self {
            Self::Validate => CheckId::Manifest,
            Self::CommandRefs => CheckId::CommandReferences,
            Self::Links => CheckId::MarkdownLinks,
            Self::CommandSurface => CheckId::CommandSurface,
            Self::Smoke => CheckId::CommandSmoke,
            Self::E2e => CheckId::E2eScenarios,
            Self::AgentBudget => CheckId::AgentBudget,
            Self::AgentRouting => CheckId::AgentRouting,
            Self::SkillBudget => CheckId::SkillBudget,
            Self::SkillRouting => CheckId::SkillRouting,
            Self::Sync | Self::Route { .. } | Self::Harness => return None,
        })
    }
}

fn main() {
    let cli = Cli::parse();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Returns whether the command succeeded.
fn run(cli: Cli) -> eyre::Result<bool> {
    let config = ToolkitConfig::load(&cli.root, cli.config.as_deref())
        .wrap_err("failed to load toolkit config")?;
    debug!(root = %cli.root.display(), "config loaded");
    let workspace = Workspace::new(cli.root, config);

    if let Some(id) = cli.command.check() {
        let outcome = id
            .run(&workspace)
            .wrap_err_with(|| format!("{} could not run", id.name()))?;
        render::print_outcome(&outcome);
        return Ok(outcome.passed);
    }

    match cli.command {
        Command::Sync => run_sync(&workspace),
        Command::Route { query, cases } => run_route(&workspace, &query, cases.as_deref()),
        Command::Harness => {
            let report = run_harness(&workspace);
            println!("{}", report.render());
            Ok(report.success())
        }
        _ => Ok(true),
    }
}

fn run_sync(workspace: &Workspace) -> eyre::Result<bool> {
    match sync_artifacts(&workspace.root, &workspace.config) {
        Ok(summary) => {
            println!("{}", summary.render(&workspace.config));
            Ok(true)
        }
        Err(SyncError::Invalid(issues)) => {
            render::print_sync_rejected(&issues);
            Ok(false)
        }
        Err(e) => Err(e).wrap_err("sync failed"),
    }
}

fn run_route(workspace: &Workspace, query: &str, cases: Option<&Path>) -> eyre::Result<bool> {
    let path = cases.map_or_else(|| workspace.config.agent_routing_cases(), Path::to_path_buf);
    let cases: RoutingCases = workspace
        .read_json(&path)
        .wrap_err("failed to load routing keyword table")?;
    let decision = score(query, &cases.keyword_map);
    render::print_route(query, &decision);
    Ok(decision.is_resolved())
}

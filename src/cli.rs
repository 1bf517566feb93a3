///
/// This module implements the CLI interface for hashnode-sync: command parsing,
/// argument and environment handling, and the async entrypoint.
///
/// All reconciliation logic (parsing, asset rewriting, classification, the
/// engine itself) lives in the [`hashnode-sync-core`] crate. This module only
/// wires configuration, the Hashnode client and report output together.
///
/// ## How To Use
/// - In CI: run `hashnode-sync publish` with the changed-file lists in
///   `ADDED_FILES`, `CHANGED_FILES` and `DELETED_FILES`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`hashnode-sync-core`]: ../../hashnode_sync_core/
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use hashnode_sync_core::changes::{classify, ChangeInputs};
use hashnode_sync_core::error::AbortedRun;
use hashnode_sync_core::report::{RunReport, RunStatus};
use hashnode_sync_core::synchronise::synchronise;

use crate::hashnode::HashnodeClient;
use crate::load_config::load_config;
use crate::output;

/// CLI for hashnode-sync: publish markdown posts to a Hashnode publication.
#[derive(Parser)]
#[clap(
    name = "hashnode-sync",
    version,
    about = "Reconcile markdown posts changed in a git push with a Hashnode publication"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create, update or remove posts for the changed markdown files
    Publish(PublishArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct PublishArgs {
    /// Paths added in this push (whitespace, newline or comma separated)
    #[clap(long, env = "ADDED_FILES", default_value = "")]
    pub added_files: String,

    /// Paths modified in this push
    #[clap(long, env = "CHANGED_FILES", default_value = "")]
    pub changed_files: String,

    /// Paths deleted in this push
    #[clap(long, env = "DELETED_FILES", default_value = "")]
    pub deleted_files: String,

    /// Optional YAML settings file
    #[clap(long, env = "HASHNODE_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root of the repository checkout
    #[clap(long, default_value = ".")]
    pub repo_root: PathBuf,

    /// File to append workflow outputs to
    #[clap(long, env = "GITHUB_OUTPUT")]
    pub github_output: Option<PathBuf>,
}

/// Extracted async CLI logic entrypoint for integration tests and main().
///
/// Returns the run status; configuration problems come back as errors.
pub async fn run(cli: Cli) -> Result<RunStatus> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Publish(args) => publish(args).await,
    }
}

async fn publish(args: PublishArgs) -> Result<RunStatus> {
    let settings = load_config(args.config.as_deref())?;
    let sync_config = settings.sync_config(&args.repo_root);
    sync_config.trace_loaded();

    let inputs = ChangeInputs::from_lists(&args.added_files, &args.changed_files, &args.deleted_files);
    let changes = classify(&inputs, &sync_config.posts_root, |path| {
        args.repo_root.join(path).is_file()
    });
    tracing::info!(command = "publish", changes = changes.len(), "Starting publish");

    let client = HashnodeClient::new(settings.client_config())?;
    let report = match synchronise(&client, &sync_config, &changes).await {
        Ok(report) => report,
        Err(AbortedRun { source, partial }) => {
            tracing::error!(command = "publish", error = %source, "Synchronisation aborted");
            RunReport::fatal(partial, &source)
        }
    };

    output::emit(&report, args.github_output.as_deref())?;

    let status = report.status();
    tracing::info!(command = "publish", ?status, "Publish finished");
    Ok(status)
}

mod cmd;
mod output;
mod root;
mod ui;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, sync::SyncArgs, task::TaskSubcommand, tech::TechSubcommand,
    wiki::WikiSubcommand, Globals,
};
use std::path::PathBuf;
use tasker_core::TaskerError;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "tasker",
    about = "Create and synchronize TFS work items from Confluence task tables",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: ./.tasker.yaml, then ~/.tasker.yaml)
    #[arg(long, global = true, env = "TASKER_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Approve the preview without asking
    #[arg(long, global = true, short = 'y')]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize a page's task tables with child tasks
    Sync(SyncArgs),

    /// Tech-debt pages: create linked items, archive finished pages
    Tech {
        #[command(subcommand)]
        subcommand: TechSubcommand,
    },

    /// Create single tasks
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Wiki page maintenance
    Wiki {
        #[command(subcommand)]
        subcommand: WikiSubcommand,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

async fn run(command: Commands, globals: Globals) -> anyhow::Result<()> {
    let cancel = globals.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received");
            cancel.cancel();
        }
    });

    match command {
        Commands::Sync(args) => cmd::sync::run(&globals, args).await,
        Commands::Tech { subcommand } => cmd::tech::run(&globals, subcommand).await,
        Commands::Task { subcommand } => cmd::task::run(&globals, subcommand).await,
        Commands::Wiki { subcommand } => cmd::wiki::run(&globals, subcommand).await,
        Commands::Config { subcommand } => cmd::config::run(&globals, subcommand),
    }
}

fn is_aborted(e: &anyhow::Error) -> bool {
    matches!(e.downcast_ref::<TaskerError>(), Some(TaskerError::Aborted))
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let globals = Globals {
        config: cli.config,
        json: cli.json,
        yes: cli.yes,
        cancel: CancellationToken::new(),
    };

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(anyhow::Error::from)
        .and_then(|rt| rt.block_on(run(cli.command, globals)));

    match result {
        Ok(()) => {}
        Err(e) if is_aborted(&e) => eprintln!("canceled by user"),
        Err(e) => {
            // Print the full error chain (anyhow's alternate Display)
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

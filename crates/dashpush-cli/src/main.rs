mod cmd;
mod settings;
mod tools;

use clap::{Parser, Subcommand};
use cmd::run::RunArgs;
use settings::Settings;

#[derive(Parser)]
#[command(
    name = "dashpush",
    about = "Build a dashboard with an agent, push it, and link it into the app group",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the agent and emit one JSON line per event on stdout
    Run(RunArgs),

    /// Run as an MCP stdio server exposing deploy_to_github (used by `run`)
    Mcp,

    /// Push the working tree and activate dashboard links once
    Deploy,
}

fn main() {
    let cli = Cli::parse();

    // stdout carries the line protocol or JSON-RPC; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = cli.settings.deploy_config().and_then(|config| match cli.command {
        Commands::Run(args) => cmd::run::run(&config, args),
        Commands::Mcp => cmd::mcp::run(&config),
        Commands::Deploy => cmd::deploy::run(&config),
    });

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

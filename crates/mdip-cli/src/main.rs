//! MDIP CLI: command-line client for a Gatekeeper node.
//!
//! Subcommands: status, resolve, registries, queue, process, verify-db,
//! export, import.

mod commands;

use clap::{Parser, Subcommand};

/// MDIP: decentralized identifiers anchored on multiple registries.
#[derive(Parser, Debug)]
#[command(name = "mdip", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Query the status of a running node.
    Status(commands::status::StatusArgs),
    /// Resolve a DID to its document.
    Resolve(commands::resolve::ResolveArgs),
    /// List the registries the node currently accepts.
    Registries(commands::registries::RegistriesArgs),
    /// Show or clear the pending operation queue of a registry.
    Queue(commands::queue::QueueArgs),
    /// Process the pending import queue.
    Process(commands::process::ProcessArgs),
    /// Re-verify every stored DID and prune invalid ones.
    VerifyDb(commands::verify_db::VerifyDbArgs),
    /// Export DIDs or a registry batch to a JSON file.
    Export(commands::export::ExportArgs),
    /// Import DIDs or a registry batch from a JSON file.
    Import(commands::import::ImportArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Status(args) => commands::status::run(args).await,
        Commands::Resolve(args) => commands::resolve::run(args).await,
        Commands::Registries(args) => commands::registries::run(args).await,
        Commands::Queue(args) => commands::queue::run(args).await,
        Commands::Process(args) => commands::process::run(args).await,
        Commands::VerifyDb(args) => commands::verify_db::run(args).await,
        Commands::Export(args) => commands::export::run(args).await,
        Commands::Import(args) => commands::import::run(args).await,
    }
}

//! `mdip import`: import DID event logs or a registry batch.

use clap::Args;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

use super::DEFAULT_ENDPOINT;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON file produced by `mdip export`.
    pub file: PathBuf,

    /// The file holds a flat event batch instead of per-DID logs.
    #[arg(long)]
    pub batch: bool,

    /// Process the import queue afterwards.
    #[arg(long)]
    pub process: bool,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Deserialize)]
struct ImportResponse {
    queued: usize,
    processed: usize,
    rejected: usize,
    total: usize,
}

pub async fn run(args: &ImportArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.file)?;
    let payload: Vec<Value> = serde_json::from_str(&text)?;
    if payload.is_empty() {
        anyhow::bail!("{} contains no entries", args.file.display());
    }

    let path = if args.batch { "batch/import" } else { "dids/import" };
    let url = format!("{}/api/v1/{}", args.endpoint, path);
    let client = reqwest::Client::new();
    let resp = match client.post(&url).json(&payload).send().await {
        Ok(r) => r,
        Err(e) => {
            super::unreachable(&args.endpoint, &e);
            return Ok(());
        }
    };

    let result: ImportResponse = super::read_response("import", resp).await?;
    println!("Import:");
    println!("  Queued:    {}", result.queued);
    println!("  Processed: {}", result.processed);
    println!("  Rejected:  {}", result.rejected);
    println!("  Pending:   {}", result.total);

    if args.process {
        super::process::run(&super::process::ProcessArgs {
            endpoint: args.endpoint.clone(),
        })
        .await?;
    }
    Ok(())
}

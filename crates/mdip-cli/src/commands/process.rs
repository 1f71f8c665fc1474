//! `mdip process`: drain the node's pending import queue.

use clap::Args;
use serde::Deserialize;

use super::DEFAULT_ENDPOINT;

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Deserialize)]
struct ProcessResponse {
    #[serde(default)]
    busy: bool,
    added: usize,
    merged: usize,
    rejected: usize,
    pending: usize,
}

pub async fn run(args: &ProcessArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/events/process", args.endpoint);
    let resp = match reqwest::Client::new().post(&url).send().await {
        Ok(r) => r,
        Err(e) => {
            super::unreachable(&args.endpoint, &e);
            return Ok(());
        }
    };

    let result: ProcessResponse = super::read_response("process events", resp).await?;
    if result.busy {
        println!("Node is already processing events; try again later.");
        return Ok(());
    }
    println!("Processed events:");
    println!("  Added:    {}", result.added);
    println!("  Merged:   {}", result.merged);
    println!("  Rejected: {}", result.rejected);
    println!("  Pending:  {}", result.pending);
    Ok(())
}

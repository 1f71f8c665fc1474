//! `mdip export`: export DID event logs or a registry batch.

use clap::Args;
use serde_json::{json, Value};
use std::path::PathBuf;

use super::DEFAULT_ENDPOINT;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// DIDs to export (all when omitted).
    pub dids: Vec<String>,

    /// Export a flat batch of non-local events instead of per-DID logs.
    #[arg(long)]
    pub batch: bool,

    /// Write the export to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

pub async fn run(args: &ExportArgs) -> anyhow::Result<()> {
    let path = if args.batch { "batch/export" } else { "dids/export" };
    let url = format!("{}/api/v1/{}", args.endpoint, path);
    let body = if args.dids.is_empty() {
        json!({})
    } else {
        json!({ "dids": args.dids })
    };

    let resp = match reqwest::Client::new().post(&url).json(&body).send().await {
        Ok(r) => r,
        Err(e) => {
            super::unreachable(&args.endpoint, &e);
            return Ok(());
        }
    };

    let exported: Vec<Value> = super::read_response("export", resp).await?;
    let text = serde_json::to_string_pretty(&exported)?;

    match &args.output {
        Some(file) => {
            std::fs::write(file, text)?;
            eprintln!("Exported {} entries to {}", exported.len(), file.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

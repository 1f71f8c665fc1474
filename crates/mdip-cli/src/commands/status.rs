//! `mdip status`: query the status of a running Gatekeeper node.

use clap::Args;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::DEFAULT_ENDPOINT;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    uptime_seconds: u64,
    dids: Option<DidsReport>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DidsReport {
    total: usize,
    by_type: ByType,
    by_registry: BTreeMap<String, usize>,
    by_version: BTreeMap<String, usize>,
    events_queue: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ByType {
    agents: usize,
    assets: usize,
    confirmed: usize,
    unconfirmed: usize,
    ephemeral: usize,
    invalid: usize,
}

pub async fn run(args: &StatusArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/status", args.endpoint);
    let resp = match reqwest::get(&url).await {
        Ok(r) => r,
        Err(e) => {
            super::unreachable(&args.endpoint, &e);
            return Ok(());
        }
    };

    let status: StatusResponse = super::read_response("status", resp).await?;
    println!("Node Status:");
    println!("  Uptime:       {}s", status.uptime_seconds);

    let Some(dids) = status.dids else {
        println!("  DIDs:         (no report yet)");
        return Ok(());
    };

    println!("  DIDs:         {}", dids.total);
    println!("    agents:       {}", dids.by_type.agents);
    println!("    assets:       {}", dids.by_type.assets);
    println!("    confirmed:    {}", dids.by_type.confirmed);
    println!("    unconfirmed:  {}", dids.by_type.unconfirmed);
    println!("    ephemeral:    {}", dids.by_type.ephemeral);
    println!("    invalid:      {}", dids.by_type.invalid);
    for (registry, count) in &dids.by_registry {
        println!("  Registry {:<12} {}", registry, count);
    }
    for (version, count) in &dids.by_version {
        println!("  Version {:<13} {}", version, count);
    }
    println!("  Events queue: {}", dids.events_queue.len());

    Ok(())
}

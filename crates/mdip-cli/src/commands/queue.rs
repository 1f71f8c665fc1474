//! `mdip queue`: show or clear the pending operations of a registry.

use clap::Args;
use serde_json::Value;

use super::DEFAULT_ENDPOINT;

#[derive(Args, Debug)]
pub struct QueueArgs {
    /// Registry whose queue to inspect.
    pub registry: String,

    /// Clear the operations shown from the queue.
    #[arg(long)]
    pub clear: bool,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

pub async fn run(args: &QueueArgs) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/queue/{}", args.endpoint, args.registry);
    let resp = match client.get(&url).send().await {
        Ok(r) => r,
        Err(e) => {
            super::unreachable(&args.endpoint, &e);
            return Ok(());
        }
    };

    let operations: Vec<Value> = super::read_response("queue", resp).await?;
    println!("Queue {} ({} operations):", args.registry, operations.len());
    for op in &operations {
        let kind = op.get("type").and_then(Value::as_str).unwrap_or("?");
        let did = op.get("did").and_then(Value::as_str).unwrap_or("(new)");
        println!("  {:<8} {}", kind, did);
    }

    if args.clear && !operations.is_empty() {
        let url = format!("{}/api/v1/queue/{}/clear", args.endpoint, args.registry);
        let resp = client.post(&url).json(&operations).send().await?;
        let cleared: bool = super::read_response("clear queue", resp).await?;
        println!("Cleared: {}", cleared);
    }

    Ok(())
}

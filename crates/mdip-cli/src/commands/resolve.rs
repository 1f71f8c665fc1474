//! `mdip resolve`: resolve a DID to its document.

use clap::Args;

use super::DEFAULT_ENDPOINT;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// The DID to resolve.
    pub did: String,

    /// Resolve the state as of this ISO-8601 time.
    #[arg(long)]
    pub version_time: Option<String>,

    /// Resolve a specific version (1-based).
    #[arg(long)]
    pub version_sequence: Option<u32>,

    /// Ignore operations not yet confirmed on the DID's registry.
    #[arg(long)]
    pub confirm: bool,

    /// Verify every signature in the log.
    #[arg(long)]
    pub verify: bool,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

pub async fn run(args: &ResolveArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/did/{}", args.endpoint, args.did);

    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(ref time) = args.version_time {
        query.push(("versionTime", time.clone()));
    }
    if let Some(seq) = args.version_sequence {
        query.push(("versionSequence", seq.to_string()));
    }
    if args.confirm {
        query.push(("confirm", "true".into()));
    }
    if args.verify {
        query.push(("verify", "true".into()));
    }

    let resp = match reqwest::Client::new().get(&url).query(&query).send().await {
        Ok(r) => r,
        Err(e) => {
            super::unreachable(&args.endpoint, &e);
            return Ok(());
        }
    };

    let doc: serde_json::Value = super::read_response("resolve", resp).await?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

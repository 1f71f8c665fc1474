//! `mdip verify-db`: re-verify stored DIDs and prune invalid ones.

use clap::Args;
use serde::Deserialize;

use super::DEFAULT_ENDPOINT;

#[derive(Args, Debug)]
pub struct VerifyDbArgs {
    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Deserialize)]
struct VerifyResponse {
    total: usize,
    verified: usize,
    expired: usize,
    invalid: usize,
}

pub async fn run(args: &VerifyDbArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/db/verify", args.endpoint);
    let resp = match reqwest::get(&url).await {
        Ok(r) => r,
        Err(e) => {
            super::unreachable(&args.endpoint, &e);
            return Ok(());
        }
    };

    let result: VerifyResponse = super::read_response("verify db", resp).await?;
    println!("Database verification:");
    println!("  Total:    {}", result.total);
    println!("  Verified: {}", result.verified);
    println!("  Expired:  {}", result.expired);
    println!("  Invalid:  {}", result.invalid);
    Ok(())
}

//! `mdip registries`: list the registries the node accepts.

use clap::Args;

use super::DEFAULT_ENDPOINT;

#[derive(Args, Debug)]
pub struct RegistriesArgs {
    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

pub async fn run(args: &RegistriesArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/registries", args.endpoint);
    let resp = match reqwest::get(&url).await {
        Ok(r) => r,
        Err(e) => {
            super::unreachable(&args.endpoint, &e);
            return Ok(());
        }
    };

    let registries: Vec<String> = super::read_response("registries", resp).await?;
    println!("Supported registries ({}):", registries.len());
    for registry in &registries {
        println!("  {}", registry);
    }
    Ok(())
}

pub mod export;
pub mod import;
pub mod process;
pub mod queue;
pub mod registries;
pub mod resolve;
pub mod status;
pub mod verify_db;

use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:4224";

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Decode a node response, turning HTTP errors into `anyhow` errors.
pub async fn read_response<T: DeserializeOwned>(what: &str, resp: reqwest::Response) -> anyhow::Result<T> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }
    if let Ok(err) = resp.json::<ErrorResponse>().await {
        anyhow::bail!("{} failed (HTTP {}): {}", what, status, err.error);
    } else {
        anyhow::bail!("{} failed (HTTP {})", what, status);
    }
}

pub fn unreachable(endpoint: &str, e: &reqwest::Error) {
    println!("Could not reach node at {}", endpoint);
    println!("  Error: {}", e);
    println!();
    println!("Is the node running? Start it with: mdip-node");
}

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

use docmirror_service::config::Config;

/// Asks the server at `addr`, or at the configured `bind` address, whether it is healthy.
pub fn healthcheck(config: Config, addr: Option<SocketAddr>, timeout: u64) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()?;

    let addr = match addr {
        Some(addr) => addr,
        None => config
            .bind
            .as_deref()
            .context("no `bind` address configured, pass `--addr`")?
            .parse()?,
    };

    let url = format!("http://{addr}/health-check");
    tracing::debug!("Sending request to: {url}");

    match client.get(url).send() {
        Ok(response) if response.status().is_success() => {
            println!("OK");
            Ok(())
        }
        Ok(response) => {
            println!("ERROR");
            Err(anyhow::anyhow!(
                "docmirror ({addr}) is unhealthy. Status: {}",
                response.status()
            ))
        }
        Err(error) => {
            println!("ERROR");
            Err(anyhow::anyhow!(
                "Failed to check docmirror ({addr}) health: {error}"
            ))
        }
    }
}

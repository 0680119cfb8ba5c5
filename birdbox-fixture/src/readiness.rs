use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr, bail};
use tokio_retry::{Retry, strategy::FixedInterval};
use tracing::{debug, info};

const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);
const READY_POLL_ATTEMPTS: usize = 120;

/// Poll the server's readiness endpoint until it answers 2xx.
pub async fn wait_until_ready(api_url: &str) -> Result<()> {
    wait_until_ready_with(api_url, READY_POLL_INTERVAL, READY_POLL_ATTEMPTS).await
}

pub async fn wait_until_ready_with(
    api_url: &str,
    interval: Duration,
    attempts: usize,
) -> Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{api_url}/v1/readyz");

    Retry::spawn(FixedInterval::new(interval).take(attempts), || {
        let client = client.clone();
        let url = url.clone();
        async move {
            let response = client
                .get(&url)
                .send()
                .await
                .wrap_err("server not reachable")?;

            let status = response.status();
            if !status.is_success() {
                bail!("readiness probe returned {status}");
            }

            debug!(%url, "readiness probe succeeded");
            Ok(())
        }
    })
    .await
    .wrap_err_with(|| format!("server at {api_url} never became ready"))?;

    info!(%api_url, "server ready");
    Ok(())
}

use std::collections::BTreeMap;
use std::time::Duration;

use birdbox::args::parse_args;
use birdbox::suite::run_suite;
use birdbox_client::{ApiClient, DEFAULT_API_TOKEN};
use birdbox_fixture::{BirdBox, StartConfig, env_file::load_env_file};
use color_eyre::eyre::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Queries and assertions all have to finish inside this window.
const SUITE_TIMEOUT: Duration = Duration::from_secs(60 * 5);

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    color_eyre::install()?;

    let args = parse_args();
    info!(?args, "Init");

    let env = load_env_file(&args.env_file)?;

    let config = StartConfig {
        db_type: args.db_type.as_str().to_string(),
        env,
        extra_env: BTreeMap::from([
            (
                "CUBEJS_SCHEDULED_REFRESH_DEFAULT".to_string(),
                "false".to_string(),
            ),
            ("CUBEJS_EXTERNAL_DEFAULT".to_string(), "true".to_string()),
        ]),
    };

    let birdbox = match BirdBox::start(args.mode.into(), &config).await {
        Ok(birdbox) => birdbox,
        Err(e) => {
            error!("failed to start {} server: {e:#}", config.db_type);
            return Err(e);
        }
    };
    info!(api_url = birdbox.api_url(), "server is up");

    let client = ApiClient::new(birdbox.api_url(), DEFAULT_API_TOKEN);

    let outcome = tokio::time::timeout(SUITE_TIMEOUT, run_suite(&client, args.db_type)).await;

    // The server goes down before the verdict is decided, pass or fail.
    let report = outcome.context("suite timed out");
    birdbox.stop().await?;

    report?.finish()
}

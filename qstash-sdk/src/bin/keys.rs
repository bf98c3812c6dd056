//! QStash Keys - fetch or rotate the signing keys.
//!
//! Usage: `qstash-keys [get|rotate]` (defaults to `get`).
//! The key pair is written to stdout as `QSTASH_CURRENT_SIGNING_KEY` /
//! `QSTASH_NEXT_SIGNING_KEY` lines. Logs go to stderr and never carry the
//! keys themselves.

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use qstash::{Config, QStash};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "get".to_string());

    let config = Config::from_env();
    info!(
        base_url = %config.base_url,
        retries = config.retries,
        command = %command,
        "config_loaded"
    );

    let client = QStash::from_config(&config).context("Failed to create QStash client")?;

    let key = match command.as_str() {
        "get" => client
            .signing_key()
            .get()
            .await
            .context("Failed to fetch signing keys")?,
        "rotate" => client
            .signing_key()
            .rotate()
            .await
            .context("Failed to rotate signing keys")?,
        other => bail!("unknown command: {} (expected get or rotate)", other),
    };

    info!(command = %command, "signing_keys_received");

    print!("{}", key.to_env());

    Ok(())
}

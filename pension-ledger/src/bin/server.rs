//! Pension ledger server binary

use pension_ledger::{Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting PensionRail ledger server");

    // Load configuration from the environment
    let config = Config::from_env()?;

    // Open ledger
    let ledger = Ledger::open(config).await?;
    tracing::info!(entries = ledger.entry_count()?, "Ledger opened successfully");

    // TODO: wire up the HTTP API once the gateway service lands
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down ledger server");
    ledger.shutdown().await?;
    Ok(())
}

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Use JSON logs in production (FARSIGHT_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("FARSIGHT_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env().add_directive("farsight_hub=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .init();
    }

    let config = farsight_hub::config::HubConfig::parse();
    tracing::info!("Starting signaling hub on {}", config.listen_addr);
    if let Some(ref url) = config.events_url {
        tracing::info!("Session event fan-out enabled -> {url}");
    }

    let server = farsight_hub::server::Server::new(config);
    server.run().await
}

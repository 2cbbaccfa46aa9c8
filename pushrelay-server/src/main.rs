use anyhow::Result;
use tokio::task::JoinSet;

use pushrelay_server::config::Config;
use pushrelay_server::relay;
use pushrelay_server::transport::{Transport, http::HttpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("pushrelay={}", config.log_level).parse()?)
                .add_directive(format!("pushrelay_server={}", config.log_level).parse()?),
        )
        .init();

    let relay = relay::create_relay(&config)?;

    let mut transport_tasks = JoinSet::new();

    let transport = HttpTransport::new(&config.http.host, config.http.port)?;
    let relay_handle = relay.clone();
    let host = config.http.host.clone();
    let port = config.http.port;
    transport_tasks.spawn(async move {
        tracing::info!("Starting HTTP transport on {}:{}", host, port);
        transport.start(relay_handle).await
    });

    tracing::info!(
        "pushrelay started, relaying to {} with {:?} decrement policy",
        config.upstream.url,
        config.cache.policy
    );
    tracing::info!(
        "Upstream timeout: {:?}, cache capacity: {}",
        config.upstream.timeout,
        config.cache.capacity
    );

    // The transport runs until it fails
    while let Some(result) = transport_tasks.join_next().await {
        match result {
            Ok(Ok(())) => {
                tracing::info!("Transport task completed successfully");
            }
            Ok(Err(e)) => {
                tracing::error!("Transport task failed: {}", e);
                return Err(e);
            }
            Err(e) => {
                tracing::error!("Transport task panicked: {}", e);
                return Err(anyhow::anyhow!("Transport task panicked"));
            }
        }
    }

    Ok(())
}

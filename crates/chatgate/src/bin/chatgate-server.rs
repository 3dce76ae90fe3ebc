use chatgate::{config, server, signal, telemetry};
use chatgate_std::env::SystemEnv;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::from_env_with_provider(&SystemEnv)?;
    telemetry::init_logger(config.prefix().as_str());

    info!(keys = config.api_keys().len(), "chatgate starting");

    let result = run(&config).await;

    telemetry::shutdown_otel();

    match &result {
        Ok(()) => info!("chatgate stopped"),
        Err(e) => error!(error = %e, "chatgate stopped with error"),
    }
    result
}

async fn run(config: &config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let client = chatgate_nats::connect(config.nats()).await?;
    let listener = server::bind(config).await?;

    server::serve(listener, client.clone(), config, signal::shutdown_signal()).await?;

    if let Err(e) = client.flush().await {
        error!(error = %e, "Failed to flush NATS client on shutdown");
    }
    Ok(())
}

use crate::bridge::Bridge;
use crate::config::Config;
use crate::http::{AppState, router};
use crate::metrics::Metrics;
use chatgate_nats::{FlushClient, PublishClient, RequestClient, SubscribeClient};
use chatgate_std::SystemClock;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

/// Serves the chat API on `listener` until `shutdown` resolves. In-flight
/// streams are allowed to finish.
pub async fn serve<N, F>(
    listener: TcpListener,
    client: N,
    config: &Config,
    shutdown: F,
) -> std::io::Result<()>
where
    N: SubscribeClient + PublishClient + FlushClient + RequestClient,
    F: Future<Output = ()> + Send + 'static,
{
    let meter = opentelemetry::global::meter("chatgate");
    let bridge = Bridge::new(
        client,
        config.prefix().clone(),
        config.store_timeout(),
        SystemClock,
        Metrics::new(&meter),
    );
    let app = router(AppState::new(bridge, config), config.max_body_bytes());

    info!(addr = %listener.local_addr()?, prefix = %config.prefix(), "Chat API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

pub async fn bind(config: &Config) -> std::io::Result<TcpListener> {
    TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], config.port()))).await
}

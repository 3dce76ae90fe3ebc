use crate::auth::{NatsAuth, NatsConfig};
use async_nats::{Client, ConnectOptions, Event};
use std::time::Duration;
use tracing::{info, instrument, warn};

#[derive(Debug)]
pub enum ConnectError {
    InvalidCredentials(std::io::Error),
    ConnectionFailed {
        servers: Vec<String>,
        error: async_nats::ConnectError,
    },
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredentials(e) => write!(f, "Failed to load credentials file: {}", e),
            Self::ConnectionFailed { servers, error } => {
                write!(f, "Failed to connect to NATS servers {:?}: {}", servers, error)
            }
        }
    }
}

impl std::error::Error for ConnectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidCredentials(e) => Some(e),
            Self::ConnectionFailed { error, .. } => Some(error),
        }
    }
}

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

fn reconnect_delay(attempts: usize) -> Duration {
    let exp = u32::try_from(attempts).unwrap_or(u32::MAX);
    let delay = Duration::from_secs(std::cmp::min(
        MAX_RECONNECT_DELAY.as_secs(),
        2u64.saturating_pow(exp),
    ));
    info!(attempts, delay_secs = delay.as_secs(), "NATS reconnect delay");
    delay
}

async fn handle_event(event: Event) {
    match event {
        Event::Connected => info!("NATS connected"),
        Event::Disconnected => warn!("NATS disconnected, open subscriptions stall until reconnect"),
        Event::ServerError(err) => warn!(error = %err, "NATS server error"),
        Event::ClientError(err) => warn!(error = %err, "NATS client error"),
        Event::SlowConsumer(sid) => warn!(sid, "NATS slow consumer detected"),
        Event::LameDuckMode => warn!("NATS server entering lame duck mode"),
        Event::Closed => info!("NATS connection closed"),
        Event::Draining => info!("NATS connection draining"),
    }
}

fn apply_options(opts: ConnectOptions, config: &NatsConfig) -> ConnectOptions {
    opts.name(config.client_name.clone())
        .retry_on_initial_connect()
        .connection_timeout(config.connection_timeout)
        .reconnect_delay_callback(reconnect_delay)
        .event_callback(|event| async move { handle_event(event).await })
}

/// Connects with automatic reconnection and connection event logging.
#[instrument(name = "nats.connect", skip(config), fields(servers = ?config.servers, auth = %config.auth.description()))]
pub async fn connect(config: &NatsConfig) -> Result<Client, ConnectError> {
    info!("Connecting to NATS");

    let options = match &config.auth {
        NatsAuth::Credentials(path) => {
            info!(path = %path.display(), "Using credentials file");
            ConnectOptions::with_credentials_file(path.clone())
                .await
                .map_err(|e| {
                    warn!(error = %e, path = %path.display(), "Failed to load credentials file");
                    ConnectError::InvalidCredentials(e)
                })?
        }
        NatsAuth::NKey(seed) => ConnectOptions::with_nkey(seed.clone()),
        NatsAuth::UserPassword { user, password } => {
            ConnectOptions::with_user_and_password(user.clone(), password.clone())
        }
        NatsAuth::Token(token) => ConnectOptions::with_token(token.clone()),
        NatsAuth::None => ConnectOptions::new(),
    };

    match apply_options(options, config).connect(&config.servers).await {
        Ok(client) => {
            info!("Connected to NATS");
            Ok(client)
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS");
            Err(ConnectError::ConnectionFailed {
                servers: config.servers.clone(),
                error: e,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_delay_doubles_from_one_second() {
        assert_eq!(reconnect_delay(0).as_secs(), 1);
        assert_eq!(reconnect_delay(1).as_secs(), 2);
        assert_eq!(reconnect_delay(2).as_secs(), 4);
        assert_eq!(reconnect_delay(4).as_secs(), 16);
    }

    #[test]
    fn reconnect_delay_caps_at_max() {
        assert_eq!(reconnect_delay(5), MAX_RECONNECT_DELAY);
        assert_eq!(reconnect_delay(100), MAX_RECONNECT_DELAY);
        assert_eq!(reconnect_delay(usize::MAX), MAX_RECONNECT_DELAY);
    }

    #[tokio::test]
    async fn handle_event_accepts_every_variant() {
        use async_nats::{ClientError, ServerError};

        handle_event(Event::Connected).await;
        handle_event(Event::Disconnected).await;
        handle_event(Event::ServerError(ServerError::Other("test".to_string()))).await;
        handle_event(Event::ClientError(ClientError::Other("test".to_string()))).await;
        handle_event(Event::SlowConsumer(42)).await;
        handle_event(Event::LameDuckMode).await;
        handle_event(Event::Closed).await;
        handle_event(Event::Draining).await;
    }

    #[test]
    fn invalid_credentials_error_keeps_source() {
        let err = ConnectError::InvalidCredentials(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(err.to_string().contains("Failed to load credentials file"));
        assert!(err.to_string().contains("file not found"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn missing_credentials_file_fails_before_connecting() {
        let config = NatsConfig::new(
            vec!["localhost:1".to_string()],
            NatsAuth::Credentials("/nonexistent/chatgate.creds".into()),
        );

        let err = connect(&config).await.unwrap_err();
        assert!(matches!(err, ConnectError::InvalidCredentials(_)));
    }
}

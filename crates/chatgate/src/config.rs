//! Configuration for the chatgate server.
//!
//! CLI flags win over environment variables, which win over defaults.
//! Invalid numeric values are logged and ignored.

use crate::auth::ApiKeys;
use crate::token::{SubjectPrefix, TokenError};
use chatgate_nats::NatsConfig;
use chatgate_std::env::ReadEnv;
use clap::Parser;
use std::time::Duration;
use tracing::warn;

const DEFAULT_PREFIX: &str = "chatgate";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(7200);
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const MIN_TIMEOUT_SECS: u64 = 1;

const ENV_PREFIX: &str = "CHATGATE_PREFIX";
const ENV_PORT: &str = "CHATGATE_PORT";
const ENV_RESPONSE_TIMEOUT_SECS: &str = "CHATGATE_RESPONSE_TIMEOUT_SECS";
const ENV_STORE_TIMEOUT_SECS: &str = "CHATGATE_STORE_TIMEOUT_SECS";
const ENV_API_KEYS: &str = "CHATGATE_API_KEYS";

#[derive(Parser, Debug, Default)]
#[command(name = "chatgate-server")]
#[command(about = "Chat-completion API in front of a NATS worker pool", long_about = None)]
pub struct Args {
    /// NATS subject prefix.
    #[arg(long)]
    pub prefix: Option<String>,
    /// HTTP listen port.
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) prefix: SubjectPrefix,
    pub(crate) nats: NatsConfig,
    pub(crate) port: u16,
    pub(crate) response_timeout: Duration,
    pub(crate) store_timeout: Duration,
    pub(crate) max_body_bytes: usize,
    pub(crate) api_keys: ApiKeys,
}

impl Config {
    pub fn new(prefix: impl AsRef<str>, nats: NatsConfig) -> Result<Self, TokenError> {
        Ok(Self {
            prefix: SubjectPrefix::new(prefix)?,
            nats,
            port: DEFAULT_PORT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            api_keys: ApiKeys::default(),
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Deadline for one inbound request, streaming or blocking.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    pub fn with_api_keys(mut self, keys: ApiKeys) -> Self {
        self.api_keys = keys;
        self
    }

    pub fn prefix(&self) -> &SubjectPrefix {
        &self.prefix
    }

    pub fn nats(&self) -> &NatsConfig {
        &self.nats
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn api_keys(&self) -> &ApiKeys {
        &self.api_keys
    }

    #[cfg(test)]
    pub fn for_test() -> Self {
        Self {
            prefix: SubjectPrefix::new(DEFAULT_PREFIX).unwrap(),
            nats: NatsConfig::from_url("localhost:4222"),
            port: DEFAULT_PORT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            api_keys: ApiKeys::default(),
        }
    }
}

pub fn from_env_with_provider<E: ReadEnv>(env: &E) -> Result<Config, TokenError> {
    from_args(Args::parse(), env)
}

pub fn from_args<E: ReadEnv>(args: Args, env: &E) -> Result<Config, TokenError> {
    let prefix = args
        .prefix
        .or_else(|| env.var(ENV_PREFIX).ok())
        .unwrap_or_else(|| DEFAULT_PREFIX.to_string());
    let mut config = Config::new(prefix, NatsConfig::from_env(env))?;

    match (args.port, env.parsed::<u16>(ENV_PORT)) {
        (Some(port), _) | (None, Some(Ok(port))) => config = config.with_port(port),
        (None, Some(Err(raw))) => {
            warn!("{ENV_PORT}={raw:?} is not a valid port, using default");
        }
        (None, None) => {}
    }

    if let Some(timeout) = timeout_from_env(env, ENV_RESPONSE_TIMEOUT_SECS) {
        config = config.with_response_timeout(timeout);
    }
    if let Some(timeout) = timeout_from_env(env, ENV_STORE_TIMEOUT_SECS) {
        config = config.with_store_timeout(timeout);
    }

    if let Ok(raw) = env.var(ENV_API_KEYS) {
        let (keys, rejected) = ApiKeys::parse(&raw);
        for token in rejected {
            warn!(token_prefix = %token.chars().take(4).collect::<String>(), "{ENV_API_KEYS} entry is malformed, skipping");
        }
        config = config.with_api_keys(keys);
    }

    Ok(config)
}

fn timeout_from_env<E: ReadEnv>(env: &E, key: &str) -> Option<Duration> {
    match env.parsed::<u64>(key)? {
        Ok(secs) if secs >= MIN_TIMEOUT_SECS => Some(Duration::from_secs(secs)),
        Ok(secs) => {
            warn!("{key}={secs} is below minimum ({MIN_TIMEOUT_SECS}), using default");
            None
        }
        Err(raw) => {
            warn!("{key}={raw:?} is not a valid integer, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
    use chatgate_std::env::InMemoryEnv;

    fn config_from_env(env: &InMemoryEnv) -> Config {
        from_args(Args::default(), env).unwrap()
    }

    #[test]
    fn defaults() {
        let config = config_from_env(&InMemoryEnv::new());

        assert_eq!(config.prefix().as_str(), DEFAULT_PREFIX);
        assert_eq!(config.port(), DEFAULT_PORT);
        assert_eq!(config.response_timeout(), DEFAULT_RESPONSE_TIMEOUT);
        assert_eq!(config.store_timeout(), DEFAULT_STORE_TIMEOUT);
        assert_eq!(config.max_body_bytes(), DEFAULT_MAX_BODY_BYTES);
        assert!(config.api_keys().is_empty());
        assert_eq!(config.nats().servers, vec!["localhost:4222"]);
    }

    #[test]
    fn args_override_env() {
        let env = InMemoryEnv::new();
        env.set(ENV_PREFIX, "env-prefix");
        env.set(ENV_PORT, "9000");

        let config = from_args(
            Args {
                prefix: Some("cli-prefix".into()),
                port: Some(9100),
            },
            &env,
        )
        .unwrap();

        assert_eq!(config.prefix().as_str(), "cli-prefix");
        assert_eq!(config.port(), 9100);
    }

    #[test]
    fn env_values_apply() {
        let env = InMemoryEnv::new();
        env.set(ENV_PREFIX, "staging.chatgate");
        env.set(ENV_PORT, "9000");
        env.set(ENV_RESPONSE_TIMEOUT_SECS, "300");
        env.set(ENV_STORE_TIMEOUT_SECS, "2");
        env.set(ENV_API_KEYS, "sk-a=alice");

        let config = config_from_env(&env);

        assert_eq!(config.prefix().as_str(), "staging.chatgate");
        assert_eq!(config.port(), 9000);
        assert_eq!(config.response_timeout(), Duration::from_secs(300));
        assert_eq!(config.store_timeout(), Duration::from_secs(2));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer sk-a"));
        assert_eq!(config.api_keys().authenticate(&headers).unwrap().as_str(), "alice");
    }

    #[test]
    fn invalid_numbers_keep_defaults() {
        let env = InMemoryEnv::new();
        env.set(ENV_PORT, "http");
        env.set(ENV_RESPONSE_TIMEOUT_SECS, "0");
        env.set(ENV_STORE_TIMEOUT_SECS, "soon");

        let config = config_from_env(&env);

        assert_eq!(config.port(), DEFAULT_PORT);
        assert_eq!(config.response_timeout(), DEFAULT_RESPONSE_TIMEOUT);
        assert_eq!(config.store_timeout(), DEFAULT_STORE_TIMEOUT);
    }

    #[test]
    fn invalid_prefix_is_rejected() {
        let env = InMemoryEnv::new();
        env.set(ENV_PREFIX, "chat*");

        let err = from_args(Args::default(), &env).unwrap_err();
        assert_eq!(err.to_string(), "prefix contains invalid character: '*'");
    }

    #[test]
    fn builders_override_defaults() {
        let config = Config::for_test()
            .with_port(1)
            .with_max_body_bytes(64)
            .with_response_timeout(Duration::from_secs(5));

        assert_eq!(config.port(), 1);
        assert_eq!(config.max_body_bytes(), 64);
        assert_eq!(config.response_timeout(), Duration::from_secs(5));
    }
}

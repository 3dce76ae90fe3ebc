use chatgate_std::env::ReadEnv;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const ENV_NATS_URL: &str = "NATS_URL";
const ENV_NATS_CREDS: &str = "NATS_CREDS";
const ENV_NATS_NKEY: &str = "NATS_NKEY";
const ENV_NATS_USER: &str = "NATS_USER";
const ENV_NATS_PASSWORD: &str = "NATS_PASSWORD";
const ENV_NATS_TOKEN: &str = "NATS_TOKEN";
const ENV_NATS_CONNECT_TIMEOUT_SECS: &str = "NATS_CONNECT_TIMEOUT_SECS";

const DEFAULT_NATS_URL: &str = "localhost:4222";
const DEFAULT_CLIENT_NAME: &str = "chatgate";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MIN_CONNECT_TIMEOUT_SECS: u64 = 1;

/// How the client authenticates to the NATS servers.
///
/// Resolved from the environment in this order:
/// `NATS_CREDS` > `NATS_NKEY` > `NATS_USER` + `NATS_PASSWORD` > `NATS_TOKEN` > none.
#[derive(Debug, Clone)]
pub enum NatsAuth {
    Credentials(PathBuf),
    NKey(String),
    UserPassword { user: String, password: String },
    Token(String),
    None,
}

impl NatsAuth {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Credentials(_) => "credentials file",
            Self::NKey(_) => "NKey",
            Self::UserPassword { .. } => "user/password",
            Self::Token(_) => "token",
            Self::None => "none",
        }
    }

    fn from_env<E: ReadEnv>(env: &E) -> Self {
        if let Ok(path) = env.var(ENV_NATS_CREDS) {
            return Self::Credentials(PathBuf::from(path));
        }
        if let Ok(seed) = env.var(ENV_NATS_NKEY) {
            return Self::NKey(seed);
        }
        if let (Ok(user), Ok(password)) = (env.var(ENV_NATS_USER), env.var(ENV_NATS_PASSWORD)) {
            return Self::UserPassword { user, password };
        }
        if let Ok(token) = env.var(ENV_NATS_TOKEN) {
            return Self::Token(token);
        }
        Self::None
    }
}

#[derive(Debug, Clone)]
pub struct NatsConfig {
    pub servers: Vec<String>,
    pub auth: NatsAuth,
    /// Client name reported to the server (shows up in `nats server report connections`).
    pub client_name: String,
    pub connection_timeout: Duration,
}

impl NatsConfig {
    pub fn new(servers: Vec<String>, auth: NatsAuth) -> Self {
        Self {
            servers,
            auth,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self::new(vec![url.into()], NatsAuth::None)
    }

    /// Reads `NATS_URL` (comma separated, default `localhost:4222`), the auth
    /// variables and `NATS_CONNECT_TIMEOUT_SECS`.
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        let raw = env
            .var(ENV_NATS_URL)
            .unwrap_or_else(|_| DEFAULT_NATS_URL.to_string());
        let servers = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let mut config = Self::new(servers, NatsAuth::from_env(env));
        match env.parsed::<u64>(ENV_NATS_CONNECT_TIMEOUT_SECS) {
            Some(Ok(secs)) if secs >= MIN_CONNECT_TIMEOUT_SECS => {
                config.connection_timeout = Duration::from_secs(secs);
            }
            Some(Ok(secs)) => warn!(
                "{ENV_NATS_CONNECT_TIMEOUT_SECS}={secs} is below minimum ({MIN_CONNECT_TIMEOUT_SECS}), using default"
            ),
            Some(Err(raw)) => warn!(
                "{ENV_NATS_CONNECT_TIMEOUT_SECS}={raw:?} is not a valid integer, using default"
            ),
            None => {}
        }
        config
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_std::env::InMemoryEnv;

    #[test]
    fn defaults_without_environment() {
        let config = NatsConfig::from_env(&InMemoryEnv::new());

        assert_eq!(config.servers, vec!["localhost:4222"]);
        assert!(matches!(config.auth, NatsAuth::None));
        assert_eq!(config.client_name, "chatgate");
        assert_eq!(config.connection_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn server_list_is_trimmed_and_skips_blanks() {
        let env = InMemoryEnv::new();
        env.set("NATS_URL", " nats-a:4222 ,, nats-b:4222 ");

        assert_eq!(
            NatsConfig::from_env(&env).servers,
            vec!["nats-a:4222", "nats-b:4222"]
        );
    }

    #[test]
    fn auth_priority_follows_documented_order() {
        let env = InMemoryEnv::new();
        env.set("NATS_TOKEN", "tok");
        assert!(matches!(NatsConfig::from_env(&env).auth, NatsAuth::Token(t) if t == "tok"));

        env.set("NATS_USER", "gate");
        assert!(
            matches!(NatsConfig::from_env(&env).auth, NatsAuth::Token(_)),
            "user without password must not win over token"
        );

        env.set("NATS_PASSWORD", "secret");
        assert!(matches!(
            NatsConfig::from_env(&env).auth,
            NatsAuth::UserPassword { user, password } if user == "gate" && password == "secret"
        ));

        env.set("NATS_NKEY", "SUAK");
        assert!(matches!(NatsConfig::from_env(&env).auth, NatsAuth::NKey(k) if k == "SUAK"));

        env.set("NATS_CREDS", "/etc/nats/gate.creds");
        assert!(matches!(
            NatsConfig::from_env(&env).auth,
            NatsAuth::Credentials(p) if p == std::path::Path::new("/etc/nats/gate.creds")
        ));
    }

    #[test]
    fn connect_timeout_from_env_respects_minimum() {
        let env = InMemoryEnv::new();
        env.set("NATS_CONNECT_TIMEOUT_SECS", "25");
        assert_eq!(
            NatsConfig::from_env(&env).connection_timeout,
            Duration::from_secs(25)
        );

        env.set("NATS_CONNECT_TIMEOUT_SECS", "0");
        assert_eq!(
            NatsConfig::from_env(&env).connection_timeout,
            DEFAULT_CONNECT_TIMEOUT
        );

        env.set("NATS_CONNECT_TIMEOUT_SECS", "soon");
        assert_eq!(
            NatsConfig::from_env(&env).connection_timeout,
            DEFAULT_CONNECT_TIMEOUT
        );
    }

    #[test]
    fn builders_override_defaults() {
        let config = NatsConfig::from_url("nats://bus:4222")
            .with_client_name("chatgate-e2e")
            .with_connection_timeout(Duration::from_secs(3));

        assert_eq!(config.servers, vec!["nats://bus:4222"]);
        assert_eq!(config.client_name, "chatgate-e2e");
        assert_eq!(config.connection_timeout, Duration::from_secs(3));
    }

    #[test]
    fn description_matches_variant() {
        assert_eq!(NatsAuth::Credentials("/a".into()).description(), "credentials file");
        assert_eq!(NatsAuth::NKey("k".into()).description(), "NKey");
        assert_eq!(
            NatsAuth::UserPassword {
                user: "u".into(),
                password: "p".into()
            }
            .description(),
            "user/password"
        );
        assert_eq!(NatsAuth::Token("t".into()).description(), "token");
        assert_eq!(NatsAuth::None.description(), "none");
    }
}

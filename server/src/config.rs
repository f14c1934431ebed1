//! Configuration management for the relay server.
//!
//! Loads configuration from environment variables with sensible defaults.

use relay_auth::login::{LOGIN_LINK_ACTION, VERIFY_ACTION};
use relay_auth::token_store::DEFAULT_TOKEN_TTL;
use relay_auth::providers::{ConsoleEmailSender, Mailer, SmtpEmailSender, SmtpSettings};
use relay_auth::{LoginLinkConfig, RateLimitPolicy, RateLimiter};
use relay_core::environment::Clock;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Rate-limit action guarding the LLM proxy.
pub const LLM_ACTION: &str = "llm";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Login-link configuration
    pub login: LoginConfig,
    /// Rate-limit ceilings per action
    pub rate_limits: RateLimitsConfig,
    /// Background sweeper configuration
    pub sweeper: SweeperConfig,
    /// Upstream completion API configuration
    pub llm: LlmConfig,
    /// Outbound email configuration
    pub email: EmailConfig,
    /// Public settings handed to browser clients
    pub client: ClientConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Deployment environment name (e.g., "development", "production")
    pub environment: String,
    /// Origins allowed by CORS
    pub cors_allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// `host:port` to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Login-link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Base URL of the client application
    pub base_url: String,
    /// Client page that redeems tokens
    pub verify_path: String,
    /// Token lifetime in seconds
    pub token_ttl_secs: i64,
}

impl LoginConfig {
    /// Token lifetime.
    ///
    /// Values outside the representable range fall back to the default.
    #[must_use]
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.token_ttl_secs).unwrap_or(DEFAULT_TOKEN_TTL)
    }

    /// Library-level configuration for the login-link service.
    #[must_use]
    pub fn link_config(&self) -> LoginLinkConfig {
        LoginLinkConfig::new(self.base_url.clone())
            .with_verify_path(self.verify_path.clone())
    }
}

/// A single action's ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitConfig {
    /// Requests admitted per window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl LimitConfig {
    /// Convert to a limiter policy.
    #[must_use]
    pub const fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(Duration::from_secs(self.window_secs), self.max_requests)
    }
}

/// Rate-limit ceilings per action
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitsConfig {
    /// Login-link issuance, per client and identity
    pub login_link: LimitConfig,
    /// Token redemption, per client
    pub verify: LimitConfig,
    /// LLM proxy and any other action, per client
    pub api: LimitConfig,
}

impl RateLimitsConfig {
    /// Build a limiter with one policy per action.
    ///
    /// Actions without their own policy fall back to the `api` ceiling.
    #[must_use]
    pub fn build_limiter(&self, clock: Arc<dyn Clock>) -> RateLimiter {
        RateLimiter::new(clock, self.api.policy())
            .with_policy(LOGIN_LINK_ACTION, self.login_link.policy())
            .with_policy(VERIFY_ACTION, self.verify.policy())
            .with_policy(LLM_ACTION, self.api.policy())
    }
}

/// Background sweeper configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Seconds between sweep passes
    pub interval_secs: u64,
}

impl SweeperConfig {
    /// Time between sweep passes.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Upstream completion API configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Bearer key; the proxy answers `500` without one
    pub api_key: Option<String>,
    /// API root, `/chat/completions` is appended
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Whether an API key is configured.
    #[must_use]
    pub const fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Upstream request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Outbound email configuration
///
/// SMTP is used only when both `smtp_host` and `from` are set.
#[derive(Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP server host
    pub smtp_host: Option<String>,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP username
    pub smtp_username: Option<String>,
    /// SMTP password
    pub smtp_password: Option<String>,
    /// Sender address
    pub from: Option<String>,
}

impl EmailConfig {
    /// SMTP settings, if SMTP delivery is configured.
    #[must_use]
    pub fn smtp_settings(&self) -> Option<SmtpSettings> {
        let host = self.smtp_host.clone()?;
        let from = self.from.clone()?;

        Some(SmtpSettings {
            host,
            port: self.smtp_port,
            username: self.smtp_username.clone(),
            password: self.smtp_password.clone(),
            from,
        })
    }

    /// Build the mailer: SMTP when configured, the console otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`relay_auth::AuthError::Configuration`] if the SMTP settings
    /// are unusable.
    pub fn build_mailer(&self) -> relay_auth::Result<Mailer> {
        match self.smtp_settings() {
            Some(settings) => Ok(Mailer::Smtp(SmtpEmailSender::new(&settings)?)),
            None => Ok(Mailer::Console(ConsoleEmailSender::new())),
        }
    }
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &self.smtp_password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .finish()
    }
}

/// Public settings handed to browser clients
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Client API key
    pub api_key: Option<String>,
    /// Auth domain
    pub auth_domain: Option<String>,
    /// Project ID
    pub project_id: Option<String>,
    /// Storage bucket
    pub storage_bucket: Option<String>,
    /// Messaging sender ID
    pub messaging_sender_id: Option<String>,
    /// App ID
    pub app_id: Option<String>,
    /// Measurement ID
    pub measurement_id: Option<String>,
}

impl ClientConfig {
    /// Names of the settings that are not configured.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("apiKey", &self.api_key),
            ("authDomain", &self.auth_domain),
            ("projectId", &self.project_id),
            ("storageBucket", &self.storage_bucket),
            ("messagingSenderId", &self.messaging_sender_id),
            ("appId", &self.app_id),
            ("measurementId", &self.measurement_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Falls back to defaults if environment variables are not set.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Empty values are treated as unset.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let string = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());
        let limit = |max_key: &str, window_key: &str, max: u32, window_secs: u64| LimitConfig {
            max_requests: var(max_key).and_then(|s| s.parse().ok()).unwrap_or(max),
            window_secs: var(window_key)
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(window_secs),
        };

        Self {
            server: ServerConfig {
                host: string("HOST", "0.0.0.0"),
                port: var("PORT").and_then(|s| s.parse().ok()).unwrap_or(5000),
                environment: var("NODE_ENV")
                    .or_else(|| var("APP_ENV"))
                    .unwrap_or_else(|| "development".to_string()),
                cors_allowed_origins: string(
                    "CORS_ALLOWED_ORIGINS",
                    "http://localhost:3000,http://localhost:3001,http://localhost:5000",
                )
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect(),
            },
            login: LoginConfig {
                base_url: string("LOGIN_LINK_BASE_URL", "http://localhost:3000"),
                verify_path: string("LOGIN_LINK_VERIFY_PATH", "/auth/verify"),
                token_ttl_secs: var("LOGIN_TOKEN_TTL_SECS")
                    .and_then(|s| s.parse().ok())
                    .filter(|secs| *secs > 0 && chrono::Duration::try_seconds(*secs).is_some())
                    .unwrap_or(3600),
            },
            rate_limits: RateLimitsConfig {
                login_link: limit("LOGIN_RATE_LIMIT_MAX", "LOGIN_RATE_LIMIT_WINDOW_SECS", 5, 600),
                verify: limit("VERIFY_RATE_LIMIT_MAX", "VERIFY_RATE_LIMIT_WINDOW_SECS", 20, 600),
                api: limit("API_RATE_LIMIT_MAX", "API_RATE_LIMIT_WINDOW_SECS", 60, 60),
            },
            sweeper: SweeperConfig {
                interval_secs: var("SWEEP_INTERVAL_SECS")
                    .and_then(|s| s.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(300),
            },
            llm: LlmConfig {
                api_key: var("LLM_API_KEY").or_else(|| var("GROQ_API_KEY")),
                base_url: string("LLM_BASE_URL", "https://api.groq.com/openai/v1"),
                timeout_secs: var("LLM_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(30),
            },
            email: EmailConfig {
                smtp_host: var("SMTP_HOST"),
                smtp_port: var("SMTP_PORT").and_then(|s| s.parse().ok()).unwrap_or(587),
                smtp_username: var("SMTP_USERNAME"),
                smtp_password: var("SMTP_PASSWORD"),
                from: var("EMAIL_FROM"),
            },
            client: ClientConfig {
                api_key: var("CLIENT_API_KEY"),
                auth_domain: var("CLIENT_AUTH_DOMAIN"),
                project_id: var("CLIENT_PROJECT_ID"),
                storage_bucket: var("CLIENT_STORAGE_BUCKET"),
                messaging_sender_id: var("CLIENT_MESSAGING_SENDER_ID"),
                app_id: var("CLIENT_APP_ID"),
                measurement_id: var("CLIENT_MEASUREMENT_ID"),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);

        assert_eq!(config.server.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.server.environment, "development");
        assert_eq!(config.server.cors_allowed_origins.len(), 3);
        assert_eq!(config.login.token_ttl(), chrono::Duration::hours(1));
        assert_eq!(config.rate_limits.login_link, LimitConfig { max_requests: 5, window_secs: 600 });
        assert_eq!(config.rate_limits.verify, LimitConfig { max_requests: 20, window_secs: 600 });
        assert_eq!(config.rate_limits.api, LimitConfig { max_requests: 60, window_secs: 60 });
        assert_eq!(config.sweeper.interval(), Duration::from_secs(300));
        assert!(!config.llm.has_api_key());
        assert_eq!(config.llm.timeout(), Duration::from_secs(30));
        assert!(config.email.smtp_settings().is_none());
        assert_eq!(config.client.missing().len(), 7);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("APP_ENV", "staging"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
            ("LOGIN_RATE_LIMIT_MAX", "3"),
            ("LLM_TIMEOUT_SECS", "5"),
        ]);

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, "staging");
        assert_eq!(
            config.server.cors_allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.rate_limits.login_link.max_requests, 3);
        assert_eq!(config.rate_limits.login_link.window_secs, 600);
        assert_eq!(config.llm.timeout_secs, 5);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = config_from(&[
            ("PORT", "eighty"),
            ("SWEEP_INTERVAL_SECS", "0"),
            ("LOGIN_TOKEN_TTL_SECS", "10000000000000000"),
            ("API_RATE_LIMIT_WINDOW_SECS", "0"),
            ("LLM_TIMEOUT_SECS", "0"),
        ]);

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.sweeper.interval_secs, 300);
        assert_eq!(config.login.token_ttl_secs, 3600);
        assert_eq!(config.login.token_ttl(), chrono::Duration::hours(1));
        assert_eq!(config.rate_limits.api.window_secs, 60);
        assert_eq!(config.llm.timeout_secs, 30);
    }

    #[test]
    fn test_out_of_range_ttl_field_uses_default() {
        let login = LoginConfig {
            base_url: "http://localhost:3000".to_string(),
            verify_path: "/auth/verify".to_string(),
            token_ttl_secs: i64::MAX,
        };
        assert_eq!(login.token_ttl(), DEFAULT_TOKEN_TTL);
    }

    #[test]
    fn test_llm_key_fallback() {
        let config = config_from(&[("GROQ_API_KEY", "gsk_fallback")]);
        assert_eq!(config.llm.api_key.as_deref(), Some("gsk_fallback"));

        let config = config_from(&[("LLM_API_KEY", "primary"), ("GROQ_API_KEY", "fallback")]);
        assert_eq!(config.llm.api_key.as_deref(), Some("primary"));

        let config = config_from(&[("LLM_API_KEY", "  ")]);
        assert!(!config.llm.has_api_key());
    }

    #[test]
    fn test_llm_key_redacted_in_debug() {
        let config = config_from(&[("LLM_API_KEY", "sk-secret")]);
        assert!(!format!("{:?}", config.llm).contains("sk-secret"));
    }

    #[test]
    fn test_smtp_requires_host_and_sender() {
        let config = config_from(&[("SMTP_HOST", "smtp.example.com")]);
        assert!(config.email.smtp_settings().is_none());
        assert_eq!(config.email.build_mailer().unwrap().kind(), "console");

        let config = config_from(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "465"),
            ("EMAIL_FROM", "Relay <noreply@example.com>"),
        ]);
        let settings = config.email.smtp_settings().unwrap();
        assert_eq!(settings.port, 465);
        assert_eq!(settings.from, "Relay <noreply@example.com>");
    }

    #[test]
    fn test_client_config_missing() {
        let config = config_from(&[
            ("CLIENT_API_KEY", "k"),
            ("CLIENT_AUTH_DOMAIN", "d"),
            ("CLIENT_PROJECT_ID", "p"),
            ("CLIENT_STORAGE_BUCKET", "b"),
            ("CLIENT_MESSAGING_SENDER_ID", "s"),
            ("CLIENT_APP_ID", "a"),
        ]);

        assert_eq!(config.client.missing(), vec!["measurementId"]);
    }

    #[test]
    fn test_limiter_policies() {
        let config = config_from(&[]);
        let limiter = config
            .rate_limits
            .build_limiter(Arc::new(relay_core::environment::SystemClock));

        assert_eq!(limiter.policy(LOGIN_LINK_ACTION).max_requests, 5);
        assert_eq!(limiter.policy(VERIFY_ACTION).max_requests, 20);
        assert_eq!(limiter.policy(LLM_ACTION).max_requests, 60);
        assert_eq!(limiter.policy("unknown").window, Duration::from_secs(60));
    }
}

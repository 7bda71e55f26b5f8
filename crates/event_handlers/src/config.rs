use chrono::Duration;
use std::str::FromStr;
use verification_tokens::{DEFAULT_TOKEN_TTL_SECONDS, LinkConfig};

const DEFAULT_FROM_EMAIL: &str = "no-reply@localhost";
const DEFAULT_DOMAIN: &str = "localhost";
const DEFAULT_SCHEME: &str = "https";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE_URL: &str = "postgres://localhost/verification";
const DEFAULT_API_KEY_VAR: &str = "SENDGRID_API_KEY";
const MAX_TOKEN_TTL_SECONDS: i64 = 86_400;

/// Invalid configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable held a value that could not be interpreted.
    #[error("Invalid value {value:?} for {key}")]
    InvalidValue {
        /// Name of the variable
        key: &'static str,
        /// Offending value
        value: String,
    },
}

/// Where verification tokens are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStoreKind {
    /// PostgreSQL `verification_tokens` table
    Postgres,
    /// Process memory, lost on exit
    Memory,
}

impl FromStr for TokenStoreKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

/// Which provider delivers email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailProvider {
    /// SendGrid v3 API
    SendGrid,
    /// Amazon SES
    Ses,
}

impl FromStr for EmailProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sendgrid" => Ok(Self::SendGrid),
            "ses" => Ok(Self::Ses),
            _ => Err(()),
        }
    }
}

/// Configuration of the dispatcher, built once at startup.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Sender identity of verification emails
    pub from_email: String,
    /// Target of verification links
    pub link: LinkConfig,
    /// Validity window of issued tokens
    pub token_ttl: Duration,
    /// Connection string of the token database
    pub database_url: String,
    /// Token storage backend
    pub token_store: TokenStoreKind,
    /// Email delivery backend
    pub email_provider: EmailProvider,
    /// Name of the variable holding the SendGrid API key
    pub sendgrid_api_key_var: String,
}

impl DispatchConfig {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = match lookup("LINK_PORT") {
            None => Some(DEFAULT_PORT),
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(value.trim().parse::<u16>().map_err(|_| {
                ConfigError::InvalidValue {
                    key: "LINK_PORT",
                    value: value.clone(),
                }
            })?),
        };

        let ttl_raw = var("TOKEN_TTL_SECONDS", &DEFAULT_TOKEN_TTL_SECONDS.to_string());
        let token_ttl = ttl_raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|seconds| (1..=MAX_TOKEN_TTL_SECONDS).contains(seconds))
            .and_then(Duration::try_seconds)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "TOKEN_TTL_SECONDS",
                value: ttl_raw.clone(),
            })?;

        let store_raw = var("TOKEN_STORE", "postgres");
        let token_store = store_raw
            .parse::<TokenStoreKind>()
            .map_err(|_| ConfigError::InvalidValue {
                key: "TOKEN_STORE",
                value: store_raw.clone(),
            })?;

        let provider_raw = var("EMAIL_PROVIDER", "sendgrid");
        let email_provider = provider_raw
            .parse::<EmailProvider>()
            .map_err(|_| ConfigError::InvalidValue {
                key: "EMAIL_PROVIDER",
                value: provider_raw.clone(),
            })?;

        Ok(Self {
            from_email: var("FROM_EMAIL", DEFAULT_FROM_EMAIL),
            link: LinkConfig {
                scheme: var("LINK_SCHEME", DEFAULT_SCHEME),
                domain: var("DOMAIN_NAME", DEFAULT_DOMAIN),
                port,
            },
            token_ttl,
            database_url: var("DATABASE_URL", DEFAULT_DATABASE_URL),
            token_store,
            email_provider,
            sendgrid_api_key_var: var("SENDGRID_API_KEY_VAR", DEFAULT_API_KEY_VAR),
        })
    }

    /// Logs the configuration, showing at most five characters of `api_key`.
    pub fn log_summary(&self, api_key: Option<&str>) {
        log::info!("⚙️ Checking configuration:");
        match api_key {
            Some(key) if !key.is_empty() => log::info!(
                "🔐 {}: {}... (truncated for security)",
                self.sendgrid_api_key_var,
                truncate_secret(key)
            ),
            _ => log::warn!(
                "⚠️ {} is missing or not set.",
                self.sendgrid_api_key_var
            ),
        }
        log::info!("🌐 Domain: {}", self.link.domain);
        log::info!("📧 From email: {}", self.from_email);
        log::info!(
            "🔑 Token store: {:?}, validity: {}s",
            self.token_store,
            self.token_ttl.num_seconds()
        );
        log::info!("📨 Email provider: {:?}", self.email_provider);
    }
}

/// Keeps the first five characters of a secret.
pub fn truncate_secret(secret: &str) -> String {
    secret.chars().take(5).collect()
}

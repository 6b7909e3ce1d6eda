use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";
const MIN_JWT_SECRET_CHARS: usize = 32;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl_seconds: i64,
    pub http_addr: String,
    pub cors_origins: Vec<String>,
    pub log_level: String,
    pub http_request_body_limit_bytes: usize,
    pub http_concurrency_limit: usize,
    pub http_request_timeout_secs: u64,
    /// Upper bound for one vote transaction attempt.
    pub vote_tx_timeout_ms: u64,
    pub vote_tx_max_attempts: u32,
    pub reset_token_ttl_secs: i64,
    /// Front-end origin used in password reset links, without trailing slash.
    pub app_url: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = EnvReader { lookup };

        let jwt_secret = env.required("JWT_SECRET")?;
        if jwt_secret.chars().count() < MIN_JWT_SECRET_CHARS {
            return Err(anyhow!(
                "JWT_SECRET must be at least {MIN_JWT_SECRET_CHARS} characters"
            ));
        }

        Ok(Self {
            database_url: env.required("DATABASE_URL")?,
            db_max_connections: env.positive("DB_MAX_CONNECTIONS", 10)?,
            jwt_secret,
            jwt_ttl_seconds: env.positive("JWT_TTL_SECONDS", 3600)?,
            http_addr: env.string_or("HTTP_ADDR", "0.0.0.0:8080"),
            cors_origins: parse_cors_origins(&env.string_or("CORS_ORIGINS", DEFAULT_CORS_ORIGINS)),
            log_level: env
                .optional("LOG_LEVEL")
                .or_else(|| env.optional("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),
            http_request_body_limit_bytes: env
                .positive("HTTP_REQUEST_BODY_LIMIT_BYTES", 1024 * 1024)?,
            http_concurrency_limit: env.positive("HTTP_CONCURRENCY_LIMIT", 256)?,
            http_request_timeout_secs: env.positive("HTTP_REQUEST_TIMEOUT_SECS", 10)?,
            vote_tx_timeout_ms: env.positive("VOTE_TX_TIMEOUT_MS", 5000)?,
            vote_tx_max_attempts: env.positive("VOTE_TX_MAX_ATTEMPTS", 3)?,
            reset_token_ttl_secs: env.positive("RESET_TOKEN_TTL_SECS", 60)?,
            app_url: env
                .string_or("APP_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
        })
    }

    pub fn vote_tx_timeout(&self) -> Duration {
        Duration::from_millis(self.vote_tx_timeout_ms)
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value; blank counts as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| anyhow!("{key} is required and must not be empty"))
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn positive<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr + PartialOrd + Default,
        T::Err: Display,
    {
        let value = match self.optional(key) {
            Some(raw) => raw
                .parse::<T>()
                .map_err(|err| anyhow!("{err}"))
                .with_context(|| format!("Failed to parse {key}, expecting positive integer"))?,
            None => default,
        };

        if value <= T::default() {
            return Err(anyhow!("{key} must be > 0"));
        }
        Ok(value)
    }
}

fn parse_cors_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

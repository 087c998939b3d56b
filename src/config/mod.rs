use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::session::MAX_SESSION_TTL_HOURS;

/// Environment variable that overrides `auth.session_secret`.
pub const SESSION_SECRET_ENV: &str = "CLAIMDESK_SESSION_SECRET";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Take the client address from X-Forwarded-For / X-Real-IP. Only enable
    /// behind a reverse proxy that overwrites these headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            trust_proxy_headers: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Key for signing the session cookie (HMAC-SHA256)
    #[serde(default = "default_session_secret")]
    pub session_secret: String,
    /// Lifetime of an issued session in hours (default: 168)
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    /// Mark the session cookie `Secure` (enable behind HTTPS)
    #[serde(default)]
    pub secure_cookies: bool,
    /// Email of the registry account created on first start
    #[serde(default = "default_registry_email")]
    pub registry_email: String,
    /// Password of the registry account created on first start.
    /// A random one is generated and logged when unset.
    pub registry_password: Option<String>,
    #[serde(default = "default_registry_name")]
    pub registry_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: default_session_secret(),
            session_ttl_hours: default_session_ttl_hours(),
            secure_cookies: false,
            registry_email: default_registry_email(),
            registry_password: None,
            registry_name: default_registry_name(),
        }
    }
}

fn default_session_secret() -> String {
    // Random per process; sessions do not survive a restart unless configured
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

fn default_session_ttl_hours() -> i64 {
    24 * 7
}

fn default_registry_email() -> String {
    "registry@claimdesk.local".to_string()
}

fn default_registry_name() -> String {
    "Registry".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Requests per window for login and signup submissions (default: 20)
    #[serde(default = "default_auth_requests")]
    pub auth_requests_per_window: u32,
    /// Requests per window for claim submissions and decisions (default: 120)
    #[serde(default = "default_action_requests")]
    pub action_requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Seconds between sweeps of stale limiter entries
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth_requests_per_window: default_auth_requests(),
            action_requests_per_window: default_action_requests(),
            window_seconds: default_window_seconds(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_auth_requests() -> u32 {
    20
}

fn default_action_requests() -> u32 {
    120
}

fn default_window_seconds() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds a cached page view stays fresh (default: 30)
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        if let Ok(secret) = std::env::var(SESSION_SECRET_ENV) {
            if !secret.is_empty() {
                config.auth.session_secret = secret;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    fn validate(&self) -> Result<()> {
        if self.auth.session_secret.is_empty() {
            anyhow::bail!("auth.session_secret must not be empty");
        }
        if self.auth.session_secret.len() < 32 {
            warn!("auth.session_secret is shorter than 32 bytes; session cookies are weakly signed");
        }
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.auth.session_ttl_hours) {
            anyhow::bail!(
                "auth.session_ttl_hours must be between 1 and {}",
                MAX_SESSION_TTL_HOURS
            );
        }
        Ok(())
    }
}

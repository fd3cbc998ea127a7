//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `ARCTL_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `ARCTL_` override YAML values
//! 3. **POSTGRES_\*** - `POSTGRES_HOST`, `POSTGRES_PORT`, `POSTGRES_DB`, `POSTGRES_USER` and
//!    `POSTGRES_PASSWORD` override the matching `database.*` fields
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `ARCTL_DATABASE__POOL__MAX_CONNECTIONS=20` sets `database.pool.max_connections`.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use arctl::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}", config.bind_address());
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! ARCTL_PORT=8080
//!
//! # Database connection, as the container images set it
//! POSTGRES_HOST=db POSTGRES_DB=archive POSTGRES_USER=arctl POSTGRES_PASSWORD=...
//!
//! # Session verification secret
//! ARCTL_SECRET_KEY=...
//! ```
//!
//! Configuration is validated once at load time. Database reachability is not checked here:
//! the pool is created lazily, so an unreachable database surfaces on first use.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "ARCTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults except `secret_key`, which validation requires.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Secret used to verify session tokens
    pub secret_key: Option<String>,
    /// Postgres connection and pool settings
    pub database: DatabaseConfig,
    /// Session and CORS settings
    pub auth: AuthConfig,
    /// Expose Prometheus metrics at `/internal/metrics` and sample pool gauges
    pub enable_metrics: bool,
    /// How often the pool metrics sampler runs
    #[serde(with = "humantime_serde")]
    pub metrics_sample_interval: Duration,
    /// Export traces over OTLP
    pub enable_otel_export: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            secret_key: None,
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            enable_metrics: false,
            metrics_sample_interval: Duration::from_secs(5),
            enable_otel_export: false,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("auth", &self.auth)
            .field("enable_metrics", &self.enable_metrics)
            .field("metrics_sample_interval", &self.metrics_sample_interval)
            .field("enable_otel_export", &self.enable_otel_export)
            .finish()
    }
}

/// Static connection parameters for the process-wide pool.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    /// Database name
    pub name: String,
    pub user: String,
    pub password: String,
    /// Connection pool settings
    pub pool: PoolSettings,
    /// How long shutdown waits for checked-out connections to be returned
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Apply embedded migrations at startup
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "arctl".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            pool: PoolSettings::default(),
            shutdown_timeout: Duration::from_secs(30),
            run_migrations: true,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("pool", &self.pool)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("run_migrations", &self.run_migrations)
            .finish()
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub session: SessionConfig,
    pub security: SecurityConfig,
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Lifetime of session tokens minted for this service
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Cookie name for session token
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(24 * 60 * 60), // 24 hours
            cookie_name: "arctl_session".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    pub cors: CorsConfig,
}

/// CORS settings. No origins means same-origin only.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://archive.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

/// `POSTGRES_*` variable names and the fields they set.
const POSTGRES_ENV: [(&str, &str); 5] = [
    ("POSTGRES_HOST", "database.host"),
    ("POSTGRES_PORT", "database.port"),
    ("POSTGRES_DB", "database.name"),
    ("POSTGRES_USER", "database.user"),
    ("POSTGRES_PASSWORD", "database.password"),
];

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |message: String| Error::Internal {
            operation: format!("Config validation: {message}"),
        };

        if self.secret_key.as_deref().is_none_or(|key| key.is_empty()) {
            return Err(invalid(
                "secret_key is not configured. Set ARCTL_SECRET_KEY or add secret_key to the config file.".to_string(),
            ));
        }

        let db = &self.database;
        for (field, value) in [("database.host", &db.host), ("database.name", &db.name), ("database.user", &db.user)] {
            if value.trim().is_empty() {
                return Err(invalid(format!("{field} must not be empty")));
            }
        }
        if db.port == 0 {
            return Err(invalid("database.port must not be 0".to_string()));
        }
        if db.pool.max_connections == 0 {
            return Err(invalid("database.pool.max_connections must be at least 1".to_string()));
        }
        if db.pool.min_connections > db.pool.max_connections {
            return Err(invalid(format!(
                "database.pool.min_connections ({}) cannot be greater than max_connections ({})",
                db.pool.min_connections, db.pool.max_connections
            )));
        }
        if db.shutdown_timeout.is_zero() {
            return Err(invalid("database.shutdown_timeout must be greater than 0".to_string()));
        }

        let cors = &self.auth.security.cors;
        if cors.allow_credentials && cors.allowed_origins.contains(&CorsOrigin::Wildcard) {
            return Err(invalid(
                "auth.security.cors cannot combine a wildcard origin with allow_credentials".to_string(),
            ));
        }

        if self.enable_metrics && self.metrics_sample_interval.is_zero() {
            return Err(invalid("metrics_sample_interval must be greater than 0".to_string()));
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("ARCTL_").ignore(&["config"]).split("__"))
            // Conventional Postgres variables
            .merge(
                Env::raw()
                    .only(&POSTGRES_ENV.map(|(var, _)| var))
                    .map(|key| {
                        POSTGRES_ENV
                            .iter()
                            .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
                            .map(|(_, field)| (*field).into())
                            .unwrap_or_else(|| key.as_str().to_string().into())
                    }),
            )
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

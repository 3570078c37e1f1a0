//! Configuration management for the server.

use std::env;
use std::path::PathBuf;

/// Default directory cover images are stored under.
pub const DEFAULT_IMAGE_DIR: &str = "./public/images/books";

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Upper bound on pooled database connections
    pub database_max_connections: u32,
    /// Shared secret the gateway presents as a bearer token. When unset the
    /// identity headers are trusted as-is.
    pub auth_secret: Option<String>,
    /// Directory holding book cover images
    pub image_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::MissingDatabaseUrl)?;

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => match raw.parse() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidMaxConnections),
            },
            None => 10,
        };

        let auth_secret = lookup("AUTH_SECRET").filter(|s| !s.is_empty());

        let image_dir = lookup("IMAGE_DIR")
            .unwrap_or_else(|| DEFAULT_IMAGE_DIR.to_string())
            .into();

        Ok(Self {
            host,
            port,
            database_url,
            database_max_connections,
            auth_secret,
            image_dir,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("DATABASE_MAX_CONNECTIONS must be a positive integer")]
    InvalidMaxConnections,
}

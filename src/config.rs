use std::env;
use std::path::PathBuf;

use crate::error::{Result, ShopError};

/// Runtime configuration, read from the environment (and `.env` via dotenv).
#[derive(Debug, Clone)]
pub struct Config {
    /// MongoDB connection string. Without it the server runs on the in-memory store.
    pub database_url: Option<String>,
    pub database_name: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub storage_dir: PathBuf,
    /// Base used when building public URLs for stored files.
    pub public_url: String,
    pub token_ttl_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ShopError::Internal("JWT_SECRET must be set".into()))?;

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let public_url = lookup("PUBLIC_URL")
            .unwrap_or_else(|| format!("http://{bind_addr}"))
            .trim_end_matches('/')
            .to_string();

        let token_ttl_hours = match lookup("TOKEN_TTL_HOURS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|h| *h > 0)
                .ok_or_else(|| ShopError::Internal(format!("invalid TOKEN_TTL_HOURS: {raw}")))?,
            None => 1,
        };

        Ok(Config {
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            database_name: lookup("DATABASE_NAME").unwrap_or_else(|| "sweet_shop".to_string()),
            jwt_secret,
            bind_addr,
            storage_dir: PathBuf::from(lookup("STORAGE_DIR").unwrap_or_else(|| "./storage".into())),
            public_url,
            token_ttl_hours,
        })
    }
}

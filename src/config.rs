use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

use crate::auth::jwt::MAX_TTL_MINUTES;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub users_file: PathBuf,
    /// Where browser form posts are sent back to with `?token=`.
    pub frontend_url: Option<String>,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let ttl_minutes = match std::env::var("JWT_TTL_MINUTES") {
            Ok(v) => v
                .parse::<i64>()
                .context("JWT_TTL_MINUTES must be an integer")?,
            Err(_) => 60,
        };
        if !(1..=MAX_TTL_MINUTES).contains(&ttl_minutes) {
            anyhow::bail!("JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}");
        }

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            ttl_minutes,
        };
        if jwt.secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let port = match std::env::var("APP_PORT") {
            Ok(v) => v.parse::<u16>().context("APP_PORT must be a port number")?,
            Err(_) => 4000,
        };

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            users_file: std::env::var("USERS_FILE")
                .unwrap_or_else(|_| "./users.json".into())
                .into(),
            frontend_url: std::env::var("FRONTEND_URL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            jwt,
        })
    }
}

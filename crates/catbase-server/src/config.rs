use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

/// Secrets shipped in sample env files; never acceptable for signing.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    /// Previous signing key, still accepted for verification during rotation.
    pub jwt_previous_secret: Option<String>,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub seed_admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = non_empty("CATBASE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CATBASE_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let host = non_empty("CATBASE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = non_empty("CATBASE_PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("CATBASE_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            jwt_secret,
            jwt_previous_secret: non_empty("CATBASE_JWT_PREVIOUS_SECRET"),
            db_path: PathBuf::from(non_empty("CATBASE_DB_PATH").unwrap_or_else(|| "catbase.db".into())),
            addr,
            seed_admin_password: non_empty("CATBASE_SEED_ADMIN_PASSWORD"),
        })
    }
}

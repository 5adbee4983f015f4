use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;

const DEFAULT_ADDR: &str = "127.0.0.1:3001";
const DEFAULT_TOKEN_DAYS: i64 = 90;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub address: SocketAddr,
    pub auth: AuthConfig,
    /// Usernames promoted to superuser on start-up.
    pub superusers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_lifetime: time::Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let address = env::var("SOCIALNET_ADDR")
            .unwrap_or_else(|_| DEFAULT_ADDR.to_owned())
            .parse()
            .context("SOCIALNET_ADDR is not a valid socket address")?;
        let superusers = env::var("SOCIALNET_SUPERUSERS")
            .ok()
            .map(|raw| parse_list(&raw))
            .unwrap_or_default();
        Ok(Self {
            database_url,
            address,
            auth: AuthConfig::from_env()?,
            superusers,
        })
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = env::var("JWT_SECRET").context("Failed to get JWT_SECRET")?;
        let days = env::var("SOCIALNET_TOKEN_DAYS")
            .ok()
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|days| *days > 0)
            .unwrap_or(DEFAULT_TOKEN_DAYS);
        Ok(Self::new(jwt_secret, days))
    }

    pub fn new(jwt_secret: impl Into<String>, token_days: i64) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_lifetime: time::Duration::days(token_days),
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superuser_list_skips_blanks() {
        assert_eq!(
            parse_list(" alice, ,bob ,"),
            vec!["alice".to_string(), "bob".to_string()]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn auth_config_uses_days() {
        let auth = AuthConfig::new("secret", 7);
        assert_eq!(auth.token_lifetime, time::Duration::days(7));
    }
}

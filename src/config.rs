//! Process configuration, read from the environment (and `.env` when present).

use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::payments::stripe::DEFAULT_API_BASE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Operating mode. Development relaxes webhook signature checks and exposes
/// internal error detail in responses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool { *self == Self::Development }
}

impl FromStr for Environment {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub port: u16,
    pub environment: Environment,
    pub jwt_secret: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,
    pub payment_currency: String,
    pub nats_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| lookup(name).filter(|v| !v.is_empty()).ok_or(ConfigError::Missing(name));
        let or_default = |name: &'static str, default: &str| lookup(name).filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string());

        let environment_raw = or_default("APP_ENV", "production");
        let environment = environment_raw
            .parse::<Environment>()
            .map_err(|_| ConfigError::Invalid { name: "APP_ENV", value: environment_raw.clone() })?;

        let port_raw = or_default("PORT", "8000");
        let port = port_raw.parse::<u16>().map_err(|_| ConfigError::Invalid { name: "PORT", value: port_raw.clone() })?;

        let pool_raw = or_default("DB_MAX_CONNECTIONS", "10");
        let db_max_connections = pool_raw
            .parse::<u32>()
            .map_err(|_| ConfigError::Invalid { name: "DB_MAX_CONNECTIONS", value: pool_raw.clone() })?;

        let stripe_webhook_secret = match environment {
            Environment::Production => required("STRIPE_WEBHOOK_SECRET")?,
            Environment::Development => or_default("STRIPE_WEBHOOK_SECRET", ""),
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            db_max_connections,
            port,
            environment,
            jwt_secret: required("JWT_SECRET")?,
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret,
            stripe_api_base: or_default("STRIPE_API_BASE", DEFAULT_API_BASE),
            payment_currency: or_default("PAYMENT_CURRENCY", "usd").to_ascii_lowercase(),
            nats_url: lookup("NATS_URL").filter(|v| !v.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    const BASE: [(&str, &str); 4] = [
        ("DATABASE_URL", "postgres://localhost/marketplace"),
        ("JWT_SECRET", "secret"),
        ("STRIPE_SECRET_KEY", "sk_test"),
        ("STRIPE_WEBHOOK_SECRET", "whsec"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&BASE)).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.payment_currency, "usd");
        assert_eq!(config.stripe_api_base, DEFAULT_API_BASE);
        assert_eq!(config.db_max_connections, 10);
        assert!(config.nats_url.is_none());
    }

    #[test]
    fn test_missing_required() {
        let err = Config::from_lookup(lookup(&BASE[..3])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("STRIPE_WEBHOOK_SECRET")));
    }

    #[test]
    fn test_development_needs_no_webhook_secret() {
        let mut vars = BASE[..3].to_vec();
        vars.push(("APP_ENV", "development"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert!(config.environment.is_development());
        assert_eq!(config.stripe_webhook_secret, "");
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = BASE.to_vec();
        vars.push(("PORT", "eighty"));
        assert!(matches!(Config::from_lookup(lookup(&vars)), Err(ConfigError::Invalid { name: "PORT", .. })));
    }
}

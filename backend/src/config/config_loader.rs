use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};
use storefront_core::payments::stripe_client::StripeClientConfig;

use super::config_model::{Auth, BackendServer, Database, DotEnvyConfig, Store, Stripe};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    load_from(|key| std::env::var(key).ok())
}

pub fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| -> Result<String> {
        lookup(key)
            .filter(|value| !value.trim().is_empty())
            .with_context(|| format!("{key} is invalid"))
    };

    let backend_server = BackendServer {
        port: parse(&required("SERVER_PORT_BACKEND")?, "SERVER_PORT_BACKEND")?,
        body_limit: parse(&required("SERVER_BODY_LIMIT")?, "SERVER_BODY_LIMIT")?,
        timeout: parse(&required("SERVER_TIMEOUT")?, "SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: optional(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        api_base: lookup("STRIPE_API_BASE")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "https://api.stripe.com".to_string()),
        timeout_secs: optional(&lookup, "STRIPE_TIMEOUT_SECS", 10)?,
        max_retries: optional(&lookup, "STRIPE_MAX_RETRIES", 2)?,
        webhook_tolerance_secs: optional(&lookup, "STRIPE_WEBHOOK_TOLERANCE_SECS", 300)?,
    };

    let auth = Auth {
        jwt_secret: required("JWT_SECRET")?,
    };

    let currency = lookup("STORE_CURRENCY")
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "USD".to_string())
        .trim()
        .to_ascii_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        anyhow::bail!("STORE_CURRENCY must be a 3-letter ISO 4217 code, got {currency:?}");
    }

    let store = Store {
        currency,
        order_number_prefix: lookup("ORDER_NUMBER_PREFIX")
            .unwrap_or_else(|| "ORD".to_string())
            .trim()
            .to_string(),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        stripe,
        auth,
        store,
    })
}

fn parse<T>(raw: &str, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} is invalid"))
}

fn optional<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).filter(|value| !value.trim().is_empty()) {
        Some(raw) => parse(&raw, key),
        None => Ok(default),
    }
}

impl Stripe {
    pub fn client_config(&self) -> StripeClientConfig {
        StripeClientConfig {
            secret_key: self.secret_key.clone(),
            webhook_secret: self.webhook_secret.clone(),
            api_base: self.api_base.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            webhook_tolerance: Duration::from_secs(self.webhook_tolerance_secs),
        }
    }
}

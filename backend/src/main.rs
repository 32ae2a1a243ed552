use std::sync::Arc;

use anyhow::Result;
use backend::{axum_http::http_serve, config::config_loader};
use storefront_core::{
    infra::db::postgres::postgres_connection::{self, PoolSettings},
    payments::stripe_client::StripeClient,
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    storefront_core::observability::init_observability("backend")?;

    let dotenvy_env = config_loader::load()?;
    info!("ENV has been loaded");

    let pool_settings = PoolSettings {
        max_connections: dotenvy_env.database.max_connections,
        ..PoolSettings::default()
    };
    let postgres_pool =
        postgres_connection::establish_connection(&dotenvy_env.database.url, &pool_settings)?;
    info!("Postgres connection has been established");

    let stripe_client = StripeClient::new(dotenvy_env.stripe.client_config())?;
    info!("Stripe client has been configured");

    http_serve::start(
        Arc::new(dotenvy_env),
        Arc::new(postgres_pool),
        Arc::new(stripe_client),
    )
    .await?;

    Ok(())
}

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use teleshop::bot::Storefront;
use teleshop::config::BotConfig;
use teleshop::db::{init_database_schema, status_change_listener, PgStore};
use teleshop::localization::{init_localization, set_default_language};
use teleshop::poller::Poller;
use teleshop::status_notifier::StatusNotifier;
use teleshop::transport::{TelegramTransport, Transport};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();
    info!("Starting Teleshop storefront bot");

    let config = BotConfig::from_env().context("Invalid configuration")?;
    init_localization().context("Failed to load localization resources")?;
    set_default_language(&config.default_language);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    init_database_schema(&pool).await?;
    let store = Arc::new(PgStore::new(pool));

    let bot = Bot::new(&config.bot_token);
    let transport: Arc<dyn Transport> = Arc::new(TelegramTransport::new(bot));

    // Status notifications run beside the poll loop
    let notifier = StatusNotifier::new(
        Some(Arc::clone(&transport)),
        store.clone(),
        store.clone(),
        config.shop.phone_country_code.clone(),
    )
    .with_language(config.default_language.clone());
    match status_change_listener(&config.database_url).await {
        Ok(listener) => {
            tokio::spawn(notifier.run(listener));
        }
        Err(e) => warn!(error = %format!("{e:#}"), "Order status notifications disabled"),
    }

    let storefront = Storefront::new(
        Arc::clone(&transport),
        store.clone(),
        store.clone(),
        config.shop.clone(),
        config.session_ttl,
    );

    info!("Bot initialized, starting poll loop");
    Poller::new(transport, store, storefront, &config).run().await
}

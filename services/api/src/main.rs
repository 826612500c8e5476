use std::sync::Arc;

use anyhow::{Context, Result};
use auth::{AuthGateway, SessionConfig, SessionManager};
use common::{
    cache::{KeyValueStore, RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    repositories::PgUserRepository,
};
use notifier::{BirthdayScheduler, CommandHandler, LogNotifier, Notifier, TelegramNotifier};
use teloxide::Bot;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod middleware;
mod routes;
mod services;
mod settings;
mod shutdown;
mod state;

use crate::{
    services::{Services, run_services},
    settings::AppSettings,
    shutdown::shutdown_signal,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting birthday reminder service");

    let settings = AppSettings::load().context("Failed to load settings")?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    run_migrations(&pool).await?;

    // Initialize the session store
    let redis = RedisPool::new(&RedisConfig::from_env())?;
    if redis.health_check().await? {
        info!("Redis connection successful");
    } else {
        anyhow::bail!("Failed to connect to Redis");
    }

    let users = Arc::new(PgUserRepository::new(pool));
    let sessions = SessionManager::new(
        Arc::new(redis),
        SessionConfig {
            ttl_seconds: settings.session.ttl_seconds,
        },
    );
    let gateway = AuthGateway::new(users.clone(), sessions);

    let bot = settings.telegram_token().map(Bot::new);
    let notifier: Arc<dyn Notifier> = match &bot {
        Some(bot) => Arc::new(TelegramNotifier::new(bot.clone())),
        None => Arc::new(LogNotifier),
    };

    let services = Services {
        listener: TcpListener::bind(&settings.server.addr)
            .await
            .with_context(|| format!("Failed to bind {}", settings.server.addr))?,
        router: routes::create_router(AppState::new(gateway.clone())),
        scheduler: BirthdayScheduler::new(users, notifier, settings.scheduler_period()),
        bot: bot.map(|bot| (bot, Arc::new(CommandHandler::new(gateway)))),
    };

    let token = CancellationToken::new();
    tokio::spawn(shutdown_signal(token.clone()));

    run_services(services, token).await
}

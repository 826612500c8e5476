//! Concurrent service loops
//!
//! The HTTP server, the birthday scheduler and the optional Telegram bot run
//! side by side and stop together when the shared cancellation token fires.

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use notifier::{BirthdayScheduler, CommandHandler, run_bot};
use teloxide::Bot;
use tokio::{net::TcpListener, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct Services {
    pub listener: TcpListener,
    pub router: Router,
    pub scheduler: BirthdayScheduler,
    /// Present only when a bot token is configured
    pub bot: Option<(Bot, Arc<CommandHandler>)>,
}

/// Run every loop until `cancellation_token` fires or the server fails
pub async fn run_services(services: Services, cancellation_token: CancellationToken) -> Result<()> {
    let Services {
        listener,
        router,
        scheduler,
        bot,
    } = services;

    let mut tasks = JoinSet::new();

    let token = cancellation_token.clone();
    tasks.spawn(async move { scheduler.run(token).await });

    if let Some((bot, handler)) = bot {
        let token = cancellation_token.clone();
        tasks.spawn(async move { run_bot(bot, handler, token).await });
    } else {
        info!("Telegram bot disabled, no token configured");
    }

    info!("API service listening on {}", listener.local_addr()?);
    let token = cancellation_token.clone();
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await;

    // The server may have stopped on its own; make sure the other loops follow.
    cancellation_token.cancel();

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("Service task failed: {}", e);
        }
    }

    served?;
    info!("All services stopped");
    Ok(())
}

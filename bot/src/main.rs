use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bot::config::Config;
use bot::state::AppState;
use bot::telegram::TelegramClient;
use bot::{app, dispatch};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let client = TelegramClient::new(config.bot_token.clone());
    let me = client
        .get_me()
        .await
        .context("getMe failed; check BOT_TOKEN")?;
    let username = me.username.clone().context("bot account has no username")?;
    tracing::info!(bot = %username, "authenticated");

    let state = AppState::with_persistence(me.id, username, &config.state_path).await;

    match &config.webhook_addr {
        Some(addr) => {
            let router = app(state, Arc::new(client), config.webhook_secret.clone());
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            tracing::info!(%addr, "serving webhook");
            axum::serve(listener, router).await?;
        }
        None => {
            tracing::info!("long polling for updates");
            poll_loop(&state, &client).await;
        }
    }
    Ok(())
}

/// Sequential long-polling loop: one update dispatched at a time, offset
/// advanced past everything received, backoff on poll failures.
async fn poll_loop(state: &AppState, client: &TelegramClient) {
    let mut offset = 0;
    loop {
        match client.get_updates(offset, 30).await {
            Ok(updates) => {
                for update in updates {
                    offset = update.update_id + 1;
                    dispatch::dispatch(state, client, update).await;
                }
            }
            Err(err) => {
                tracing::warn!(%err, "getUpdates failed, backing off");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

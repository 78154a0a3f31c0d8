//! Telegram Secret Santa coordinator: participants join through deep links,
//! submit wishlists privately, and the organizer's shuffle DMs each giver
//! their receiver. This crate holds the service layer; the domain rules live
//! in `santa-core`.

pub mod config;
pub mod dispatch;
pub mod handlers;
pub mod state;
pub mod telegram;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

pub use crate::state::AppState;
use crate::telegram::{ChatApi, Update};

const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
struct WebhookState {
    app: AppState,
    api: Arc<dyn ChatApi>,
    secret: Option<String>,
}

/// Webhook-mode router: Telegram POSTs updates to `/webhook`.
pub fn app(state: AppState, api: Arc<dyn ChatApi>, secret: Option<String>) -> Router {
    Router::new()
        .route("/webhook", post(receive_update))
        .with_state(WebhookState {
            app: state,
            api,
            secret,
        })
}

async fn receive_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> impl IntoResponse {
    if let Some(expected) = &state.secret {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if provided != expected {
            return (StatusCode::UNAUTHORIZED, "invalid secret token").into_response();
        }
    }

    dispatch::dispatch(&state.app, state.api.as_ref(), update).await;
    StatusCode::OK.into_response()
}

//! Routes one inbound update to its handler: group commands, deep-linked
//! private commands, session text, and button callbacks.

use santa_core::GroupId;

use crate::handlers;
use crate::state::AppState;
use crate::telegram::{CallbackQuery, ChatApi, Message, Update};

enum Inbound<'a> {
    Command { name: &'a str, arg: Option<&'a str> },
    ForeignCommand,
    Text(&'a str),
}

fn classify<'a>(text: &'a str, bot_username: &str) -> Inbound<'a> {
    let Some(rest) = text.strip_prefix('/') else {
        return Inbound::Text(text);
    };
    let mut parts = rest.splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or("");
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());
    let (name, target) = match head.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (head, None),
    };
    if target.is_some_and(|t| !t.eq_ignore_ascii_case(bot_username)) {
        return Inbound::ForeignCommand;
    }
    Inbound::Command { name, arg }
}

fn deep_link_group(arg: &str, prefix: &str) -> Option<GroupId> {
    arg.strip_prefix(prefix)?.parse().ok()
}

pub async fn dispatch(state: &AppState, api: &dyn ChatApi, update: Update) {
    if let Some(message) = update.message {
        handle_message(state, api, message).await;
    } else if let Some(query) = update.callback_query {
        handle_callback(state, api, query).await;
    }
}

async fn handle_message(state: &AppState, api: &dyn ChatApi, message: Message) {
    if message
        .new_chat_members
        .iter()
        .any(|member| member.id == state.bot_id)
    {
        handlers::bot_added(api, &message).await;
        return;
    }

    let Some(from) = message.from.clone() else {
        return;
    };
    if from.is_bot {
        return;
    }
    let Some(text) = message.text.clone() else {
        return;
    };

    match classify(&text, &state.bot_username) {
        Inbound::ForeignCommand => {}
        Inbound::Command { name: "santa", .. } => {
            handlers::start_event(state, api, &message, &from).await;
        }
        Inbound::Command { name: "start", arg } => {
            if !message.chat.is_private() {
                return;
            }
            match arg {
                Some(arg) if arg.starts_with("join_") => {
                    // Mangled payloads are dropped without a reply.
                    if let Some(group_id) = deep_link_group(arg, "join_") {
                        handlers::join(state, api, &from, group_id).await;
                    }
                }
                Some(arg) if arg.starts_with("setup_") => {
                    if let Some(group_id) = deep_link_group(arg, "setup_") {
                        handlers::begin_setup(state, api, &from, group_id).await;
                    }
                }
                _ => handlers::greeting(api, message.chat.id).await,
            }
        }
        Inbound::Command { name: "cancel", .. } if message.chat.is_private() => {
            handlers::cancel_setup(state, api, &from).await;
        }
        Inbound::Command { name, .. } => {
            tracing::debug!(command = name, "unrecognized command");
        }
        Inbound::Text(text) => {
            if message.chat.is_private() {
                handlers::private_text(state, api, &from, text).await;
            }
        }
    }
}

async fn handle_callback(state: &AppState, api: &dyn ChatApi, query: CallbackQuery) {
    let Some(data) = query.data.clone() else {
        return;
    };

    if let Some(group_id) = data.strip_prefix("status_").and_then(|s| s.parse().ok()) {
        handlers::status_callback(state, api, &query, group_id).await;
    } else if let Some(group_id) = data.strip_prefix("shuffle_").and_then(|s| s.parse().ok()) {
        handlers::shuffle_callback(state, api, &query, group_id).await;
    } else {
        // Close the loading spinner and drop the press.
        if let Err(err) = api.answer_callback(&query.id, None, false).await {
            tracing::warn!(%err, "answer callback failed");
        }
        tracing::debug!(%data, "unrecognized callback payload");
    }
}

//! Command and callback handlers. Every domain failure is translated into a
//! message in the originating chat; nothing here propagates errors upward.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use santa_core::{assign, ConfigField, Event, EventConfig, EventError, GroupId, Participant, UserId};

use crate::state::{AppState, SetupConversation, SetupStep};
use crate::telegram::{
    CallbackQuery, ChatApi, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, Message,
    SendOptions, User,
};

/// Banner shown above the group dashboard via the link-preview trick.
const IMAGE_URL: &str = "https://cdn-icons-png.flaticon.com/512/6231/6231458.png";

pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn dashboard_keyboard(bot_username: &str, group_id: GroupId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![InlineKeyboardButton::url(
                "🎅 Join Secret Santa",
                format!("https://t.me/{bot_username}?start=join_{group_id}"),
            )],
            vec![InlineKeyboardButton::url(
                "⚙️ Setup Rules (Admin Only)",
                format!("https://t.me/{bot_username}?start=setup_{group_id}"),
            )],
            vec![
                InlineKeyboardButton::callback("📋 Status", format!("status_{group_id}")),
                InlineKeyboardButton::callback("🎲 Shuffle", format!("shuffle_{group_id}")),
            ],
        ],
    }
}

fn dashboard_text(event: &Event) -> String {
    let names = if event.users.is_empty() {
        "<i>No participants yet</i>".to_string()
    } else {
        let mut entries: Vec<&Participant> = event.users.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
            .iter()
            .map(|p| format!("- {}", escape_html(&p.name)))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let footer = if event.is_open() {
        "<i>Click 'Join' to set your wishlist privately!</i>"
    } else {
        "<i>The draw is done — check your private messages!</i>"
    };
    // The invisible link keeps the banner preview without eating into the
    // 4096-char message limit.
    format!(
        "<a href='{IMAGE_URL}'>&#8205;</a>\
         <b>🎄 Secret Santa 🎄</b>\n\n\
         <b>Rules:</b> {}\n\
         💰 Budget: {}\n\
         📅 Deadline: {}\n\n\
         <b>Participants ({}):</b>\n{}\n\n{}",
        escape_html(&event.config.rules),
        escape_html(&event.config.budget),
        escape_html(&event.config.deadline),
        event.users.len(),
        names,
        footer,
    )
}

fn reveal_text(receiver: &Participant, config: &EventConfig) -> String {
    format!(
        "🎅 *SECRET SANTA REVEAL* 🎅\n\n\
         You are gifting to: *{}*\n\
         📝 *Their wishlist:*\n_{}_\n\n\
         📜 *Rules:* {}\n\
         💰 *Budget:* {}\n\
         📅 *Deadline:* {}",
        receiver.name, receiver.wishlist, config.rules, config.budget, config.deadline
    )
}

async fn send(api: &dyn ChatApi, chat_id: ChatId, text: &str, opts: SendOptions) {
    if let Err(err) = api.send_message(chat_id, text, opts).await {
        tracing::warn!(chat_id, %err, "send failed");
    }
}

async fn answer(api: &dyn ChatApi, query: &CallbackQuery, text: Option<&str>, show_alert: bool) {
    if let Err(err) = api.answer_callback(&query.id, text, show_alert).await {
        tracing::warn!(callback = %query.id, %err, "answer callback failed");
    }
}

/// `/santa` in a group: start a fresh event and post the dashboard.
pub async fn start_event(state: &AppState, api: &dyn ChatApi, message: &Message, from: &User) {
    if message.chat.is_private() {
        send(
            api,
            message.chat.id,
            "🚫 Please run this command in the group where you want to hold Secret Santa.",
            SendOptions::default(),
        )
        .await;
        return;
    }

    let group_id = message.chat.id;
    let text = {
        let mut store = state.store.write().await;
        dashboard_text(store.create(group_id, from.id))
    };
    state.persist().await;
    tracing::info!(group_id, admin_id = from.id, "event created");

    let opts = SendOptions::html().with_keyboard(dashboard_keyboard(&state.bot_username, group_id));
    send(api, group_id, &text, opts).await;
}

/// The bot was just added to a group.
pub async fn bot_added(api: &dyn ChatApi, message: &Message) {
    send(
        api,
        message.chat.id,
        "🎄 Ho ho ho! I've been added to the group!\n\n\
         To start organizing your Secret Santa event, an admin should type:\n\n\
         👉 /santa",
        SendOptions::default(),
    )
    .await;
}

/// Bare `/start` in private with no deep-link payload.
pub async fn greeting(api: &dyn ChatApi, chat_id: ChatId) {
    send(
        api,
        chat_id,
        "👋 Hi! Use the buttons in your group chat to join a Secret Santa.",
        SendOptions::default(),
    )
    .await;
}

/// `/start join_<group>` in private: register and prompt for a wishlist.
pub async fn join(state: &AppState, api: &dyn ChatApi, user: &User, group_id: GroupId) {
    let result = {
        let mut store = state.store.write().await;
        store.join(group_id, user.id, user.full_name(), user.username.clone())
    };

    match result {
        Ok(()) => {
            state.persist().await;
            let mut session = state.session(user.id).await;
            session.active_group = Some(group_id);
            state.set_session(user.id, session).await;
            tracing::info!(group_id, user_id = user.id, "participant joined");
            send(
                api,
                user.id,
                &format!(
                    "✅ You joined the Secret Santa for group `{group_id}`!\n\n\
                     *Please reply to this message with your WISHLIST.*\n\
                     (What do you want? What do you hate?)"
                ),
                SendOptions::markdown(),
            )
            .await;
        }
        Err(EventError::EventClosed) => {
            send(
                api,
                user.id,
                "❌ This event has already started/finished.",
                SendOptions::default(),
            )
            .await;
        }
        Err(_) => {
            send(
                api,
                user.id,
                "❌ This event doesn't exist.",
                SendOptions::default(),
            )
            .await;
        }
    }
}

/// Free text in private: a setup answer when a conversation is running,
/// otherwise a wishlist for the active event.
pub async fn private_text(state: &AppState, api: &dyn ChatApi, user: &User, text: &str) {
    let session = state.session(user.id).await;
    if let Some(setup) = session.setup {
        setup_step(state, api, user, setup, text).await;
        return;
    }

    let Some(group_id) = session.active_group else {
        send(
            api,
            user.id,
            "I don't know which event you are referring to. Please click 'Join' in your group again.",
            SendOptions::default(),
        )
        .await;
        return;
    };

    let result = {
        let mut store = state.store.write().await;
        store.set_wishlist(group_id, user.id, text)
    };
    match result {
        Ok(()) => {
            state.persist().await;
            send(
                api,
                user.id,
                "💾 *Wishlist saved!* (Send another message to overwrite it.)",
                SendOptions::markdown(),
            )
            .await;
        }
        Err(EventError::NotRegistered) => {
            send(
                api,
                user.id,
                "You aren't registered. Go back to the group and click Join.",
                SendOptions::default(),
            )
            .await;
        }
        Err(_) => {
            send(
                api,
                user.id,
                "I don't know which event you are referring to. Please click 'Join' in your group again.",
                SendOptions::default(),
            )
            .await;
        }
    }
}

/// `/start setup_<group>` in private: organizer-only config conversation.
pub async fn begin_setup(state: &AppState, api: &dyn ChatApi, user: &User, group_id: GroupId) {
    let is_admin = {
        let store = state.store.read().await;
        store.get(group_id).is_some_and(|e| e.is_organizer(user.id))
    };
    if !is_admin {
        send(
            api,
            user.id,
            "🚫 You are not the admin of this event.",
            SendOptions::default(),
        )
        .await;
        return;
    }

    let mut session = state.session(user.id).await;
    session.setup = Some(SetupConversation {
        group_id,
        step: SetupStep::Budget,
    });
    state.set_session(user.id, session).await;

    send(
        api,
        user.id,
        &format!(
            "⚙️ *Admin setup for group {group_id}*\n\n\
             1️⃣ Enter the *Budget* (e.g., '$20', 'Handmade'):"
        ),
        SendOptions::markdown(),
    )
    .await;
}

async fn setup_step(
    state: &AppState,
    api: &dyn ChatApi,
    user: &User,
    setup: SetupConversation,
    text: &str,
) {
    let field = match setup.step {
        SetupStep::Budget => ConfigField::Budget,
        SetupStep::Rules => ConfigField::Rules,
        SetupStep::Deadline => ConfigField::Deadline,
    };

    let result = {
        let mut store = state.store.write().await;
        store.set_config(setup.group_id, user.id, field, text)
    };
    if let Err(err) = result {
        // Event replaced or discarded mid-conversation.
        let mut session = state.session(user.id).await;
        session.setup = None;
        state.set_session(user.id, session).await;
        tracing::debug!(group_id = setup.group_id, %err, "setup aborted");
        send(
            api,
            user.id,
            "❌ Setup canceled: the event is gone or you are no longer its organizer.",
            SendOptions::default(),
        )
        .await;
        return;
    }
    state.persist().await;

    let mut session = state.session(user.id).await;
    let reply = match setup.step {
        SetupStep::Budget => {
            session.setup = Some(SetupConversation {
                group_id: setup.group_id,
                step: SetupStep::Rules,
            });
            "✅ Budget set.\n\n2️⃣ Now enter the *Rules*:"
        }
        SetupStep::Rules => {
            session.setup = Some(SetupConversation {
                group_id: setup.group_id,
                step: SetupStep::Deadline,
            });
            "✅ Rules set.\n\n3️⃣ Now enter the *Deadline* (e.g., 'Dec 24th'):"
        }
        SetupStep::Deadline => {
            session.setup = None;
            "✅ *Configuration complete!*\n\n\
             Go back to the group and click 'Status' to see the changes."
        }
    };
    state.set_session(user.id, session).await;
    send(api, user.id, reply, SendOptions::markdown()).await;
}

/// `/cancel` in private: abort a running setup conversation.
pub async fn cancel_setup(state: &AppState, api: &dyn ChatApi, user: &User) {
    let mut session = state.session(user.id).await;
    if session.setup.take().is_some() {
        state.set_session(user.id, session).await;
        send(api, user.id, "❌ Setup canceled.", SendOptions::default()).await;
    }
}

/// Status button: re-render the dashboard in place.
pub async fn status_callback(
    state: &AppState,
    api: &dyn ChatApi,
    query: &CallbackQuery,
    group_id: GroupId,
) {
    answer(api, query, None, false).await;
    let Some(message) = &query.message else {
        return;
    };

    let text = {
        let store = state.store.read().await;
        store.get(group_id).map(dashboard_text)
    };
    match text {
        Some(text) => {
            let opts = SendOptions::html()
                .with_keyboard(dashboard_keyboard(&state.bot_username, group_id));
            if let Err(err) = api
                .edit_message(message.chat.id, message.message_id, &text, opts)
                .await
            {
                tracing::warn!(group_id, %err, "status edit failed");
            }
        }
        None => {
            if let Err(err) = api
                .edit_message(
                    message.chat.id,
                    message.message_id,
                    "❌ Event expired or data lost (bot restarted).",
                    SendOptions::default(),
                )
                .await
            {
                tracing::warn!(group_id, %err, "status edit failed");
            }
        }
    }
}

/// Shuffle button: organizer-gated draw, private reveals, group announcement,
/// then the event closes.
pub async fn shuffle_callback(
    state: &AppState,
    api: &dyn ChatApi,
    query: &CallbackQuery,
    group_id: GroupId,
) {
    let mut rng = ChaCha8Rng::from_entropy();
    run_shuffle(state, api, query, group_id, &mut rng).await;
}

pub(crate) async fn run_shuffle<R: Rng>(
    state: &AppState,
    api: &dyn ChatApi,
    query: &CallbackQuery,
    group_id: GroupId,
    rng: &mut R,
) {
    let snapshot = {
        let store = state.store.read().await;
        store.get(group_id).cloned()
    };
    let Some(event) = snapshot else {
        answer(api, query, Some("❌ Game not found."), true).await;
        return;
    };

    if !event.is_organizer(query.from.id) {
        answer(
            api,
            query,
            Some("🚫 Only the event creator can start the shuffle!"),
            true,
        )
        .await;
        return;
    }
    answer(api, query, None, false).await;

    let mut ids: Vec<UserId> = event.users.keys().copied().collect();
    ids.sort_unstable();
    let pairs = match assign(&ids, rng) {
        Ok(pairs) => pairs,
        Err(_) => {
            send(
                api,
                group_id,
                "⚠️ Need at least 2 people to shuffle!",
                SendOptions::default(),
            )
            .await;
            return;
        }
    };
    tracing::info!(group_id, pairs = pairs.len(), "assignment drawn");

    let mut blocked = Vec::new();
    for (giver_id, receiver_id) in &pairs {
        let receiver = &event.users[receiver_id];
        let text = reveal_text(receiver, &event.config);
        if let Err(err) = api
            .send_message(*giver_id, &text, SendOptions::markdown())
            .await
        {
            tracing::warn!(group_id, giver = giver_id, %err, "reveal DM failed");
            blocked.push(event.users[giver_id].name.clone());
        }
    }

    let announcement = if blocked.is_empty() {
        "✅ *Shuffle complete!* Check your private messages!".to_string()
    } else {
        format!(
            "✅ Shuffle done! But I couldn't DM these people (bot blocked?): {}",
            blocked.join(", ")
        )
    };
    send(api, group_id, &announcement, SendOptions::markdown()).await;

    {
        let mut store = state.store.write().await;
        if let Err(err) = store.close(group_id) {
            tracing::warn!(group_id, %err, "close failed");
        }
    }
    state.persist().await;
    tracing::info!(group_id, "event closed");
}

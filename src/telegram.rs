//! Telegram wiring: the long-polling dispatcher, command and callback
//! routing, and the [`ChatApi`] implementation the download pipeline talks
//! through.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQuery, ChatId, InlineKeyboardButton, InlineKeyboardMarkup,
    InputFile, MaybeInaccessibleMessage, MessageId, ParseMode, ReplyParameters,
};
use tracing::{debug, info, warn};

use crate::classifier::{Classifier, Verdict};
use crate::download::{
    offer_keyboard, ConversationController, PromptTarget, CB_CANCEL, CB_NO, CB_START_PREFIX,
    CB_YES,
};
use crate::membership;
use crate::messages;
use crate::moderation;
use crate::traits::ChatApi;
use crate::types::{Keyboard, MediaKind, MediaPayload, MessageRef};

/// Telegram caps callback data at 64 bytes; longer URLs skip the offer
/// button and go straight to the confirmation prompt.
const MAX_CALLBACK_DATA: usize = 64;

pub struct TelegramGateway {
    bot: Bot,
    controller: Arc<ConversationController>,
    classifier: Classifier,
    admin_user_ids: Vec<u64>,
}

impl TelegramGateway {
    pub fn new(
        bot: Bot,
        controller: Arc<ConversationController>,
        classifier: Classifier,
        admin_user_ids: Vec<u64>,
    ) -> Self {
        Self {
            bot,
            controller,
            classifier,
            admin_user_ids,
        }
    }

    /// Start the Telegram dispatcher with automatic retry on crash.
    /// Exponential backoff, 5s doubling to a 60s cap; a run that stays up
    /// for 60s resets the backoff.
    pub async fn start_with_retry(self: Arc<Self>) {
        let bot_username = match self.bot.get_me().await {
            Ok(me) => me.user.username.clone().unwrap_or_else(|| "manolobot".to_string()),
            Err(_) => "manolobot".to_string(),
        };

        let initial_backoff = Duration::from_secs(5);
        let max_backoff = Duration::from_secs(60);
        let stable_threshold = Duration::from_secs(60);
        let mut backoff = initial_backoff;

        loop {
            info!(name = %bot_username, "Starting Telegram dispatcher");
            let started = tokio::time::Instant::now();
            self.clone().start().await;
            let ran_for = started.elapsed();

            if ran_for >= stable_threshold {
                backoff = initial_backoff;
            }

            warn!(
                name = %bot_username,
                backoff_secs = backoff.as_secs(),
                ran_for_secs = ran_for.as_secs(),
                "Telegram dispatcher stopped, restarting"
            );
            tokio::time::sleep(backoff).await;
            backoff = std::cmp::min(backoff * 2, max_backoff);
        }
    }

    pub async fn start(self: Arc<Self>) {
        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint({
                let gateway = Arc::clone(&self);
                move |msg: teloxide::types::Message, bot: Bot| {
                    let gateway = Arc::clone(&gateway);
                    async move {
                        gateway.handle_message(msg, bot).await;
                        respond(())
                    }
                }
            }))
            .branch(Update::filter_callback_query().endpoint({
                let gateway = Arc::clone(&self);
                move |q: CallbackQuery, bot: Bot| {
                    let gateway = Arc::clone(&gateway);
                    async move {
                        gateway.handle_callback(q, bot).await;
                        respond(())
                    }
                }
            }))
            .branch(Update::filter_chat_member().endpoint({
                let gateway = Arc::clone(&self);
                move |update: teloxide::types::ChatMemberUpdated, bot: Bot| {
                    let gateway = Arc::clone(&gateway);
                    async move {
                        gateway.handle_chat_member(update, bot).await;
                        respond(())
                    }
                }
            }));

        Dispatcher::builder(self.bot.clone(), handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    async fn handle_message(&self, msg: teloxide::types::Message, bot: Bot) {
        let Some(text) = msg.text() else {
            return;
        };
        if text.starts_with('/') {
            self.handle_command(text, &msg, &bot).await;
            return;
        }

        match self.classifier.scan(text) {
            Verdict::Banned(word) => self.remove_banned_message(&msg, &bot, &word).await,
            Verdict::MediaLink(url) => {
                let Some(user) = msg.from.as_ref() else {
                    return;
                };
                self.controller
                    .enter(
                        user.id.0,
                        &url,
                        PromptTarget::Reply {
                            chat_id: msg.chat.id.0,
                            message_id: msg.id.0,
                        },
                    )
                    .await;
            }
            Verdict::Clean => {}
        }
    }

    /// Delete the offending message and warn its author in the open.
    async fn remove_banned_message(&self, msg: &teloxide::types::Message, bot: &Bot, word: &str) {
        let user_id = msg.from.as_ref().map(|u| u.id.0).unwrap_or(0);
        if let Err(err) = bot.delete_message(msg.chat.id, msg.id).await {
            warn!(user_id, error = %err, "Failed to delete message with banned vocabulary");
        }
        let first_name = msg
            .from
            .as_ref()
            .map(|u| u.first_name.as_str())
            .unwrap_or("amigo");
        if let Err(err) = bot
            .send_message(msg.chat.id, messages::banned_word_warning(first_name))
            .await
        {
            warn!(user_id, error = %err, "Failed to send vocabulary warning");
        }
        info!(user_id, word, "Removed message with banned vocabulary");
    }

    async fn handle_command(&self, text: &str, msg: &teloxide::types::Message, bot: &Bot) {
        let (cmd, arg) = parse_command(text);
        match cmd {
            "/start" => {
                let Some(user) = msg.from.as_ref() else {
                    return;
                };
                info!(user_id = user.id.0, "User started a conversation");
                let reply = bot
                    .send_message(msg.chat.id, messages::welcome(&user.first_name, user.id.0))
                    .parse_mode(ParseMode::MarkdownV2)
                    .reply_parameters(ReplyParameters::new(msg.id))
                    .await;
                if let Err(err) = reply {
                    warn!(error = %err, "Failed to send welcome message");
                }
            }
            "/rules" => {
                let reply = bot
                    .send_message(msg.chat.id, messages::rules())
                    .parse_mode(ParseMode::MarkdownV2)
                    .await;
                if let Err(err) = reply {
                    warn!(error = %err, "Failed to send group rules");
                }
            }
            "/download" => self.handle_download_command(arg, msg, bot).await,
            "/stop" => {
                let Some(user) = msg.from.as_ref() else {
                    return;
                };
                let cancelled = self.controller.external_cancel(user.id.0).await;
                info!(user_id = user.id.0, cancelled, "Stop requested");
                if let Err(err) = bot
                    .send_message(msg.chat.id, messages::ALL_OPERATIONS_CANCELLED)
                    .reply_parameters(ReplyParameters::new(msg.id))
                    .await
                {
                    warn!(error = %err, "Failed to acknowledge stop command");
                }
            }
            "/ban" => {
                if let Err(err) = moderation::handle_ban(bot, msg, &self.admin_user_ids).await {
                    warn!(error = %err, "Ban command failed");
                }
            }
            "/unban" => {
                if let Err(err) = moderation::handle_unban(bot, msg, &self.admin_user_ids).await {
                    warn!(error = %err, "Unban command failed");
                }
            }
            "/unrestrict" => {
                if let Err(err) =
                    moderation::handle_unrestrict(bot, msg, &self.admin_user_ids).await
                {
                    warn!(error = %err, "Unrestrict command failed");
                }
            }
            _ => debug!(cmd, "Ignoring unknown command"),
        }
    }

    /// /download [url]: post an offer message whose button opens the
    /// confirmation dialog. URLs too long for callback data skip the offer.
    async fn handle_download_command(
        &self,
        arg: &str,
        msg: &teloxide::types::Message,
        bot: &Bot,
    ) {
        let Some(user) = msg.from.as_ref() else {
            return;
        };
        let mut parts = arg.split_whitespace();
        let url = match (parts.next(), parts.next()) {
            (Some(url), None) => url,
            _ => {
                if let Err(err) = bot
                    .send_message(msg.chat.id, messages::DOWNLOAD_USAGE)
                    .reply_parameters(ReplyParameters::new(msg.id))
                    .await
                {
                    warn!(error = %err, "Failed to send download usage");
                }
                return;
            }
        };

        if CB_START_PREFIX.len() + url.len() > MAX_CALLBACK_DATA {
            debug!(user_id = user.id.0, "URL too long for an offer button, prompting directly");
            self.controller
                .enter(
                    user.id.0,
                    url,
                    PromptTarget::Reply {
                        chat_id: msg.chat.id.0,
                        message_id: msg.id.0,
                    },
                )
                .await;
            return;
        }

        info!(user_id = user.id.0, url, "Offering download");
        let send = bot
            .send_message(msg.chat.id, messages::download_offer(url))
            .reply_markup(markup(&offer_keyboard(url)))
            .reply_parameters(ReplyParameters::new(msg.id))
            .await;
        if let Err(err) = send {
            warn!(error = %err, "Failed to send download offer");
        }
    }

    async fn handle_callback(&self, q: CallbackQuery, bot: Bot) {
        let CallbackQuery {
            id,
            from,
            message,
            data,
            ..
        } = q;

        // Acknowledge right away so the button stops spinning, whatever
        // happens to the dialog afterwards.
        if let Err(err) = bot.answer_callback_query(id).await {
            debug!(error = %err, "Failed to answer callback query");
        }

        let Some(data) = data else {
            return;
        };
        let Some(MaybeInaccessibleMessage::Regular(m)) = message else {
            debug!(user_id = from.id.0, "Callback without an accessible message");
            return;
        };
        let message = MessageRef::new(m.chat.id.0, m.id.0);
        let user_id = from.id.0;

        if let Some(url) = data.strip_prefix(CB_START_PREFIX) {
            self.controller
                .enter(user_id, url, PromptTarget::Edit(message))
                .await;
            return;
        }
        match data.as_str() {
            CB_YES => {
                self.controller.confirm(user_id, message).await;
            }
            CB_NO => {
                self.controller.decline(user_id, message).await;
            }
            CB_CANCEL => {
                let cancelled = self.controller.external_cancel(user_id).await;
                if !cancelled {
                    // Stale button: no dialog left, just settle the message.
                    if let Err(err) = bot
                        .edit_message_text(
                            ChatId(message.chat_id),
                            MessageId(message.message_id),
                            messages::OPERATION_CANCELLED,
                        )
                        .await
                    {
                        debug!(user_id, error = %err, "Failed to settle stale cancel");
                    }
                }
            }
            _ => debug!(user_id, data = %data, "Ignoring unknown callback"),
        }
    }

    async fn handle_chat_member(
        &self,
        update: teloxide::types::ChatMemberUpdated,
        bot: Bot,
    ) {
        if let Err(err) = membership::handle_chat_member(&bot, &update).await {
            warn!(error = %err, "Failed to greet new member");
        }
    }
}

/// First whitespace-separated token with any @botname suffix removed, plus
/// the remainder. Commands in groups arrive as `/cmd@botname args`.
fn parse_command(text: &str) -> (&str, &str) {
    let mut parts = text.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("");
    let arg = parts.next().unwrap_or("").trim();
    let cmd = cmd.split('@').next().unwrap_or(cmd);
    (cmd, arg)
}

fn markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

/// The production [`ChatApi`]: a thin translation onto the Bot client.
pub struct TelegramApi {
    bot: Bot,
}

impl TelegramApi {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatApi for TelegramApi {
    async fn send_keyboard(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        text: &str,
        keyboard: &Keyboard,
    ) -> anyhow::Result<MessageRef> {
        let mut req = self.bot.send_message(ChatId(chat_id), text);
        if !keyboard.rows.is_empty() {
            req = req.reply_markup(markup(keyboard));
        }
        if let Some(message_id) = reply_to {
            req = req.reply_parameters(ReplyParameters::new(MessageId(message_id)));
        }
        let sent = req.await?;
        Ok(MessageRef::new(chat_id, sent.id.0))
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> anyhow::Result<()> {
        self.bot
            .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text)
            .await?;
        Ok(())
    }

    async fn edit_text_keyboard(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: &Keyboard,
    ) -> anyhow::Result<()> {
        self.bot
            .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text)
            .reply_markup(markup(keyboard))
            .await?;
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> anyhow::Result<()> {
        self.bot
            .delete_message(ChatId(message.chat_id), MessageId(message.message_id))
            .await?;
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        media: &MediaPayload,
        caption: &str,
    ) -> anyhow::Result<()> {
        let file = InputFile::file(media.path.clone()).file_name(media.file_name.clone());
        let reply = reply_to.map(|id| ReplyParameters::new(MessageId(id)));
        match media.kind {
            MediaKind::Photo => {
                let mut req = self.bot.send_photo(ChatId(chat_id), file).caption(caption);
                if let Some(reply) = reply {
                    req = req.reply_parameters(reply);
                }
                req.await?;
            }
            MediaKind::Video => {
                let mut req = self.bot.send_video(ChatId(chat_id), file).caption(caption);
                if let Some(reply) = reply {
                    req = req.reply_parameters(reply);
                }
                req.await?;
            }
            MediaKind::Document => {
                let mut req = self
                    .bot
                    .send_document(ChatId(chat_id), file)
                    .caption(caption);
                if let Some(reply) = reply {
                    req = req.reply_parameters(reply);
                }
                req.await?;
            }
        }
        Ok(())
    }
}

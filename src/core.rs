use std::sync::Arc;

use teloxide::Bot;
use tracing::info;

use crate::classifier::Classifier;
use crate::config::AppConfig;
use crate::download::{ConversationController, SessionRegistry};
use crate::telegram::{TelegramApi, TelegramGateway};
use crate::ytdlp::YtDlpFetcher;

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    // 1. Telegram client, shared by the gateway and the chat API.
    let bot = Bot::new(&config.telegram.bot_token);
    let chat = Arc::new(TelegramApi::new(bot.clone()));

    // 2. Download pipeline.
    let registry = Arc::new(SessionRegistry::new());
    let fetcher = Arc::new(YtDlpFetcher::new(&config.downloads));
    let controller = Arc::new(ConversationController::new(registry, chat, fetcher));
    info!(
        ytdlp_bin = %config.downloads.ytdlp_bin,
        max_height = config.downloads.max_height,
        "Download pipeline configured"
    );

    // 3. Moderation.
    let classifier = Classifier::new(&config.moderation.banned_words);
    info!(
        admins = config.moderation.admin_user_ids.len(),
        banned_words = config.moderation.banned_words.len(),
        "Moderation configured"
    );

    // 4. Gateway. Runs until the process is stopped.
    let gateway = Arc::new(TelegramGateway::new(
        bot,
        controller,
        classifier,
        config.moderation.admin_user_ids.clone(),
    ));
    gateway.start_with_retry().await;
    Ok(())
}

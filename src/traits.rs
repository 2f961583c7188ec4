use std::ops::ControlFlow;

use async_trait::async_trait;

use crate::download::DownloadError;
use crate::types::{Keyboard, MediaMetadata, MediaPayload, MessageRef};

/// A progress report from the download engine, clamped to 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub percent: u8,
}

/// Synchronous callback the engine invokes per progress line. Returning
/// `Break` tells the engine to stop transferring and abandon the job.
pub type ProgressSink<'a> = &'a (dyn Fn(Progress) -> ControlFlow<()> + Send + Sync);

/// Outbound chat operations the conversation needs. Implemented for the real
/// Telegram client in production and by a recording double in tests.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send a text message, optionally replying to another message and
    /// attaching inline buttons. Returns a handle to the new message.
    async fn send_keyboard(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        text: &str,
        keyboard: &Keyboard,
    ) -> anyhow::Result<MessageRef>;

    /// Replace a message's text, dropping any inline buttons it carried.
    async fn edit_text(&self, message: MessageRef, text: &str) -> anyhow::Result<()>;

    /// Replace a message's text and inline buttons together.
    async fn edit_text_keyboard(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: &Keyboard,
    ) -> anyhow::Result<()>;

    async fn delete_message(&self, message: MessageRef) -> anyhow::Result<()>;

    /// Deliver a downloaded file into the chat with a caption.
    async fn send_media(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        media: &MediaPayload,
        caption: &str,
    ) -> anyhow::Result<()>;
}

/// The download engine. `probe` resolves what a URL points at without
/// transferring it; `fetch` pulls the file while streaming progress through
/// the sink.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn probe(&self, url: &str) -> Result<MediaMetadata, DownloadError>;

    async fn fetch(
        &self,
        url: &str,
        progress: ProgressSink<'_>,
    ) -> Result<MediaPayload, DownloadError>;
}

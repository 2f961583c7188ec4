use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::registry::{DownloadSession, SessionRegistry};
use super::{cancel_keyboard, DownloadError};
use crate::messages;
use crate::traits::{ChatApi, MediaFetcher, Progress};
use crate::types::{MediaMetadata, MediaPayload, MessageRef};

/// One confirmed download, run to completion in a spawned task.
///
/// The worker never cancels itself; it polls the registry before every
/// externally visible step and simply stops when its session is no longer
/// the user's active one. Whoever deactivated the session already wrote the
/// terminal message.
pub(super) struct DownloadWorker {
    registry: Arc<SessionRegistry>,
    chat: Arc<dyn ChatApi>,
    fetcher: Arc<dyn MediaFetcher>,
    user_id: u64,
    session_id: u64,
    url: String,
    chat_id: i64,
    reply_to: Option<i32>,
    progress_message: MessageRef,
}

impl DownloadWorker {
    pub(super) fn new(
        registry: Arc<SessionRegistry>,
        chat: Arc<dyn ChatApi>,
        fetcher: Arc<dyn MediaFetcher>,
        user_id: u64,
        session: &DownloadSession,
        progress_message: MessageRef,
    ) -> Self {
        Self {
            registry,
            chat,
            fetcher,
            user_id,
            session_id: session.id,
            url: session.url.clone(),
            chat_id: session.chat_id,
            reply_to: session.reply_to,
            progress_message,
        }
    }

    pub(super) async fn run(self) {
        let started = Instant::now();
        if !self.is_active() {
            debug!(user_id = self.user_id, "Cancelled before the worker started");
            return;
        }

        let metadata = match self.fetcher.probe(&self.url).await {
            Ok(metadata) => metadata,
            Err(err) => {
                self.finish_with_error(err).await;
                return;
            }
        };
        if !self.is_active() {
            debug!(user_id = self.user_id, "Cancelled while probing metadata");
            return;
        }
        info!(
            user_id = self.user_id,
            title = %metadata.title,
            duration_secs = metadata.duration_secs,
            "Resolved media metadata"
        );

        match self.fetch_with_progress(&metadata).await {
            Ok(payload) => self.deliver(payload, &metadata, started).await,
            Err(err) if err.is_cancelled() => {
                debug!(user_id = self.user_id, "Download stopped at a cancellation checkpoint");
            }
            Err(err) => self.finish_with_error(err).await,
        }
    }

    /// Run the engine, mirroring its progress into the chat. Each edit goes
    /// out in its own task so a chatty engine never stalls on the API; every
    /// spawned edit re-checks the session right before writing.
    async fn fetch_with_progress(
        &self,
        metadata: &MediaMetadata,
    ) -> Result<MediaPayload, DownloadError> {
        let registry = Arc::clone(&self.registry);
        let chat = Arc::clone(&self.chat);
        let user_id = self.user_id;
        let session_id = self.session_id;
        let message = self.progress_message;
        let metadata = metadata.clone();

        let on_progress = move |progress: Progress| -> ControlFlow<()> {
            if !registry.is_active(user_id, session_id) {
                return ControlFlow::Break(());
            }
            if let Some(percent) = registry.advance_progress(user_id, session_id, progress.percent)
            {
                let text =
                    messages::download_progress(&metadata.title, metadata.duration_secs, percent);
                let registry = Arc::clone(&registry);
                let chat = Arc::clone(&chat);
                tokio::spawn(async move {
                    if !registry.is_active(user_id, session_id) {
                        return;
                    }
                    if let Err(err) = chat.edit_text_keyboard(message, &text, &cancel_keyboard()).await
                    {
                        warn!(user_id, error = %err, "Progress edit failed");
                    }
                });
            }
            ControlFlow::Continue(())
        };

        self.fetcher.fetch(&self.url, &on_progress).await
    }

    /// Success path: claim the terminal transition, send the file, then
    /// remove the progress message. Sending before deleting keeps the
    /// progress message around to carry an error notice if delivery fails.
    async fn deliver(&self, payload: MediaPayload, metadata: &MediaMetadata, started: Instant) {
        let Some(session) = self.registry.take_if_active(self.user_id, self.session_id) else {
            debug!(user_id = self.user_id, "Cancelled before delivery");
            return;
        };
        session.watchdog.cancel();

        let caption = messages::download_complete(&metadata.title);
        match self
            .chat
            .send_media(self.chat_id, self.reply_to, &payload, &caption)
            .await
        {
            Ok(()) => {
                if let Err(err) = self.chat.delete_message(self.progress_message).await {
                    warn!(user_id = self.user_id, error = %err, "Failed to delete progress message");
                }
                info!(
                    user_id = self.user_id,
                    url = %self.url,
                    file = %payload.file_name,
                    elapsed_secs = started.elapsed().as_secs(),
                    "Download delivered"
                );
            }
            Err(err) => {
                warn!(user_id = self.user_id, error = %err, "Media delivery failed");
                if let Err(err) = self
                    .chat
                    .edit_text(self.progress_message, messages::DELIVERY_FAILED)
                    .await
                {
                    warn!(user_id = self.user_id, error = %err, "Failed to edit delivery error");
                }
            }
        }
    }

    /// Failure path. Skipped entirely when the session was already
    /// finalized by a cancel, so the cancel notice stays the last word.
    async fn finish_with_error(&self, err: DownloadError) {
        let Some(session) = self.registry.take_if_active(self.user_id, self.session_id) else {
            debug!(user_id = self.user_id, "Download failed after cancellation, staying quiet");
            return;
        };
        session.watchdog.cancel();
        match &err {
            DownloadError::Unexpected(inner) => {
                error!(user_id = self.user_id, url = %self.url, error = ?inner, "Unexpected download failure")
            }
            _ => warn!(user_id = self.user_id, url = %self.url, error = %err, "Download failed"),
        }
        if let Err(edit_err) = self
            .chat
            .edit_text(self.progress_message, &messages::download_error(&err))
            .await
        {
            warn!(user_id = self.user_id, error = %edit_err, "Failed to edit failure notice");
        }
    }

    fn is_active(&self) -> bool {
        self.registry.is_active(self.user_id, self.session_id)
    }
}

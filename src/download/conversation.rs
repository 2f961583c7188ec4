use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::registry::{DownloadSession, SessionRegistry};
use super::timeout::TimeoutSupervisor;
use super::worker::DownloadWorker;
use super::{cancel_keyboard, confirm_keyboard, CancelReason, ConversationState, DIALOG_TIMEOUT};
use crate::messages;
use crate::traits::{ChatApi, MediaFetcher};
use crate::types::MessageRef;

/// Where `enter` should place the confirmation prompt.
#[derive(Debug, Clone, Copy)]
pub enum PromptTarget {
    /// Rewrite an existing bot message in place (the /download offer).
    Edit(MessageRef),
    /// Send a fresh prompt replying to the user's link message.
    Reply { chat_id: i64, message_id: i32 },
}

/// Drives the per-user download dialog: prompt, confirm or decline, spawn
/// the worker, and cancel from outside when asked. All session bookkeeping
/// goes through the [`SessionRegistry`]; this type never holds dialog state
/// of its own.
pub struct ConversationController {
    registry: Arc<SessionRegistry>,
    chat: Arc<dyn ChatApi>,
    fetcher: Arc<dyn MediaFetcher>,
    supervisor: TimeoutSupervisor,
}

impl ConversationController {
    pub fn new(
        registry: Arc<SessionRegistry>,
        chat: Arc<dyn ChatApi>,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Self {
        Self {
            registry,
            chat,
            fetcher,
            supervisor: TimeoutSupervisor::new(DIALOG_TIMEOUT),
        }
    }

    pub fn state_of(&self, user_id: u64) -> ConversationState {
        match self.registry.get(user_id) {
            None => ConversationState::Idle,
            Some(s) if s.active => ConversationState::Running,
            Some(_) => ConversationState::Choosing,
        }
    }

    /// Open a download dialog for a URL. Any earlier dialog of the same
    /// user, deciding or downloading, is cancelled first and its message
    /// gets a supersede notice.
    pub async fn enter(
        self: &Arc<Self>,
        user_id: u64,
        url: &str,
        target: PromptTarget,
    ) -> ConversationState {
        self.finalize(user_id, CancelReason::Superseded).await;

        let text = messages::download_prompt(url);
        let keyboard = confirm_keyboard();
        let (chat_id, reply_to, prompt) = match target {
            PromptTarget::Edit(message) => {
                if let Err(err) = self.chat.edit_text_keyboard(message, &text, &keyboard).await {
                    warn!(user_id, error = %err, "Failed to turn offer into download prompt");
                    return ConversationState::Idle;
                }
                (message.chat_id, None, message)
            }
            PromptTarget::Reply {
                chat_id,
                message_id,
            } => {
                match self
                    .chat
                    .send_keyboard(chat_id, Some(message_id), &text, &keyboard)
                    .await
                {
                    Ok(message) => (chat_id, Some(message_id), message),
                    Err(err) => {
                        warn!(user_id, error = %err, "Failed to send download prompt");
                        return ConversationState::Idle;
                    }
                }
            }
        };

        let mut session = DownloadSession::new(url, chat_id, reply_to);
        session.progress_message = Some(prompt);
        let watchdog = session.watchdog.clone();
        let session_id = self.registry.install(user_id, session);
        self.supervisor
            .watch(Arc::clone(self), user_id, session_id, watchdog);
        info!(user_id, url = %url, "Download dialog opened");
        ConversationState::Choosing
    }

    /// The SI button: mark the session active and hand it to a background
    /// worker. Stale presses with no session behind them get a short notice.
    pub async fn confirm(self: &Arc<Self>, user_id: u64, prompt: MessageRef) -> ConversationState {
        let Some(session) = self.registry.get(user_id) else {
            debug!(user_id, "Confirm pressed with no session behind it");
            if let Err(err) = self.chat.edit_text(prompt, messages::NO_URL_FOUND).await {
                debug!(user_id, error = %err, "Failed to edit stale confirm prompt");
            }
            return ConversationState::Idle;
        };
        if session.active {
            return ConversationState::Running;
        }

        let text = messages::download_starting(&session.url);
        if let Err(err) = self
            .chat
            .edit_text_keyboard(prompt, &text, &cancel_keyboard())
            .await
        {
            warn!(user_id, error = %err, "Failed to edit prompt into progress message");
        }
        if !self.registry.activate(user_id, session.id, prompt) {
            debug!(user_id, "Session withdrawn while confirming");
            return ConversationState::Idle;
        }

        info!(user_id, url = %session.url, "Download confirmed, starting worker");
        let worker = DownloadWorker::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.chat),
            Arc::clone(&self.fetcher),
            user_id,
            &session,
            prompt,
        );
        tokio::spawn(worker.run());
        ConversationState::Running
    }

    /// The NO button: drop the pending session and confirm the refusal on
    /// the prompt itself.
    pub async fn decline(&self, user_id: u64, prompt: MessageRef) -> ConversationState {
        if let Some(session) = self.registry.remove(user_id) {
            session.watchdog.cancel();
            info!(user_id, url = %session.url, "Download declined");
        }
        if let Err(err) = self.chat.edit_text(prompt, messages::DOWNLOAD_DECLINED).await {
            debug!(user_id, error = %err, "Failed to edit declined prompt");
        }
        ConversationState::Idle
    }

    /// Cancel from outside the dialog (the Cancelar button or /stop).
    /// Returns whether there was a live dialog to cancel.
    pub async fn external_cancel(&self, user_id: u64) -> bool {
        self.finalize(user_id, CancelReason::UserRequest).await
    }

    /// Watchdog expiry. Only touches the session the watchdog was armed
    /// for; a successor dialog keeps running untouched.
    pub(super) async fn cancel_for_timeout(&self, user_id: u64, session_id: u64) {
        let Some(session) = self.registry.remove_matching(user_id, session_id) else {
            return;
        };
        session.watchdog.cancel();
        warn!(user_id, url = %session.url, "Download dialog timed out");
        self.notify_finalized(user_id, &session, messages::DOWNLOAD_TIMED_OUT)
            .await;
    }

    /// Remove whatever session the user has and leave one finalize notice
    /// on its message. Idempotent: a second call finds nothing.
    async fn finalize(&self, user_id: u64, reason: CancelReason) -> bool {
        let Some(session) = self.registry.remove(user_id) else {
            return false;
        };
        session.watchdog.cancel();
        let age_secs = (Utc::now() - session.started_at).num_seconds();
        info!(user_id, url = %session.url, ?reason, age_secs, "Download session cancelled");
        let text = match reason {
            CancelReason::UserRequest => messages::DOWNLOAD_CANCELLED_BY_USER,
            CancelReason::Superseded => messages::DOWNLOAD_SUPERSEDED,
            CancelReason::TimedOut => messages::DOWNLOAD_TIMED_OUT,
        };
        self.notify_finalized(user_id, &session, text).await;
        true
    }

    async fn notify_finalized(&self, user_id: u64, session: &DownloadSession, text: &str) {
        if let Some(message) = session.progress_message {
            if let Err(err) = self.chat.edit_text(message, text).await {
                warn!(user_id, error = %err, "Failed to edit finalize notice");
            }
        }
    }
}

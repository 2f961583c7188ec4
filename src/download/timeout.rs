use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::conversation::ConversationController;

/// Arms one watchdog task per dialog. The watchdog loses the race against
/// any terminal transition, because every one of those cancels the session's
/// token before it does anything else.
pub(super) struct TimeoutSupervisor {
    timeout: Duration,
}

impl TimeoutSupervisor {
    pub(super) fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub(super) fn watch(
        &self,
        controller: Arc<ConversationController>,
        user_id: u64,
        session_id: u64,
        watchdog: CancellationToken,
    ) {
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = watchdog.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    controller.cancel_for_timeout(user_id, session_id).await;
                }
            }
        });
    }
}

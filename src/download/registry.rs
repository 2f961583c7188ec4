use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::PROGRESS_STEP;
use crate::types::MessageRef;

/// One user's pending or in-flight download.
#[derive(Debug, Clone)]
pub struct DownloadSession {
    /// Registry-assigned identity. A worker only acts on behalf of the
    /// session id it was spawned with, so a superseded worker can never
    /// mistake its successor's entry for its own.
    pub id: u64,
    pub url: String,
    pub chat_id: i64,
    /// The user message that carried the link, when the dialog started from
    /// one. Deliveries reply to it.
    pub reply_to: Option<i32>,
    /// True only while a worker may keep fetching and editing progress.
    pub active: bool,
    /// The prompt message, later reused as the progress message.
    pub progress_message: Option<MessageRef>,
    /// Last percentage actually surfaced to the user.
    pub last_reported_progress: u8,
    pub started_at: DateTime<Utc>,
    /// Cancelled on every terminal transition; stops the dialog watchdog.
    pub watchdog: CancellationToken,
}

impl DownloadSession {
    pub fn new(url: impl Into<String>, chat_id: i64, reply_to: Option<i32>) -> Self {
        Self {
            id: 0,
            url: url.into(),
            chat_id,
            reply_to,
            active: false,
            progress_message: None,
            last_reported_progress: 0,
            started_at: Utc::now(),
            watchdog: CancellationToken::new(),
        }
    }
}

/// In-memory map of user id to download session. The single source of truth
/// for "is this user's download still the one that should be running".
///
/// A synchronous lock on purpose: the engine reports progress through a
/// synchronous callback, and every critical section is a short map access.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<u64, DownloadSession>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Install a session for a user, assigning its identity. Any previous
    /// entry for that user is replaced wholesale.
    pub fn install(&self, user_id: u64, mut session: DownloadSession) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        session.id = id;
        self.write().insert(user_id, session);
        id
    }

    pub fn get(&self, user_id: u64) -> Option<DownloadSession> {
        self.read().get(&user_id).cloned()
    }

    /// Remove whatever session the user has, if any.
    pub fn remove(&self, user_id: u64) -> Option<DownloadSession> {
        self.write().remove(&user_id)
    }

    /// Remove the user's session only if it is still the given one.
    pub fn remove_matching(&self, user_id: u64, session_id: u64) -> Option<DownloadSession> {
        let mut sessions = self.write();
        if sessions.get(&user_id).is_some_and(|s| s.id == session_id) {
            sessions.remove(&user_id)
        } else {
            None
        }
    }

    /// Flip the session to active and record its progress message. The
    /// confirm edge. Fails if the session was replaced or withdrawn.
    pub fn activate(&self, user_id: u64, session_id: u64, progress_message: MessageRef) -> bool {
        let mut sessions = self.write();
        match sessions.get_mut(&user_id) {
            Some(s) if s.id == session_id => {
                s.active = true;
                s.progress_message = Some(progress_message);
                true
            }
            _ => false,
        }
    }

    /// Whether the given session is still the user's current one and active.
    /// Workers poll this at every checkpoint.
    pub fn is_active(&self, user_id: u64, session_id: u64) -> bool {
        self.read()
            .get(&user_id)
            .is_some_and(|s| s.id == session_id && s.active)
    }

    /// Atomically claim the terminal transition: remove the session if it is
    /// still this one and active. Exactly one caller wins, so exactly one
    /// terminal message gets written.
    pub fn take_if_active(&self, user_id: u64, session_id: u64) -> Option<DownloadSession> {
        let mut sessions = self.write();
        if sessions
            .get(&user_id)
            .is_some_and(|s| s.id == session_id && s.active)
        {
            sessions.remove(&user_id)
        } else {
            None
        }
    }

    /// Record a progress value if it deserves an edit: never backwards,
    /// at least [`PROGRESS_STEP`] beyond the last surfaced value, except
    /// that 100 always surfaces once. Returns the value to display.
    pub fn advance_progress(&self, user_id: u64, session_id: u64, percent: u8) -> Option<u8> {
        let percent = percent.min(100);
        let mut sessions = self.write();
        let session = sessions.get_mut(&user_id)?;
        if session.id != session_id || !session.active {
            return None;
        }
        if percent < session.last_reported_progress {
            return None;
        }
        let big_enough = percent >= session.last_reported_progress.saturating_add(PROGRESS_STEP);
        let completes = percent == 100 && session.last_reported_progress < 100;
        if big_enough || completes {
            session.last_reported_progress = percent;
            Some(percent)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<u64, DownloadSession>> {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<u64, DownloadSession>> {
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: u64 = 42;

    fn message() -> MessageRef {
        MessageRef::new(-100, 7)
    }

    fn installed(registry: &SessionRegistry) -> u64 {
        registry.install(USER, DownloadSession::new("https://youtu.be/a", -100, None))
    }

    // --- lifecycle ---

    #[test]
    fn install_get_remove_roundtrip() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty());
        let id = installed(&registry);
        let session = registry.get(USER).unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.url, "https://youtu.be/a");
        assert!(!session.active);
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(USER).is_some());
        assert!(registry.remove(USER).is_none());
    }

    #[test]
    fn install_replaces_previous_session() {
        let registry = SessionRegistry::new();
        let first = installed(&registry);
        let second = registry.install(USER, DownloadSession::new("https://youtu.be/b", -100, None));
        assert_ne!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(USER).unwrap().url, "https://youtu.be/b");
    }

    #[test]
    fn activate_requires_matching_identity() {
        let registry = SessionRegistry::new();
        let id = installed(&registry);
        assert!(!registry.activate(USER, id + 1, message()));
        assert!(!registry.is_active(USER, id));
        assert!(registry.activate(USER, id, message()));
        assert!(registry.is_active(USER, id));
        assert_eq!(registry.get(USER).unwrap().progress_message, Some(message()));
    }

    #[test]
    fn take_if_active_claims_exactly_once() {
        let registry = SessionRegistry::new();
        let id = installed(&registry);
        assert!(registry.take_if_active(USER, id).is_none());
        registry.activate(USER, id, message());
        assert!(registry.take_if_active(USER, id).is_some());
        assert!(registry.take_if_active(USER, id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn stale_worker_sees_successor_as_inactive() {
        let registry = SessionRegistry::new();
        let old = installed(&registry);
        registry.activate(USER, old, message());
        let new = registry.install(USER, DownloadSession::new("https://youtu.be/b", -100, None));
        registry.activate(USER, new, message());
        assert!(!registry.is_active(USER, old));
        assert!(registry.take_if_active(USER, old).is_none());
        assert!(registry.is_active(USER, new));
    }

    #[test]
    fn remove_matching_spares_a_replacement() {
        let registry = SessionRegistry::new();
        let old = installed(&registry);
        let new = registry.install(USER, DownloadSession::new("https://youtu.be/b", -100, None));
        assert!(registry.remove_matching(USER, old).is_none());
        assert_eq!(registry.get(USER).unwrap().id, new);
        assert!(registry.remove_matching(USER, new).is_some());
        assert!(registry.is_empty());
    }

    // --- progress policy ---

    #[test]
    fn progress_throttles_small_increments() {
        let registry = SessionRegistry::new();
        let id = installed(&registry);
        registry.activate(USER, id, message());
        assert_eq!(registry.advance_progress(USER, id, 0), None);
        assert_eq!(registry.advance_progress(USER, id, 5), None);
        assert_eq!(registry.advance_progress(USER, id, 12), Some(12));
        assert_eq!(registry.advance_progress(USER, id, 19), None);
        assert_eq!(registry.advance_progress(USER, id, 47), Some(47));
    }

    #[test]
    fn progress_never_goes_backwards() {
        let registry = SessionRegistry::new();
        let id = installed(&registry);
        registry.activate(USER, id, message());
        assert_eq!(registry.advance_progress(USER, id, 50), Some(50));
        assert_eq!(registry.advance_progress(USER, id, 30), None);
        assert_eq!(registry.get(USER).unwrap().last_reported_progress, 50);
    }

    #[test]
    fn hundred_surfaces_once_regardless_of_step() {
        let registry = SessionRegistry::new();
        let id = installed(&registry);
        registry.activate(USER, id, message());
        assert_eq!(registry.advance_progress(USER, id, 95), Some(95));
        assert_eq!(registry.advance_progress(USER, id, 100), Some(100));
        assert_eq!(registry.advance_progress(USER, id, 100), None);
    }

    #[test]
    fn progress_ignores_inactive_and_stale_sessions() {
        let registry = SessionRegistry::new();
        let id = installed(&registry);
        assert_eq!(registry.advance_progress(USER, id, 50), None);
        registry.activate(USER, id, message());
        assert_eq!(registry.advance_progress(USER, id + 1, 50), None);
        assert_eq!(registry.advance_progress(USER + 1, id, 50), None);
        assert_eq!(registry.advance_progress(USER, id, 120), Some(100));
    }
}

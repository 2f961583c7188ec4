//! Test infrastructure: RecordingChat and ScriptedFetcher.
//!
//! RecordingChat captures every outbound chat operation; ScriptedFetcher
//! plays back a queue of fetch plans, optionally holding a fetch open on a
//! gate so tests can cancel mid-download deterministically.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::download::DownloadError;
use crate::traits::{ChatApi, MediaFetcher, Progress, ProgressSink};
use crate::types::{Keyboard, MediaMetadata, MediaPayload, MessageRef};

// ---------------------------------------------------------------------------
// RecordingChat
// ---------------------------------------------------------------------------

/// One captured chat operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Sent {
        message: MessageRef,
        reply_to: Option<i32>,
        text: String,
        buttons: Vec<String>,
    },
    Edited {
        message: MessageRef,
        text: String,
        buttons: Vec<String>,
    },
    Deleted {
        message: MessageRef,
    },
    Media {
        chat_id: i64,
        reply_to: Option<i32>,
        file_name: String,
        caption: String,
    },
}

/// ChatApi double that records calls and hands out sequential message ids.
pub struct RecordingChat {
    next_message_id: AtomicI32,
    events: Mutex<Vec<ChatEvent>>,
    /// When set, edits fail. Exercises the best-effort edit paths.
    pub fail_edits: AtomicBool,
    /// When set, media sends fail. Exercises the delivery error path.
    pub fail_media: AtomicBool,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicI32::new(1000),
            events: Mutex::new(Vec::new()),
            fail_edits: AtomicBool::new(false),
            fail_media: AtomicBool::new(false),
        }
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Texts written to one message, sends and edits alike, in order.
    pub fn texts_of(&self, message: MessageRef) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ChatEvent::Sent {
                    message: m, text, ..
                }
                | ChatEvent::Edited {
                    message: m, text, ..
                } if m == message => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_text_of(&self, message: MessageRef) -> Option<String> {
        self.texts_of(message).pop()
    }

    pub fn deleted(&self, message: MessageRef) -> bool {
        self.events()
            .iter()
            .any(|event| matches!(event, ChatEvent::Deleted { message: m } if *m == message))
    }

    pub fn media_sent(&self) -> Vec<ChatEvent> {
        self.events()
            .into_iter()
            .filter(|event| matches!(event, ChatEvent::Media { .. }))
            .collect()
    }

    fn record(&self, event: ChatEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ChatApi for RecordingChat {
    async fn send_keyboard(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        text: &str,
        keyboard: &Keyboard,
    ) -> anyhow::Result<MessageRef> {
        let message = MessageRef::new(chat_id, self.next_message_id.fetch_add(1, Ordering::SeqCst));
        self.record(ChatEvent::Sent {
            message,
            reply_to,
            text: text.to_string(),
            buttons: keyboard.labels(),
        });
        Ok(message)
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> anyhow::Result<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            anyhow::bail!("edit refused");
        }
        self.record(ChatEvent::Edited {
            message,
            text: text.to_string(),
            buttons: Vec::new(),
        });
        Ok(())
    }

    async fn edit_text_keyboard(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: &Keyboard,
    ) -> anyhow::Result<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            anyhow::bail!("edit refused");
        }
        self.record(ChatEvent::Edited {
            message,
            text: text.to_string(),
            buttons: keyboard.labels(),
        });
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> anyhow::Result<()> {
        self.record(ChatEvent::Deleted { message });
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        media: &MediaPayload,
        caption: &str,
    ) -> anyhow::Result<()> {
        if self.fail_media.load(Ordering::SeqCst) {
            anyhow::bail!("media refused");
        }
        self.record(ChatEvent::Media {
            chat_id,
            reply_to,
            file_name: media.file_name.clone(),
            caption: caption.to_string(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedFetcher
// ---------------------------------------------------------------------------

/// What one `fetch` call should do.
pub struct FetchPlan {
    pub percents: Vec<u8>,
    /// When present, fetch blocks on this gate before reporting progress.
    /// The fetcher signals `fetch_started` first, so a test can wait for
    /// the worker to be mid-fetch, act, then open the gate.
    pub gate: Option<Arc<Notify>>,
    pub outcome: FetchOutcome,
}

pub enum FetchOutcome {
    Deliver,
    Fail(String),
}

impl FetchPlan {
    pub fn delivering(percents: Vec<u8>) -> Self {
        Self {
            percents,
            gate: None,
            outcome: FetchOutcome::Deliver,
        }
    }

    pub fn gated(percents: Vec<u8>, gate: Arc<Notify>) -> Self {
        Self {
            percents,
            gate: Some(gate),
            outcome: FetchOutcome::Deliver,
        }
    }

    pub fn failing(detail: &str) -> Self {
        Self {
            percents: Vec::new(),
            gate: None,
            outcome: FetchOutcome::Fail(detail.to_string()),
        }
    }
}

/// MediaFetcher double playing back a FIFO queue of plans. A fetch with no
/// queued plan completes immediately at 100%.
pub struct ScriptedFetcher {
    pub metadata: MediaMetadata,
    probe_failure: Mutex<Option<String>>,
    plans: Mutex<VecDeque<FetchPlan>>,
    pub fetch_started: Arc<Notify>,
    pub probe_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            metadata: MediaMetadata {
                title: "Mi video".to_string(),
                duration_secs: Some(213),
            },
            probe_failure: Mutex::new(None),
            plans: Mutex::new(VecDeque::new()),
            fetch_started: Arc::new(Notify::new()),
            probe_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_plan(self, plan: FetchPlan) -> Self {
        self.plans.lock().unwrap().push_back(plan);
        self
    }

    pub fn with_probe_failure(self, detail: &str) -> Self {
        *self.probe_failure.lock().unwrap() = Some(detail.to_string());
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for ScriptedFetcher {
    async fn probe(&self, _url: &str) -> Result<MediaMetadata, DownloadError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(detail) = self.probe_failure.lock().unwrap().take() {
            return Err(DownloadError::MetadataUnavailable(detail));
        }
        Ok(self.metadata.clone())
    }

    async fn fetch(
        &self,
        _url: &str,
        progress: ProgressSink<'_>,
    ) -> Result<MediaPayload, DownloadError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let plan = self
            .plans
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| FetchPlan::delivering(vec![100]));

        self.fetch_started.notify_one();
        if let Some(gate) = &plan.gate {
            gate.notified().await;
        }

        for percent in plan.percents {
            if progress(Progress { percent }).is_break() {
                return Err(DownloadError::Cancelled);
            }
            // Let the spawned progress edits run between reports, like a
            // real engine yielding between stdout lines.
            tokio::task::yield_now().await;
        }

        match plan.outcome {
            FetchOutcome::Deliver => Ok(MediaPayload::new(
                PathBuf::from("/tmp/scripted/Mi video.mp4"),
                None,
            )),
            FetchOutcome::Fail(detail) => Err(DownloadError::FetchFailed(detail)),
        }
    }
}

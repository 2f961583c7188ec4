//! The download conversation: a per-user dialog that turns a media link into
//! a confirmation prompt, a progress-reporting background job and finally a
//! delivered file. One user, one live session at a time.

mod conversation;
mod error;
mod registry;
mod timeout;
mod worker;

pub use conversation::{ConversationController, PromptTarget};
pub use error::DownloadError;
pub use registry::{DownloadSession, SessionRegistry};

use std::time::Duration;

use crate::messages;
use crate::types::{Button, Keyboard};

/// Hard ceiling on a dialog's lifetime, covering both the decision phase and
/// the transfer itself.
pub const DIALOG_TIMEOUT: Duration = Duration::from_secs(600);

/// Minimum jump between two user-visible progress values. 100 always shows.
pub(crate) const PROGRESS_STEP: u8 = 10;

// Callback data carried by the inline buttons.
pub const CB_START_PREFIX: &str = "start_download:";
pub const CB_YES: &str = "download_yes";
pub const CB_NO: &str = "download_no";
pub const CB_CANCEL: &str = "download_cancel";

/// Where the conversation currently stands for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    /// No session registered.
    Idle,
    /// Prompt shown, waiting for SI/NO.
    Choosing,
    /// A worker is fetching.
    Running,
}

/// Why a session is being finalized from outside the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The user pressed Cancelar or sent /stop.
    UserRequest,
    /// A newer request from the same user took over.
    Superseded,
    /// The dialog outlived [`DIALOG_TIMEOUT`].
    TimedOut,
}

pub(crate) fn confirm_keyboard() -> Keyboard {
    Keyboard::single_row(vec![
        Button::new(messages::BUTTON_YES, CB_YES),
        Button::new(messages::BUTTON_NO, CB_NO),
    ])
}

pub(crate) fn cancel_keyboard() -> Keyboard {
    Keyboard::single_row(vec![Button::new(messages::BUTTON_CANCEL, CB_CANCEL)])
}

pub fn offer_keyboard(url: &str) -> Keyboard {
    Keyboard::single_row(vec![Button::new(
        messages::BUTTON_START_DOWNLOAD,
        format!("{CB_START_PREFIX}{url}"),
    )])
}

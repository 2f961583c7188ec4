use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Address of a single chat message. Progress edits, finalize notices and
/// deletions all go through one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

impl MessageRef {
    pub fn new(chat_id: i64, message_id: i32) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

/// One inline button: the label shown to the user and the callback data the
/// platform echoes back when it is pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Rows of inline buttons attached to a prompt or progress message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn single_row(buttons: Vec<Button>) -> Self {
        Self {
            rows: vec![buttons],
        }
    }

    /// Flat list of button labels, in row order.
    pub fn labels(&self) -> Vec<String> {
        self.rows
            .iter()
            .flatten()
            .map(|b| b.label.clone())
            .collect()
    }
}

/// How a downloaded file should be delivered back into the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Document,
}

impl MediaKind {
    /// Classify a file by extension. Everything unrecognized ships as a
    /// plain document so delivery never depends on sniffing file contents.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("jpg") | Some("jpeg") | Some("png") | Some("webp") => MediaKind::Photo,
            Some("mp4") | Some("webm") | Some("mov") | Some("mkv") => MediaKind::Video,
            _ => MediaKind::Document,
        }
    }
}

/// A fetched media file, ready to send. Holding the payload keeps its
/// scratch directory alive; dropping it removes the file from disk.
#[derive(Debug)]
pub struct MediaPayload {
    pub path: PathBuf,
    pub file_name: String,
    pub kind: MediaKind,
    pub workdir: Option<TempDir>,
}

impl MediaPayload {
    pub fn new(path: PathBuf, workdir: Option<TempDir>) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());
        let kind = MediaKind::from_path(&path);
        Self {
            path,
            file_name,
            kind,
            workdir,
        }
    }
}

/// What the engine knows about a resource before any bytes are transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMetadata {
    pub title: String,
    pub duration_secs: Option<u64>,
}

//! yt-dlp as a [`MediaFetcher`]: metadata via `--dump-json`, transfers via a
//! spawned process whose `--newline` stdout feeds the progress sink.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::UNIX_EPOCH;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::config::DownloadsConfig;
use crate::download::DownloadError;
use crate::traits::{MediaFetcher, Progress, ProgressSink};
use crate::types::{MediaMetadata, MediaPayload};

static PROGRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[download\]\s+([0-9]+(?:\.[0-9]+)?)%").unwrap());

pub struct YtDlpFetcher {
    bin: String,
    max_height: u32,
}

impl YtDlpFetcher {
    pub fn new(config: &DownloadsConfig) -> Self {
        Self {
            bin: config.ytdlp_bin.clone(),
            max_height: config.max_height,
        }
    }

    fn format_arg(&self) -> String {
        format!("best[height<={}]", self.max_height)
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn probe(&self, url: &str) -> Result<MediaMetadata, DownloadError> {
        let output = Command::new(&self.bin)
            .args(["--no-warnings", "--no-playlist", "--skip-download", "--dump-json"])
            .args(["--format", &self.format_arg()])
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| {
                DownloadError::Unexpected(anyhow!("failed to run {}: {err}", self.bin))
            })?;
        if !output.status.success() {
            return Err(DownloadError::MetadataUnavailable(stderr_tail(
                &output.stderr,
            )));
        }
        let info: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|err| DownloadError::MetadataUnavailable(format!("bad metadata: {err}")))?;
        let title = info["title"].as_str().unwrap_or("video").to_string();
        let duration_secs = info["duration"]
            .as_u64()
            .or_else(|| info["duration"].as_f64().map(|d| d.round() as u64));
        Ok(MediaMetadata {
            title,
            duration_secs,
        })
    }

    async fn fetch(
        &self,
        url: &str,
        progress: ProgressSink<'_>,
    ) -> Result<MediaPayload, DownloadError> {
        let workdir = tempfile::tempdir()
            .context("failed to create download directory")
            .map_err(DownloadError::Unexpected)?;
        let template = workdir.path().join("%(title).80s.%(ext)s");

        let mut child = Command::new(&self.bin)
            .args(["--newline", "--no-warnings", "--no-playlist"])
            .args(["--format", &self.format_arg()])
            .arg("--output")
            .arg(&template)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                DownloadError::Unexpected(anyhow!("failed to run {}: {err}", self.bin))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Unexpected(anyhow!("child stdout not piped")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::Unexpected(anyhow!("child stderr not piped")))?;
        let stderr_drain = tokio::spawn(async move {
            let mut buf = Vec::new();
            let mut stderr = stderr;
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut stopped = false;
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(percent) = parse_progress_line(&line) {
                if progress(Progress { percent }).is_break() {
                    stopped = true;
                    break;
                }
            }
        }

        if stopped {
            debug!(url, "Killing download process after cancellation");
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(DownloadError::Cancelled);
        }

        let status = child
            .wait()
            .await
            .context("failed to wait for download process")
            .map_err(DownloadError::Unexpected)?;
        let stderr_buf = stderr_drain.await.unwrap_or_default();
        if !status.success() {
            return Err(DownloadError::FetchFailed(stderr_tail(&stderr_buf)));
        }

        let path = newest_file_in(workdir.path())
            .ok_or_else(|| DownloadError::FetchFailed("no output file produced".to_string()))?;
        Ok(MediaPayload::new(path, Some(workdir)))
    }
}

/// Percentage from one `--newline` progress line, if the line carries one.
pub(crate) fn parse_progress_line(line: &str) -> Option<u8> {
    let caps = PROGRESS_RE.captures(line.trim_start())?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.round().min(100.0) as u8)
}

/// Last non-empty stderr line, shortened for chat display.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("unknown error")
        .trim()
        .chars()
        .take(200)
        .collect()
}

/// Most recently modified regular file in the directory, skipping partial
/// transfer leftovers.
fn newest_file_in(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .filter(|entry| entry.path().is_file())
        .filter(|entry| entry.path().extension().and_then(|e| e.to_str()) != Some("part"))
        .max_by_key(|entry| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(UNIX_EPOCH)
        })
        .map(|entry| entry.path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_progress_lines() {
        assert_eq!(
            parse_progress_line("[download]  42.3% of 10.50MiB at 2.00MiB/s ETA 00:05"),
            Some(42)
        );
        assert_eq!(
            parse_progress_line("[download] 100% of 10.50MiB in 00:07"),
            Some(100)
        );
        assert_eq!(parse_progress_line("[download]   0.0% of 10.50MiB"), Some(0));
    }

    #[test]
    fn rounds_and_clamps_percentages() {
        assert_eq!(parse_progress_line("[download]  42.7% of x"), Some(43));
        assert_eq!(parse_progress_line("[download] 100.0% of x"), Some(100));
    }

    #[test]
    fn ignores_non_progress_lines() {
        assert_eq!(parse_progress_line("[youtube] abc: Downloading webpage"), None);
        assert_eq!(
            parse_progress_line("[download] Destination: video.mp4"),
            None
        );
        assert_eq!(parse_progress_line(""), None);
    }

    #[test]
    fn stderr_tail_takes_last_meaningful_line() {
        let stderr = b"WARNING: something\nERROR: Video unavailable\n\n";
        assert_eq!(stderr_tail(stderr), "ERROR: Video unavailable");
        assert_eq!(stderr_tail(b""), "unknown error");
    }

    #[test]
    fn format_arg_carries_configured_height() {
        let fetcher = YtDlpFetcher::new(&DownloadsConfig {
            ytdlp_bin: "yt-dlp".to_string(),
            max_height: 480,
        });
        assert_eq!(fetcher.format_arg(), "best[height<=480]");
    }

    #[test]
    fn newest_file_skips_partial_downloads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("video.mp4"), b"data").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(25));
        std::fs::write(dir.path().join("video.mp4.part"), b"partial").unwrap();
        let newest = newest_file_in(dir.path()).unwrap();
        assert_eq!(newest.file_name().and_then(|n| n.to_str()), Some("video.mp4"));
    }
}

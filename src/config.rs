use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Environment variable consulted when the config file carries no token.
pub const TOKEN_ENV_VAR: &str = "TELEGRAM_BOT_TOKEN";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ModerationConfig {
    /// User ids allowed to run /ban, /unban and /unrestrict.
    #[serde(default)]
    pub admin_user_ids: Vec<u64>,
    /// Words that get a message deleted and its author warned.
    #[serde(default)]
    pub banned_words: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DownloadsConfig {
    #[serde(default = "default_ytdlp_bin")]
    pub ytdlp_bin: String,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            ytdlp_bin: default_ytdlp_bin(),
            max_height: default_max_height(),
        }
    }
}

fn default_ytdlp_bin() -> String {
    "yt-dlp".to_string()
}

fn default_max_height() -> u32 {
    720
}

impl AppConfig {
    /// Load configuration. A missing file is fine; the bot token may come
    /// from the environment instead. An empty token everywhere is an error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<AppConfig>(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            AppConfig::default()
        };
        config.telegram.bot_token =
            resolve_token(&config.telegram.bot_token, std::env::var(TOKEN_ENV_VAR).ok())
                .with_context(|| {
                    format!(
                        "no bot token in {} and {} is unset",
                        path.display(),
                        TOKEN_ENV_VAR
                    )
                })?;
        Ok(config)
    }
}

/// File value wins; the environment fills the gap when the file is silent.
fn resolve_token(file_value: &str, env_value: Option<String>) -> anyhow::Result<String> {
    let file_value = file_value.trim();
    if !file_value.is_empty() {
        return Ok(file_value.to_string());
    }
    match env_value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => anyhow::bail!("bot token missing"),
    }
}

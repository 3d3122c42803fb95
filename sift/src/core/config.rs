use anyhow::{bail, Result};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub youtube: YoutubeConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    pub auth_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct YoutubeConfig {
    pub api_key: String,
    pub playlist_id: String,
    /// 0 means no ceiling on commentThreads pagination.
    #[serde(default)]
    pub comments_page_limit: u32,
    #[serde(default = "default_transcript_lang")]
    pub transcript_lang: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible endpoint, e.g. "http://localhost:11434/v1".
    pub api_url: String,
    pub api_key: Option<String>,
    /// Also stamped on records as model_version.
    pub model: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_featured_limit")]
    pub featured_limit: usize,
    #[serde(default = "default_featured_max_per_video")]
    pub featured_max_per_video: usize,
    #[serde(default = "default_featured_max_per_author")]
    pub featured_max_per_author: usize,
    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_limit: usize,
    #[serde(default = "default_leaderboard_top_k")]
    pub leaderboard_top_k: usize,
    #[serde(default = "default_transcript_max_chars")]
    pub transcript_max_chars: usize,
    #[serde(default = "default_worker_limit")]
    pub worker_limit: usize,
    /// When set, the server runs an in-process sync loop on this interval.
    pub interval_min: Option<u64>,
    #[serde(default = "default_empty_transcript_backoff")]
    pub empty_transcript_backoff_secs: i64,
    #[serde(default = "default_summary_failure_backoff")]
    pub summary_failure_backoff_secs: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            featured_limit: default_featured_limit(),
            featured_max_per_video: default_featured_max_per_video(),
            featured_max_per_author: default_featured_max_per_author(),
            leaderboard_limit: default_leaderboard_limit(),
            leaderboard_top_k: default_leaderboard_top_k(),
            transcript_max_chars: default_transcript_max_chars(),
            worker_limit: default_worker_limit(),
            interval_min: None,
            empty_transcript_backoff_secs: default_empty_transcript_backoff(),
            summary_failure_backoff_secs: default_summary_failure_backoff(),
        }
    }
}

fn default_port() -> u16 {
    8899
}
fn default_store_path() -> String {
    "data/sift".to_string()
}
fn default_transcript_lang() -> String {
    "en".to_string()
}
fn default_featured_limit() -> usize {
    12
}
fn default_featured_max_per_video() -> usize {
    2
}
fn default_featured_max_per_author() -> usize {
    1
}
fn default_leaderboard_limit() -> usize {
    10
}
fn default_leaderboard_top_k() -> usize {
    10
}
fn default_transcript_max_chars() -> usize {
    5000
}
fn default_worker_limit() -> usize {
    4
}
fn default_empty_transcript_backoff() -> i64 {
    60 * 60 * 24
}
fn default_summary_failure_backoff() -> i64 {
    60 * 60 * 6
}

impl Config {
    /// Rejects a config that would let a sync run start without its externals.
    /// Checked before every run so nothing is written on a misconfigured deploy.
    pub fn validate(&self) -> Result<()> {
        if self.server.auth_key.trim().is_empty() {
            bail!("server.auth_key is not configured");
        }
        if self.youtube.api_key.trim().is_empty() {
            bail!("youtube.api_key is not configured");
        }
        if self.youtube.playlist_id.trim().is_empty() {
            bail!("youtube.playlist_id is not configured");
        }
        if self.llm.api_url.trim().is_empty() {
            bail!("llm.api_url is not configured");
        }
        if self.llm.model.trim().is_empty() {
            bail!("llm.model is not configured");
        }
        Ok(())
    }
}

pub fn load_config(path: &str) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

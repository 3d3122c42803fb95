use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::core::config::YoutubeConfig;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// A tracked video as seen by the sync run: just enough context to score
/// comments against.
#[derive(Debug, Clone)]
pub struct VideoMeta {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SourceComment {
    pub id: String,
    pub video_id: String,
    pub text: String,
    pub author_name: String,
    pub author_channel_id: String,
    pub author_channel_url: Option<String>,
    pub like_count: Option<u64>,
    pub reply_count: Option<u64>,
    pub published_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

#[allow(async_fn_in_trait)]
pub trait CommentSource {
    async fn list_videos(&self) -> Result<Vec<VideoMeta>>;
    /// Idempotent read of all current top-level comments for one video.
    async fn fetch_comments(&self, video_id: &str) -> Result<Vec<SourceComment>>;
}

#[allow(async_fn_in_trait)]
pub trait TranscriptSource {
    /// Empty vec when the video has no captions.
    async fn fetch_transcript(&self, video_id: &str) -> Result<Vec<TranscriptSegment>>;
}

#[derive(Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    snippet: Option<PlaylistSnippet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistSnippet {
    title: Option<String>,
    description: Option<String>,
    published_at: Option<String>,
    resource_id: Option<ResourceId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct CommentThreadsResponse {
    #[serde(default)]
    items: Vec<CommentThread>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct CommentThread {
    snippet: Option<ThreadSnippet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadSnippet {
    top_level_comment: Option<TopLevelComment>,
    total_reply_count: Option<u64>,
}

#[derive(Deserialize)]
struct TopLevelComment {
    id: Option<String>,
    snippet: Option<CommentSnippet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    text_display: Option<String>,
    text_original: Option<String>,
    author_display_name: Option<String>,
    author_channel_id: Option<AuthorChannelId>,
    author_channel_url: Option<String>,
    like_count: Option<u64>,
    published_at: Option<String>,
    updated_at: Option<String>,
}

#[derive(Deserialize)]
struct AuthorChannelId {
    value: Option<String>,
}

#[derive(Deserialize)]
struct TimedTextResponse {
    #[serde(default)]
    events: Vec<TimedTextEvent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimedTextEvent {
    t_start_ms: Option<u64>,
    d_duration_ms: Option<u64>,
    #[serde(default)]
    segs: Vec<TimedTextSeg>,
}

#[derive(Deserialize)]
struct TimedTextSeg {
    utf8: Option<String>,
}

/// First description line, capped for use as scoring context.
fn summarize_description(description: &str) -> String {
    let first_line = description.lines().next().unwrap_or("").trim();
    if first_line.chars().count() <= 140 {
        return first_line.to_string();
    }
    let mut summary: String = first_line.chars().take(137).collect();
    summary.push_str("...");
    summary
}

pub struct YoutubeClient {
    client: Client,
    config: YoutubeConfig,
}

impl YoutubeClient {
    pub fn new(config: YoutubeConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let res = self.client.get(url).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("YouTube API error {}: {}", status, body));
        }
        Ok(res.json().await?)
    }
}

impl CommentSource for YoutubeClient {
    async fn list_videos(&self) -> Result<Vec<VideoMeta>> {
        let mut videos = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/playlistItems?part=snippet&maxResults=50&playlistId={}&key={}",
                API_BASE, self.config.playlist_id, self.config.api_key
            );
            if let Some(token) = &page_token {
                url.push_str("&pageToken=");
                url.push_str(token);
            }

            let data: PlaylistItemsResponse = self.get_json(&url).await?;
            for item in data.items {
                let Some(snippet) = item.snippet else { continue };
                let Some(id) = snippet.resource_id.and_then(|r| r.video_id) else {
                    continue;
                };
                videos.push(VideoMeta {
                    id,
                    title: snippet.title.unwrap_or_else(|| "Untitled".to_string()),
                    summary: summarize_description(snippet.description.as_deref().unwrap_or("")),
                    published_at: snippet.published_at,
                });
            }

            page_token = data.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(videos)
    }

    async fn fetch_comments(&self, video_id: &str) -> Result<Vec<SourceComment>> {
        let mut comments = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0u32;
        let limit = self.config.comments_page_limit;

        loop {
            let mut url = format!(
                "{}/commentThreads?part=snippet&maxResults=100&textFormat=plainText&videoId={}&key={}",
                API_BASE, video_id, self.config.api_key
            );
            if let Some(token) = &page_token {
                url.push_str("&pageToken=");
                url.push_str(token);
            }

            let data: CommentThreadsResponse = self.get_json(&url).await?;
            for item in data.items {
                let Some(snippet) = item.snippet else { continue };
                let Some(top_level) = snippet.top_level_comment else {
                    continue;
                };
                let (Some(id), Some(comment)) = (top_level.id, top_level.snippet) else {
                    continue;
                };
                let text = comment
                    .text_original
                    .or(comment.text_display)
                    .unwrap_or_default();
                if text.is_empty() {
                    continue;
                }
                comments.push(SourceComment {
                    id,
                    video_id: video_id.to_string(),
                    text,
                    author_name: comment
                        .author_display_name
                        .unwrap_or_else(|| "Unknown".to_string()),
                    author_channel_id: comment
                        .author_channel_id
                        .and_then(|c| c.value)
                        .unwrap_or_default(),
                    author_channel_url: comment.author_channel_url,
                    like_count: comment.like_count,
                    reply_count: snippet.total_reply_count,
                    published_at: comment.published_at,
                    updated_at: comment.updated_at,
                });
            }

            page_token = data.next_page_token;
            pages += 1;
            if page_token.is_none() || (limit > 0 && pages >= limit) {
                break;
            }
        }

        Ok(comments)
    }
}

impl TranscriptSource for YoutubeClient {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Vec<TranscriptSegment>> {
        let url = format!(
            "https://www.youtube.com/api/timedtext?v={}&lang={}&fmt=json3",
            video_id, self.config.transcript_lang
        );

        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            return Ok(Vec::new());
        }
        let body = res.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        // Videos without captions answer with an empty or non-JSON body.
        let data: TimedTextResponse = match serde_json::from_str(&body) {
            Ok(data) => data,
            Err(_) => return Ok(Vec::new()),
        };

        let segments = data
            .events
            .into_iter()
            .filter_map(|event| {
                let text = event
                    .segs
                    .iter()
                    .filter_map(|seg| seg.utf8.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
                    .trim()
                    .to_string();
                if text.is_empty() {
                    return None;
                }
                let start_seconds = event.t_start_ms.unwrap_or(0) as f64 / 1000.0;
                let end_seconds =
                    start_seconds + event.d_duration_ms.unwrap_or(0) as f64 / 1000.0;
                Some(TranscriptSegment {
                    text,
                    start_seconds,
                    end_seconds,
                })
            })
            .collect();

        Ok(segments)
    }
}

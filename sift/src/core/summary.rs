use std::sync::Arc;

use crate::core::llm::SummaryModel;
use crate::core::store::RecordStore;
use crate::core::youtube::TranscriptSource;

#[derive(Debug, Clone)]
pub struct SummaryPolicy {
    pub max_chars: usize,
    pub empty_backoff_secs: i64,
    pub failure_backoff_secs: i64,
}

/// Lazy transcript summaries. Summarization is the most expensive call per
/// video, so a terminal cache plus a backoff marker guarantee at most one
/// attempt per backoff window no matter how many comments a video gets.
pub struct TranscriptSummarizer<T, M> {
    transcripts: Arc<T>,
    model: Arc<M>,
    store: RecordStore,
    policy: SummaryPolicy,
}

impl<T, M> TranscriptSummarizer<T, M>
where
    T: TranscriptSource,
    M: SummaryModel,
{
    pub fn new(transcripts: Arc<T>, model: Arc<M>, store: RecordStore, policy: SummaryPolicy) -> Self {
        Self {
            transcripts,
            model,
            store,
            policy,
        }
    }

    /// Never fails: any problem degrades to `fallback` plus a backoff marker.
    pub async fn ensure_summary(&self, video_id: &str, title: &str, fallback: &str) -> String {
        match self.store.transcript_summary(video_id) {
            Ok(Some(summary)) => return summary,
            Ok(None) => {}
            Err(e) => log::warn!("summary cache read failed for {}: {}", video_id, e),
        }

        let now = chrono::Utc::now().timestamp();
        match self.store.summary_backoff_active(video_id, now) {
            Ok(true) => return fallback.to_string(),
            Ok(false) => {}
            Err(e) => log::warn!("backoff read failed for {}: {}", video_id, e),
        }

        let segments = match self.transcripts.fetch_transcript(video_id).await {
            Ok(segments) => segments,
            Err(e) => {
                log::warn!("transcript fetch failed for {}: {}", video_id, e);
                self.set_backoff(video_id, now + self.policy.failure_backoff_secs);
                return fallback.to_string();
            }
        };

        if segments.is_empty() {
            // No captions. Not worth re-checking soon.
            self.set_backoff(video_id, now + self.policy.empty_backoff_secs);
            return fallback.to_string();
        }

        let transcript = segments
            .iter()
            .map(|segment| segment.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let excerpt = truncate_excerpt(&transcript, self.policy.max_chars);

        match self.model.summarize(title, &excerpt).await {
            Ok(summary) if !summary.is_empty() => {
                if let Err(e) = self.store.set_transcript_summary(video_id, &summary) {
                    log::warn!("failed to persist summary for {}: {}", video_id, e);
                }
                summary
            }
            Ok(_) => {
                log::warn!("summarizer returned empty output for {}", video_id);
                self.set_backoff(video_id, now + self.policy.failure_backoff_secs);
                fallback.to_string()
            }
            Err(e) => {
                log::warn!("summarization failed for {}: {}", video_id, e);
                self.set_backoff(video_id, now + self.policy.failure_backoff_secs);
                fallback.to_string()
            }
        }
    }

    fn set_backoff(&self, video_id: &str, until: i64) {
        if let Err(e) = self.store.set_summary_backoff(video_id, until) {
            log::warn!("failed to set summary backoff for {}: {}", video_id, e);
        }
    }
}

pub fn truncate_excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut excerpt: String = text.chars().take(max_chars).collect();
    excerpt.push_str("...");
    excerpt
}

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::core::comments::{fingerprint, hard_block_reason, CommentRecord, CommentStatus};
use crate::core::config::SyncConfig;
use crate::core::featured::{build_featured, FeaturedCaps};
use crate::core::leaderboard::{build_leaderboard, LeaderboardCaps};
use crate::core::llm::{CommentJudge, CommentVerdict, ScoreRequest, SummaryModel};
use crate::core::store::RecordStore;
use crate::core::summary::{SummaryPolicy, TranscriptSummarizer};
use crate::core::youtube::{CommentSource, SourceComment, TranscriptSource, VideoMeta};

#[derive(Debug, Default, Clone, Serialize)]
pub struct RunStats {
    pub fetched: usize,
    pub scored: usize,
    pub featured: usize,
    pub ranked: usize,
}

/// Per-video result, kept even when the video failed partway: comments
/// fetched and records already persisted before the failure still count
/// toward the run totals and the derived outputs.
struct VideoOutcome {
    fetched: usize,
    scored: usize,
    records: Vec<CommentRecord>,
    error: Option<anyhow::Error>,
}

impl VideoOutcome {
    fn empty() -> Self {
        Self {
            fetched: 0,
            scored: 0,
            records: Vec::new(),
            error: None,
        }
    }
}

/// One pipeline run over every tracked video. Videos fan out through a
/// bounded pool; one video's failure is logged, never fatal, and the work
/// it completed before failing still feeds the run totals and outputs.
/// There is no cross-process run lock: callers must not overlap runs, and
/// an accidental overlap only wastes work because every run recomputes from
/// the comment source.
pub struct SyncRunner<S, M> {
    source: Arc<S>,
    model: Arc<M>,
    store: RecordStore,
    summarizer: TranscriptSummarizer<S, M>,
    cfg: SyncConfig,
}

impl<S, M> SyncRunner<S, M>
where
    S: CommentSource + TranscriptSource,
    M: CommentJudge + SummaryModel,
{
    pub fn new(source: Arc<S>, model: Arc<M>, store: RecordStore, cfg: SyncConfig) -> Self {
        let summarizer = TranscriptSummarizer::new(
            source.clone(),
            model.clone(),
            store.clone(),
            SummaryPolicy {
                max_chars: cfg.transcript_max_chars,
                empty_backoff_secs: cfg.empty_transcript_backoff_secs,
                failure_backoff_secs: cfg.summary_failure_backoff_secs,
            },
        );
        Self {
            source,
            model,
            store,
            summarizer,
            cfg,
        }
    }

    pub async fn run(&self) -> Result<RunStats> {
        let videos = self.source.list_videos().await?;
        let hidden = self.store.hidden_ids()?;
        log::info!("starting comment sync over {} videos", videos.len());

        let hidden = &hidden;
        // Collected eagerly (the futures stay inert until polled) to work
        // around rust-lang/rust#102211: a lazily mapped iterator of async
        // blocks fails the `Send` check at `tokio::spawn` boundaries.
        let video_futures: Vec<_> = videos
            .iter()
            .map(|video| async move {
                (video.id.clone(), self.process_video(video, hidden).await)
            })
            .collect();
        let outcomes = stream::iter(video_futures)
        .buffer_unordered(self.cfg.worker_limit.max(1))
        .collect::<Vec<_>>()
        .await;

        let mut records = Vec::new();
        let mut fetched = 0;
        let mut scored = 0;
        for (video_id, mut outcome) in outcomes {
            fetched += outcome.fetched;
            scored += outcome.scored;
            records.append(&mut outcome.records);
            if let Some(e) = outcome.error {
                log::error!("comment sync failed for video {}: {:#}", video_id, e);
            }
        }

        let featured = build_featured(
            &records,
            &FeaturedCaps {
                limit: self.cfg.featured_limit,
                max_per_video: self.cfg.featured_max_per_video,
                max_per_author: self.cfg.featured_max_per_author,
            },
        );
        self.store.set_featured(&featured)?;

        let leaderboard = build_leaderboard(
            &records,
            &LeaderboardCaps {
                limit: self.cfg.leaderboard_limit,
                top_k: self.cfg.leaderboard_top_k,
            },
        );
        self.store.set_leaderboard(&leaderboard)?;
        self.store.flush()?;

        let stats = RunStats {
            fetched,
            scored,
            featured: featured.len(),
            ranked: leaderboard.len(),
        };
        log::info!(
            "comment sync finished: fetched={} scored={} featured={} ranked={}",
            stats.fetched,
            stats.scored,
            stats.featured,
            stats.ranked
        );
        Ok(stats)
    }

    async fn process_video(&self, video: &VideoMeta, hidden: &HashSet<String>) -> VideoOutcome {
        let mut outcome = VideoOutcome::empty();

        let previous_ids = match self.store.video_comment_ids(&video.id) {
            Ok(ids) => ids,
            Err(e) => {
                outcome.error = Some(e);
                return outcome;
            }
        };
        let incoming = match self.source.fetch_comments(&video.id).await {
            Ok(incoming) => incoming,
            Err(e) => {
                outcome.error = Some(e);
                return outcome;
            }
        };
        outcome.fetched = incoming.len();

        let fallback_summary = if video.summary.is_empty() {
            video.title.clone()
        } else {
            video.summary.clone()
        };
        // One summary per video, however many comments follow.
        let transcript_summary = self
            .summarizer
            .ensure_summary(&video.id, &video.title, &fallback_summary)
            .await;

        let mut incoming_ids = Vec::with_capacity(incoming.len());

        for comment in &incoming {
            incoming_ids.push(comment.id.clone());
            let step = async {
                let (record, oracle_ran) = self
                    .process_comment(video, comment, hidden, &fallback_summary, &transcript_summary)
                    .await?;
                self.store.set_comment(&record)?;
                self.store
                    .add_author_comment_id(&comment.author_channel_id, &comment.id)?;
                Ok::<_, anyhow::Error>((record, oracle_ran))
            }
            .await;
            match step {
                Ok((record, oracle_ran)) => {
                    if oracle_ran {
                        outcome.scored += 1;
                    }
                    outcome.records.push(record);
                }
                Err(e) => {
                    outcome.error = Some(e);
                    break;
                }
            }
        }

        // The removal diff and the id-set replacement need the full incoming
        // set; after a partial pass they would misreport survivors as removed.
        if outcome.error.is_none() {
            if let Err(e) = self.finish_video(&video.id, &previous_ids, &incoming_ids) {
                outcome.error = Some(e);
            }
        }

        outcome
    }

    fn finish_video(
        &self,
        video_id: &str,
        previous_ids: &[String],
        incoming_ids: &[String],
    ) -> Result<()> {
        // Ids seen last run but absent now were removed at the source.
        for removed_id in previous_ids.iter().filter(|id| !incoming_ids.contains(id)) {
            if let Some(mut existing) = self.store.comment(removed_id)? {
                if existing.status != CommentStatus::Hidden {
                    existing.status = CommentStatus::Deleted;
                    self.store.set_comment(&existing)?;
                }
            }
        }

        self.store.replace_video_comment_ids(video_id, incoming_ids)?;
        self.store.flush()?;
        Ok(())
    }

    /// Builds the full-overwrite record for one comment, scoring it when the
    /// rescore rule says so. Returns whether the oracle actually ran.
    async fn process_comment(
        &self,
        video: &VideoMeta,
        comment: &SourceComment,
        hidden: &HashSet<String>,
        video_summary: &str,
        transcript_summary: &str,
    ) -> Result<(CommentRecord, bool)> {
        let digest = fingerprint(&comment.text);
        let existing = self.store.comment(&comment.id)?;
        let status = if hidden.contains(&comment.id) {
            CommentStatus::Hidden
        } else {
            CommentStatus::Active
        };

        let mut record = CommentRecord {
            id: comment.id.clone(),
            video_id: video.id.clone(),
            author_channel_id: comment.author_channel_id.clone(),
            author_name: comment.author_name.clone(),
            author_url: comment.author_channel_url.clone(),
            text: comment.text.clone(),
            published_at: comment.published_at.clone(),
            updated_at: comment.updated_at.clone(),
            like_count: comment.like_count,
            reply_count: comment.reply_count,
            fingerprint: digest.clone(),
            status,
            safety: existing.as_ref().and_then(|e| e.safety.clone()),
            scores: existing.as_ref().and_then(|e| e.scores),
            feature: existing.as_ref().and_then(|e| e.feature),
            rationale: existing.as_ref().and_then(|e| e.rationale.clone()),
            scored_at: existing.as_ref().and_then(|e| e.scored_at.clone()),
            model_version: existing.as_ref().and_then(|e| e.model_version.clone()),
        };

        // Hidden records are never (re)scored.
        if record.status != CommentStatus::Active {
            return Ok((record, false));
        }

        let needs_scoring = match &existing {
            None => true,
            Some(existing) => {
                existing.fingerprint != digest
                    || existing.scores.is_none()
                    || existing.safety.is_none()
            }
        };
        if !needs_scoring {
            return Ok((record, false));
        }

        let (verdict, oracle_ran) = match hard_block_reason(&comment.text) {
            Some(reason) => (CommentVerdict::hard_block(reason), false),
            None => {
                let verdict = self
                    .model
                    .judge(ScoreRequest {
                        comment: &comment.text,
                        video_title: &video.title,
                        video_summary,
                        transcript_summary,
                        author_history: None,
                    })
                    .await?;
                (verdict, true)
            }
        };

        // Safety dominates: an unsafe verdict can never be featured, whatever
        // the model said in its feature flag.
        let feature = verdict.feature && verdict.safety.ok;
        record.safety = Some(verdict.safety);
        record.scores = Some(verdict.scores);
        record.feature = Some(feature);
        record.rationale = Some(verdict.rationale);
        record.scored_at = Some(Utc::now().to_rfc3339());
        record.model_version = Some(self.model.model_version());

        Ok((record, oracle_ran))
    }
}

use std::collections::HashMap;

use crate::core::comments::{comment_url, CommentRecord, CommentStatus, FeaturedComment};

#[derive(Debug, Clone)]
pub struct FeaturedCaps {
    pub limit: usize,
    pub max_per_video: usize,
    pub max_per_author: usize,
}

/// Constrained greedy top-k over eligible comments. The per-video and
/// per-author caps keep one hot video or prolific author from owning the
/// whole featured set even when raw scores say otherwise.
pub fn build_featured(records: &[CommentRecord], caps: &FeaturedCaps) -> Vec<FeaturedComment> {
    let mut candidates: Vec<&CommentRecord> = records
        .iter()
        .filter(|r| {
            r.status == CommentStatus::Active
                && r.safety.as_ref().map(|s| s.ok).unwrap_or(false)
                && r.feature.unwrap_or(false)
        })
        .collect();

    // Score descending; ties break by most recent publish time. RFC-3339
    // strings are fixed-width, so plain string order is chronological.
    candidates.sort_by(|a, b| {
        let score_a = a.scores.map(|s| s.overall).unwrap_or(0);
        let score_b = b.scores.map(|s| s.overall).unwrap_or(0);
        score_b.cmp(&score_a).then_with(|| {
            b.published_at
                .as_deref()
                .unwrap_or("")
                .cmp(a.published_at.as_deref().unwrap_or(""))
        })
    });

    let mut per_video: HashMap<&str, usize> = HashMap::new();
    let mut per_author: HashMap<&str, usize> = HashMap::new();
    let mut featured = Vec::new();

    for record in candidates {
        if featured.len() >= caps.limit {
            break;
        }
        let video_count = *per_video.get(record.video_id.as_str()).unwrap_or(&0);
        if video_count >= caps.max_per_video {
            continue;
        }
        let author = record.author_key();
        let author_count = *per_author.get(author).unwrap_or(&0);
        if author_count >= caps.max_per_author {
            continue;
        }

        per_video.insert(record.video_id.as_str(), video_count + 1);
        per_author.insert(author, author_count + 1);
        featured.push(FeaturedComment {
            id: record.id.clone(),
            video_id: record.video_id.clone(),
            author_name: record.author_name.clone(),
            text: record.text.clone(),
            youtube_url: comment_url(&record.video_id, &record.id),
            score: record.scores.map(|s| s.overall),
            rationale: record.rationale.clone(),
        });
    }

    featured
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::comments::{fingerprint, CommentSafety, CommentScores};

    fn eligible(
        id: &str,
        video_id: &str,
        author: &str,
        overall: u8,
        published_at: &str,
    ) -> CommentRecord {
        CommentRecord {
            id: id.to_string(),
            video_id: video_id.to_string(),
            author_channel_id: author.to_string(),
            author_name: format!("name-{}", author),
            author_url: None,
            text: format!("comment {}", id),
            published_at: Some(published_at.to_string()),
            updated_at: None,
            like_count: None,
            reply_count: None,
            fingerprint: fingerprint(&format!("comment {}", id)),
            status: CommentStatus::Active,
            safety: Some(CommentSafety {
                ok: true,
                labels: vec![],
                confidence: 0.9,
            }),
            scores: Some(CommentScores {
                overall,
                ..CommentScores::zero()
            }),
            feature: Some(true),
            rationale: None,
            scored_at: None,
            model_version: None,
        }
    }

    fn caps(limit: usize, per_video: usize, per_author: usize) -> FeaturedCaps {
        FeaturedCaps {
            limit,
            max_per_video: per_video,
            max_per_author: per_author,
        }
    }

    #[test]
    fn respects_per_video_and_per_author_caps() {
        // Raw score order alone would take the top three from v1 and two
        // comments from author a1.
        let records = vec![
            eligible("c1", "v1", "a1", 99, "2026-01-05T00:00:00Z"),
            eligible("c2", "v1", "a2", 98, "2026-01-04T00:00:00Z"),
            eligible("c3", "v1", "a3", 97, "2026-01-03T00:00:00Z"),
            eligible("c4", "v2", "a1", 96, "2026-01-02T00:00:00Z"),
            eligible("c5", "v2", "a3", 95, "2026-01-01T00:00:00Z"),
        ];
        let featured = build_featured(&records, &caps(10, 2, 1));
        // c3 bumps into the v1 cap, c4 into the a1 cap; c5 still fits.
        let ids: Vec<&str> = featured.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c5"]);

        let mut per_video: HashMap<&str, usize> = HashMap::new();
        for f in &featured {
            *per_video.entry(f.video_id.as_str()).or_default() += 1;
        }
        assert!(per_video.values().all(|&count| count <= 2));
    }

    #[test]
    fn ties_break_by_publish_time() {
        let records = vec![
            eligible("older", "v1", "a1", 90, "2026-01-01T00:00:00Z"),
            eligible("newer", "v2", "a2", 90, "2026-02-01T00:00:00Z"),
        ];
        let featured = build_featured(&records, &caps(1, 2, 1));
        assert_eq!(featured[0].id, "newer");
    }

    #[test]
    fn global_limit_stops_the_walk() {
        let records = vec![
            eligible("c1", "v1", "a1", 90, "2026-01-01T00:00:00Z"),
            eligible("c2", "v2", "a2", 80, "2026-01-01T00:00:00Z"),
            eligible("c3", "v3", "a3", 70, "2026-01-01T00:00:00Z"),
        ];
        assert_eq!(build_featured(&records, &caps(2, 2, 1)).len(), 2);
    }

    #[test]
    fn ineligible_records_never_appear() {
        let mut hidden = eligible("h", "v1", "a1", 99, "2026-01-01T00:00:00Z");
        hidden.status = CommentStatus::Hidden;
        let mut unsafe_rec = eligible("u", "v1", "a2", 98, "2026-01-01T00:00:00Z");
        if let Some(safety) = unsafe_rec.safety.as_mut() {
            safety.ok = false;
        }
        let mut not_flagged = eligible("n", "v1", "a3", 97, "2026-01-01T00:00:00Z");
        not_flagged.feature = Some(false);

        let featured = build_featured(&[hidden, unsafe_rec, not_flagged], &caps(10, 5, 5));
        assert!(featured.is_empty());
    }

    #[test]
    fn featured_carries_comment_url() {
        let records = vec![eligible("c1", "v1", "a1", 90, "2026-01-01T00:00:00Z")];
        let featured = build_featured(&records, &caps(5, 2, 1));
        assert_eq!(
            featured[0].youtube_url,
            "https://www.youtube.com/watch?v=v1&lc=c1"
        );
    }
}

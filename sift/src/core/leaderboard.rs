use std::collections::HashMap;

use crate::core::comments::{CommentRecord, CommentStatus, LeaderboardEntry};

#[derive(Debug, Clone)]
pub struct LeaderboardCaps {
    pub limit: usize,
    pub top_k: usize,
}

struct AuthorTally {
    name: String,
    scores: Vec<u8>,
    top_text: String,
    top_score: u8,
}

/// Per-author ranking over the mean of each author's best `top_k` scores.
/// The remembered text is the latest comment matching the author's maximum
/// (`>=` replacement), which is order-dependent on source iteration order.
pub fn build_leaderboard(records: &[CommentRecord], caps: &LeaderboardCaps) -> Vec<LeaderboardEntry> {
    let mut per_author: HashMap<String, AuthorTally> = HashMap::new();

    for record in records {
        if record.status != CommentStatus::Active {
            continue;
        }
        if !record.safety.as_ref().map(|s| s.ok).unwrap_or(false) {
            continue;
        }
        let Some(score) = record.scores.map(|s| s.overall) else {
            continue;
        };

        let tally = per_author
            .entry(record.author_key().to_string())
            .or_insert_with(|| AuthorTally {
                name: record.author_name.clone(),
                scores: Vec::new(),
                top_text: record.text.clone(),
                top_score: score,
            });
        tally.scores.push(score);
        if score >= tally.top_score {
            tally.top_score = score;
            tally.top_text = record.text.clone();
            tally.name = record.author_name.clone();
        }
    }

    let mut leaderboard: Vec<LeaderboardEntry> = per_author
        .into_values()
        .map(|tally| {
            let mut scores = tally.scores;
            scores.sort_unstable_by(|a, b| b.cmp(a));
            scores.truncate(caps.top_k.max(1));
            let sum: u32 = scores.iter().map(|&s| u32::from(s)).sum();
            let mean = sum as f64 / scores.len() as f64;
            LeaderboardEntry {
                user: tally.name,
                text: tally.top_text,
                score: mean.round() as u8,
            }
        })
        .collect();

    leaderboard.sort_by(|a, b| b.score.cmp(&a.score));
    leaderboard.truncate(caps.limit);
    leaderboard
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::comments::{fingerprint, CommentSafety, CommentScores};

    fn scored(id: &str, author: &str, text: &str, overall: u8) -> CommentRecord {
        CommentRecord {
            id: id.to_string(),
            video_id: "v1".into(),
            author_channel_id: author.to_string(),
            author_name: format!("name-{}", author),
            author_url: None,
            text: text.to_string(),
            published_at: None,
            updated_at: None,
            like_count: None,
            reply_count: None,
            fingerprint: fingerprint(text),
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
            feature: Some(false),
            rationale: None,
            scored_at: None,
            model_version: None,
        }
    }

    fn caps(limit: usize, top_k: usize) -> LeaderboardCaps {
        LeaderboardCaps { limit, top_k }
    }

    #[test]
    fn score_is_mean_of_top_k() {
        let records = vec![
            scored("c1", "a1", "one", 90),
            scored("c2", "a1", "two", 80),
            scored("c3", "a1", "three", 70),
            scored("c4", "a1", "four", 60),
        ];
        let leaderboard = build_leaderboard(&records, &caps(10, 3));
        assert_eq!(leaderboard.len(), 1);
        assert_eq!(leaderboard[0].score, 80); // round((90+80+70)/3)
    }

    #[test]
    fn fewer_than_k_scores_average_over_what_exists() {
        let records = vec![scored("c1", "a1", "one", 91), scored("c2", "a1", "two", 80)];
        let leaderboard = build_leaderboard(&records, &caps(10, 5));
        assert_eq!(leaderboard[0].score, 86); // round(171/2)
    }

    #[test]
    fn later_equal_top_score_takes_the_text() {
        let records = vec![
            scored("c1", "a1", "first at ninety", 90),
            scored("c2", "a1", "second at ninety", 90),
        ];
        let leaderboard = build_leaderboard(&records, &caps(10, 10));
        assert_eq!(leaderboard[0].text, "second at ninety");
    }

    #[test]
    fn ranked_descending_and_truncated() {
        let records = vec![
            scored("c1", "a1", "one", 50),
            scored("c2", "a2", "two", 90),
            scored("c3", "a3", "three", 70),
        ];
        let leaderboard = build_leaderboard(&records, &caps(2, 10));
        assert_eq!(leaderboard.len(), 2);
        assert_eq!(leaderboard[0].user, "name-a2");
        assert_eq!(leaderboard[1].user, "name-a3");
    }

    #[test]
    fn ineligible_records_are_skipped() {
        let mut hidden = scored("c1", "a1", "hidden one", 99);
        hidden.status = CommentStatus::Hidden;
        let mut unscored = scored("c2", "a2", "no scores", 0);
        unscored.scores = None;
        let mut unsafe_rec = scored("c3", "a3", "unsafe", 95);
        if let Some(safety) = unsafe_rec.safety.as_mut() {
            safety.ok = false;
        }
        assert!(build_leaderboard(&[hidden, unscored, unsafe_rec], &caps(10, 10)).is_empty());
    }

    #[test]
    fn authors_without_channel_id_group_by_name() {
        let mut a = scored("c1", "", "one", 80);
        a.author_name = "SameName".into();
        let mut b = scored("c2", "", "two", 60);
        b.author_name = "SameName".into();
        let leaderboard = build_leaderboard(&[a, b], &caps(10, 10));
        // Known caveat: display-name fallback merges same-named authors.
        assert_eq!(leaderboard.len(), 1);
        assert_eq!(leaderboard[0].score, 70);
    }
}

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    Active,
    Hidden,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentSafety {
    pub ok: bool,
    pub labels: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentScores {
    pub overall: u8,
    pub safety: u8,
    pub originality: u8,
    pub specificity: u8,
    pub constructive: u8,
    pub community: u8,
}

impl CommentScores {
    pub fn zero() -> Self {
        Self {
            overall: 0,
            safety: 0,
            originality: 0,
            specificity: 0,
            constructive: 0,
            community: 0,
        }
    }
}

/// One stored comment. Overwritten wholesale on every sync; never erased.
/// Invariant: `safety` and `scores` are written together or not at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub video_id: String,
    pub author_channel_id: String,
    pub author_name: String,
    pub author_url: Option<String>,
    pub text: String,
    pub published_at: Option<String>,
    pub updated_at: Option<String>,
    pub like_count: Option<u64>,
    pub reply_count: Option<u64>,
    pub fingerprint: String,
    pub status: CommentStatus,
    pub safety: Option<CommentSafety>,
    pub scores: Option<CommentScores>,
    pub feature: Option<bool>,
    pub rationale: Option<String>,
    pub scored_at: Option<String>,
    pub model_version: Option<String>,
}

impl CommentRecord {
    /// Channel ids can be missing on some comments; fall back to the display
    /// name even though names are not guaranteed unique.
    pub fn author_key(&self) -> &str {
        if self.author_channel_id.is_empty() {
            &self.author_name
        } else {
            &self.author_channel_id
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturedComment {
    pub id: String,
    pub video_id: String,
    pub author_name: String,
    pub text: String,
    pub youtube_url: String,
    pub score: Option<u8>,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user: String,
    pub text: String,
    pub score: u8,
}

pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Content identity for change detection, not a primary key. Whitespace and
/// case edits do not change it; any visible edit does.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(text).as_bytes());
    hex::encode(hasher.finalize())
}

pub fn clamp_score(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// Deterministic gate in front of the oracle. Rules are checked in order,
/// first match wins.
pub fn hard_block_reason(text: &str) -> Option<&'static str> {
    let trimmed = text.trim();
    if trimmed.chars().count() < 3 {
        return Some("too_short");
    }
    let lower = trimmed.to_lowercase();
    if (lower.starts_with("http://") || lower.starts_with("https://"))
        && trimmed.chars().count() < 80
    {
        return Some("link_only");
    }
    let handle = Regex::new(r"^[@#]?\w{1,2}$").unwrap();
    if handle.is_match(trimmed) {
        return Some("too_short");
    }
    None
}

pub fn comment_url(video_id: &str, comment_id: &str) -> String {
    format!(
        "https://www.youtube.com/watch?v={}&lc={}",
        video_id, comment_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_ignores_whitespace_and_case() {
        let a = fingerprint("Great  episode,\nloved it");
        let b = fingerprint("great episode, loved it");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_changes_on_edit() {
        assert_ne!(
            fingerprint("great episode, loved it"),
            fingerprint("great episode, loved it!")
        );
    }

    #[test]
    fn hard_block_table() {
        assert_eq!(hard_block_reason("ok"), Some("too_short"));
        assert_eq!(hard_block_reason("https://x.co"), Some("link_only"));
        assert_eq!(hard_block_reason("@a"), Some("too_short"));
        assert_eq!(hard_block_reason("this is a fine comment"), None);
    }

    #[test]
    fn long_link_is_not_blocked() {
        let long = format!("https://example.com/{}", "a".repeat(80));
        assert_eq!(hard_block_reason(&long), None);
    }

    #[test]
    fn clamp_score_bounds() {
        assert_eq!(clamp_score(150.0), 100);
        assert_eq!(clamp_score(-5.0), 0);
        assert_eq!(clamp_score(72.4), 72);
        assert_eq!(clamp_score(f64::NAN), 0);
        assert_eq!(clamp_score(f64::INFINITY), 0);
    }

    #[test]
    fn comment_url_shape() {
        assert_eq!(
            comment_url("abc123", "UgxK"),
            "https://www.youtube.com/watch?v=abc123&lc=UgxK"
        );
    }

    #[test]
    fn author_key_falls_back_to_name() {
        let mut record = CommentRecord {
            id: "c1".into(),
            video_id: "v1".into(),
            author_channel_id: "UC1".into(),
            author_name: "Alice".into(),
            author_url: None,
            text: "hi there friend".into(),
            published_at: None,
            updated_at: None,
            like_count: None,
            reply_count: None,
            fingerprint: fingerprint("hi there friend"),
            status: CommentStatus::Active,
            safety: None,
            scores: None,
            feature: None,
            rationale: None,
            scored_at: None,
            model_version: None,
        };
        assert_eq!(record.author_key(), "UC1");
        record.author_channel_id.clear();
        assert_eq!(record.author_key(), "Alice");
    }
}

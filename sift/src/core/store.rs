use anyhow::Result;
use std::collections::HashSet;

use crate::core::comments::{CommentRecord, FeaturedComment, LeaderboardEntry};

const FEATURED_KEY: &str = "featured";
const LEADERBOARD_KEY: &str = "leaderboard";

/// Durable keyed storage for the pipeline. All writes are unconditional
/// overwrites; last write wins.
#[derive(Clone)]
pub struct RecordStore {
    db: sled::Db,
    comments: sled::Tree,
    video_ids: sled::Tree,
    author_ids: sled::Tree,
    hidden: sled::Tree,
    summaries: sled::Tree,
    backoff: sled::Tree,
    outputs: sled::Tree,
}

impl RecordStore {
    pub fn open(path: &str) -> Result<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// In-memory store for tests.
    pub fn temporary() -> Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        Ok(Self {
            comments: db.open_tree("comments")?,
            video_ids: db.open_tree("video_comment_ids")?,
            author_ids: db.open_tree("author_comment_ids")?,
            hidden: db.open_tree("hidden")?,
            summaries: db.open_tree("summaries")?,
            backoff: db.open_tree("summary_backoff")?,
            outputs: db.open_tree("outputs")?,
            db,
        })
    }

    pub fn comment(&self, id: &str) -> Result<Option<CommentRecord>> {
        match self.comments.get(id.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_comment(&self, record: &CommentRecord) -> Result<()> {
        self.comments
            .insert(record.id.as_bytes(), serde_json::to_vec(record)?)?;
        Ok(())
    }

    pub fn video_comment_ids(&self, video_id: &str) -> Result<Vec<String>> {
        match self.video_ids.get(video_id.as_bytes())? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Replaced wholesale every run; the diff against the previous set is the
    /// removal signal.
    pub fn replace_video_comment_ids(&self, video_id: &str, ids: &[String]) -> Result<()> {
        self.video_ids
            .insert(video_id.as_bytes(), serde_json::to_vec(ids)?)?;
        Ok(())
    }

    /// Append-only per-author history, deduped on insert.
    pub fn add_author_comment_id(&self, author: &str, comment_id: &str) -> Result<()> {
        let mut ids = self.author_comment_ids(author)?;
        if !ids.iter().any(|id| id == comment_id) {
            ids.push(comment_id.to_string());
            self.author_ids
                .insert(author.as_bytes(), serde_json::to_vec(&ids)?)?;
        }
        Ok(())
    }

    pub fn author_comment_ids(&self, author: &str) -> Result<Vec<String>> {
        match self.author_ids.get(author.as_bytes())? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn hidden_ids(&self) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();
        for entry in self.hidden.iter() {
            let (key, _) = entry?;
            ids.insert(String::from_utf8_lossy(&key).to_string());
        }
        Ok(ids)
    }

    pub fn add_hidden_id(&self, comment_id: &str) -> Result<()> {
        self.hidden.insert(comment_id.as_bytes(), &[])?;
        Ok(())
    }

    pub fn transcript_summary(&self, video_id: &str) -> Result<Option<String>> {
        match self.summaries.get(video_id.as_bytes())? {
            Some(raw) => Ok(Some(String::from_utf8_lossy(&raw).to_string())),
            None => Ok(None),
        }
    }

    /// Terminal: once set, the summary is reused indefinitely.
    pub fn set_transcript_summary(&self, video_id: &str, summary: &str) -> Result<()> {
        self.summaries
            .insert(video_id.as_bytes(), summary.as_bytes())?;
        Ok(())
    }

    pub fn summary_backoff_active(&self, video_id: &str, now: i64) -> Result<bool> {
        match self.backoff.get(video_id.as_bytes())? {
            Some(raw) => {
                let until: i64 = serde_json::from_slice(&raw)?;
                Ok(until > now)
            }
            None => Ok(false),
        }
    }

    pub fn set_summary_backoff(&self, video_id: &str, until: i64) -> Result<()> {
        self.backoff
            .insert(video_id.as_bytes(), serde_json::to_vec(&until)?)?;
        Ok(())
    }

    pub fn featured(&self) -> Result<Option<Vec<FeaturedComment>>> {
        self.output(FEATURED_KEY)
    }

    pub fn set_featured(&self, list: &[FeaturedComment]) -> Result<()> {
        self.set_output(FEATURED_KEY, list)
    }

    pub fn featured_updated_at(&self) -> Result<Option<String>> {
        self.output_updated_at(FEATURED_KEY)
    }

    pub fn leaderboard(&self) -> Result<Option<Vec<LeaderboardEntry>>> {
        self.output(LEADERBOARD_KEY)
    }

    pub fn set_leaderboard(&self, list: &[LeaderboardEntry]) -> Result<()> {
        self.set_output(LEADERBOARD_KEY, list)
    }

    pub fn leaderboard_updated_at(&self) -> Result<Option<String>> {
        self.output_updated_at(LEADERBOARD_KEY)
    }

    fn output<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.outputs.get(key.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    fn set_output<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.outputs.insert(key.as_bytes(), serde_json::to_vec(value)?)?;
        let stamp_key = format!("{}:updated_at", key);
        self.outputs.insert(
            stamp_key.as_bytes(),
            chrono::Utc::now().to_rfc3339().as_bytes(),
        )?;
        Ok(())
    }

    fn output_updated_at(&self, key: &str) -> Result<Option<String>> {
        let stamp_key = format!("{}:updated_at", key);
        match self.outputs.get(stamp_key.as_bytes())? {
            Some(raw) => Ok(Some(String::from_utf8_lossy(&raw).to_string())),
            None => Ok(None),
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::comments::{fingerprint, CommentStatus};

    fn record(id: &str) -> CommentRecord {
        CommentRecord {
            id: id.to_string(),
            video_id: "v1".into(),
            author_channel_id: "UC1".into(),
            author_name: "Alice".into(),
            author_url: None,
            text: "a perfectly fine comment".into(),
            published_at: Some("2026-01-01T00:00:00Z".into()),
            updated_at: None,
            like_count: Some(3),
            reply_count: None,
            fingerprint: fingerprint("a perfectly fine comment"),
            status: CommentStatus::Active,
            safety: None,
            scores: None,
            feature: None,
            rationale: None,
            scored_at: None,
            model_version: None,
        }
    }

    #[test]
    fn comment_roundtrip() {
        let store = RecordStore::temporary().unwrap();
        assert!(store.comment("c1").unwrap().is_none());
        let rec = record("c1");
        store.set_comment(&rec).unwrap();
        assert_eq!(store.comment("c1").unwrap().unwrap(), rec);
    }

    #[test]
    fn video_id_set_is_replaced_wholesale() {
        let store = RecordStore::temporary().unwrap();
        store
            .replace_video_comment_ids("v1", &["a".into(), "b".into()])
            .unwrap();
        store.replace_video_comment_ids("v1", &["c".into()]).unwrap();
        assert_eq!(store.video_comment_ids("v1").unwrap(), vec!["c".to_string()]);
    }

    #[test]
    fn author_id_set_appends_without_duplicates() {
        let store = RecordStore::temporary().unwrap();
        store.add_author_comment_id("UC1", "a").unwrap();
        store.add_author_comment_id("UC1", "b").unwrap();
        store.add_author_comment_id("UC1", "a").unwrap();
        assert_eq!(
            store.author_comment_ids("UC1").unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn hidden_set_membership() {
        let store = RecordStore::temporary().unwrap();
        store.add_hidden_id("c9").unwrap();
        let hidden = store.hidden_ids().unwrap();
        assert!(hidden.contains("c9"));
        assert!(!hidden.contains("c1"));
    }

    #[test]
    fn backoff_marker_expires() {
        let store = RecordStore::temporary().unwrap();
        assert!(!store.summary_backoff_active("v1", 100).unwrap());
        store.set_summary_backoff("v1", 200).unwrap();
        assert!(store.summary_backoff_active("v1", 100).unwrap());
        assert!(!store.summary_backoff_active("v1", 200).unwrap());
        assert!(!store.summary_backoff_active("v1", 300).unwrap());
    }

    #[test]
    fn outputs_carry_updated_at_stamp() {
        let store = RecordStore::temporary().unwrap();
        assert!(store.featured().unwrap().is_none());
        assert!(store.featured_updated_at().unwrap().is_none());
        store.set_featured(&[]).unwrap();
        assert_eq!(store.featured().unwrap().unwrap(), Vec::<FeaturedComment>::new());
        assert!(store.featured_updated_at().unwrap().is_some());
    }
}

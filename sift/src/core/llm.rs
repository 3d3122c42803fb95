use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::core::comments::{clamp_score, CommentSafety, CommentScores};
use crate::core::config::LlmConfig;

/// Context handed to the oracle for one comment.
pub struct ScoreRequest<'a> {
    pub comment: &'a str,
    pub video_title: &'a str,
    pub video_summary: &'a str,
    pub transcript_summary: &'a str,
    pub author_history: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentVerdict {
    pub safety: CommentSafety,
    pub scores: CommentScores,
    pub feature: bool,
    pub rationale: String,
}

impl CommentVerdict {
    /// Fixed record for unusable model output. Never an error: the comment
    /// just drops out of featured/leaderboard.
    pub fn parse_failure() -> Self {
        Self {
            safety: CommentSafety {
                ok: false,
                labels: vec!["parse_error".to_string()],
                confidence: 1.0,
            },
            scores: CommentScores::zero(),
            feature: false,
            rationale: "model_output_parse_error".to_string(),
        }
    }

    /// Deterministic verdict for comments the prefilter rejects; the oracle
    /// is never consulted for these.
    pub fn hard_block(reason: &str) -> Self {
        Self {
            safety: CommentSafety {
                ok: false,
                labels: vec![reason.to_string()],
                confidence: 1.0,
            },
            scores: CommentScores::zero(),
            feature: false,
            rationale: reason.to_string(),
        }
    }
}

/// Models wrap their JSON in prose often enough that plain parsing is not an
/// option. The two outcomes are explicit variants so callers cannot forget
/// the malformed path.
#[derive(Debug)]
pub enum ModelJson {
    Parsed(serde_json::Value),
    Malformed(String),
}

/// Takes the first `{` to the last `}` and parses only that window.
pub fn extract_json(raw: &str) -> ModelJson {
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if end > start {
            if let Ok(value) = serde_json::from_str(&raw[start..=end]) {
                return ModelJson::Parsed(value);
            }
        }
    }
    ModelJson::Malformed(raw.to_string())
}

#[derive(Deserialize)]
struct RawVerdict {
    safety: RawSafety,
    scores: RawScores,
    feature: bool,
    #[serde(default)]
    rationale: String,
}

#[derive(Deserialize)]
struct RawSafety {
    ok: bool,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    confidence: f64,
}

#[derive(Deserialize)]
struct RawScores {
    overall: f64,
    #[serde(default)]
    safety: f64,
    #[serde(default)]
    originality: f64,
    #[serde(default)]
    specificity: f64,
    #[serde(default)]
    constructive: f64,
    #[serde(default)]
    community: f64,
}

/// Malformed output or a missing required field degrades to the fixed
/// fallback verdict; every score is clamped into 0..=100.
pub fn parse_verdict(raw: &str) -> CommentVerdict {
    let value = match extract_json(raw) {
        ModelJson::Parsed(value) => value,
        ModelJson::Malformed(_) => return CommentVerdict::parse_failure(),
    };
    let parsed: RawVerdict = match serde_json::from_value(value) {
        Ok(parsed) => parsed,
        Err(_) => return CommentVerdict::parse_failure(),
    };
    CommentVerdict {
        safety: CommentSafety {
            ok: parsed.safety.ok,
            labels: parsed.safety.labels,
            confidence: if parsed.safety.confidence.is_finite() {
                parsed.safety.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
        },
        scores: CommentScores {
            overall: clamp_score(parsed.scores.overall),
            safety: clamp_score(parsed.scores.safety),
            originality: clamp_score(parsed.scores.originality),
            specificity: clamp_score(parsed.scores.specificity),
            constructive: clamp_score(parsed.scores.constructive),
            community: clamp_score(parsed.scores.community),
        },
        feature: parsed.feature,
        rationale: parsed.rationale,
    }
}

#[allow(async_fn_in_trait)]
pub trait CommentJudge {
    fn model_version(&self) -> String;
    async fn judge(&self, request: ScoreRequest<'_>) -> Result<CommentVerdict>;
}

#[allow(async_fn_in_trait)]
pub trait SummaryModel {
    /// Empty string means the model produced nothing usable; the caller
    /// applies its backoff policy.
    async fn summarize(&self, title: &str, excerpt: &str) -> Result<String>;
}

pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    pub async fn chat(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "stream": false,
            "temperature": 0.2
        });

        let url = format!(
            "{}/chat/completions",
            self.config.api_url.trim_end_matches('/')
        );

        log::debug!("Sending LLM request to {}", url);

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let res = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Failed to connect to LLM at {}: {}", url, e);
                return Err(anyhow!("LLM Connection Failed: {}", e));
            }
        };

        if !res.status().is_success() {
            let status = res.status();
            let error_text = res.text().await.unwrap_or_default();
            log::error!("LLM Error {}: {}", status, error_text);
            return Err(anyhow!("LLM API Error {}: {}", status, error_text));
        }

        let response_json: serde_json::Value = res.json().await?;

        // Parse OpenAI format: choices[0].message.content
        let mut content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .unwrap_or_default();

        // Strip <think> tags if present
        if let Some(idx) = content.find("</think>") {
            content = content[idx + "</think>".len()..].trim().to_string();
        }

        Ok(content.trim().to_string())
    }

    fn score_prompt(request: &ScoreRequest<'_>) -> String {
        format!(
            "You are a strict comment evaluator for a video community site.\n\
            Return only JSON.\n\n\
            Evaluation priorities:\n\
            1) Safety is absolute. If unsafe, mark safety.ok=false and feature=false.\n\
            2) Originality and specificity are next most important.\n\
            3) Other axes still matter but are secondary.\n\n\
            Scoring rules:\n\
            - scores are 0-100 integers.\n\
            - scores.safety is 0-100 where higher means safer.\n\
            - overall should reflect the weighted importance above.\n\n\
            Context:\n\
            Video title: {}\n\
            Video summary: {}\n\
            Transcript summary: {}\n\n\
            Comment:\n{}\n\n\
            Optional author history summary:\n{}\n\n\
            Return JSON with this schema:\n\
            {{\n\
              \"safety\": {{ \"ok\": boolean, \"labels\": [string], \"confidence\": number }},\n\
              \"scores\": {{\n\
                \"overall\": number,\n\
                \"safety\": number,\n\
                \"originality\": number,\n\
                \"specificity\": number,\n\
                \"constructive\": number,\n\
                \"community\": number\n\
              }},\n\
              \"feature\": boolean,\n\
              \"rationale\": string\n\
            }}",
            request.video_title,
            request.video_summary,
            request.transcript_summary,
            request.comment,
            request.author_history.unwrap_or("(none)")
        )
    }

    fn summary_prompt(title: &str, excerpt: &str) -> String {
        format!(
            "You are summarizing a video episode transcript.\n\
            Return only JSON with {{ \"summary\": string }}.\n\n\
            Title: {}\n\
            Transcript excerpt:\n{}\n\n\
            Write a 2-3 sentence summary, concise and factual.",
            title, excerpt
        )
    }
}

impl CommentJudge for LlmClient {
    fn model_version(&self) -> String {
        self.config.model.clone()
    }

    async fn judge(&self, request: ScoreRequest<'_>) -> Result<CommentVerdict> {
        let prompt = Self::score_prompt(&request);
        let raw = self.chat(&prompt).await?;
        Ok(parse_verdict(&raw))
    }
}

impl SummaryModel for LlmClient {
    async fn summarize(&self, title: &str, excerpt: &str) -> Result<String> {
        let prompt = Self::summary_prompt(title, excerpt);
        let raw = self.chat(&prompt).await?;
        match extract_json(&raw) {
            ModelJson::Parsed(value) => Ok(value["summary"]
                .as_str()
                .map(|s| s.trim().to_string())
                .unwrap_or_default()),
            ModelJson::Malformed(_) => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_tolerates_prose() {
        let raw = "Sure! Here is the result:\n{\"feature\": true}\nHope that helps.";
        match extract_json(raw) {
            ModelJson::Parsed(value) => assert_eq!(value["feature"], true),
            ModelJson::Malformed(_) => panic!("expected parsed"),
        }
    }

    #[test]
    fn extract_json_flags_garbage() {
        match extract_json("no braces here at all") {
            ModelJson::Malformed(raw) => assert_eq!(raw, "no braces here at all"),
            ModelJson::Parsed(_) => panic!("expected malformed"),
        }
    }

    #[test]
    fn parse_verdict_happy_path() {
        let raw = r#"Evaluation complete.
        {
          "safety": { "ok": true, "labels": [], "confidence": 0.9 },
          "scores": { "overall": 87, "safety": 95, "originality": 80, "specificity": 75, "constructive": 70, "community": 60 },
          "feature": true,
          "rationale": "specific and constructive"
        }"#;
        let verdict = parse_verdict(raw);
        assert!(verdict.safety.ok);
        assert!(verdict.feature);
        assert_eq!(verdict.scores.overall, 87);
        assert_eq!(verdict.rationale, "specific and constructive");
    }

    #[test]
    fn parse_verdict_clamps_out_of_range() {
        let raw = r#"{
          "safety": { "ok": true, "labels": [], "confidence": 2.5 },
          "scores": { "overall": 150, "safety": -20, "originality": 50, "specificity": 50, "constructive": 50, "community": 50 },
          "feature": false,
          "rationale": ""
        }"#;
        let verdict = parse_verdict(raw);
        assert_eq!(verdict.scores.overall, 100);
        assert_eq!(verdict.scores.safety, 0);
        assert_eq!(verdict.safety.confidence, 1.0);
    }

    #[test]
    fn parse_verdict_falls_back_on_malformed() {
        let verdict = parse_verdict("I refuse to answer in JSON.");
        assert!(!verdict.safety.ok);
        assert_eq!(verdict.safety.labels, vec!["parse_error".to_string()]);
        assert_eq!(verdict.safety.confidence, 1.0);
        assert_eq!(verdict.scores, CommentScores::zero());
        assert!(!verdict.feature);
        assert_eq!(verdict.rationale, "model_output_parse_error");
    }

    #[test]
    fn parse_verdict_falls_back_on_missing_fields() {
        let verdict = parse_verdict(r#"{ "scores": { "overall": 90 } }"#);
        assert_eq!(verdict.rationale, "model_output_parse_error");
    }
}

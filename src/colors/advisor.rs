//! Color-code advisor.
//!
//! An opaque LLM advisor that maps abbreviation-looking color codes to
//! display names. It is strictly advisory: every call carries a hard
//! timeout, a timeout or parse failure yields no suggestions, and the
//! pipeline never blocks on it. Only suggestions at or above the
//! per-source confidence threshold are auto-applied.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AppConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorSuggestion {
    pub bad: String,
    pub good: String,
    pub confidence: f64,
}

#[async_trait]
pub trait ColorAdvisor: Send + Sync {
    /// Suggest display names for a batch of unmapped color codes. An empty
    /// result is always acceptable.
    async fn suggest_colors(&self, codes: &[String]) -> Result<Vec<ColorSuggestion>>;
}

/// Advisor used when no API key is configured: suggests nothing.
pub struct NoopColorAdvisor;

#[async_trait]
impl ColorAdvisor for NoopColorAdvisor {
    async fn suggest_colors(&self, _codes: &[String]) -> Result<Vec<ColorSuggestion>> {
        Ok(Vec::new())
    }
}

const SYSTEM_PROMPT: &str = "You expand apparel color abbreviation codes into proper English color names. \
For every input code reply with exactly one line in the form \
CODE=<input>;NAME=<color name>;CONF=<0.0-1.0>. \
Use CONF below 0.5 when you are guessing. No other output.";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// OpenRouter-style chat-completions advisor.
pub struct HttpColorAdvisor {
    http: reqwest::Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl HttpColorAdvisor {
    pub fn new(http: reqwest::Client, api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            http,
            api_key,
            model,
            timeout,
        }
    }

    /// Build from app config; `None` when no key is configured.
    pub fn from_config(http: reqwest::Client, cfg: &AppConfig) -> Option<Self> {
        let api_key = cfg.advisor_api_key.clone()?;
        Some(Self::new(
            http,
            api_key,
            cfg.advisor_model.clone(),
            Duration::from_millis(cfg.advisor_timeout_ms),
        ))
    }

    async fn chat(&self, user: &str) -> Result<String> {
        let req = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: Some(0.0),
            max_tokens: Some(1024),
        };

        let resp = self
            .http
            .post("https://openrouter.ai/api/v1/chat/completions")
            .timeout(self.timeout)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&req)
            .send()
            .await
            .context("color advisor request")?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            let snippet: String = body.chars().take(400).collect();
            return Err(anyhow!("color advisor {}: {}", status.as_u16(), snippet));
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&body).context("color advisor json parse")?;
        Ok(parsed
            .choices
            .first()
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.clone())
            .unwrap_or_default())
    }
}

/// Parse `CODE=..;NAME=..;CONF=..` reply lines. Unparseable lines are
/// skipped, not fatal.
pub fn parse_suggestions(raw: &str) -> Vec<ColorSuggestion> {
    let mut out = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut bad: Option<String> = None;
        let mut good: Option<String> = None;
        let mut confidence: Option<f64> = None;

        for field in line.split(';') {
            let Some((k, v)) = field.split_once('=') else {
                continue;
            };
            let val = v.trim();
            match k.trim().to_ascii_uppercase().as_str() {
                "CODE" => bad = Some(val.to_string()),
                "NAME" => good = Some(val.to_string()),
                "CONF" => confidence = val.parse().ok(),
                _ => {}
            }
        }

        if let (Some(bad), Some(good), Some(confidence)) = (bad, good, confidence) {
            if !bad.is_empty() && !good.is_empty() && (0.0..=1.0).contains(&confidence) {
                out.push(ColorSuggestion {
                    bad,
                    good,
                    confidence,
                });
            }
        }
    }
    out
}

#[async_trait]
impl ColorAdvisor for HttpColorAdvisor {
    async fn suggest_colors(&self, codes: &[String]) -> Result<Vec<ColorSuggestion>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let user = format!("Codes:\n{}", codes.join("\n"));
        let content = match self.chat(&user).await {
            Ok(c) => c,
            Err(e) => {
                // Advisory only: a failed or timed-out batch is no
                // suggestion, never a failed import.
                warn!("color advisor batch failed: {:#}", e);
                return Ok(Vec::new());
            }
        };

        let suggestions = parse_suggestions(&content);
        debug!(
            requested = codes.len(),
            received = suggestions.len(),
            "color advisor batch complete"
        );
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reply_lines() {
        let raw = "CODE=BLK;NAME=Black;CONF=0.97\nCODE=NVY;NAME=Navy;CONF=0.95\ngarbage line\nCODE=XQZ;NAME=;CONF=0.2\n";
        let parsed = parse_suggestions(raw);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].bad, "BLK");
        assert_eq!(parsed[0].good, "Black");
        assert!(parsed[0].confidence > 0.9);
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let parsed = parse_suggestions("CODE=BLK;NAME=Black;CONF=1.7");
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn noop_advisor_suggests_nothing() {
        let advisor = NoopColorAdvisor;
        let out = advisor
            .suggest_colors(&["BLK".to_string()])
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}

//! Language model client
//!
//! Caller-side contract only: one request per scan, bounded by a timeout,
//! and the response must parse into the structured analysis document or the
//! scan fails. The production client talks to the Gemini generateContent
//! endpoint; models that wrap their JSON in markdown fences are tolerated.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::repo::analysis::ModelAnalysis;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Analyze the prompt, returning the parsed structured document
    async fn analyze(&self, prompt: &str) -> PipelineResult<ModelAnalysis>;

    /// Identifier recorded on the analysis (`ai_model` field)
    fn model_name(&self) -> &str;
}

/// Gemini REST client
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> PipelineResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Io {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn analyze(&self, prompt: &str) -> PipelineResult<ModelAnalysis> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Analysis {
                message: format!("Model request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(PipelineError::Analysis {
                message: format!("Model endpoint returned HTTP {}", response.status().as_u16()),
            });
        }

        let parsed: GenerateResponse =
            response.json().await.map_err(|e| PipelineError::Analysis {
                message: format!("Failed to read model response: {}", e),
            })?;

        let text = parsed
            .candidates
            .and_then(|mut c| c.drain(..).next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .and_then(|mut p| p.drain(..).next())
            .and_then(|p| p.text)
            .ok_or_else(|| PipelineError::Analysis {
                message: "Model response contained no text candidate".to_string(),
            })?;

        parse_model_output(&text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Parse the model's text output into the structured document
///
/// Strips markdown code fences first; anything that still fails to parse
/// is an analysis failure.
pub fn parse_model_output(text: &str) -> PipelineResult<ModelAnalysis> {
    let json_text = strip_code_fences(text);
    serde_json::from_str(json_text).map_err(|e| PipelineError::Analysis {
        message: format!("Unparsable model output: {}", e),
    })
}

fn strip_code_fences(text: &str) -> &str {
    let mut trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        trimmed = rest;
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        trimmed = rest;
    }
    if let Some(rest) = trimmed.strip_suffix("```") {
        trimmed = rest;
    }
    trimmed.trim()
}

//! The AI responder behind the reserved room.
//!
//! A responder never fails from the caller's point of view: any error on the
//! way to the model is logged and replaced by [`FALLBACK_REPLY`].

use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const AI_BOT_NAME: &str = "AI Bot";
pub const FALLBACK_REPLY: &str = "I'm having trouble connecting to my brain right now. Please try again later.";

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Answer concisely and clearly.";
const TEMPERATURE: f32 = 0.7;

#[async_trait]
pub trait Responder: Send + Sync {
    async fn reply(&self, prompt: &str) -> String;
}

pub struct Gemini {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl Gemini {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> reqwest::Result<Self> {
        let http = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, api_key, model: model.into() })
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let api_key = self.api_key.as_deref().ok_or(anyhow!("GEMINI_API_KEY is not configured"))?;

        let body: GenerateResponse = self.http
            .post(format!("{GEMINI_ENDPOINT}/{}:generateContent", self.model))
            .header("x-goog-api-key", api_key)
            .json(&GenerateRequest::new(prompt))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("decoding Gemini response")?;

        body.text().ok_or(anyhow!("Gemini returned no text"))
    }
}

#[async_trait]
impl Responder for Gemini {
    async fn reply(&self, prompt: &str) -> String {
        match self.generate(prompt).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(model = %self.model, error = %err, "AI responder failed, using fallback");
                FALLBACK_REPLY.to_owned()
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

impl<'a> GenerateRequest<'a> {
    fn new(prompt: &'a str) -> Self {
        Self {
            system_instruction: Content { role: None, parts: vec![Part { text: SYSTEM_PROMPT }] },
            contents: [Content { role: Some("user"), parts: vec![Part { text: prompt }] }],
            generation_config: GenerationConfig { temperature: TEMPERATURE },
        }
    }
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn text(self) -> Option<String> {
        let text: String = self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        let text = text.trim();
        (!text.is_empty()).then(|| text.to_owned())
    }
}

//! Clients for the external generative model used to label free-text queries.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{ArbiterError, ArbiterResult};

/// Opaque text-classification collaborator: prompt in, free-form text out.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    fn name(&self) -> &str;
    async fn classify(&self, prompt: &str) -> ArbiterResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAi,
}

/// Settings shared by both HTTP backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub provider: Provider,
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key: None,
            timeout_secs: 20,
            temperature: 0.1,
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Build the configured backend.
pub fn build_classifier(config: &InferenceConfig) -> ArbiterResult<Box<dyn TextClassifier>> {
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ArbiterError::config("inference.api_key must be set"))?;

    let http = Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| ArbiterError::network("building http client", e))?;

    let classifier: Box<dyn TextClassifier> = match config.provider {
        Provider::Gemini => Box::new(GeminiClassifier {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        }),
        Provider::OpenAi => Box::new(ChatCompletionsClassifier {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        }),
    };
    Ok(classifier)
}

/// Google Gemini `generateContent`.
pub struct GeminiClassifier {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[async_trait]
impl TextClassifier for GeminiClassifier {
    fn name(&self) -> &str {
        &self.model
    }

    async fn classify(&self, prompt: &str) -> ArbiterResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": self.temperature }
        });

        let resp = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ArbiterError::network("gemini generateContent", e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ArbiterError::model(
                crate::errors::Stage::Inference,
                format!("gemini returned HTTP {status}"),
            ));
        }

        let parsed: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| ArbiterError::network("decoding gemini response", e))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        non_empty(text, "gemini")
    }
}

/// OpenAI-compatible `/v1/chat/completions` (also served by LM Studio, vLLM, Ollama).
pub struct ChatCompletionsClassifier {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

#[async_trait]
impl TextClassifier for ChatCompletionsClassifier {
    fn name(&self) -> &str {
        &self.model
    }

    async fn classify(&self, prompt: &str) -> ArbiterResult<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": "You classify access requests. Answer only with the requested JSON block."},
                {"role": "user", "content": prompt}
            ],
            "temperature": self.temperature,
            "stream": false
        });

        let resp = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ArbiterError::network("chat completions", e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ArbiterError::model(
                crate::errors::Stage::Inference,
                format!("chat completions returned HTTP {status}"),
            ));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ArbiterError::network("decoding chat completions response", e))?;
        let answer = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        non_empty(answer, "chat completions")
    }
}

fn non_empty(text: String, backend: &str) -> ArbiterResult<String> {
    if text.trim().is_empty() {
        return Err(ArbiterError::model(
            crate::errors::Stage::Inference,
            format!("empty {backend} response"),
        ));
    }
    Ok(text)
}

use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use waypoint_core::{CallError, CallOutcome, Language};

use crate::config::InferenceConfig;

const MIN_CREDENTIAL_LEN: usize = 16;
const SYSTEM_PROMPT: &str = "You plan realistic one-day driving tours in Georgia. You answer with a single JSON object and nothing else.";

/// Opaque text-generation boundary. Implementations classify their own failures.
pub trait InferenceClient: Send + Sync {
    fn invoke<'a>(&'a self, prompt: &'a str, language: Language) -> BoxFuture<'a, CallOutcome>;
}

#[derive(Clone)]
pub struct OpenAiInference {
    http: Client,
    config: InferenceConfig,
}

impl OpenAiInference {
    pub fn new(config: InferenceConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { http, config })
    }

    pub fn is_configured(&self) -> bool {
        validate_credential(self.config.api_key.as_deref()).is_ok()
    }
}

impl InferenceClient for OpenAiInference {
    fn invoke<'a>(&'a self, prompt: &'a str, language: Language) -> BoxFuture<'a, CallOutcome> {
        self.request(prompt, language).boxed()
    }
}

impl OpenAiInference {
    async fn request(&self, prompt: &str, language: Language) -> CallOutcome {
        let api_key = validate_credential(self.config.api_key.as_deref())?;

        let payload = json!({
            "model": self.config.model,
            "input": [
                {
                    "role": "system",
                    "content": [
                        { "type": "input_text", "text": SYSTEM_PROMPT }
                    ]
                },
                {
                    "role": "user",
                    "content": [
                        { "type": "input_text", "text": prompt }
                    ]
                }
            ],
            "metadata": {
                "language": language.as_code()
            }
        });

        let response = self
            .http
            .post(self.config.endpoint.as_str())
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| CallError::transient(format!("inference request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| CallError::transient(format!("inference parse failed: {err}")))?;

        extract_output_text(&body)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| CallError::transient("inference output text missing"))
    }
}

/// Checked before any network attempt; a missing or malformed key is fatal.
pub fn validate_credential(api_key: Option<&str>) -> Result<&str, CallError> {
    let key = api_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| CallError::fatal("inference credential is not configured"))?;

    if key.len() < MIN_CREDENTIAL_LEN
        || key
            .chars()
            .any(|ch| ch.is_whitespace() || ch.is_control())
    {
        return Err(CallError::fatal("inference credential is malformed"));
    }

    Ok(key)
}

pub fn classify_status(status: StatusCode, body: &str) -> CallError {
    let snippet = body.chars().take(200).collect::<String>();
    let lower = body.to_lowercase();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CallError::fatal(format!("inference rejected credentials ({}): {}", status.as_u16(), snippet))
        }
        StatusCode::BAD_REQUEST if lower.contains("api key") || lower.contains("api_key") => {
            CallError::fatal(format!("inference rejected credentials (400): {}", snippet))
        }
        _ => CallError::transient(format!("inference status {}: {}", status.as_u16(), snippet)),
    }
}

fn extract_output_text(payload: &Value) -> Option<String> {
    if let Some(value) = payload.get("output_text").and_then(|value| value.as_str()) {
        return Some(value.to_string());
    }
    let output = payload.get("output")?.as_array()?;
    let mut chunks = Vec::new();
    for item in output {
        if let Some(content) = item.get("content").and_then(|value| value.as_array()) {
            for content_item in content {
                let is_text = content_item
                    .get("type")
                    .and_then(|value| value.as_str())
                    .map(|value| value == "output_text")
                    .unwrap_or(false);
                if is_text {
                    if let Some(text) = content_item.get("text").and_then(|value| value.as_str()) {
                        chunks.push(text.to_string());
                    }
                }
            }
        }
    }
    if chunks.is_empty() {
        None
    } else {
        Some(chunks.join("\n\n"))
    }
}

//! Gemini API client for the chat endpoint
//!
//! Single best-effort generateContent call with a hard timeout.
//! Uses a long-lived reqwest::Client for connection pooling.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::error::BackendError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// `api_key` is the server-wide default; an empty string means
    /// "unconfigured" and requests only succeed with a per-user override.
    pub fn new(api_key: String) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent".to_string(),
        })
    }

    /// Generate a response for `prompt`.
    ///
    /// `Ok(Some(text))` is a usable answer; `Ok(None)` means the call
    /// succeeded but carried no extractable text. Transport failures,
    /// non-success statuses and unparseable payloads are errors.
    pub async fn generate(
        &self,
        prompt: &str,
        api_key_override: Option<&str>,
    ) -> crate::Result<Option<String>> {
        let api_key = api_key_override.unwrap_or(&self.api_key);
        if api_key.is_empty() {
            return Err(BackendError::ModelError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, api_key);

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.4,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
        };

        info!("Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                BackendError::ModelError(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(BackendError::ModelError(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            BackendError::ModelError(format!("Gemini parse error: {}", e))
        })?;

        Ok(extract_text(gemini_response))
    }
}

/// First candidate's text, if any non-empty text came back.
fn extract_text(response: GeminiResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()?
        .content
        .parts
        .into_iter()
        .next()
        .map(|part| part.text)
        .filter(|text| !text.trim().is_empty())
}

const SYSTEM_PROMPT: &str = "You are a personal finance assistant. \
The user shares a summary of their monthly income, savings goal and recent \
expenses, followed by a question. Give practical, concrete guidance grounded \
in their numbers. Be concise and avoid financial jargon.";

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "How should I budget?".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.4,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: "You are a personal finance assistant".to_string(),
                }],
            },
        };

        let json = serde_json::to_string(&request);
        assert!(json.is_ok());
        assert!(json.unwrap().contains("How should I budget?"));
    }

    #[test]
    fn test_extract_text_first_candidate() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [
                {"content": {"parts": [{"text": "first"}]}},
                {"content": {"parts": [{"text": "second"}]}}
            ]}"#,
        )
        .unwrap();

        assert_eq!(extract_text(response), Some("first".to_string()));
    }

    #[test]
    fn test_extract_text_empty_shapes() {
        let no_candidates: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(extract_text(no_candidates), None);

        let missing_candidates: GeminiResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(extract_text(missing_candidates), None);

        let blank_text: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "   "}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(blank_text), None);
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = GeminiClient::new(String::new()).unwrap();
        let result = client.generate("what is an index fund?", None).await;

        assert!(result.is_err());
        let error_msg = result.unwrap_err().to_string();
        assert!(error_msg.contains("not configured"));
    }
}

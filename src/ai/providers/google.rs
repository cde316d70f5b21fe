//! Google Gemini provider implementation

use crate::ai::error::AIError;
use crate::ai::provider::AIProvider;
use crate::ai::AIResult;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Google Gemini API request structure
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety_settings: Option<Vec<GeminiSafetySetting>>,
}

/// Gemini content structure
#[derive(Debug, Clone, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiPart {
    text: String,
}

/// Gemini generation configuration
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidate_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiSafetySetting {
    category: String,
    threshold: String,
}

/// Gemini API response structure
#[derive(Debug, Clone, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini error response
#[derive(Debug, Clone, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiError {
    message: String,
    #[serde(default)]
    status: String,
}

/// Google Gemini provider implementation
pub struct GoogleProvider {
    client: Client,
    api_key: String,
    model: String,
    api_base: String,
    temperature: f32,
    max_output_tokens: u32,
    request_timeout: Duration,
}

impl GoogleProvider {
    /// Create a new Google Gemini provider
    pub fn new(api_key: String, model: String, request_timeout: Duration) -> AIResult<Self> {
        if api_key.trim().is_empty() {
            return Err(AIError::config_error("Gemini API key not configured"));
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AIError::config_error(format!("Failed to build HTTP client: {}", e)))?;

        let model = if model.trim().is_empty() {
            DEFAULT_GEMINI_MODEL.to_string()
        } else {
            model
        };

        Ok(Self {
            client,
            api_key,
            model,
            api_base: GEMINI_API_BASE.to_string(),
            temperature: 0.7,
            max_output_tokens: 2048,
            request_timeout,
        })
    }

    /// Point the provider at a different API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }

    /// Make a request to Google Gemini API
    async fn make_request(&self, contents: Vec<GeminiContent>) -> AIResult<String> {
        let generation_config = Some(GeminiGenerationConfig {
            temperature: Some(self.temperature),
            max_output_tokens: Some(self.max_output_tokens),
            candidate_count: Some(1),
        });

        let safety_settings = Some(
            [
                "HARM_CATEGORY_HATE_SPEECH",
                "HARM_CATEGORY_DANGEROUS_CONTENT",
                "HARM_CATEGORY_SEXUALLY_EXPLICIT",
                "HARM_CATEGORY_HARASSMENT",
            ]
            .iter()
            .map(|category| GeminiSafetySetting {
                category: category.to_string(),
                threshold: "BLOCK_MEDIUM_AND_ABOVE".to_string(),
            })
            .collect(),
        );

        let request = GeminiRequest {
            contents,
            generation_config,
            safety_settings,
        };

        tracing::debug!("Requesting draft from Gemini model {}", self.model);

        let response = timeout(
            self.request_timeout,
            self.client
                .post(self.endpoint())
                .query(&[("key", self.api_key.as_str())])
                .header("Content-Type", "application/json")
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| AIError::timeout(self.request_timeout))?
        .map_err(AIError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!("Gemini request failed with status {}", status);

            return match status.as_u16() {
                401 | 403 => Err(AIError::auth_failure("Google")),
                429 => Err(AIError::rate_limit("Google", Some(Duration::from_secs(60)))),
                400 => {
                    if let Ok(error_response) =
                        serde_json::from_str::<GeminiErrorResponse>(&error_text)
                    {
                        if error_response.error.status == "INVALID_ARGUMENT" {
                            Err(AIError::invalid_response(error_response.error.message))
                        } else {
                            Err(AIError::provider_unavailable(error_response.error.message))
                        }
                    } else {
                        Err(AIError::invalid_response(error_text))
                    }
                }
                500..=599 => Err(AIError::provider_unavailable("Google server error")),
                _ => Err(AIError::provider_unavailable(format!(
                    "Google API error: {}",
                    status
                ))),
            };
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            AIError::invalid_response(format!("Failed to parse Gemini response: {}", e))
        })?;

        let candidate = gemini_response
            .candidates
            .first()
            .ok_or_else(|| AIError::invalid_response("No candidates in Gemini response"))?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(AIError::content_filtered("Content blocked by safety filters"));
        }

        let text: String = candidate
            .content
            .as_ref()
            .map(|content| content.parts.iter().map(|part| part.text.as_str()).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AIError::invalid_response("No text in Gemini candidate"));
        }

        Ok(text)
    }

    fn create_content(&self, text: &str) -> Vec<GeminiContent> {
        vec![GeminiContent {
            parts: vec![GeminiPart {
                text: text.to_string(),
            }],
            role: Some("user".to_string()),
        }]
    }
}

#[async_trait]
impl AIProvider for GoogleProvider {
    fn name(&self) -> &str {
        "Google"
    }

    async fn complete_text(&self, prompt: &str) -> AIResult<String> {
        let contents = self.create_content(prompt);
        self.make_request(contents).await
    }
}

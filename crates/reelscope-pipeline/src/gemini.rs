//! [`SynthesisModel`] backed by the Google Gemini `generateContent` REST API.
//!
//! Images travel inline as base64 parts, so a whole carousel or keyframe
//! sequence is described in one request.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::collaborators::SynthesisModel;
use crate::error::PipelineError;
use crate::prompts::DATA_PREAMBLE;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_VISION_MODEL: &str = "gemini-2.0-flash-lite";
pub const DEFAULT_SUMMARY_MODEL: &str = "gemini-2.5-flash";

const REQUEST_TIMEOUT_SECS: u64 = 180;

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    vision_model: String,
    summary_model: String,
}

impl GeminiClient {
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingApiKey`] for a blank key, or
    /// [`PipelineError::Http`] if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        vision_model: impl Into<String>,
        summary_model: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(PipelineError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            vision_model: vision_model.into(),
            summary_model: summary_model.into(),
        })
    }

    /// Points the client at another host (a proxy, or a mock in tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn generate(
        &self,
        model: &str,
        parts: Vec<GeminiPart>,
        temperature: f32,
    ) -> Result<String, PipelineError> {
        let request = GeminiRequest {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiGenerationConfig {
                temperature,
                max_output_tokens: 8192,
            },
        };
        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url);

        // The key rides in the query string; keep it out of error messages.
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        let body = response.text().await.map_err(reqwest::Error::without_url)?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .map_or(body, |e| e.message);
            return Err(PipelineError::Model(format!(
                "Gemini API error ({status}): {message}"
            )));
        }

        let parsed: GeminiResponse =
            serde_json::from_str(&body).map_err(|e| PipelineError::Deserialize {
                context: format!("{model} response"),
                source: e,
            })?;
        if let Some(error) = parsed.error {
            return Err(PipelineError::Model(format!(
                "Gemini API error: {}",
                error.message
            )));
        }

        parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| PipelineError::Model(format!("{model} returned no text")))
    }
}

fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

async fn inline_image(path: &Path) -> Result<GeminiPart, PipelineError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    Ok(GeminiPart::InlineData {
        inline_data: GeminiInlineData {
            mime_type: mime_type(path),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        },
    })
}

#[async_trait]
impl SynthesisModel for GeminiClient {
    async fn describe_images(
        &self,
        prompt: &str,
        images: &[PathBuf],
    ) -> Result<String, PipelineError> {
        let mut parts = Vec::with_capacity(images.len() + 1);
        parts.push(GeminiPart::Text {
            text: prompt.to_string(),
        });
        for image in images {
            match inline_image(image).await {
                Ok(part) => parts.push(part),
                Err(e) => tracing::warn!(image = %image.display(), error = %e, "skipping unreadable image"),
            }
        }
        if parts.len() == 1 {
            return Err(PipelineError::Model(
                "none of the images could be read".to_string(),
            ));
        }

        tracing::info!(model = %self.vision_model, images = parts.len() - 1, "describing images");
        self.generate(&self.vision_model, parts, 0.2).await
    }

    async fn synthesize_report(
        &self,
        system_prompt: &str,
        content: &str,
    ) -> Result<String, PipelineError> {
        let parts = vec![
            GeminiPart::Text {
                text: system_prompt.to_string(),
            },
            GeminiPart::Text {
                text: DATA_PREAMBLE.to_string(),
            },
            GeminiPart::Text {
                text: content.to_string(),
            },
        ];
        tracing::info!(model = %self.summary_model, "synthesizing final report");
        self.generate(&self.summary_model, parts, 0.4).await
    }

    fn model_name(&self) -> &str {
        &self.summary_model
    }
}

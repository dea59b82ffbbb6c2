//! Wire types for the Generative Language REST API, shared by the story
//! assistant (text) and the panel artist (images).

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

pub const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub fn endpoint(model: &str, method: &str, api_key: &str) -> Result<Url> {
    let raw = format!("{}/models/{}:{}", API_BASE, model, method);
    Url::parse_with_params(&raw, &[("key", api_key)]).context("Invalid Gemini endpoint")
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    pub fn system(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn inline(mime_type: &str, base64_data: String) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data: base64_data,
            }),
            ..Default::default()
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageGenerationConfig>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ImageGenerationConfig {
    pub aspect_ratio: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ApiError {
    pub message: String,
}

impl GenerateContentResponse {
    fn first_candidate(&self) -> Option<&Candidate> {
        self.candidates.as_ref().and_then(|c| c.first())
    }

    pub fn first_text(&self) -> Option<&str> {
        self.first_candidate()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.text.as_deref())
    }

    pub fn first_inline_data(&self) -> Option<&InlineData> {
        self.first_candidate()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.inline_data.as_ref())
    }

    /// Best available explanation for a response that carries no usable part.
    pub fn empty_reason(&self) -> String {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return format!("prompt blocked ({})", reason);
        }
        match self.first_candidate() {
            Some(c) => format!(
                "finish reason {}",
                c.finish_reason.as_deref().unwrap_or("UNKNOWN")
            ),
            None => "no candidates".to_string(),
        }
    }
}

pub async fn generate_content(
    client: &reqwest::Client,
    url: Url,
    request: &GenerateContentRequest,
) -> Result<GenerateContentResponse> {
    let resp = client.post(url).json(request).send().await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let error_text = resp.text().await?;
        return Err(anyhow!("Gemini API error ({}): {}", status, error_text));
    }

    let response_text = resp.text().await?;
    let result: GenerateContentResponse = serde_json::from_str(&response_text)
        .map_err(|e| anyhow!("Failed to parse Gemini response: {}. Body: {}", e, response_text))?;

    if let Some(err) = &result.error {
        return Err(anyhow!("Gemini API returned error: {}", err.message));
    }

    Ok(result)
}

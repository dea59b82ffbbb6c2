use crate::core::config::{resolve_api_key, Config};
use crate::core::error::{ComicError, ComicResult};
use crate::core::model::PanelImage;
use crate::services::gemini::{self, Content, GenerateContentRequest, GenerationConfig, ImageGenerationConfig, Part};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

// --- Config ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageConfig {
    pub provider: String, // "gemini" or "imagen"
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    pub gemini: Option<ImageModelConfig>,
    pub imagen: Option<ImageModelConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ImageModelConfig {
    #[serde(default)]
    pub api_key: String,
    pub model: Option<String>,
}

fn default_aspect_ratio() -> String {
    "1:1".to_string()
}

const DEFAULT_GEMINI_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const DEFAULT_IMAGEN_MODEL: &str = "imagen-4.0-generate-001";

// --- Request ---

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    /// Earlier panel artwork the new image should stay consistent with.
    pub reference: Option<PanelImage>,
    pub aspect_ratio: String,
    /// Asks the model to leave lettering out; dialogue is overlaid later.
    pub exclude_text: bool,
}

const NO_TEXT_DIRECTIVE: &str = "Do not include any text, speech bubbles, or captions in the image.";

impl ImageRequest {
    /// The prompt as sent to the model.
    pub fn full_prompt(&self) -> String {
        if self.exclude_text {
            format!("{}\n{}\n", self.prompt.trim_end(), NO_TEXT_DIRECTIVE)
        } else {
            self.prompt.clone()
        }
    }
}

#[async_trait]
pub trait ImageGenerator: Send + Sync + Debug {
    /// Produces exactly one image or fails. A reply without an image is
    /// [`ComicError::NoImageReturned`], never a blank placeholder.
    async fn generate(&self, request: &ImageRequest) -> ComicResult<PanelImage>;
}

pub fn create_image_generator(config: &Config) -> Result<Box<dyn ImageGenerator>> {
    info!("Initializing image generator for provider: {}", config.image.provider);
    match config.image.provider.as_str() {
        "gemini" => {
            let cfg = config.image.gemini.clone().unwrap_or_default();
            let api_key = resolve_api_key(&cfg.api_key)?;
            let model = cfg.model.as_deref().unwrap_or(DEFAULT_GEMINI_IMAGE_MODEL);
            Ok(Box::new(GeminiImageClient::new(&api_key, model)))
        }
        "imagen" => {
            let cfg = config.image.imagen.clone().unwrap_or_default();
            let api_key = resolve_api_key(&cfg.api_key)?;
            let model = cfg.model.as_deref().unwrap_or(DEFAULT_IMAGEN_MODEL);
            Ok(Box::new(ImagenClient::new(&api_key, model)))
        }
        _ => Err(anyhow!("Unknown image provider: {}", config.image.provider)),
    }
}

// --- Gemini (generateContent with image output) ---

#[derive(Debug)]
pub struct GeminiImageClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiImageClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn build_request(request: &ImageRequest) -> GenerateContentRequest {
        let mut parts = vec![Part::text(&request.full_prompt())];
        if let Some(reference) = &request.reference {
            parts.push(Part::inline(&reference.mime_type, reference.to_base64()));
        }

        GenerateContentRequest {
            contents: vec![Content::user(parts)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["IMAGE".to_string()]),
                image_config: Some(ImageGenerationConfig {
                    aspect_ratio: request.aspect_ratio.clone(),
                }),
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageClient {
    async fn generate(&self, request: &ImageRequest) -> ComicResult<PanelImage> {
        let url = gemini::endpoint(&self.model, "generateContent", &self.api_key)
            .map_err(ComicError::Generation)?;
        debug!(
            "Requesting panel image from {} (reference: {})",
            self.model,
            request.reference.is_some()
        );

        let body = Self::build_request(request);
        let response = gemini::generate_content(&self.client, url, &body)
            .await
            .map_err(ComicError::Generation)?;

        let inline = response
            .first_inline_data()
            .ok_or_else(|| ComicError::no_image(response.empty_reason()))?;

        PanelImage::from_base64(inline.mime_type.clone(), &inline.data)
            .context("Image payload is not valid base64")
            .map_err(ComicError::Generation)
    }
}

// --- Imagen (predict) ---

#[derive(Debug)]
pub struct ImagenClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl ImagenClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct ImagenRequest {
    instances: Vec<ImagenInstance>,
    parameters: ImagenParameters,
}

#[derive(Serialize)]
struct ImagenInstance {
    prompt: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagenParameters {
    sample_count: u32,
    aspect_ratio: String,
    output_mime_type: String,
}

#[derive(Deserialize)]
struct ImagenResponse {
    #[serde(default)]
    predictions: Vec<ImagenPrediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagenPrediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
    rai_filtered_reason: Option<String>,
}

impl ImagenClient {
    fn build_request(request: &ImageRequest) -> ImagenRequest {
        ImagenRequest {
            instances: vec![ImagenInstance {
                prompt: request.full_prompt(),
            }],
            parameters: ImagenParameters {
                sample_count: 1,
                aspect_ratio: request.aspect_ratio.clone(),
                output_mime_type: "image/jpeg".to_string(),
            },
        }
    }
}

#[async_trait]
impl ImageGenerator for ImagenClient {
    async fn generate(&self, request: &ImageRequest) -> ComicResult<PanelImage> {
        if request.reference.is_some() {
            debug!("{} does not accept reference images; sending prompt only", self.model);
        }

        let url = gemini::endpoint(&self.model, "predict", &self.api_key)
            .map_err(ComicError::Generation)?;
        let body = Self::build_request(request);

        let resp = self.client.post(url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await?;
            return Err(ComicError::Generation(anyhow!(
                "Imagen API error ({}): {}",
                status,
                error_text
            )));
        }

        let result: ImagenResponse = resp.json().await?;
        let prediction = result
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| ComicError::no_image("empty predictions"))?;

        match prediction.bytes_base64_encoded {
            Some(encoded) => {
                let mime = prediction.mime_type.unwrap_or_else(|| "image/jpeg".to_string());
                PanelImage::from_base64(mime, &encoded).map_err(ComicError::Generation)
            }
            None => Err(ComicError::no_image(
                prediction
                    .rai_filtered_reason
                    .unwrap_or_else(|| "prediction without image bytes".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(reference: Option<PanelImage>) -> ImageRequest {
        ImageRequest {
            prompt: "A comic book panel".to_string(),
            reference,
            aspect_ratio: "1:1".to_string(),
            exclude_text: true,
        }
    }

    #[test]
    fn test_gemini_request_carries_reference_as_inline_part() {
        let body = GeminiImageClient::build_request(&request(Some(PanelImage::new(
            "image/jpeg",
            vec![1, 2, 3],
        ))));
        let json = serde_json::to_value(&body).unwrap();

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[0]["text"],
            "A comic book panel\nDo not include any text, speech bubbles, or captions in the image.\n"
        );
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "AQID");
        assert_eq!(json["generationConfig"]["responseModalities"][0], "IMAGE");
    }

    #[test]
    fn test_gemini_request_without_reference() {
        let body = GeminiImageClient::build_request(&request(None));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_text_directive_follows_flag() {
        let mut req = request(None);
        req.exclude_text = false;
        assert_eq!(req.full_prompt(), "A comic book panel");

        let body = ImagenClient::build_request(&req);
        assert_eq!(body.instances[0].prompt, "A comic book panel");

        req.exclude_text = true;
        let body = ImagenClient::build_request(&req);
        assert!(body.instances[0].prompt.ends_with("captions in the image.\n"));
        assert_eq!(body.parameters.aspect_ratio, "1:1");
    }

    #[test]
    fn test_imagen_response_parsing() {
        let json = r#"{
            "predictions": [
                { "bytesBase64Encoded": "AQID", "mimeType": "image/jpeg" }
            ]
        }"#;
        let result: ImagenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(result.predictions[0].bytes_base64_encoded.as_deref(), Some("AQID"));

        let empty: ImagenResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.predictions.is_empty());
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let config: Config = serde_yaml_ng::from_str("image:\n  provider: dalle\n").unwrap();
        let err = create_image_generator(&config).unwrap_err();
        assert!(err.to_string().contains("Unknown image provider"));
    }
}

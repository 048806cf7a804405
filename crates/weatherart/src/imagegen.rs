//! Raw reqwest Gemini image-generation client.
//!
//! Single request/response against the `generateContent` endpoint with
//! image-only response modality. The generated artwork is written to the
//! output directory named by the run timestamp.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ── Constants ───────────────────────────────────────────────────────

/// Gemini REST API base.
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Requested output size and shape.
const IMAGE_SIZE: &str = "4K";
const ASPECT_RATIO: &str = "16:9";

// ── Errors ──────────────────────────────────────────────────────────

/// Errors from image generation.
#[derive(Debug, thiserror::Error)]
pub enum ImageGenError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("GEMINI_API_KEY or GOOGLE_API_KEY is not set")]
    MissingApiKey,

    #[error("No image data returned from Gemini")]
    NoImageData,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ImageGenError>;

// ── Wire format ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    image_config: ImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    image_size: &'static str,
    aspect_ratio: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

// ── Client ──────────────────────────────────────────────────────────

/// A minimal Gemini image client.
#[derive(Debug)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a client; `api_key` comes from the resolved settings.
    pub fn new(api_key: Option<&str>, model: &str) -> Result<Self> {
        let api_key = api_key.ok_or(ImageGenError::MissingApiKey)?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Generate an artwork for `prompt_text` and write it to
    /// `<output_dir>/<timestamp>.<ext>`. Returns the written path.
    pub async fn generate(
        &self,
        prompt_text: &str,
        output_dir: &Path,
        timestamp: &str,
    ) -> Result<PathBuf> {
        let body = ApiRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt_text }],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE"],
                image_config: ImageConfig {
                    image_size: IMAGE_SIZE,
                    aspect_ratio: ASPECT_RATIO,
                },
            },
        };

        let url = format!("{API_BASE}/{}:generateContent", self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ImageGenError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: ApiResponse = response.json().await?;
        let (image_bytes, mime_type) =
            extract_image_bytes(&api_response).ok_or(ImageGenError::NoImageData)?;

        let ext = match mime_type.as_deref() {
            Some("image/jpeg") => ".jpg",
            _ => ".png",
        };
        std::fs::create_dir_all(output_dir)?;
        let image_path = output_dir.join(format!("{timestamp}{ext}"));
        std::fs::write(&image_path, image_bytes)?;
        Ok(image_path)
    }
}

/// First base64-decodable inline part, with its mime type.
fn extract_image_bytes(response: &ApiResponse) -> Option<(Vec<u8>, Option<String>)> {
    for candidate in &response.candidates {
        for part in &candidate.content.parts {
            let Some(inline) = &part.inline_data else {
                continue;
            };
            let Some(data) = inline.data.as_deref() else {
                continue;
            };
            if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(data) {
                return Some((bytes, inline.mime_type.clone()));
            }
        }
    }
    None
}

/// Description generation through a vision-capable chat completions API.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::config::DescribeConfig;

const PROMPT: &str = "Provide a description of this image";

/// Why a description could not be produced
#[derive(Debug, Error)]
pub enum DescribeError {
    #[error("API key has not been set, please set it with `photo-labeler settings --set-api-key`")]
    MissingCredential,
    #[error("could not read image {path}: {message}")]
    Image { path: String, message: String },
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Anything that can turn an image file into a text description
pub trait DescriptionService {
    fn describe(&self, image_path: &Path, credential: Option<&str>) -> Result<String, DescribeError>;
}

/// OpenAI-compatible `/v1/chat/completions` client
pub struct OpenAiDescriber {
    http_client: ureq::Agent,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiDescriber {
    pub fn new(config: &DescribeConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();

        Self {
            http_client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    fn request_body(&self, mime: &str, encoded_image: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": PROMPT },
                        {
                            "type": "image_url",
                            "image_url": { "url": format!("data:{mime};base64,{encoded_image}") }
                        }
                    ]
                }
            ],
            "max_tokens": self.max_tokens
        })
    }
}

impl DescriptionService for OpenAiDescriber {
    fn describe(&self, image_path: &Path, credential: Option<&str>) -> Result<String, DescribeError> {
        let api_key = credential
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(DescribeError::MissingCredential)?;

        let bytes = std::fs::read(image_path).map_err(|e| DescribeError::Image {
            path: image_path.display().to_string(),
            message: e.to_string(),
        })?;
        let body = self.request_body(mime_for(image_path), &BASE64.encode(bytes));

        info!("⏳ Requesting description for {}", image_path.display());

        let response = self
            .http_client
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {api_key}"))
            .send_json(body);

        let payload: Value = match response {
            Ok(response) => response
                .into_json()
                .map_err(|e| DescribeError::UnexpectedResponse(e.to_string()))?,
            Err(ureq::Error::Status(code, response)) => {
                let detail = response
                    .into_json::<Value>()
                    .ok()
                    .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(|| "no detail".to_string());
                warn!("Description service answered HTTP {}: {}", code, detail);
                return Err(DescribeError::Request(format!("HTTP {code}: {detail}")));
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(DescribeError::Request(transport.to_string()));
            }
        };

        let description = extract_description(&payload)?;
        debug!("Description received ({} chars)", description.len());
        Ok(description)
    }
}

/// Pull `choices[0].message.content` out of a completion payload
pub fn extract_description(payload: &Value) -> Result<String, DescribeError> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| DescribeError::UnexpectedResponse(payload.to_string()))
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

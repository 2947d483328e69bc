use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hangar_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};

use super::{Llm, VisionModel};
use crate::ollama::OllamaClient;

#[derive(Debug, Clone)]
pub struct OllamaLlm {
    client: OllamaClient,
    timeout: Duration,
}

impl OllamaLlm {
    pub fn new(client: OllamaClient) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn call(&self, req: GenerateRequest<'_>, code: &str) -> Result<String, AppError> {
        let url = format!("{}/api/generate", self.client.base_url());
        let resp = ureq::post(&url)
            .timeout(self.timeout)
            .send_json(serde_json::to_value(&req).map_err(|e| {
                AppError::new(code, "Failed to encode generate request").with_details(e.to_string())
            })?);

        match resp {
            Ok(r) if r.status() == 200 => {
                let v: GenerateResponse = r.into_json().map_err(|e| {
                    AppError::new(code, "Failed to decode generate response")
                        .with_details(e.to_string())
                })?;
                if v.response.trim().is_empty() {
                    return Err(AppError::new(code, "Generate response was empty")
                        .with_details(format!("model={}", req.model)));
                }
                Ok(v.response)
            }
            Ok(r) => Err(AppError::new(code, "Generate request failed")
                .with_details(format!("model={}; status={}", req.model, r.status()))),
            Err(e) => Err(AppError::new(code, "Failed to call generate endpoint")
                .with_details(format!("model={}; err={}", req.model, e))
                .with_retryable(true)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl Llm for OllamaLlm {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError> {
        let req = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
            images: Vec::new(),
        };
        self.call(req, codes::GENERATION_FAILED)
    }
}

impl VisionModel for OllamaLlm {
    fn analyze_image(&self, model: &str, image: &[u8], prompt: &str) -> Result<String, AppError> {
        let req = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
            images: vec![STANDARD.encode(image)],
        };
        self.call(req, codes::VISION_FAILED)
    }
}

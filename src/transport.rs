use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::error::{GuideError, Result};

/// One "generate content" call against a single model
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub system_instruction: String,
    /// Output shape for structured operations; `None` asks for free text
    pub response_schema: Option<Value>,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateResponse {
    pub model: String,
    pub text: Option<String>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse>;
}

// ----- Gemini wire format -----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    system_instruction: GeminiContent<'a>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl<'a> GeminiRequest<'a> {
    fn from_request(req: &'a GenerateRequest) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart { text: &req.prompt }],
            }],
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: &req.system_instruction,
                }],
            },
            generation_config: GenerationConfig {
                temperature: req.temperature,
                response_mime_type: req.response_schema.as_ref().map(|_| "application/json"),
                response_schema: req.response_schema.as_ref(),
            },
        }
    }
}

impl GeminiResponse {
    /// Concatenated text of the first candidate, if it has any parts
    fn into_text(self) -> Option<String> {
        let parts = self.candidates.into_iter().next()?.content?.parts;
        let texts: Vec<String> = parts.into_iter().filter_map(|p| p.text).collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }
}

/// Map a non-success reply to the gateway's error kinds
fn classify_failure(model: &str, status: StatusCode, body: &str) -> GuideError {
    let (message, api_status) = match serde_json::from_str::<GeminiErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.to_string(), String::new()),
    };

    if status == StatusCode::SERVICE_UNAVAILABLE || api_status == "UNAVAILABLE" {
        GuideError::ProviderUnavailable {
            model: model.to_string(),
            message,
        }
    } else if api_status.is_empty() {
        GuideError::Provider(format!("{status}: {message}"))
    } else {
        GuideError::Provider(format!("{status} {api_status}: {message}"))
    }
}

struct ClientHandle {
    http: Client,
    api_key: String,
}

/// Gemini REST transport. The HTTP client and credential are resolved on the
/// first call and reused for the lifetime of the instance.
pub struct GeminiTransport {
    config: Config,
    handle: OnceCell<ClientHandle>,
}

impl GeminiTransport {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            handle: OnceCell::new(),
        }
    }

    async fn handle(&self) -> Result<&ClientHandle> {
        self.handle
            .get_or_try_init(|| async {
                let api_key = self.config.api_key()?;
                let http = Client::builder()
                    .timeout(self.config.request_timeout())
                    .build()?;
                tracing::debug!("Gemini client initialised");
                Ok::<_, GuideError>(ClientHandle { http, api_key })
            })
            .await
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.gemini.base_url.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
        let handle = self.handle().await?;
        let body = GeminiRequest::from_request(req);

        let response = handle
            .http
            .post(self.endpoint(&req.model))
            .header("x-goog-api-key", &handle.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GuideError::Provider(format!("Failed to send request to Gemini API: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_failure(&req.model, status, &text));
        }

        let parsed: GeminiResponse = response.json().await.map_err(|e| {
            GuideError::Provider(format!("Failed to parse Gemini API response: {e}"))
        })?;

        Ok(GenerateResponse {
            model: req.model.clone(),
            text: parsed.into_text(),
        })
    }
}

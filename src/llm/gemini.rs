use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::llm::media::{aspect_ratio_hint, EncodedImage};
use crate::llm::prompt::build_styling_prompt;
use crate::llm::styling::{
    is_credential_error_message, CredentialPrompt, StylingError, StylingService,
};
use crate::options::StylingOptions;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

/// Finish reasons that mean the model refused to return an image.
const SAFETY_FINISH_REASONS: [&str; 6] = [
    "SAFETY",
    "IMAGE_SAFETY",
    "PROHIBITED_CONTENT",
    "IMAGE_PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyProfile {
    Standard,
    Permissive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AspectRatioSetting {
    Auto,
    Off,
    Fixed(String),
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub safety: SafetyProfile,
    pub request_timeout: Duration,
    pub aspect_ratio: AspectRatioSetting,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Text {
        text: String,
    },
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

fn redact_api_key(text: &str, key: &str) -> String {
    let key = key.trim();
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key, "[redacted]")
}

fn is_credential_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn build_safety_settings(profile: SafetyProfile) -> Vec<Value> {
    let threshold = match profile {
        SafetyProfile::Standard => "BLOCK_MEDIUM_AND_ABOVE",
        SafetyProfile::Permissive => "OFF",
    };

    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
    ]
}

fn build_image_config(aspect_ratio: Option<&str>) -> Option<Value> {
    let mut map = Map::new();

    if let Some(aspect_ratio) = aspect_ratio {
        let trimmed = aspect_ratio.trim();
        if !trimmed.is_empty() {
            map.insert("aspectRatio".to_string(), json!(trimmed));
        }
    }

    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map))
    }
}

fn build_styling_payload(
    source: &EncodedImage,
    prompt: &str,
    aspect_ratio: Option<&str>,
    safety: SafetyProfile,
) -> Value {
    let parts = vec![
        json!({
            "inlineData": {
                "mimeType": source.mime_type,
                "data": source.base64_data()
            }
        }),
        json!({ "text": prompt }),
    ];

    let mut generation_config = json!({
        "responseModalities": ["TEXT", "IMAGE"]
    });
    if let Some(image_config) = build_image_config(aspect_ratio) {
        if let Some(config_object) = generation_config.as_object_mut() {
            config_object.insert("imageConfig".to_string(), image_config);
        }
    }

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": generation_config,
        "safetySettings": build_safety_settings(safety),
    })
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_payload(payload: &Value) -> Value {
    let parts = payload
        .pointer("/contents/0/parts")
        .and_then(|value| value.as_array())
        .map(|parts| {
            parts
                .iter()
                .map(|part| {
                    if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                        json!({ "text": truncate_for_log(text, 200) })
                    } else if let Some(inline_data) = part.get("inlineData") {
                        let mime_type = inline_data
                            .get("mimeType")
                            .and_then(|value| value.as_str())
                            .unwrap_or("unknown");
                        let data_len = inline_data
                            .get("data")
                            .and_then(|value| value.as_str())
                            .map(|value| value.len())
                            .unwrap_or(0);
                        json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
                    } else {
                        json!({ "unknownPart": true })
                    }
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    json!({
        "parts": parts,
        "generationConfig": payload.get("generationConfig").cloned().unwrap_or(Value::Null),
        "safetySettingsCount": payload
            .get("safetySettings")
            .and_then(|value| value.as_array())
            .map(|value| value.len())
            .unwrap_or(0),
    })
}

fn summarize_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;
    let mut text_preview = None;

    for part in response_parts(response) {
        match part {
            GeminiPart::Text { text } => {
                text_parts += 1;
                if text_preview.is_none() && !text.trim().is_empty() {
                    text_preview = Some(truncate_for_log(text, 200));
                }
            }
            GeminiPart::InlineData { inline_data } => {
                if inline_data.mime_type.starts_with("image/") {
                    image_parts += 1;
                }
            }
            GeminiPart::Other(_) => {}
        }
    }

    json!({
        "candidates": response.candidates.as_ref().map(|candidates| candidates.len()).unwrap_or(0),
        "textParts": text_parts,
        "imageParts": image_parts,
        "textPreview": text_preview,
        "blockReason": response
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.clone()),
    })
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn response_parts(response: &GeminiResponse) -> impl Iterator<Item = &GeminiPart> {
    response
        .candidates
        .iter()
        .flatten()
        .filter_map(|candidate| candidate.content.as_ref())
        .filter_map(|content| content.parts.as_ref())
        .flatten()
}

/// First image-bearing part, scanning candidates and parts in order.
fn extract_first_image(response: &GeminiResponse) -> Option<EncodedImage> {
    for part in response_parts(response) {
        let GeminiPart::InlineData { inline_data } = part else {
            continue;
        };
        if !inline_data.mime_type.starts_with("image/") {
            continue;
        }
        match general_purpose::STANDARD.decode(inline_data.data.trim()) {
            Ok(bytes) if !bytes.is_empty() => {
                return Some(EncodedImage::new(inline_data.mime_type.clone(), bytes));
            }
            Ok(_) => warn!("Skipping empty {} part in Gemini response", inline_data.mime_type),
            Err(err) => warn!(
                "Skipping undecodable {} part in Gemini response: {}",
                inline_data.mime_type, err
            ),
        }
    }
    None
}

fn extract_text_preview(response: &GeminiResponse) -> Option<String> {
    let text = response_parts(response)
        .filter_map(|part| match part {
            GeminiPart::Text { text } if !text.trim().is_empty() => Some(text.trim()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    if text.is_empty() {
        None
    } else {
        Some(truncate_for_log(&text, 500))
    }
}

fn interpret_response(response: &GeminiResponse, model: &str) -> Result<EncodedImage, StylingError> {
    if let Some(image) = extract_first_image(response) {
        return Ok(image);
    }

    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(StylingError::service(format!(
            "The request was blocked by the safety filters ({reason}). Try a different photo or style."
        )));
    }

    let safety_stop = response
        .candidates
        .iter()
        .flatten()
        .filter_map(|candidate| candidate.finish_reason.as_deref())
        .find(|reason| SAFETY_FINISH_REASONS.contains(reason));
    if let Some(reason) = safety_stop {
        return Err(StylingError::service(format!(
            "Generation was stopped by the safety filters ({reason}). Try a different photo or style."
        )));
    }

    Err(StylingError::EmptyResponse {
        model: model.to_string(),
        text: extract_text_preview(response),
    })
}

/// Styling client backed by the Gemini `generateContent` endpoint.
pub struct GeminiStylist {
    settings: GeminiSettings,
    client: Client,
    credential_prompt: Arc<dyn CredentialPrompt>,
}

impl GeminiStylist {
    pub fn new(settings: GeminiSettings, credential_prompt: Arc<dyn CredentialPrompt>) -> Self {
        Self {
            settings,
            client: get_http_client().clone(),
            credential_prompt,
        }
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn resolve_aspect_ratio(&self, source: &EncodedImage) -> Option<String> {
        match &self.settings.aspect_ratio {
            AspectRatioSetting::Auto => aspect_ratio_hint(source).map(|value| value.to_string()),
            AspectRatioSetting::Off => None,
            AspectRatioSetting::Fixed(value) => Some(value.clone()),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.model
        )
    }

    async fn call_api(&self, payload: &Value) -> Result<GeminiResponse, StylingError> {
        let key = &self.settings.api_key;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(target: "llm.gemini", model = %self.settings.model, payload = %summarize_payload(payload));
        }

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .timeout(self.settings.request_timeout)
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                let err_text = redact_api_key(&err.to_string(), key);
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect()
                );
                if err.is_timeout() {
                    StylingError::service(format!(
                        "The AI Barber service did not respond within {} seconds.",
                        self.settings.request_timeout.as_secs()
                    ))
                } else {
                    StylingError::service(format!("Gemini request failed: {err_text}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!(
                "Gemini API error: status={}, body={}",
                status,
                redact_api_key(&body_summary, key)
            );
            let detail = redact_api_key(&message.unwrap_or(body_summary), key);
            let text = format!("Gemini request failed with status {status}: {detail}");
            let credential_reset = is_credential_status(status) || is_credential_error_message(&text);
            return Err(StylingError::Service {
                message: text,
                credential_reset,
            });
        }

        let value = response.json::<GeminiResponse>().await.map_err(|err| {
            StylingError::service(format!(
                "Gemini returned a response that could not be read: {}",
                redact_api_key(&err.to_string(), key)
            ))
        })?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(target: "llm.gemini", model = %self.settings.model, response = %summarize_response(&value));
        }
        Ok(value)
    }

    async fn request_style(
        &self,
        source: &EncodedImage,
        options: &StylingOptions,
    ) -> Result<EncodedImage, StylingError> {
        source.validate()?;
        if self.settings.api_key.trim().is_empty() {
            return Err(StylingError::credential("Gemini API key not configured."));
        }

        let prompt = build_styling_prompt(options);
        let aspect_ratio = self.resolve_aspect_ratio(source);
        let payload =
            build_styling_payload(source, &prompt, aspect_ratio.as_deref(), self.settings.safety);
        let metadata = json!({
            "hairstyle": options.hairstyle.label(),
            "beardStyle": options.beard_style.label(),
            "sourceMimeType": source.mime_type,
            "sourceBytes": source.data.len(),
            "aspectRatio": aspect_ratio,
        });

        let model = self.settings.model.as_str();
        log_llm_timing("gemini", model, "apply_style", Some(metadata), || async {
            let response = self.call_api(&payload).await?;
            interpret_response(&response, model)
        })
        .await
    }
}

impl StylingService for GeminiStylist {
    async fn apply_style(
        &self,
        source: &EncodedImage,
        options: &StylingOptions,
    ) -> Result<EncodedImage, StylingError> {
        let result = self.request_style(source, options).await;
        match &result {
            Ok(image) => info!(
                "Styled portrait with {} ({} / {}): {} bytes of {}",
                self.settings.model,
                options.hairstyle,
                options.beard_style,
                image.data.len(),
                image.mime_type
            ),
            Err(err) if err.is_credential_error() => {
                warn!("AI styling failed with a credential error: {}", err);
                self.credential_prompt.request_reselection(&err.to_string());
            }
            Err(err) => warn!("AI styling failed: {}", err),
        }
        result
    }
}

use std::future::Future;

use tracing::warn;

use crate::llm::media::{EncodedImage, MediaError};
use crate::options::StylingOptions;

pub const EMPTY_RESPONSE_MESSAGE: &str =
    "Style generation failed. The AI did not return a valid image.";
pub const CREDENTIAL_RESET_MESSAGE: &str =
    "The API key configuration was reset. Select a valid Gemini API key and try again.";

/// Marker texts the image service uses when the configured key is unusable.
const CREDENTIAL_ERROR_MARKERS: [&str; 4] = [
    "requested entity was not found",
    "api key not valid",
    "api_key_invalid",
    "api key not configured",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StylingError {
    #[error("Malformed image input: {0}")]
    MalformedInput(String),
    #[error("Style generation failed. The AI did not return a valid image. (model: {model})")]
    EmptyResponse { model: String, text: Option<String> },
    #[error("{message}")]
    Service {
        message: String,
        credential_reset: bool,
    },
}

impl StylingError {
    pub fn service(message: impl Into<String>) -> Self {
        let message = message.into();
        let credential_reset = is_credential_error_message(&message);
        StylingError::Service {
            message,
            credential_reset,
        }
    }

    pub fn credential(message: impl Into<String>) -> Self {
        StylingError::Service {
            message: message.into(),
            credential_reset: true,
        }
    }

    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            StylingError::Service {
                credential_reset: true,
                ..
            }
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            StylingError::MalformedInput(detail) => {
                format!("The uploaded photo could not be read: {detail}")
            }
            StylingError::EmptyResponse { text: Some(text), .. } => {
                format!("{EMPTY_RESPONSE_MESSAGE} The model said: {text}")
            }
            StylingError::EmptyResponse { text: None, .. } => EMPTY_RESPONSE_MESSAGE.to_string(),
            StylingError::Service {
                credential_reset: true,
                ..
            } => CREDENTIAL_RESET_MESSAGE.to_string(),
            StylingError::Service { message, .. } if message.trim().is_empty() => {
                "An error occurred while communicating with the AI Barber service.".to_string()
            }
            StylingError::Service { message, .. } => message.clone(),
        }
    }
}

impl From<MediaError> for StylingError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Malformed(detail) => StylingError::MalformedInput(detail),
            other => StylingError::MalformedInput(other.to_string()),
        }
    }
}

pub fn is_credential_error_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    CREDENTIAL_ERROR_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// One outbound call per invocation. Implementations never touch session state.
pub trait StylingService {
    fn apply_style(
        &self,
        source: &EncodedImage,
        options: &StylingOptions,
    ) -> impl Future<Output = Result<EncodedImage, StylingError>> + Send;
}

pub trait CredentialPrompt: Send + Sync {
    fn request_reselection(&self, reason: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleCredentialPrompt;

impl CredentialPrompt for ConsoleCredentialPrompt {
    fn request_reselection(&self, reason: &str) {
        warn!("Gemini rejected the configured API key: {}", reason);
        eprintln!(
            "The Gemini API key was rejected. Set GEMINI_API_KEY (in the environment or .env) to a valid key, then run the command again."
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_credential_markers() {
        assert!(is_credential_error_message(
            "Gemini request failed with status 404 Not Found: Requested entity was not found."
        ));
        assert!(is_credential_error_message("API key not valid. Please pass a valid API key."));
        assert!(!is_credential_error_message("Resource has been exhausted (e.g. check quota)."));
    }

    #[test]
    fn service_constructor_flags_credential_errors() {
        assert!(StylingError::service("Requested entity was not found.").is_credential_error());
        assert!(!StylingError::service("quota exceeded").is_credential_error());
    }

    #[test]
    fn user_messages_per_variant() {
        assert_eq!(
            StylingError::credential("bad key").user_message(),
            CREDENTIAL_RESET_MESSAGE
        );
        assert_eq!(
            StylingError::service("Quota exceeded").user_message(),
            "Quota exceeded"
        );
        assert_eq!(
            StylingError::EmptyResponse {
                model: "m".to_string(),
                text: None
            }
            .user_message(),
            EMPTY_RESPONSE_MESSAGE
        );
        let with_text = StylingError::EmptyResponse {
            model: "m".to_string(),
            text: Some("I can't edit this photo.".to_string()),
        }
        .user_message();
        assert!(with_text.starts_with(EMPTY_RESPONSE_MESSAGE));
        assert!(with_text.ends_with("I can't edit this photo."));
    }

    #[test]
    fn media_errors_become_malformed_input() {
        let err: StylingError = MediaError::Malformed("missing mime type".to_string()).into();
        assert_eq!(
            err,
            StylingError::MalformedInput("missing mime type".to_string())
        );
    }
}

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

use crate::llm::gemini::{AspectRatioSetting, GeminiSettings, SafetyProfile};
use crate::llm::media::SUPPORTED_ASPECT_RATIOS;
use crate::options::{BeardStyle, Hairstyle, StylingOptions, DEFAULT_COLOR};
use crate::studio::{IdentityMode, StudioSettings};

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub logs_dir: PathBuf,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_image_model: String,
    pub gemini_safety_settings: SafetyProfile,
    pub gemini_request_timeout_seconds: u64,
    pub gemini_aspect_ratio: AspectRatioSetting,
    pub store_dir: PathBuf,
    pub store_namespace: String,
    pub identity_mode: IdentityMode,
    pub default_options: StylingOptions,
    /// Fallbacks applied while parsing; emitted by `log_warnings` once logging is up.
    pub warnings: Vec<String>,
}

type Vars = HashMap<String, String>;

fn var_string(vars: &Vars, name: &str, default: &str) -> String {
    vars.get(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn var_u64(vars: &Vars, name: &str, default: u64, warnings: &mut Vec<String>) -> u64 {
    match vars.get(name) {
        None => default,
        Some(value) => value.trim().parse::<u64>().unwrap_or_else(|_| {
            warnings.push(format!("Invalid {name} value '{value}'; using {default}."));
            default
        }),
    }
}

fn normalize_safety_settings(value: &str, warnings: &mut Vec<String>) -> SafetyProfile {
    match value.trim().to_lowercase().as_str() {
        "" | "standard" => SafetyProfile::Standard,
        "permissive" | "off" | "none" => SafetyProfile::Permissive,
        _ => {
            warnings.push(format!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{value}'; defaulting to standard."
            ));
            SafetyProfile::Standard
        }
    }
}

fn normalize_aspect_ratio(value: &str, warnings: &mut Vec<String>) -> AspectRatioSetting {
    let trimmed = value.trim();
    match trimmed.to_lowercase().as_str() {
        "" | "auto" => return AspectRatioSetting::Auto,
        "off" | "none" => return AspectRatioSetting::Off,
        _ => {}
    }
    if SUPPORTED_ASPECT_RATIOS
        .iter()
        .any(|(label, _, _)| *label == trimmed)
    {
        return AspectRatioSetting::Fixed(trimmed.to_string());
    }
    warnings.push(format!(
        "Unsupported GEMINI_ASPECT_RATIO value '{value}'; deriving it from the source image."
    ));
    AspectRatioSetting::Auto
}

fn normalize_identity_mode(value: &str, warnings: &mut Vec<String>) -> IdentityMode {
    match value.trim().to_lowercase().as_str() {
        "" | "session" => IdentityMode::Session,
        "email" => IdentityMode::Email,
        _ => {
            warnings.push(format!(
                "Unknown BARBER_IDENTITY_MODE value '{value}'; defaulting to session."
            ));
            IdentityMode::Session
        }
    }
}

fn default_options(vars: &Vars, warnings: &mut Vec<String>) -> StylingOptions {
    let fallback = StylingOptions::default();
    let hairstyle = match vars.get("DEFAULT_HAIRSTYLE").map(|value| value.parse::<Hairstyle>()) {
        Some(Ok(hairstyle)) => hairstyle,
        Some(Err(err)) => {
            warnings.push(format!("Ignoring DEFAULT_HAIRSTYLE: {err}"));
            fallback.hairstyle
        }
        None => fallback.hairstyle,
    };
    let beard_style = match vars
        .get("DEFAULT_BEARD_STYLE")
        .map(|value| value.parse::<BeardStyle>())
    {
        Some(Ok(beard_style)) => beard_style,
        Some(Err(err)) => {
            warnings.push(format!("Ignoring DEFAULT_BEARD_STYLE: {err}"));
            fallback.beard_style
        }
        None => fallback.beard_style,
    };
    StylingOptions::new(
        hairstyle,
        beard_style,
        var_string(vars, "DEFAULT_COLOR", DEFAULT_COLOR),
    )
}

impl Config {
    pub fn load() -> Result<Self> {
        let vars: Vars = env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &Vars) -> Result<Self> {
        let mut warnings = Vec::new();
        let gemini_api_key = {
            let primary = var_string(vars, "GEMINI_API_KEY", "");
            if primary.is_empty() {
                var_string(vars, "API_KEY", "")
            } else {
                primary
            }
        };

        let store_namespace = var_string(vars, "BARBER_STORE_NAMESPACE", "barber");
        if store_namespace.contains(['/', '\\']) {
            return Err(anyhow::anyhow!(
                "BARBER_STORE_NAMESPACE must not contain path separators"
            ));
        }

        let gemini_safety_settings = normalize_safety_settings(
            &var_string(vars, "GEMINI_SAFETY_SETTINGS", "standard"),
            &mut warnings,
        );
        let gemini_request_timeout_seconds =
            var_u64(vars, "GEMINI_REQUEST_TIMEOUT_SECONDS", 90, &mut warnings).max(1);
        let gemini_aspect_ratio = normalize_aspect_ratio(
            &var_string(vars, "GEMINI_ASPECT_RATIO", "auto"),
            &mut warnings,
        );
        let identity_mode = normalize_identity_mode(
            &var_string(vars, "BARBER_IDENTITY_MODE", "session"),
            &mut warnings,
        );
        let default_options = default_options(vars, &mut warnings);

        Ok(Config {
            log_level: var_string(vars, "LOG_LEVEL", "info").to_lowercase(),
            logs_dir: PathBuf::from(var_string(vars, "LOGS_DIR", "logs")),
            gemini_api_key,
            gemini_api_base: var_string(vars, "GEMINI_API_BASE", DEFAULT_GEMINI_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            gemini_image_model: var_string(vars, "GEMINI_IMAGE_MODEL", DEFAULT_GEMINI_IMAGE_MODEL),
            gemini_safety_settings,
            gemini_request_timeout_seconds,
            gemini_aspect_ratio,
            store_dir: PathBuf::from(var_string(vars, "BARBER_STORE_DIR", "barber_store")),
            store_namespace,
            identity_mode,
            default_options,
            warnings,
        })
    }

    pub fn log_warnings(&self) {
        for warning in &self.warnings {
            warn!("{}", warning);
        }
    }

    pub fn gemini_settings(&self) -> GeminiSettings {
        GeminiSettings {
            api_key: self.gemini_api_key.clone(),
            api_base: self.gemini_api_base.clone(),
            model: self.gemini_image_model.clone(),
            safety: self.gemini_safety_settings,
            request_timeout: Duration::from_secs(self.gemini_request_timeout_seconds),
            aspect_ratio: self.gemini_aspect_ratio.clone(),
        }
    }

    pub fn studio_settings(&self) -> StudioSettings {
        StudioSettings {
            namespace: self.store_namespace.clone(),
            identity_mode: self.identity_mode,
            default_options: self.default_options.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vars {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn uses_defaults_when_environment_is_empty() {
        let config = Config::from_vars(&Vars::new()).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.gemini_api_base, DEFAULT_GEMINI_API_BASE);
        assert_eq!(config.gemini_image_model, DEFAULT_GEMINI_IMAGE_MODEL);
        assert_eq!(config.gemini_safety_settings, SafetyProfile::Standard);
        assert_eq!(config.gemini_aspect_ratio, AspectRatioSetting::Auto);
        assert_eq!(config.gemini_request_timeout_seconds, 90);
        assert_eq!(config.store_namespace, "barber");
        assert_eq!(config.identity_mode, IdentityMode::Session);
        assert_eq!(config.default_options, StylingOptions::default());
        assert!(config.gemini_api_key.is_empty());
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn falls_back_to_api_key_variable() {
        let config = Config::from_vars(&vars(&[("API_KEY", "legacy")])).unwrap();
        assert_eq!(config.gemini_api_key, "legacy");

        let config =
            Config::from_vars(&vars(&[("API_KEY", "legacy"), ("GEMINI_API_KEY", "primary")]))
                .unwrap();
        assert_eq!(config.gemini_api_key, "primary");
    }

    #[test]
    fn normalizes_enumerated_values() {
        let config = Config::from_vars(&vars(&[
            ("GEMINI_SAFETY_SETTINGS", "OFF"),
            ("GEMINI_ASPECT_RATIO", "4:5"),
            ("BARBER_IDENTITY_MODE", "Email"),
            ("GEMINI_API_BASE", "http://localhost:9000/"),
            ("DEFAULT_HAIRSTYLE", "buzz-cut"),
            ("DEFAULT_BEARD_STYLE", "not a beard"),
            ("GEMINI_REQUEST_TIMEOUT_SECONDS", "abc"),
        ]))
        .unwrap();
        assert_eq!(config.gemini_safety_settings, SafetyProfile::Permissive);
        assert_eq!(
            config.gemini_aspect_ratio,
            AspectRatioSetting::Fixed("4:5".to_string())
        );
        assert_eq!(config.identity_mode, IdentityMode::Email);
        assert_eq!(config.gemini_api_base, "http://localhost:9000");
        assert_eq!(config.default_options.hairstyle, Hairstyle::BuzzCut);
        assert_eq!(config.default_options.beard_style, BeardStyle::Stubble);
        assert_eq!(config.gemini_request_timeout_seconds, 90);
    }

    #[test]
    fn records_a_warning_for_misspelled_identity_mode() {
        let config = Config::from_vars(&vars(&[("BARBER_IDENTITY_MODE", "emial")])).unwrap();
        assert_eq!(config.identity_mode, IdentityMode::Session);
        assert_eq!(config.warnings.len(), 1);
        assert!(config.warnings[0].contains("BARBER_IDENTITY_MODE"));
        assert!(config.warnings[0].contains("emial"));
    }

    #[test]
    fn every_fallback_is_recorded() {
        let config = Config::from_vars(&vars(&[
            ("GEMINI_SAFETY_SETTINGS", "paranoid"),
            ("GEMINI_ASPECT_RATIO", "7:3"),
            ("GEMINI_REQUEST_TIMEOUT_SECONDS", "soon"),
            ("DEFAULT_HAIRSTYLE", "mullet"),
        ]))
        .unwrap();
        assert_eq!(config.warnings.len(), 4);
        assert!(config.warnings.iter().any(|w| w.contains("mullet")));
    }

    #[test]
    fn rejects_namespace_with_path_separator() {
        assert!(Config::from_vars(&vars(&[("BARBER_STORE_NAMESPACE", "../x")])).is_err());
    }
}

//! Environment-driven service settings.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// API version reported by `/health`.
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Content types accepted by the prediction endpoint.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Highest `top_k` the prediction endpoint accepts.
pub const MAX_TOP_K: usize = 15;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{key}: '{value}' is not a valid {expected}")]
    Invalid {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("{0} and {1} must be set together")]
    Incomplete(&'static str, &'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub model_path: Option<PathBuf>,
    pub class_names_path: Option<PathBuf>,
    /// Allowed CORS origins; `["*"]` allows any origin
    pub cors_origins: Vec<String>,
    pub max_file_size_mb: usize,
    pub top_k_default: usize,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub rate_limit_per_minute: usize,
    pub rate_limit_window: Duration,
    pub low_confidence_threshold: f32,
    pub image_download_timeout: Duration,
    pub enable_signature_validation: bool,
    /// Public webhook URL Twilio signs against
    pub webhook_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_path: None,
            class_names_path: None,
            cors_origins: vec!["*".to_string()],
            max_file_size_mb: 10,
            top_k_default: 5,
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            rate_limit_per_minute: 10,
            rate_limit_window: Duration::from_secs(60),
            low_confidence_threshold: 0.60,
            image_download_timeout: Duration::from_secs(15),
            enable_signature_validation: true,
            webhook_url: None,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads settings through an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut settings = Self::default();

        if let Some(host) = get("CROPDOC_HOST") {
            settings.host = host;
        }
        if let Some(port) = get("CROPDOC_PORT") {
            settings.port = parse("CROPDOC_PORT", &port, "port number")?;
        }
        settings.model_path = get("CROPDOC_MODEL_PATH").map(PathBuf::from);
        settings.class_names_path = get("CROPDOC_CLASS_NAMES_PATH").map(PathBuf::from);
        if let Some(origins) = get("CORS_ORIGINS") {
            settings.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(size) = get("MAX_FILE_SIZE_MB") {
            settings.max_file_size_mb = parse("MAX_FILE_SIZE_MB", &size, "size in megabytes")?;
        }
        if let Some(top_k) = get("TOP_K_DEFAULT") {
            let value: usize = parse("TOP_K_DEFAULT", &top_k, "integer between 1 and 15")?;
            if !(1..=MAX_TOP_K).contains(&value) {
                return Err(ConfigError::Invalid {
                    key: "TOP_K_DEFAULT".to_string(),
                    value: top_k,
                    expected: "integer between 1 and 15",
                });
            }
            settings.top_k_default = value;
        }
        if let Some(sid) = get("TWILIO_ACCOUNT_SID") {
            settings.twilio_account_sid = sid;
        }
        if let Some(token) = get("TWILIO_AUTH_TOKEN") {
            settings.twilio_auth_token = token;
        }
        if let Some(limit) = get("WHATSAPP_RATE_LIMIT_PER_MINUTE") {
            settings.rate_limit_per_minute = parse("WHATSAPP_RATE_LIMIT_PER_MINUTE", &limit, "integer")?;
        }
        if let Some(window) = get("WHATSAPP_RATE_LIMIT_WINDOW_SECONDS") {
            settings.rate_limit_window =
                Duration::from_secs(parse("WHATSAPP_RATE_LIMIT_WINDOW_SECONDS", &window, "number of seconds")?);
        }
        if let Some(threshold) = get("WHATSAPP_LOW_CONFIDENCE_THRESHOLD") {
            let value: f32 = parse("WHATSAPP_LOW_CONFIDENCE_THRESHOLD", &threshold, "probability")?;
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    key: "WHATSAPP_LOW_CONFIDENCE_THRESHOLD".to_string(),
                    value: threshold,
                    expected: "probability",
                });
            }
            settings.low_confidence_threshold = value;
        }
        if let Some(timeout) = get("WHATSAPP_IMAGE_DOWNLOAD_TIMEOUT") {
            settings.image_download_timeout =
                Duration::from_secs(parse("WHATSAPP_IMAGE_DOWNLOAD_TIMEOUT", &timeout, "number of seconds")?);
        }
        if let Some(flag) = get("WHATSAPP_ENABLE_SIGNATURE_VALIDATION") {
            settings.enable_signature_validation = parse_bool("WHATSAPP_ENABLE_SIGNATURE_VALIDATION", &flag)?;
        }
        settings.webhook_url = get("WHATSAPP_WEBHOOK_URL");

        Ok(settings)
    }

    /// Replaces the model file paths with any that are given.
    pub fn override_model_paths(&mut self, model: Option<PathBuf>, class_names: Option<PathBuf>) {
        if model.is_some() {
            self.model_path = model;
        }
        if class_names.is_some() {
            self.class_names_path = class_names;
        }
    }

    /// The custom model and class-name files, or `None` to use the cached built-in model.
    pub fn model_files(&self) -> Result<Option<(&Path, &Path)>, ConfigError> {
        match (&self.model_path, &self.class_names_path) {
            (Some(model), Some(class_names)) => Ok(Some((model.as_path(), class_names.as_path()))),
            (None, None) => Ok(None),
            _ => Err(ConfigError::Incomplete("CROPDOC_MODEL_PATH", "CROPDOC_CLASS_NAMES_PATH")),
        }
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse<T: FromStr>(key: &str, value: &str, expected: &'static str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            expected: "boolean",
        }),
    }
}

//! Application state shared by every request handler.

use std::sync::Arc;
use std::time::Instant;

use crate::classifier::DiseaseClassifier;
use crate::config::Settings;
use crate::whatsapp::{MediaError, MediaFetcher, RateLimiter, TwilioMediaClient};

use super::error::ApiError;

pub struct AppState {
    pub settings: Settings,
    /// Loaded model; `None` until startup succeeds
    pub predictor: Option<Arc<dyn DiseaseClassifier>>,
    /// Per-sender limiter for the WhatsApp webhook
    pub rate_limiter: RateLimiter,
    pub media_fetcher: Arc<dyn MediaFetcher>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        predictor: Option<Arc<dyn DiseaseClassifier>>,
        rate_limiter: RateLimiter,
        media_fetcher: Arc<dyn MediaFetcher>,
    ) -> Self {
        Self {
            settings,
            predictor,
            rate_limiter,
            media_fetcher,
            started_at: Instant::now(),
        }
    }

    /// Wires the production rate limiter and Twilio media client from settings.
    pub fn from_settings(
        settings: Settings,
        predictor: Option<Arc<dyn DiseaseClassifier>>,
    ) -> Result<Self, MediaError> {
        let rate_limiter = RateLimiter::new(settings.rate_limit_per_minute, settings.rate_limit_window);
        let media_fetcher = TwilioMediaClient::new(
            settings.twilio_account_sid.clone(),
            settings.twilio_auth_token.clone(),
            settings.image_download_timeout,
            settings.max_file_size_bytes(),
        )?;
        Ok(Self::new(settings, predictor, rate_limiter, Arc::new(media_fetcher)))
    }

    /// The loaded predictor, or `MODEL_NOT_LOADED`.
    pub fn predictor(&self) -> Result<Arc<dyn DiseaseClassifier>, ApiError> {
        self.predictor.clone().ok_or_else(|| {
            log::error!("Prediction requested but model is not loaded");
            ApiError::ModelNotLoaded
        })
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;

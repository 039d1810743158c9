//! Prediction endpoint - upload a leaf image to get a disease diagnosis

use std::collections::HashMap;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, Query, State},
    http::StatusCode,
    Json,
};
use image::DynamicImage;
use log::info;
use serde::Serialize;

use crate::api::{ApiError, SharedState};
use crate::classifier::{ClassScore, ClassifierError};
use crate::config::{ALLOWED_CONTENT_TYPES, MAX_TOP_K};
use crate::diseases;

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub success: bool,
    pub prediction: String,
    pub confidence: f32,
    pub crop: String,
    pub severity: String,
    pub treatment: String,
    pub top_k: Vec<ClassScore>,
}

/// POST /predict - classify an uploaded JPEG or PNG leaf image
pub async fn predict_disease(
    State(state): State<SharedState>,
    Query(query): Query<HashMap<String, String>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let top_k = parse_top_k(query.get("top_k").map(String::as_str), state.settings.top_k_default)?;
    let predictor = state.predictor()?;

    let multipart = multipart.map_err(|e| ApiError::Validation(e.body_text()))?;
    let max_bytes = state.settings.max_file_size_bytes();
    let (content_type, contents) = read_upload(multipart, max_bytes).await?;

    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(ApiError::UnsupportedFileType(content_type));
    }
    if contents.len() > max_bytes {
        return Err(ApiError::file_too_large(contents.len(), max_bytes));
    }

    let image = decode_image(&contents)?;

    let start = Instant::now();
    let result = tokio::task::spawn_blocking(move || predictor.predict(&image, top_k))
        .await
        .map_err(|e| ApiError::Internal(format!("Inference task failed: {}", e)))?;
    let prediction = result.map_err(|e| match e {
        ClassifierError::ImageError(msg) => ApiError::InvalidImage(msg),
        other => ApiError::Internal(other.to_string()),
    })?;
    let inference_ms = start.elapsed().as_secs_f64() * 1000.0;

    info!(
        "Prediction: {} ({:.1}%) in {:.0} ms",
        prediction.top_class,
        prediction.confidence * 100.0,
        inference_ms
    );

    let details = diseases::get(&prediction.top_class);
    Ok(Json(PredictionResponse {
        success: true,
        crop: diseases::crop_of(&prediction.top_class),
        severity: details
            .map(|d| d.severity.to_string())
            .unwrap_or_else(|| "Unknown".to_string()),
        treatment: prediction.recommendation,
        confidence: prediction.confidence,
        prediction: prediction.top_class,
        top_k: prediction.top_k,
    }))
}

/// Validates `top_k`, which must be an integer in `1..=15`.
fn parse_top_k(raw: Option<&str>, default: usize) -> Result<usize, ApiError> {
    let value = match raw {
        None => default,
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| ApiError::Validation(format!("top_k must be an integer, got '{}'", raw)))?,
    };
    if !(1..=MAX_TOP_K).contains(&value) {
        return Err(ApiError::Validation(format!(
            "top_k must be between 1 and {}, got {}",
            MAX_TOP_K, value
        )));
    }
    Ok(value)
}

/// Pulls the `file` field out of the multipart body.
async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> Result<(String, Bytes), ApiError> {
    let body_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::file_too_large(max_bytes + 1024 * 1024, max_bytes)
        } else {
            ApiError::Validation(format!("Malformed multipart body: {}", e))
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(body_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or("unknown").to_string();
        let contents = field.bytes().await.map_err(body_error)?;
        return Ok((content_type, contents));
    }

    Err(ApiError::Validation("Missing required multipart field 'file'".to_string()))
}

fn decode_image(contents: &[u8]) -> Result<DynamicImage, ApiError> {
    let image = image::load_from_memory(contents).map_err(|e| ApiError::InvalidImage(e.to_string()))?;
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

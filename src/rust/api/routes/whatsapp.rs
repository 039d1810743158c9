//! WhatsApp webhook - receives messages via Twilio, answers with TwiML

use std::collections::HashMap;
use std::time::Instant;

use axum::{
    extract::{rejection::FormRejection, OriginalUri, State},
    http::{header, HeaderMap, Uri},
    response::Response,
    Form,
};
use log::{error, info, warn};

use crate::api::{ApiError, SharedState};
use crate::config::Settings;
use crate::diseases;
use crate::whatsapp::{
    classify_message, format_prediction_response, mask_phone, signature, templates, twiml,
    MessageKind, TwilioWebhook,
};

/// Predictions sent back over WhatsApp carry this many alternatives.
const WHATSAPP_TOP_K: usize = 3;

/// POST /whatsapp/webhook
///
/// Every outcome except a rejected signature is a 200 TwiML reply.
pub async fn whatsapp_webhook(
    State(state): State<SharedState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Result<Response, ApiError> {
    let params = match form {
        Ok(Form(params)) => params,
        Err(e) => {
            warn!("Unreadable webhook body: {}", e);
            Vec::new()
        }
    };

    if state.settings.enable_signature_validation {
        verify_signature(&state.settings, &headers, &uri, &params)?;
    }

    let params: HashMap<String, String> = params.into_iter().collect();
    let webhook = match TwilioWebhook::from_params(&params) {
        Ok(webhook) => webhook,
        Err(field) => {
            error!("WhatsApp webhook missing field {}", field);
            return Ok(twiml::response(templates::ERROR_GENERIC));
        }
    };

    Ok(twiml::response(&respond(&state, &webhook).await))
}

/// Produces the reply text for a parsed message.
async fn respond(state: &SharedState, webhook: &TwilioWebhook) -> String {
    let phone = mask_phone(&webhook.from);

    if !state.rate_limiter.is_allowed(&webhook.from) {
        warn!("Rate limited: {}", phone);
        return templates::ERROR_RATE_LIMITED.to_string();
    }

    let reply = match classify_message(webhook) {
        MessageKind::Greeting => templates::GREETING,
        MessageKind::Help => templates::HELP,
        MessageKind::Crops => templates::SUPPORTED_CROPS,
        MessageKind::NonImageMedia => templates::ERROR_NON_IMAGE,
        MessageKind::Unknown => templates::PROMPT_SEND_PHOTO,
        MessageKind::Image => return diagnose(state, webhook, &phone).await,
    };
    reply.to_string()
}

async fn diagnose(state: &SharedState, webhook: &TwilioWebhook, phone: &str) -> String {
    let predictor = match state.predictor() {
        Ok(predictor) => predictor,
        Err(_) => return templates::ERROR_GENERIC.to_string(),
    };

    let Some(media_url) = webhook.media_url_0.as_deref() else {
        error!("Image message without MediaUrl0 from {}", phone);
        return templates::ERROR_DOWNLOAD.to_string();
    };

    let image = match state.media_fetcher.fetch_image(media_url).await {
        Ok(image) => image,
        Err(e) => {
            error!("Image download failed for {}: {}", phone, e);
            return templates::ERROR_DOWNLOAD.to_string();
        }
    };

    let start = Instant::now();
    let result = tokio::task::spawn_blocking(move || predictor.predict(&image, WHATSAPP_TOP_K)).await;
    let prediction = match result {
        Ok(Ok(prediction)) => prediction,
        Ok(Err(e)) => {
            error!("Inference failed for {}: {}", phone, e);
            return templates::ERROR_INVALID_IMAGE.to_string();
        }
        Err(e) => {
            error!("Inference task failed for {}: {}", phone, e);
            return templates::ERROR_GENERIC.to_string();
        }
    };
    let inference_ms = start.elapsed().as_secs_f64() * 1000.0;

    info!(
        "WhatsApp prediction: {} ({:.1}%) in {:.0} ms for {}",
        prediction.top_class,
        prediction.confidence * 100.0,
        inference_ms,
        phone
    );

    format_prediction_response(
        &prediction,
        diseases::get(&prediction.top_class),
        state.settings.low_confidence_threshold,
    )
}

fn verify_signature(
    settings: &Settings,
    headers: &HeaderMap,
    uri: &Uri,
    params: &[(String, String)],
) -> Result<(), ApiError> {
    if settings.twilio_auth_token.is_empty() {
        error!("Signature validation is enabled but TWILIO_AUTH_TOKEN is not set");
        return Err(ApiError::InvalidSignature);
    }

    let provided = headers
        .get(signature::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::InvalidSignature)?;

    let url = signed_url(settings, headers, uri);
    if signature::validate_signature(&settings.twilio_auth_token, &url, params, provided) {
        Ok(())
    } else {
        warn!("Rejected webhook with invalid signature for {}", url);
        Err(ApiError::InvalidSignature)
    }
}

/// The URL Twilio signed: the configured public URL, or one rebuilt from the
/// `Host` header and the request path.
fn signed_url(settings: &Settings, headers: &HeaderMap, uri: &Uri) -> String {
    if let Some(url) = &settings.webhook_url {
        return url.clone();
    }

    let header_value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let scheme = header_value("x-forwarded-proto").unwrap_or("https");
    let host = header_value(header::HOST.as_str()).unwrap_or("localhost");
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    format!("{}://{}{}", scheme, host, path)
}

//! Authenticated download of WhatsApp media attachments.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageDecoder, ImageReader};
use log::debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Media server returned status {0}")]
    Status(u16),

    #[error("Unexpected content type: {0}")]
    ContentType(String),

    #[error("Image too large ({0:.1} MB)")]
    TooLarge(f64),

    #[error("Invalid image: {0}")]
    Decode(String),
}

/// Retrieves an attachment and decodes it into an upright RGB image.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<DynamicImage, MediaError>;
}

/// Fetches media from Twilio using the account SID and auth token as Basic credentials.
#[derive(Debug, Clone)]
pub struct TwilioMediaClient {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    max_bytes: usize,
}

impl TwilioMediaClient {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        timeout: Duration,
        max_bytes: usize,
    ) -> Result<Self, MediaError> {
        // reqwest follows up to 10 redirects by default; Twilio media URLs redirect to storage
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            max_bytes,
        })
    }
}

#[async_trait]
impl MediaFetcher for TwilioMediaClient {
    async fn fetch_image(&self, url: &str) -> Result<DynamicImage, MediaError> {
        let mut response = self
            .client
            .get(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !content_type.starts_with("image/") {
            return Err(MediaError::ContentType(content_type));
        }

        if let Some(len) = response.content_length() {
            check_size(usize::try_from(len).unwrap_or(usize::MAX), self.max_bytes)?;
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            bytes.extend_from_slice(&chunk);
            check_size(bytes.len(), self.max_bytes)?;
        }
        debug!("Downloaded {} bytes of {}", bytes.len(), content_type);

        decode_upright(&bytes)
    }
}

fn check_size(len: usize, max_bytes: usize) -> Result<(), MediaError> {
    if len > max_bytes {
        return Err(MediaError::TooLarge(len as f64 / (1024.0 * 1024.0)));
    }
    Ok(())
}

/// Decodes an image, applies its EXIF orientation and converts it to RGB.
pub fn decode_upright(bytes: &[u8]) -> Result<DynamicImage, MediaError> {
    let decode_err = |e: image::ImageError| MediaError::Decode(e.to_string());

    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| MediaError::Decode(e.to_string()))?
        .into_decoder()
        .map_err(decode_err)?;
    let orientation = decoder.orientation().map_err(decode_err)?;

    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
    image.apply_orientation(orientation);
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

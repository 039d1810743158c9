use std::collections::HashMap;

use serde::Serialize;

const GREETING_KEYWORDS: &[&str] = &["hi", "hello", "hey", "start"];
const HELP_KEYWORDS: &[&str] = &["help", "?", "menu"];
const CROPS_KEYWORDS: &[&str] = &["crops", "diseases", "list"];

/// Fields of a Twilio WhatsApp webhook POST that the bot uses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwilioWebhook {
    pub message_sid: String,
    pub account_sid: String,
    pub from: String,
    pub to: String,
    pub body: String,
    pub num_media: u32,
    pub media_url_0: Option<String>,
    pub media_content_type_0: Option<String>,
    pub profile_name: Option<String>,
}

impl TwilioWebhook {
    /// Builds a webhook from decoded form parameters.
    ///
    /// Returns the name of the first missing required field on failure.
    /// A non-numeric `NumMedia` is treated as a missing field.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let required = |key: &str| {
            params
                .get(key)
                .cloned()
                .ok_or_else(|| key.to_string())
        };
        let optional = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();

        let num_media = match params.get("NumMedia").map(|v| v.trim()) {
            None | Some("") => 0,
            Some(raw) => raw.parse().map_err(|_| "NumMedia".to_string())?,
        };

        Ok(Self {
            message_sid: required("MessageSid")?,
            account_sid: required("AccountSid")?,
            from: required("From")?,
            to: params.get("To").cloned().unwrap_or_default(),
            body: params.get("Body").cloned().unwrap_or_default(),
            num_media,
            media_url_0: optional("MediaUrl0"),
            media_content_type_0: optional("MediaContentType0"),
            profile_name: optional("ProfileName"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Greeting,
    Help,
    Crops,
    Image,
    NonImageMedia,
    Unknown,
}

/// Decides how to answer an incoming message.
///
/// Media wins over text: any attachment is either an image to diagnose or
/// something the bot cannot handle.
pub fn classify_message(webhook: &TwilioWebhook) -> MessageKind {
    if webhook.num_media > 0 {
        let content_type = webhook
            .media_content_type_0
            .as_deref()
            .unwrap_or("")
            .to_ascii_lowercase();
        return if content_type.starts_with("image/") {
            MessageKind::Image
        } else {
            MessageKind::NonImageMedia
        };
    }

    let text = webhook.body.trim().to_lowercase();
    let text = text.as_str();
    if GREETING_KEYWORDS.contains(&text) {
        MessageKind::Greeting
    } else if HELP_KEYWORDS.contains(&text) {
        MessageKind::Help
    } else if CROPS_KEYWORDS.contains(&text) {
        MessageKind::Crops
    } else {
        MessageKind::Unknown
    }
}

/// Phone number reduced to its last four characters for logging.
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("...{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webhook(body: &str) -> TwilioWebhook {
        TwilioWebhook {
            message_sid: "SM1".into(),
            account_sid: "AC1".into(),
            from: "whatsapp:+15551234567".into(),
            to: String::new(),
            body: body.into(),
            num_media: 0,
            media_url_0: None,
            media_content_type_0: None,
            profile_name: None,
        }
    }

    fn with_media(content_type: &str) -> TwilioWebhook {
        TwilioWebhook {
            num_media: 1,
            media_url_0: Some("https://api.twilio.com/media/ME1".into()),
            media_content_type_0: Some(content_type.into()),
            ..webhook("")
        }
    }

    #[test]
    fn test_keywords() {
        assert_eq!(classify_message(&webhook("hi")), MessageKind::Greeting);
        assert_eq!(classify_message(&webhook("  HELLO ")), MessageKind::Greeting);
        assert_eq!(classify_message(&webhook("Start")), MessageKind::Greeting);
        assert_eq!(classify_message(&webhook("?")), MessageKind::Help);
        assert_eq!(classify_message(&webhook("MENU")), MessageKind::Help);
        assert_eq!(classify_message(&webhook("diseases")), MessageKind::Crops);
        assert_eq!(classify_message(&webhook("List")), MessageKind::Crops);
        assert_eq!(classify_message(&webhook("what is this")), MessageKind::Unknown);
        assert_eq!(classify_message(&webhook("")), MessageKind::Unknown);
    }

    #[test]
    fn test_media() {
        assert_eq!(classify_message(&with_media("image/jpeg")), MessageKind::Image);
        assert_eq!(classify_message(&with_media("IMAGE/PNG")), MessageKind::Image);
        assert_eq!(classify_message(&with_media("audio/ogg")), MessageKind::NonImageMedia);

        let mut text_with_media = with_media("video/mp4");
        text_with_media.body = "help".into();
        assert_eq!(classify_message(&text_with_media), MessageKind::NonImageMedia);
    }

    #[test]
    fn test_from_params() {
        let mut params = HashMap::new();
        params.insert("MessageSid".to_string(), "SM1".to_string());
        params.insert("AccountSid".to_string(), "AC1".to_string());
        assert_eq!(TwilioWebhook::from_params(&params).unwrap_err(), "From");

        params.insert("From".to_string(), "whatsapp:+15551234567".to_string());
        params.insert("NumMedia".to_string(), "1".to_string());
        params.insert("MediaContentType0".to_string(), "image/jpeg".to_string());
        let parsed = TwilioWebhook::from_params(&params).unwrap();
        assert_eq!(parsed.num_media, 1);
        assert_eq!(parsed.body, "");
        assert_eq!(parsed.media_content_type_0.as_deref(), Some("image/jpeg"));
        assert_eq!(parsed.media_url_0, None);

        params.insert("NumMedia".to_string(), "many".to_string());
        assert_eq!(TwilioWebhook::from_params(&params).unwrap_err(), "NumMedia");
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("whatsapp:+15551234567"), "...4567");
        assert_eq!(mask_phone("12"), "...12");
    }
}

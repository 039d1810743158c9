//! WhatsApp chatbot building blocks: message parsing, rate limiting, media
//! download, reply templates, TwiML and Twilio request signing.
//!
//! The webhook route in `api::routes::whatsapp` wires these together.

pub mod media;
pub mod message;
pub mod rate_limiter;
pub mod signature;
pub mod templates;
pub mod twiml;

pub use media::{MediaError, MediaFetcher, TwilioMediaClient};
pub use message::{classify_message, mask_phone, MessageKind, TwilioWebhook};
pub use rate_limiter::{Clock, MockClock, RateLimiter, SystemClock};
pub use signature::{compute_signature, validate_signature, SIGNATURE_HEADER};
pub use templates::format_prediction_response;

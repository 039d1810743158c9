//! Reply texts sent back over WhatsApp.
//!
//! Every message stays under WhatsApp's 1600 character limit.

use crate::classifier::Prediction;
use crate::diseases::DiseaseDetails;

/// Longest message body WhatsApp delivers in one piece.
pub const MAX_MESSAGE_CHARS: usize = 1600;

pub const GREETING: &str = "\u{1f44b} *Welcome to CropDoc!*\n\
\n\
I can help identify diseases in your Corn, Potato, and Tomato crops.\n\
\n\
\u{1f4f8} *Send me a photo* of a diseased leaf, and I will diagnose it with treatment recommendations.\n\
\n\
Type *help* for more options.";

pub const HELP: &str = "\u{1f33e} *CropDoc \u{2014} Help*\n\
\n\
\u{1f4f8} *Send a leaf photo* \u{2014} Get disease diagnosis\n\
\u{1f4cb} *crops* \u{2014} See supported crops\n\
\u{2753} *help* \u{2014} Show this message\n\
\n\
*Supported crops:* Corn, Potato, Tomato\n\
*Supported diseases:* 15 classes\n\
\n\
\u{1f4a1} For best results, send a clear, close-up photo of a single leaf in good lighting.";

pub const SUPPORTED_CROPS: &str = "\u{1f33d} *Supported Crops & Diseases*\n\
\n\
*Corn (4):* Common Rust, Gray Leaf Spot, Healthy, Northern Leaf Blight\n\
*Potato (3):* Early Blight, Healthy, Late Blight\n\
*Tomato (8):* Bacterial Spot, Early Blight, Healthy, Late Blight, Leaf Mold, Septoria Leaf Spot, Target Spot, Yellow Leaf Curl\n\
\n\
\u{1f4f8} Send a leaf photo to get started!";

pub const ERROR_NON_IMAGE: &str = "\u{1f914} I can only analyze leaf images.\n\
\n\
Please send a *photo* (JPEG or PNG) of a Corn, Potato, or Tomato leaf.\n\
\n\
Type *help* for more info.";

pub const ERROR_DOWNLOAD: &str =
    "\u{26a0}\u{fe0f} Could not download your image. Please try sending it again.";

pub const ERROR_INVALID_IMAGE: &str =
    "\u{26a0}\u{fe0f} Could not process your image. Please send a clear JPEG or PNG photo of a leaf.";

pub const ERROR_RATE_LIMITED: &str = "\u{23f3} You are sending requests too quickly.\n\
\n\
Please wait a moment before sending another photo. This helps us keep the service available for all farmers.";

pub const ERROR_GENERIC: &str = "\u{26a0}\u{fe0f} Something went wrong while analyzing your image.\n\
\n\
Please try again. If the problem continues, try sending a different photo.";

pub const PROMPT_SEND_PHOTO: &str =
    "\u{1f4f8} Send me a photo of a Corn, Potato, or Tomato leaf to get a disease diagnosis.\n\
\n\
Type *help* for more options.";

const HEADER: &str = "\u{1f33f} *Crop Disease Analysis*";

/// Turns a prediction into a farmer-facing diagnosis.
///
/// `details` is `None` for classes missing from the disease library; those
/// are reported as diseased with unknown severity.
pub fn format_prediction_response(
    prediction: &Prediction,
    details: Option<&DiseaseDetails>,
    low_confidence_threshold: f32,
) -> String {
    let disease = &prediction.top_class;
    let confidence = format!("{:.1}%", prediction.confidence * 100.0);

    if prediction.confidence < low_confidence_threshold {
        return format!(
            "{HEADER}\n\
             \n\
             \u{26a0}\u{fe0f} *Low Confidence Result*\n\
             Our best guess is *{disease}* ({confidence}), but we are not certain.\n\
             \n\
             \u{1f4a1} *Tips for a better photo:*\n\
             \u{2022} Use good lighting (natural daylight is best)\n\
             \u{2022} Focus on a single leaf showing symptoms\n\
             \u{2022} Avoid blurry or distant shots\n\
             \n\
             Please try again or consult a local agronomist."
        );
    }

    if details.map_or(false, DiseaseDetails::is_healthy) {
        return format!(
            "{HEADER}\n\
             \n\
             \u{2705} *Result:* {disease}\n\
             \u{1f4ca} *Confidence:* {confidence}\n\
             \n\
             Your plant looks healthy! Continue regular monitoring and good agricultural practices.\n\
             \n\
             \u{1f4f8} Send another leaf photo anytime."
        );
    }

    let severity = details
        .map(|d| d.severity.to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let treatment = details
        .map(|d| d.treatment.as_str())
        .unwrap_or(prediction.recommendation.as_str());

    let mut lines = vec![
        HEADER.to_string(),
        String::new(),
        format!("\u{1f52c} *Disease:* {}", disease),
        format!("\u{1f4ca} *Confidence:* {}", confidence),
        format!("\u{26a0}\u{fe0f} *Severity:* {}", severity),
        String::new(),
        format!("\u{1f48a} *Treatment:*\n{}", treatment),
    ];

    if let Some(prevention) = details.map(|d| &d.prevention).filter(|p| !p.is_empty()) {
        lines.push(String::new());
        lines.push("\u{1f6e1}\u{fe0f} *Prevention:*".to_string());
        lines.extend(prevention.iter().map(|tip| format!("\u{2022} {}", tip)));
    }

    lines.push(String::new());
    lines.push("\u{1f4f8} Send another leaf photo for a new diagnosis.".to_string());

    truncate_message(lines.join("\n"))
}

/// Cuts a message to the WhatsApp limit on a character boundary.
fn truncate_message(message: String) -> String {
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        return message;
    }
    let mut cut: String = message.chars().take(MAX_MESSAGE_CHARS - 1).collect();
    cut.push('\u{2026}');
    cut
}

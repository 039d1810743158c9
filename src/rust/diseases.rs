//! Reference data for the 15 supported crop disease classes.
//!
//! Class names use the display form produced by the exported model's
//! `class_names.json` (e.g. `"Tomato: Early Blight"`).

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Treatment text for classes the library does not know about.
pub const FALLBACK_RECOMMENDATION: &str = "Consult a local agronomist for specific treatment.";

/// How urgently a detected condition needs attention. `None` marks a healthy plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    None,
    Low,
    Moderate,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "None",
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseDetails {
    pub crop: String,
    pub severity: Severity,
    pub symptoms: Vec<String>,
    pub treatment: String,
    pub prevention: Vec<String>,
}

impl DiseaseDetails {
    pub fn is_healthy(&self) -> bool {
        self.severity == Severity::None
    }
}

/// A library entry paired with its class name, as served by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseEntry {
    pub name: String,
    #[serde(flatten)]
    pub details: DiseaseDetails,
}

fn details(
    crop: &str,
    severity: Severity,
    symptoms: &[&str],
    treatment: &str,
    prevention: &[&str],
) -> DiseaseDetails {
    DiseaseDetails {
        crop: crop.to_string(),
        severity,
        symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
        treatment: treatment.to_string(),
        prevention: prevention.iter().map(|s| s.to_string()).collect(),
    }
}

fn healthy(crop: &str) -> DiseaseDetails {
    details(
        crop,
        Severity::None,
        &[
            "Uniform green leaf colour",
            "No lesions, spots or discolouration",
            "Normal leaf shape and growth",
        ],
        "No disease detected. Continue regular monitoring.",
        &[
            "Keep scouting fields weekly",
            "Maintain balanced fertilisation and irrigation",
            "Rotate crops between seasons",
        ],
    )
}

fn build_library() -> Vec<(String, DiseaseDetails)> {
    use Severity::{High, Moderate};

    vec![
        ("Corn: Common Rust", details(
            "Corn", Moderate,
            &[
                "Small cinnamon-brown pustules on both leaf surfaces",
                "Pustules rupture and release powdery rust-coloured spores",
                "Heavily infected leaves yellow and die early",
            ],
            "Apply fungicide (e.g., azoxystrobin). Remove severely affected leaves.",
            &[
                "Plant rust-resistant hybrids",
                "Plant early to avoid peak spore periods",
                "Scout regularly during cool, humid weather",
            ],
        )),
        ("Corn: Gray Leaf Spot", details(
            "Corn", Moderate,
            &[
                "Rectangular grey to tan lesions bounded by leaf veins",
                "Lesions merge and blight whole leaves",
                "Symptoms start on lower leaves and move upward",
            ],
            "Use resistant hybrids. Apply foliar fungicides if severity is high.",
            &[
                "Rotate away from corn for at least one season",
                "Till under infected residue",
                "Choose hybrids with gray leaf spot resistance",
            ],
        )),
        ("Corn: Healthy", healthy("Corn")),
        ("Corn: Northern Leaf Blight", details(
            "Corn", High,
            &[
                "Long cigar-shaped grey-green lesions",
                "Lesions turn tan and may span several centimetres",
                "Severe infection blights leaves before grain fill",
            ],
            "Apply fungicide at early stages. Rotate crops to reduce inoculum.",
            &[
                "Plant resistant hybrids",
                "Rotate crops to reduce residue-borne inoculum",
                "Manage crop residue after harvest",
            ],
        )),
        ("Potato: Early Blight", details(
            "Potato", Moderate,
            &[
                "Dark brown spots with concentric rings on older leaves",
                "Yellowing of leaf tissue around the spots",
                "Premature leaf drop under heavy infection",
            ],
            "Apply chlorothalonil or mancozeb fungicide. Ensure proper spacing.",
            &[
                "Use certified disease-free seed tubers",
                "Avoid overhead irrigation late in the day",
                "Rotate with non-solanaceous crops",
            ],
        )),
        ("Potato: Healthy", healthy("Potato")),
        ("Potato: Late Blight", details(
            "Potato", High,
            &[
                "Water-soaked pale green lesions that turn dark brown",
                "White fungal growth on leaf undersides in humid conditions",
                "Rapid collapse of foliage and tuber rot",
            ],
            "URGENT: Apply metalaxyl-based fungicide immediately. Remove infected plants.",
            &[
                "Destroy volunteer plants and cull piles",
                "Apply protective fungicides before wet periods",
                "Plant resistant varieties where available",
            ],
        )),
        ("Tomato: Bacterial Spot", details(
            "Tomato", Moderate,
            &[
                "Small dark water-soaked spots on leaves",
                "Spots develop yellow halos and drop out",
                "Raised scabby spots on fruit",
            ],
            "Apply copper-based bactericide. Avoid overhead irrigation.",
            &[
                "Use pathogen-free seed and transplants",
                "Avoid working in wet plants",
                "Rotate away from tomato and pepper for two years",
            ],
        )),
        ("Tomato: Early Blight", details(
            "Tomato", Moderate,
            &[
                "Concentric ring (target-like) dark brown spots on lower leaves",
                "Leaves yellow around lesions and drop prematurely",
                "Fruit may develop dark, leathery spots near the stem end",
            ],
            "Apply chlorothalonil fungicide. Mulch around base to prevent spore splash.",
            &[
                "Stake plants for better air circulation",
                "Apply mulch to prevent soil splash onto leaves",
                "Remove infected lower leaves promptly",
            ],
        )),
        ("Tomato: Healthy", healthy("Tomato")),
        ("Tomato: Late Blight", details(
            "Tomato", High,
            &[
                "Large greasy grey-green blotches on leaves",
                "White mould on leaf undersides in wet weather",
                "Firm brown rot on green fruit",
            ],
            "URGENT: Apply fungicide immediately. Remove and destroy infected tissue.",
            &[
                "Keep foliage dry with drip irrigation",
                "Remove nearby potato volunteers",
                "Apply preventive fungicide during cool wet spells",
            ],
        )),
        ("Tomato: Leaf Mold", details(
            "Tomato", Moderate,
            &[
                "Pale green to yellow spots on upper leaf surface",
                "Olive-green velvety mould on leaf undersides",
                "Leaves curl, wither and drop",
            ],
            "Improve ventilation. Apply fungicide if greenhouse-grown.",
            &[
                "Keep greenhouse humidity below 85%",
                "Space plants for air movement",
                "Grow resistant cultivars",
            ],
        )),
        ("Tomato: Septoria Leaf Spot", details(
            "Tomato", Moderate,
            &[
                "Many small circular spots with dark borders and grey centres",
                "Tiny black specks inside the spots",
                "Lower leaves yellow and fall first",
            ],
            "Remove infected lower leaves. Apply fungicide preventively.",
            &[
                "Remove and destroy crop debris after harvest",
                "Water at the base of plants",
                "Rotate crops for at least one year",
            ],
        )),
        ("Tomato: Target Spot", details(
            "Tomato", Moderate,
            &[
                "Brown lesions with light centres and concentric rings",
                "Lesions enlarge and merge into blighted areas",
                "Sunken spots on fruit",
            ],
            "Apply chlorothalonil. Maintain good air circulation.",
            &[
                "Prune lower leaves to improve airflow",
                "Avoid excess nitrogen fertilisation",
                "Remove infected plant debris",
            ],
        )),
        ("Tomato: Yellow Leaf Curl", details(
            "Tomato", High,
            &[
                "Upward curling and yellowing of leaf margins",
                "Stunted plant growth with small leaves",
                "Flower drop and poor fruit set",
            ],
            "Control whitefly vectors. Remove infected plants to prevent spread.",
            &[
                "Use insect-proof netting on nurseries",
                "Plant resistant varieties",
                "Control weeds that host whiteflies",
            ],
        )),
    ]
    .into_iter()
    .map(|(name, details)| (name.to_string(), details))
    .collect()
}

lazy_static! {
    static ref LIBRARY: Vec<(String, DiseaseDetails)> = build_library();
    static ref INDEX: HashMap<&'static str, usize> = LIBRARY
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (name.as_str(), i))
        .collect();
    static ref FOLDER_NAMES: HashMap<&'static str, &'static str> = [
        ("Tomato___Bacterial_spot", "Tomato: Bacterial Spot"),
        ("Tomato___Early_blight", "Tomato: Early Blight"),
        ("Tomato___Late_blight", "Tomato: Late Blight"),
        ("Tomato___Leaf_Mold", "Tomato: Leaf Mold"),
        ("Tomato___Septoria_leaf_spot", "Tomato: Septoria Leaf Spot"),
        ("Tomato___Target_Spot", "Tomato: Target Spot"),
        ("Tomato___Tomato_Yellow_Leaf_Curl_Virus", "Tomato: Yellow Leaf Curl"),
        ("Tomato___healthy", "Tomato: Healthy"),
        ("Potato___Early_blight", "Potato: Early Blight"),
        ("Potato___Late_blight", "Potato: Late Blight"),
        ("Potato___healthy", "Potato: Healthy"),
        ("Corn_(maize)___Cercospora_leaf_spot Gray_leaf_spot", "Corn: Gray Leaf Spot"),
        ("Corn_(maize)___Common_rust_", "Corn: Common Rust"),
        ("Corn_(maize)___Northern_Leaf_Blight", "Corn: Northern Leaf Blight"),
        ("Corn_(maize)___healthy", "Corn: Healthy"),
    ]
    .into_iter()
    .collect();
}

/// Looks up a class by its exact display name.
pub fn get(name: &str) -> Option<&'static DiseaseDetails> {
    INDEX.get(name).map(|&i| &LIBRARY[i].1)
}

/// All entries in library order (alphabetical by class name).
pub fn all() -> Vec<DiseaseEntry> {
    LIBRARY
        .iter()
        .map(|(name, details)| DiseaseEntry {
            name: name.clone(),
            details: details.clone(),
        })
        .collect()
}

/// Entries for a single crop, matched case-insensitively.
pub fn by_crop(crop: &str) -> Vec<DiseaseEntry> {
    all()
        .into_iter()
        .filter(|entry| entry.details.crop.eq_ignore_ascii_case(crop))
        .collect()
}

pub fn len() -> usize {
    LIBRARY.len()
}

/// Treatment text for a class, falling back to generic advice.
pub fn recommendation(name: &str) -> &'static str {
    get(name)
        .map(|d| d.treatment.as_str())
        .unwrap_or(FALLBACK_RECOMMENDATION)
}

/// Crop of a class. Unknown classes use the text before the first `:`.
pub fn crop_of(name: &str) -> String {
    match get(name) {
        Some(details) => details.crop.clone(),
        None => name.split(':').next().unwrap_or(name).trim().to_string(),
    }
}

/// Maps a raw PlantVillage folder name to its display name.
///
/// Names that are already display names pass through unchanged.
pub fn display_name(folder: &str) -> Option<&'static str> {
    if let Some(name) = FOLDER_NAMES.get(folder) {
        return Some(*name);
    }
    INDEX.get_key_value(folder).map(|(name, _)| *name)
}

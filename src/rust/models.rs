use std::env;

/// Represents the available built-in models in the library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinModel {
    /// MobileNetV2 backbone fine-tuned on 15 PlantVillage classes
    ///
    /// Characteristics:
    /// - Input: 224x224 RGB, ImageNet normalisation
    /// - Classes: 15 (Corn, Potato, Tomato)
    /// - Size: ~9MB
    MobileNetV2,
}

/// Characteristics of a model including its capabilities and requirements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCharacteristics {
    /// Side length of the square input image
    pub input_size: u32,
    /// Number of output classes
    pub num_classes: usize,
    /// Approximate size of the model on disk
    pub model_size_mb: usize,
}

/// Where a model's artifacts are published and how to verify them
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub model_url: String,
    pub class_names_url: String,
    pub model_hash: String,
    pub class_names_hash: String,
}

pub const MODEL_FILE_NAME: &str = "crop_disease_classifier.onnx";
pub const CLASS_NAMES_FILE_NAME: &str = "class_names.json";

impl BuiltinModel {
    /// Get the characteristics of the model
    pub fn characteristics(&self) -> ModelCharacteristics {
        match self {
            Self::MobileNetV2 => ModelCharacteristics {
                input_size: 224,
                num_classes: 15,
                model_size_mb: 9,
            },
        }
    }

    /// Directory name of the model inside the cache
    pub fn name(&self) -> &'static str {
        match self {
            Self::MobileNetV2 => "mobilenet-v2-crop",
        }
    }

    /// Reads the publication URLs and SHA-256 digests of the exported artifacts.
    ///
    /// Each deployment publishes its own export, so the locations come from
    /// `CROPDOC_MODEL_URL`, `CROPDOC_MODEL_SHA256`, `CROPDOC_CLASS_NAMES_URL`
    /// and `CROPDOC_CLASS_NAMES_SHA256`. Returns the name of the first missing
    /// variable on failure.
    pub fn get_model_info(&self) -> Result<ModelInfo, String> {
        let var = |key: &str| env::var(key).map_err(|_| key.to_string());
        Ok(ModelInfo {
            name: self.name().to_string(),
            model_url: var("CROPDOC_MODEL_URL")?,
            model_hash: var("CROPDOC_MODEL_SHA256")?.to_lowercase(),
            class_names_url: var("CROPDOC_CLASS_NAMES_URL")?,
            class_names_hash: var("CROPDOC_CLASS_NAMES_SHA256")?.to_lowercase(),
        })
    }
}

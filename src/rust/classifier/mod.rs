mod error;
mod classifier;
pub mod builder;
pub mod preprocess;
mod utils;

pub use error::ClassifierError;
pub use classifier::{ClassScore, DiseaseClassifier, DiseasePredictor, Prediction};
pub use builder::{load_class_names, PredictorBuilder, DEFAULT_IMAGE_SIZE};
pub use preprocess::InputLayout;

/// Information about the loaded model and its classes
#[derive(Debug, Clone, serde::Serialize)]
pub struct PredictorInfo {
    /// Path to the ONNX model file
    pub model_path: String,
    /// Number of classes the model predicts
    pub num_classes: usize,
    /// Display names of the classes, in model output order
    pub class_names: Vec<String>,
}

impl PredictorInfo {
    pub fn of(classifier: &dyn DiseaseClassifier) -> Self {
        Self {
            model_path: classifier.model_path().to_string(),
            num_classes: classifier.num_classes(),
            class_names: classifier.class_names().to_vec(),
        }
    }
}

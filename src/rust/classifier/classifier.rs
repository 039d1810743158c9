use std::collections::HashMap;
use std::sync::Arc;

use image::DynamicImage;
use ndarray::Array1;
use ort::session::Session;
use ort::value::Tensor;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::preprocess::{preprocess, InputLayout};
use super::utils::{softmax, top_k_indices};
use crate::diseases;

/// Probability assigned to a single class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub class_name: String,
    pub confidence: f32,
}

/// Result of classifying one leaf image.
///
/// `top_k` is sorted by descending confidence; `top_class` and `confidence`
/// always mirror its first entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub top_class: String,
    pub confidence: f32,
    pub top_k: Vec<ClassScore>,
    pub recommendation: String,
}

impl Prediction {
    /// Assembles a prediction from a full probability vector.
    pub fn from_probabilities(
        probs: &[f32],
        class_names: &[String],
        top_k: usize,
    ) -> Result<Self, ClassifierError> {
        if probs.len() != class_names.len() {
            return Err(ClassifierError::PredictionError(format!(
                "Model produced {} scores but {} class names are loaded",
                probs.len(),
                class_names.len()
            )));
        }
        if probs.is_empty() {
            return Err(ClassifierError::PredictionError("Model produced no scores".into()));
        }

        let top_k: Vec<ClassScore> = top_k_indices(probs, top_k)
            .into_iter()
            .map(|i| ClassScore {
                class_name: class_names[i].clone(),
                confidence: probs[i],
            })
            .collect();

        let best = &top_k[0];
        Ok(Self {
            top_class: best.class_name.clone(),
            confidence: best.confidence,
            recommendation: diseases::recommendation(&best.class_name).to_string(),
            top_k,
        })
    }
}

/// Anything that can turn a leaf photo into a disease prediction.
///
/// The HTTP layer only sees this trait, so the server can share one
/// predictor across requests and tests can swap in a stub.
pub trait DiseaseClassifier: Send + Sync {
    fn predict(&self, image: &DynamicImage, top_k: usize) -> Result<Prediction, ClassifierError>;

    fn num_classes(&self) -> usize;

    fn model_path(&self) -> &str;

    fn class_names(&self) -> &[String];
}

/// ONNX-backed crop disease predictor.
///
/// Immutable after construction; wrap it in an `Arc` to share across threads.
///
/// ```rust,no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use cropdoc::{DiseaseClassifier, DiseasePredictor};
///
/// let predictor = DiseasePredictor::builder()
///     .with_custom_model("models/crop_disease_classifier.onnx", "models/class_names.json")?
///     .build()?;
///
/// let image = image::open("leaf.jpg")?;
/// let prediction = predictor.predict(&image, 3)?;
/// println!("{} ({:.1}%)", prediction.top_class, prediction.confidence * 100.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DiseasePredictor {
    pub(crate) model_path: String,
    pub(crate) session: Arc<Session>,
    pub(crate) class_names: Arc<Vec<String>>,
    pub(crate) input_name: String,
    pub(crate) layout: InputLayout,
    pub(crate) image_size: u32,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<DiseasePredictor>();
    }
};

impl DiseasePredictor {
    /// Creates a new PredictorBuilder for fluent construction
    pub fn builder() -> super::builder::PredictorBuilder {
        super::builder::PredictorBuilder::new()
    }

    pub fn layout(&self) -> InputLayout {
        self.layout
    }

    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    /// Runs the model on a preprocessed image and returns raw logits.
    fn run_logits(&self, image: &DynamicImage) -> Result<Array1<f32>, ClassifierError> {
        let input = preprocess(image, self.image_size, self.layout)?;
        let input = input.as_standard_layout();

        let mut inputs = HashMap::new();
        inputs.insert(
            self.input_name.as_str(),
            Tensor::from_array(&input)
                .map_err(|e| ClassifierError::ModelError(format!("Failed to create input tensor: {}", e)))?,
        );

        let outputs = self.session.run(inputs)
            .map_err(|e| ClassifierError::PredictionError(format!("Failed to run model: {}", e)))?;
        let output = outputs[0].try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::PredictionError(format!("Failed to extract output tensor: {}", e)))?;

        Ok(Array1::from_iter(output.iter().cloned()))
    }
}

impl DiseaseClassifier for DiseasePredictor {
    fn predict(&self, image: &DynamicImage, top_k: usize) -> Result<Prediction, ClassifierError> {
        let logits = self.run_logits(image)?;
        let probs = softmax(logits.view());
        Prediction::from_probabilities(&probs, &self.class_names, top_k)
    }

    fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    fn model_path(&self) -> &str {
        &self.model_path
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

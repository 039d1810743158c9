use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use ort::session::Session;
use ort::value::ValueType;

use super::classifier::DiseasePredictor;
use super::error::ClassifierError;
use super::preprocess::InputLayout;
use crate::{runtime::{create_session_builder, RuntimeConfig}, BuiltinModel, ModelManager};

/// Default square input side for the exported MobileNetV2.
pub const DEFAULT_IMAGE_SIZE: u32 = 224;

/// A builder for constructing a DiseasePredictor with a fluent interface.
#[derive(Debug)]
pub struct PredictorBuilder {
    model_path: Option<String>,
    class_names_path: Option<String>,
    runtime_config: RuntimeConfig,
    image_size: u32,
}

impl Default for PredictorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictorBuilder {
    /// Creates a new empty PredictorBuilder instance with default configuration
    pub fn new() -> Self {
        Self {
            model_path: None,
            class_names_path: None,
            runtime_config: RuntimeConfig::default(),
            image_size: DEFAULT_IMAGE_SIZE,
        }
    }

    /// Sets the runtime configuration for ONNX model execution
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Overrides the side length images are resized to before inference
    pub fn with_image_size(mut self, size: u32) -> Self {
        self.image_size = size;
        self
    }

    /// Uses a built-in model from the local model cache.
    ///
    /// The model must already be downloaded (see `ModelManager::download_model`
    /// or `cropdoc download`).
    pub fn with_model(self, model: BuiltinModel) -> Result<Self, ClassifierError> {
        let manager = ModelManager::new_default()
            .map_err(|e| ClassifierError::BuildError(format!("Failed to create model manager: {}", e)))?;
        self.with_cached_model(&manager, model)
    }

    /// Same as `with_model`, resolving artifacts through an explicit manager.
    pub fn with_cached_model(mut self, manager: &ModelManager, model: BuiltinModel) -> Result<Self, ClassifierError> {
        if self.model_path.is_some() || self.class_names_path.is_some() {
            return Err(ClassifierError::BuildError("Model and class names paths already set".to_string()));
        }

        let (model_path, class_names_path) = manager.require_model(model.name()).map_err(|e| {
            ClassifierError::BuildError(format!(
                "{}. Please download it first using ModelManager::download_model()",
                e
            ))
        })?;

        self.image_size = model.characteristics().input_size;
        self.model_path = Some(model_path.to_string_lossy().to_string());
        self.class_names_path = Some(class_names_path.to_string_lossy().to_string());
        Ok(self)
    }

    /// Sets a custom model and class names path for the predictor
    ///
    /// # Returns
    /// An error if either path is empty, the paths are already set or a file
    /// does not exist.
    pub fn with_custom_model(mut self, model_path: &str, class_names_path: &str) -> Result<Self, ClassifierError> {
        if model_path.is_empty() || class_names_path.is_empty() {
            return Err(ClassifierError::BuildError("Model and class names paths cannot be empty".to_string()));
        }
        if self.model_path.is_some() || self.class_names_path.is_some() {
            return Err(ClassifierError::BuildError("Model and class names paths already set".to_string()));
        }

        if !Path::new(model_path).exists() {
            return Err(ClassifierError::BuildError(format!("Model file not found: {}", model_path)));
        }
        if !Path::new(class_names_path).exists() {
            return Err(ClassifierError::BuildError(format!("Class names file not found: {}", class_names_path)));
        }

        self.model_path = Some(model_path.to_string());
        self.class_names_path = Some(class_names_path.to_string());
        Ok(self)
    }

    /// Loads the class names and the ONNX session, validating both.
    pub fn build(self) -> Result<DiseasePredictor, ClassifierError> {
        let model_path = self.model_path
            .ok_or_else(|| ClassifierError::BuildError("Model not set".to_string()))?;
        let class_names_path = self.class_names_path
            .ok_or_else(|| ClassifierError::BuildError("Class names not set".to_string()))?;
        if self.image_size == 0 {
            return Err(ClassifierError::ValidationError("Image size must be positive".into()));
        }

        let class_names = load_class_names(Path::new(&class_names_path))?;
        info!("Loaded {} class names from {}", class_names.len(), class_names_path);

        let session = create_session_builder(&self.runtime_config)?
            .commit_from_file(&model_path)
            .map_err(|e| {
                error!("Failed to load model {}: {}", model_path, e);
                ClassifierError::BuildError(format!("Failed to load model: {}", e))
            })?;

        let (input_name, layout) = validate_model(&session)?;
        info!("Model structure validated successfully ({:?} input '{}')", layout, input_name);

        Ok(DiseasePredictor {
            model_path,
            session: Arc::new(session),
            class_names: Arc::new(class_names),
            input_name,
            layout,
            image_size: self.image_size,
        })
    }
}

/// Reads `class_names.json`: a non-empty JSON array of unique display names.
pub fn load_class_names(path: &Path) -> Result<Vec<String>, ClassifierError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        ClassifierError::BuildError(format!("Failed to read class names {}: {}", path.display(), e))
    })?;
    parse_class_names(&raw)
}

fn parse_class_names(raw: &str) -> Result<Vec<String>, ClassifierError> {
    let names: Vec<String> = serde_json::from_str(raw)
        .map_err(|e| ClassifierError::ValidationError(format!("Invalid class names file: {}", e)))?;

    if names.is_empty() {
        return Err(ClassifierError::ValidationError("Class names list cannot be empty".into()));
    }
    let mut seen = HashSet::new();
    for name in &names {
        if name.trim().is_empty() {
            return Err(ClassifierError::ValidationError("Class name cannot be empty".into()));
        }
        if !seen.insert(name.as_str()) {
            return Err(ClassifierError::ValidationError(format!("Duplicate class name: {}", name)));
        }
    }
    Ok(names)
}

/// Checks the graph has an image input and a score output, returning the
/// input name and its layout.
fn validate_model(session: &Session) -> Result<(String, InputLayout), ClassifierError> {
    let input = session.inputs.first()
        .ok_or_else(|| ClassifierError::ModelError("Model has no inputs".into()))?;
    if session.outputs.is_empty() {
        return Err(ClassifierError::ModelError("Model has no outputs".into()));
    }

    let layout = match &input.input_type {
        ValueType::Tensor { dimensions, .. } => InputLayout::from_shape(dimensions)?,
        other => {
            return Err(ClassifierError::ModelError(format!(
                "Model input '{}' must be a tensor, found {:?}",
                input.name, other
            )))
        }
    };

    Ok((input.name.clone(), layout))
}

//! Crop leaf disease classification: an ONNX predictor, a REST API and a
//! WhatsApp chatbot webhook.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use cropdoc::{DiseaseClassifier, DiseasePredictor, BuiltinModel};
//!
//! let predictor = DiseasePredictor::builder()
//!     .with_model(BuiltinModel::MobileNetV2)?
//!     .build()?;
//!
//! let image = image::open("leaf.jpg")?;
//! let prediction = predictor.predict(&image, 3)?;
//! println!("{}: {:.1}%", prediction.top_class, prediction.confidence * 100.0);
//! println!("{}", prediction.recommendation);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The predictor is immutable once built and can be shared across threads
//! using `Arc`. The server keeps it behind `Arc<dyn DiseaseClassifier>` and
//! runs inference on the blocking thread pool.
//!
//! # Serving
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use cropdoc::{api, config::Settings, DiseasePredictor};
//!
//! let settings = Settings::from_env()?;
//! let predictor = DiseasePredictor::builder()
//!     .with_custom_model("models/crop_disease_classifier.onnx", "models/class_names.json")?
//!     .build()?;
//!
//! let state = api::AppState::from_settings(settings, Some(Arc::new(predictor)))?;
//! let app = api::build_router(Arc::new(state));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod classifier;
pub mod config;
pub mod diseases;
pub mod evaluation;
mod runtime;
pub mod model_manager;
pub mod models;
pub mod whatsapp;

pub use classifier::{
    ClassScore, ClassifierError, DiseaseClassifier, DiseasePredictor, Prediction, PredictorBuilder, PredictorInfo,
};
pub use runtime::{RuntimeConfig, create_session_builder};
pub use model_manager::{ModelManager, ModelError};
pub use models::{BuiltinModel, ModelCharacteristics, ModelInfo};

pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Response;
use axum::Router;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat};

use cropdoc::api::{self, AppState};
use cropdoc::config::Settings;
use cropdoc::whatsapp::{MediaError, MediaFetcher, MockClock, RateLimiter};
use cropdoc::{ClassifierError, DiseaseClassifier, Prediction};

pub const BOUNDARY: &str = "cropdoc-test-boundary";

pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// Classifier that always returns the same probabilities.
pub struct StubClassifier {
    pub class_names: Vec<String>,
    pub probs: Vec<f32>,
    pub calls: AtomicUsize,
}

impl StubClassifier {
    pub fn new(classes: &[(&str, f32)]) -> Self {
        Self {
            class_names: classes.iter().map(|(name, _)| name.to_string()).collect(),
            probs: classes.iter().map(|(_, p)| *p).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn early_blight() -> Self {
        Self::new(&[
            ("Tomato: Early Blight", 0.91),
            ("Tomato: Late Blight", 0.05),
            ("Tomato: Healthy", 0.03),
            ("Potato: Early Blight", 0.01),
        ])
    }
}

impl DiseaseClassifier for StubClassifier {
    fn predict(&self, _image: &DynamicImage, top_k: usize) -> Result<Prediction, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Prediction::from_probabilities(&self.probs, &self.class_names, top_k)
    }

    fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    fn model_path(&self) -> &str {
        "stub.onnx"
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

/// Media fetcher serving a fixed green image, or failing every download.
pub struct StubFetcher {
    pub fail: bool,
}

#[async_trait]
impl MediaFetcher for StubFetcher {
    async fn fetch_image(&self, _url: &str) -> Result<DynamicImage, MediaError> {
        if self.fail {
            return Err(MediaError::Status(404));
        }
        Ok(DynamicImage::new_rgb8(32, 32))
    }
}

pub struct TestApp {
    pub router: Router,
    pub clock: MockClock,
    pub classifier: Option<Arc<StubClassifier>>,
}

pub fn app(settings: Settings, classifier: Option<StubClassifier>, fetcher: StubFetcher) -> TestApp {
    init();
    let clock = MockClock::new(Instant::now());
    let limiter = RateLimiter::with_clock(
        settings.rate_limit_per_minute,
        settings.rate_limit_window,
        Arc::new(clock.clone()),
    );
    let classifier = classifier.map(Arc::new);
    let predictor = classifier
        .clone()
        .map(|c| c as Arc<dyn DiseaseClassifier>);
    let state = AppState::new(settings, predictor, limiter, Arc::new(fetcher));

    TestApp {
        router: api::build_router(Arc::new(state)),
        clock,
        classifier,
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Builds a multipart body with a single field.
pub fn multipart_body(field: &str, content_type: &str, contents: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"leaf\"\r\nContent-Type: {}\r\n\r\n",
            field, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn form_encode(params: &[(String, String)]) -> String {
    let encode = |s: &str| {
        s.bytes()
            .map(|b| match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
                _ => format!("%{:02X}", b),
            })
            .collect::<String>()
    };
    params
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

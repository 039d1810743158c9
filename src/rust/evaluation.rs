//! Offline model evaluation over a labelled image folder and inference benchmarking.
//!
//! The JSON report produced here feeds the dashboard's performance page.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::{DynamicImage, Rgb, RgbImage};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::{ClassifierError, DiseaseClassifier};
use crate::diseases;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No evaluable images found under {0}")]
    Empty(PathBuf),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// Confusion matrix over a fixed, ordered list of classes.
///
/// Rows are actual classes, columns are predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub class_names: Vec<String>,
    /// Row-major counts
    pub matrix: Vec<usize>,
}

impl ConfusionMatrix {
    pub fn new(class_names: Vec<String>) -> Self {
        let n = class_names.len();
        Self {
            class_names,
            matrix: vec![0; n * n],
        }
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Records one prediction. Out-of-range indices are ignored.
    pub fn record(&mut self, actual: usize, predicted: usize) {
        let n = self.num_classes();
        if actual < n && predicted < n {
            self.matrix[actual * n + predicted] += 1;
        }
    }

    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        let n = self.num_classes();
        if actual < n && predicted < n {
            self.matrix[actual * n + predicted]
        } else {
            0
        }
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.num_classes()).map(|i| self.get(i, i)).sum();
        correct as f64 / total as f64
    }

    pub fn class_metrics(&self, class_idx: usize) -> ClassMetrics {
        let n = self.num_classes();
        let true_positives = self.get(class_idx, class_idx);
        let predicted: usize = (0..n).map(|i| self.get(i, class_idx)).sum();
        let support: usize = (0..n).map(|j| self.get(class_idx, j)).sum();

        let precision = ratio(true_positives, predicted);
        let recall = ratio(true_positives, support);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        ClassMetrics {
            class_name: self.class_names.get(class_idx).cloned().unwrap_or_default(),
            precision,
            recall,
            f1,
            support,
        }
    }

    pub fn per_class(&self) -> Vec<ClassMetrics> {
        (0..self.num_classes()).map(|i| self.class_metrics(i)).collect()
    }

    /// Unweighted mean F1 across all classes.
    pub fn macro_f1(&self) -> f64 {
        let n = self.num_classes();
        if n == 0 {
            return 0.0;
        }
        self.per_class().iter().map(|m| m.f1).sum::<f64>() / n as f64
    }

    /// Precision, recall and F1 averaged with each class weighted by its support.
    pub fn weighted_avg(&self) -> AverageMetrics {
        let per_class = self.per_class();
        let support: usize = per_class.iter().map(|m| m.support).sum();
        let weighted = |metric: fn(&ClassMetrics) -> f64| {
            if support == 0 {
                return 0.0;
            }
            per_class.iter().map(|m| metric(m) * m.support as f64).sum::<f64>() / support as f64
        };
        AverageMetrics {
            precision: weighted(|m| m.precision),
            recall: weighted(|m| m.recall),
            f1: weighted(|m| m.f1),
            support,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class_name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Evaluation results, written as `results.json` for the dashboard.
///
/// `model_size_mb` and `avg_inference_ms` stay at zero until
/// [`EvaluationReport::with_model_stats`] fills them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub model_size_mb: f64,
    pub avg_inference_ms: f64,
    pub num_classes: usize,
    pub total_images: usize,
    pub class_names: Vec<String>,
    /// Recall of each class, keyed by class name
    pub per_class_accuracy: BTreeMap<String, f64>,
    pub macro_f1: f64,
    pub weighted_avg: AverageMetrics,
    pub per_class: Vec<ClassMetrics>,
    pub confusion_matrix: ConfusionMatrix,
    pub samples: usize,
    pub skipped: usize,
}

impl EvaluationReport {
    pub fn from_matrix(confusion_matrix: ConfusionMatrix, skipped: usize) -> Self {
        let per_class = confusion_matrix.per_class();
        let samples = confusion_matrix.total();
        Self {
            accuracy: confusion_matrix.accuracy(),
            model_size_mb: 0.0,
            avg_inference_ms: 0.0,
            num_classes: confusion_matrix.num_classes(),
            total_images: samples + skipped,
            class_names: confusion_matrix.class_names.clone(),
            per_class_accuracy: per_class
                .iter()
                .map(|m| (m.class_name.clone(), m.recall))
                .collect(),
            macro_f1: confusion_matrix.macro_f1(),
            weighted_avg: confusion_matrix.weighted_avg(),
            per_class,
            samples,
            confusion_matrix,
            skipped,
        }
    }

    /// Adds the model file size and the mean benchmarked inference time.
    pub fn with_model_stats(mut self, model_path: &Path, benchmark: &BenchmarkResult) -> Result<Self, EvaluationError> {
        self.model_size_mb = fs::metadata(model_path)?.len() as f64 / BYTES_PER_MB;
        self.avg_inference_ms = benchmark.mean_ms;
        Ok(self)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn save(&self, path: &Path) -> Result<(), EvaluationError> {
        let json = self.to_json().map_err(std::io::Error::from)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Per-class precision, recall and F1 with a weighted-average summary row.
    pub fn summary_csv(&self) -> String {
        let mut content = String::from("Class,Precision,Recall,F1-Score,Support\n");
        for m in &self.per_class {
            content.push_str(&format!(
                "{},{:.3},{:.3},{:.3},{}\n",
                csv_field(&m.class_name), m.precision, m.recall, m.f1, m.support
            ));
        }
        let avg = &self.weighted_avg;
        content.push_str(&format!(
            "OVERALL (weighted avg),{:.3},{:.3},{:.3},{}\n",
            avg.precision, avg.recall, avg.f1, avg.support
        ));
        content
    }

    pub fn save_summary_csv(&self, path: &Path) -> Result<(), EvaluationError> {
        fs::write(path, self.summary_csv())?;
        Ok(())
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl fmt::Display for EvaluationReport {
    /// Classification report with three decimal digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .per_class
            .iter()
            .map(|m| m.class_name.chars().count())
            .max()
            .unwrap_or(0)
            .max("weighted avg".len());

        writeln!(f, "Accuracy: {:.4} ({:.2}%)", self.accuracy, self.accuracy * 100.0)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support",
            width = width
        )?;
        writeln!(f)?;
        for m in &self.per_class {
            writeln!(
                f,
                "{:>width$}  {:>9.3} {:>9.3} {:>9.3} {:>9}",
                m.class_name, m.precision, m.recall, m.f1, m.support,
                width = width
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9.3} {:>9}",
            "accuracy", "", "", self.accuracy, self.samples,
            width = width
        )?;

        let n = self.per_class.len().max(1) as f64;
        let macro_precision = self.per_class.iter().map(|m| m.precision).sum::<f64>() / n;
        let macro_recall = self.per_class.iter().map(|m| m.recall).sum::<f64>() / n;
        writeln!(
            f,
            "{:>width$}  {:>9.3} {:>9.3} {:>9.3} {:>9}",
            "macro avg", macro_precision, macro_recall, self.macro_f1, self.samples,
            width = width
        )?;
        writeln!(
            f,
            "{:>width$}  {:>9.3} {:>9.3} {:>9.3} {:>9}",
            "weighted avg",
            self.weighted_avg.precision,
            self.weighted_avg.recall,
            self.weighted_avg.f1,
            self.weighted_avg.support,
            width = width
        )?;
        if self.model_size_mb > 0.0 {
            writeln!(f, "\nModel size: {:.1} MB", self.model_size_mb)?;
            writeln!(f, "Avg inference: {:.1} ms/image", self.avg_inference_ms)?;
        }
        if self.skipped > 0 {
            writeln!(f, "\nSkipped images: {}", self.skipped)?;
        }
        Ok(())
    }
}

/// Classifies every image under `root/<class folder>/` and scores the results.
///
/// Folder names may be raw PlantVillage names or display names; folders that
/// match no class of `classifier` are skipped.
pub fn evaluate_directory(classifier: &dyn DiseaseClassifier, root: &Path) -> Result<EvaluationReport, EvaluationError> {
    let class_names = classifier.class_names().to_vec();
    let mut matrix = ConfusionMatrix::new(class_names.clone());
    let mut skipped = 0;

    for folder in sorted_entries(root)? {
        if !folder.is_dir() {
            continue;
        }
        let folder_name = folder.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let actual = diseases::display_name(&folder_name)
            .and_then(|name| class_names.iter().position(|c| c == name));
        let Some(actual) = actual else {
            warn!("Skipping folder with unknown class: {}", folder_name);
            continue;
        };

        for file in sorted_entries(&folder)? {
            if !is_image_file(&file) {
                continue;
            }
            let image = match image::open(&file) {
                Ok(image) => image,
                Err(e) => {
                    debug!("Skipping unreadable image {}: {}", file.display(), e);
                    skipped += 1;
                    continue;
                }
            };
            let prediction = classifier.predict(&image, 1)?;
            match class_names.iter().position(|c| *c == prediction.top_class) {
                Some(predicted) => matrix.record(actual, predicted),
                None => skipped += 1,
            }
        }
    }

    if matrix.total() == 0 {
        return Err(EvaluationError::Empty(root.to_path_buf()));
    }

    let report = EvaluationReport::from_matrix(matrix, skipped);
    info!(
        "Evaluated {} images: accuracy {:.4}, macro F1 {:.4}, {} skipped",
        report.samples, report.accuracy, report.macro_f1, report.skipped
    );
    Ok(report)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, EvaluationError> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    Ok(entries)
}

fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

/// Latency statistics for repeated single-image inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub runs: usize,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Times `runs` predictions on a synthetic 224x224 image after one warm-up run.
pub fn benchmark_inference(classifier: &dyn DiseaseClassifier, runs: usize) -> Result<BenchmarkResult, ClassifierError> {
    if runs == 0 {
        return Err(ClassifierError::ValidationError("Benchmark needs at least one run".into()));
    }

    let sample = DynamicImage::ImageRgb8(RgbImage::from_fn(224, 224, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }));

    classifier.predict(&sample, 1)?;

    let mut timings = Vec::with_capacity(runs);
    for _ in 0..runs {
        let start = Instant::now();
        classifier.predict(&sample, 1)?;
        timings.push(start.elapsed().as_secs_f64() * 1000.0);
    }

    let mean_ms = timings.iter().sum::<f64>() / runs as f64;
    let min_ms = timings.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_ms = timings.iter().cloned().fold(0.0, f64::max);
    Ok(BenchmarkResult {
        runs,
        mean_ms,
        min_ms,
        max_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Prediction;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Predicts class 0 for reddish images and class 1 otherwise.
    struct ColourClassifier {
        names: Vec<String>,
        calls: AtomicUsize,
    }

    impl ColourClassifier {
        fn new() -> Self {
            Self {
                names: vec!["Tomato: Late Blight".to_string(), "Corn: Healthy".to_string()],
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl DiseaseClassifier for ColourClassifier {
        fn predict(&self, image: &DynamicImage, top_k: usize) -> Result<Prediction, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let pixel = image.to_rgb8().get_pixel(0, 0).0;
            let probs = if pixel[0] > pixel[1] { [0.9, 0.1] } else { [0.2, 0.8] };
            Prediction::from_probabilities(&probs, &self.names, top_k)
        }

        fn num_classes(&self) -> usize {
            self.names.len()
        }

        fn model_path(&self) -> &str {
            "colour"
        }

        fn class_names(&self) -> &[String] {
            &self.names
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn write_png(path: &Path, colour: [u8; 3]) {
        RgbImage::from_pixel(4, 4, Rgb(colour)).save(path).unwrap();
    }

    #[test]
    fn test_confusion_matrix_metrics() {
        let mut cm = ConfusionMatrix::new(names(&["a", "b", "c"]));
        cm.record(0, 0);
        cm.record(0, 0);
        cm.record(0, 1);
        cm.record(1, 1);
        cm.record(2, 1);
        cm.record(7, 0);

        assert_eq!(cm.total(), 5);
        assert!((cm.accuracy() - 0.6).abs() < 1e-9);

        let a = cm.class_metrics(0);
        assert_eq!(a.support, 3);
        assert!((a.precision - 1.0).abs() < 1e-9);
        assert!((a.recall - 2.0 / 3.0).abs() < 1e-9);

        let b = cm.class_metrics(1);
        assert!((b.precision - 1.0 / 3.0).abs() < 1e-9);
        assert!((b.recall - 1.0).abs() < 1e-9);

        // never predicted
        let c = cm.class_metrics(2);
        assert_eq!(c.precision, 0.0);
        assert_eq!(c.f1, 0.0);

        let expected_macro = (a.f1 + b.f1 + c.f1) / 3.0;
        assert!((cm.macro_f1() - expected_macro).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blight = dir.path().join("Tomato___Late_blight");
        let healthy = dir.path().join("Corn_(maize)___healthy");
        let unknown = dir.path().join("Rice___Blast");
        for d in [&blight, &healthy, &unknown] {
            fs::create_dir(d).unwrap();
        }

        write_png(&blight.join("1.png"), [200, 10, 10]);
        write_png(&blight.join("2.png"), [10, 200, 10]);
        write_png(&healthy.join("1.png"), [10, 200, 10]);
        write_png(&unknown.join("1.png"), [200, 10, 10]);
        fs::write(healthy.join("broken.jpg"), b"not a jpeg").unwrap();
        fs::write(healthy.join("notes.txt"), b"ignored").unwrap();

        let classifier = ColourClassifier::new();
        let report = evaluate_directory(&classifier, dir.path()).unwrap();

        assert_eq!(report.samples, 3);
        assert_eq!(report.skipped, 1);
        assert!((report.accuracy - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.confusion_matrix.get(0, 1), 1);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 3);

        let text = report.to_string();
        assert!(text.contains("Tomato: Late Blight"));
        assert!(text.contains("0.667"));

        assert!(text.contains("weighted avg"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["samples"], 3);
    }

    #[test]
    fn test_weighted_avg() {
        let mut cm = ConfusionMatrix::new(names(&["a", "b"]));
        cm.record(0, 0);
        cm.record(0, 0);
        cm.record(0, 1);
        cm.record(1, 1);

        let a = cm.class_metrics(0);
        let b = cm.class_metrics(1);
        let avg = cm.weighted_avg();
        assert_eq!(avg.support, 4);
        assert!((avg.recall - 0.75).abs() < 1e-9);
        assert!((avg.precision - (a.precision * 3.0 + b.precision) / 4.0).abs() < 1e-9);
        assert!((avg.f1 - (a.f1 * 3.0 + b.f1) / 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_has_dashboard_fields() {
        let mut cm = ConfusionMatrix::new(names(&["Tomato: Late Blight", "Corn: Healthy"]));
        cm.record(0, 0);
        cm.record(0, 1);
        cm.record(1, 1);

        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.onnx");
        fs::write(&model_path, vec![0u8; 512 * 1024]).unwrap();
        let benchmark = BenchmarkResult {
            runs: 50,
            mean_ms: 12.5,
            min_ms: 10.0,
            max_ms: 20.0,
        };

        let report = EvaluationReport::from_matrix(cm, 2)
            .with_model_stats(&model_path, &benchmark)
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert!((json["accuracy"].as_f64().unwrap() - 2.0 / 3.0).abs() < 1e-9);
        assert!((json["model_size_mb"].as_f64().unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(json["avg_inference_ms"], 12.5);
        assert_eq!(json["num_classes"], 2);
        assert_eq!(json["total_images"], 5);
        assert_eq!(json["class_names"][1], "Corn: Healthy");
        assert_eq!(json["per_class_accuracy"]["Tomato: Late Blight"], 0.5);
        assert_eq!(json["per_class_accuracy"]["Corn: Healthy"], 1.0);

        assert!(report.to_string().contains("Model size: 0.5 MB"));
        assert!(matches!(
            report.with_model_stats(&dir.path().join("missing.onnx"), &benchmark),
            Err(EvaluationError::Io(_))
        ));
    }

    #[test]
    fn test_summary_csv() {
        let mut cm = ConfusionMatrix::new(names(&["Tomato: Late Blight", "Corn: Healthy"]));
        cm.record(0, 0);
        cm.record(1, 0);
        cm.record(1, 1);
        let report = EvaluationReport::from_matrix(cm, 0);

        let csv = report.summary_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Class,Precision,Recall,F1-Score,Support");
        assert_eq!(lines[1], "Tomato: Late Blight,0.500,1.000,0.667,1");
        assert_eq!(lines[2], "Corn: Healthy,1.000,0.500,0.667,2");
        assert!(lines[3].starts_with("OVERALL (weighted avg),0.833,0.667,0.667,3"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_performance_summary.csv");
        report.save_summary_csv(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), csv);

        assert_eq!(csv_field("a,b"), "\"a,b\"");
    }

    #[test]
    fn test_evaluate_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = evaluate_directory(&ColourClassifier::new(), dir.path());
        assert!(matches!(result, Err(EvaluationError::Empty(_))));
    }

    #[test]
    fn test_benchmark_runs() {
        let classifier = ColourClassifier::new();
        let result = benchmark_inference(&classifier, 5).unwrap();
        assert_eq!(result.runs, 5);
        assert!(result.min_ms <= result.mean_ms && result.mean_ms <= result.max_ms);
        // warm-up plus timed runs
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 6);
        assert!(benchmark_inference(&classifier, 0).is_err());
    }
}

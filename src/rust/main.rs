use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use cropdoc::api::{self, AppState};
use cropdoc::config::{Settings, API_VERSION};
use cropdoc::evaluation::{benchmark_inference, evaluate_directory};
use cropdoc::{BuiltinModel, DiseaseClassifier, DiseasePredictor, ModelManager, PredictorInfo};

#[derive(Parser)]
#[command(name = "cropdoc", author, version, about = "Crop leaf disease classification service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the REST API and WhatsApp webhook
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        #[command(flatten)]
        model: ModelArgs,
    },
    /// Classify a single leaf image
    Predict {
        image: PathBuf,

        /// Number of top predictions to show
        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,

        #[command(flatten)]
        model: ModelArgs,
    },
    /// Score the model on a folder of labelled class sub-folders
    Evaluate {
        dir: PathBuf,

        /// Where to write the JSON report
        #[arg(short, long, default_value = "results.json")]
        output: PathBuf,

        /// Where to write the per-class CSV summary
        #[arg(long, default_value = "model_performance_summary.csv")]
        summary: PathBuf,

        /// Timed inference runs for the reported average latency
        #[arg(short, long, default_value_t = 50)]
        runs: usize,

        #[command(flatten)]
        model: ModelArgs,
    },
    /// Measure single-image inference latency
    Benchmark {
        #[arg(short, long, default_value_t = 50)]
        runs: usize,

        #[command(flatten)]
        model: ModelArgs,
    },
    /// Download the built-in model into the local cache
    Download {
        /// Force a fresh download of the model files
        #[arg(short, long)]
        fresh: bool,
    },
}

/// Overrides `CROPDOC_MODEL_PATH` / `CROPDOC_CLASS_NAMES_PATH`.
#[derive(Args)]
struct ModelArgs {
    /// ONNX model file; defaults to the cached built-in model
    #[arg(long)]
    model: Option<PathBuf>,

    /// JSON array of class names matching the model outputs
    #[arg(long)]
    class_names: Option<PathBuf>,
}

/// Environment settings with any model paths given on the command line applied.
fn load_settings(model: ModelArgs) -> Result<Settings> {
    let mut settings = Settings::from_env()?;
    settings.override_model_paths(model.model, model.class_names);
    Ok(settings)
}

fn load_predictor(settings: &Settings) -> Result<DiseasePredictor> {
    let builder = DiseasePredictor::builder();
    let builder = match settings.model_files()? {
        Some((model, class_names)) => builder.with_custom_model(&path_str(model)?, &path_str(class_names)?)?,
        None => builder.with_model(BuiltinModel::MobileNetV2)?,
    };

    let start = Instant::now();
    let predictor = builder.build()?;
    let info = PredictorInfo::of(&predictor);
    info!(
        "Model loaded: {} classes, checkpoint={} ({:.2?})",
        info.num_classes,
        info.model_path,
        start.elapsed()
    );
    Ok(predictor)
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Path is not valid UTF-8: {:?}", path))
}

async fn ensure_model_downloaded(fresh: bool) -> Result<()> {
    let manager = ModelManager::new_default()?;
    let model = BuiltinModel::MobileNetV2;
    let model_info = model
        .get_model_info()
        .map_err(|var| anyhow!("{} must be set to download the model", var))?;

    if fresh {
        info!("Fresh download requested - removing any existing model files...");
        manager.remove_download(model.name())?;
    }

    if !manager.is_model_downloaded(model.name()) {
        info!("Downloading model...");
    }
    manager.ensure_model_downloaded(&model_info).await?;
    println!("Model ready in {}", manager.models_dir().join(model.name()).display());
    Ok(())
}

async fn serve(host: Option<String>, port: Option<u16>, model: ModelArgs) -> Result<()> {
    let mut settings = load_settings(model)?;
    if let Some(host) = host {
        settings.host = host;
    }
    if let Some(port) = port {
        settings.port = port;
    }

    info!("Starting Crop Disease Classification API v{} ...", API_VERSION);
    let predictor = load_predictor(&settings).context("Failed to load model - aborting startup")?;

    if settings.enable_signature_validation && settings.twilio_auth_token.is_empty() {
        warn!("TWILIO_AUTH_TOKEN is not set; WhatsApp webhook requests will be rejected");
    }

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    let state = Arc::new(AppState::from_settings(settings, Some(Arc::new(predictor)))?);
    let app = api::build_router(state);

    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down - releasing model resources ...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    cropdoc::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { host, port, model } => serve(host, port, model).await?,
        Command::Predict { image, top_k, model } => {
            let predictor = load_predictor(&load_settings(model)?)?;
            let image = image::open(&image).with_context(|| format!("Failed to open {}", image.display()))?;

            let start = Instant::now();
            let prediction = predictor.predict(&image, top_k)?;
            info!("Inference took {:.2?}", start.elapsed());

            println!("\nPrediction: {}", prediction.top_class);
            println!("Confidence: {:.1}%", prediction.confidence * 100.0);
            println!("Top {}:", prediction.top_k.len());
            for score in &prediction.top_k {
                println!("  {}: {:.1}%", score.class_name, score.confidence * 100.0);
            }
            println!("Recommendation: {}", prediction.recommendation);
        }
        Command::Evaluate { dir, output, summary, runs, model } => {
            let predictor = load_predictor(&load_settings(model)?)?;
            let benchmark = benchmark_inference(&predictor, runs)?;
            let report = evaluate_directory(&predictor, &dir)?
                .with_model_stats(Path::new(predictor.model_path()), &benchmark)?;
            println!("{}", report);
            report.save(&output)?;
            report.save_summary_csv(&summary)?;
            println!("Saved: {}, {}", output.display(), summary.display());
        }
        Command::Benchmark { runs, model } => {
            let predictor = load_predictor(&load_settings(model)?)?;
            let result = benchmark_inference(&predictor, runs)?;
            println!(
                "Inference over {} runs: mean {:.2} ms, min {:.2} ms, max {:.2} ms",
                result.runs, result.mean_ms, result.min_ms, result.max_ms
            );
        }
        Command::Download { fresh } => ensure_model_downloaded(fresh).await?,
    }

    Ok(())
}

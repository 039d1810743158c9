use std::path::{Path, PathBuf};
use std::fs;
use std::io;
use std::sync::Arc;
use std::env;
use tokio::sync::Mutex;
use sha2::{Sha256, Digest};

use crate::models::{ModelInfo, MODEL_FILE_NAME, CLASS_NAMES_FILE_NAME};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not downloaded: {0}")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// Locates, downloads and verifies the exported classifier artifacts.
#[derive(Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("CROPDOC_CACHE") {
            return PathBuf::from(path).join("models");
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("cropdoc").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("cropdoc").join("models");
        }

        // 4. If all else fails, use system temp directory
        env::temp_dir().join("cropdoc").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn get_model_path(&self, name: &str) -> PathBuf {
        self.models_dir.join(name).join(MODEL_FILE_NAME)
    }

    pub fn get_class_names_path(&self, name: &str) -> PathBuf {
        self.models_dir.join(name).join(CLASS_NAMES_FILE_NAME)
    }

    pub fn is_model_downloaded(&self, name: &str) -> bool {
        let model_path = self.get_model_path(name);
        let class_names_path = self.get_class_names_path(name);
        log::debug!("Model path: {:?} (exists: {})", model_path, model_path.exists());
        log::debug!("Class names path: {:?} (exists: {})", class_names_path, class_names_path.exists());
        model_path.exists() && class_names_path.exists()
    }

    /// Returns the cached artifact paths, or `NotDownloaded` if either is missing.
    pub fn require_model(&self, name: &str) -> Result<(PathBuf, PathBuf), ModelError> {
        if !self.is_model_downloaded(name) {
            return Err(ModelError::NotDownloaded(format!(
                "{} is not in {:?}. Run `cropdoc download` first",
                name, self.models_dir
            )));
        }
        Ok((self.get_model_path(name), self.get_class_names_path(name)))
    }

    pub async fn download_model(&self, info: &ModelInfo) -> Result<(), ModelError> {
        let _lock = self.download_lock.lock().await;

        let model_dir = self.models_dir.join(&info.name);
        log::info!("Creating model directory at {:?}", model_dir);
        fs::create_dir_all(&model_dir)?;

        let model_path = self.get_model_path(&info.name);
        let model_result = self
            .ensure_file(&info.model_url, &model_path, &info.model_hash, "model")
            .await;

        let class_names_path = self.get_class_names_path(&info.name);
        let class_names_result = self
            .ensure_file(&info.class_names_url, &class_names_path, &info.class_names_hash, "class names")
            .await;

        match (model_result, class_names_result) {
            (Ok(()), Ok(())) => {
                log::info!("Model and class names ready to use");
                Ok(())
            }
            (Err(e), _) => {
                log::error!("Failed to setup model file: {}", e);
                let _ = self.remove_download(&info.name);
                Err(e)
            }
            (_, Err(e)) => {
                log::error!("Failed to setup class names file: {}", e);
                let _ = self.remove_download(&info.name);
                Err(e)
            }
        }
    }

    async fn ensure_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: &str,
        file_type: &str,
    ) -> Result<(), ModelError> {
        if path.exists() {
            log::info!("{} file exists at {:?}, verifying...", file_type, path);
            if self.verify_file(path, expected_hash)? {
                log::info!("Existing {} file verified successfully", file_type);
                return Ok(());
            }
            log::warn!("{} file verification failed, redownloading", file_type);
        }
        self.download_and_verify_file(url, path, expected_hash, file_type).await
    }

    fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
        let bytes = fs::read(path)?;
        let hash = sha256_hex(&bytes);
        log::debug!("Verifying {:?}: {} bytes, hash {}", path, bytes.len(), hash);
        Ok(hash == expected_hash)
    }

    pub fn verify_model(&self, info: &ModelInfo) -> Result<bool, ModelError> {
        let model_path = self.get_model_path(&info.name);
        let class_names_path = self.get_class_names_path(&info.name);

        if !model_path.exists() || !class_names_path.exists() {
            log::info!("One or both model files do not exist");
            return Ok(false);
        }

        let model_ok = self.verify_file(&model_path, &info.model_hash)?;
        let class_names_ok = self.verify_file(&class_names_path, &info.class_names_hash)?;

        log::info!("Model hash verification: {}", model_ok);
        log::info!("Class names hash verification: {}", class_names_ok);

        Ok(model_ok && class_names_ok)
    }

    async fn download_and_verify_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: &str,
        file_type: &str,
    ) -> Result<(), ModelError> {
        log::info!("Downloading {} file from {} to {:?}", file_type, url, path);
        let response = reqwest::get(url).await?.error_for_status()?;
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        let hash = sha256_hex(&bytes);
        if hash != expected_hash {
            log::error!("{} hash mismatch: expected {}, got {}", file_type, expected_hash, hash);
            return Err(ModelError::HashMismatch {
                file_type: file_type.to_string(),
                expected: expected_hash.to_string(),
                actual: hash,
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &bytes)?;

        if !self.verify_file(path, expected_hash)? {
            return Err(ModelError::VerificationFailed);
        }

        log::info!("{} file downloaded and verified successfully", file_type);
        Ok(())
    }

    pub fn remove_download(&self, name: &str) -> Result<(), ModelError> {
        let model_path = self.get_model_path(name);
        let class_names_path = self.get_class_names_path(name);

        if model_path.exists() {
            fs::remove_file(&model_path)?;
        }
        if class_names_path.exists() {
            fs::remove_file(&class_names_path)?;
        }
        Ok(())
    }

    /// Ensures that a model is downloaded and verified.
    /// If the model doesn't exist, it will be downloaded.
    /// If verification fails, it will be re-downloaded.
    pub async fn ensure_model_downloaded(&self, info: &ModelInfo) -> Result<(), ModelError> {
        log::info!("Checking if model {} is downloaded...", info.name);
        if !self.is_model_downloaded(&info.name) {
            log::info!("Model not found, downloading...");
            self.download_model(info).await?;
        } else if !self.verify_model(info)? {
            log::info!("Model verification failed, re-downloading...");
            self.remove_download(&info.name)?;
            self.download_model(info).await?;
        } else {
            log::info!("Model verification successful");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: &str = "mobilenet-v2-crop";

    fn temp_manager() -> (tempfile::TempDir, ModelManager) {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path().join("models")).unwrap();
        (dir, manager)
    }

    fn info_for(model_bytes: &[u8], class_names_bytes: &[u8]) -> ModelInfo {
        ModelInfo {
            name: NAME.to_string(),
            model_url: "http://127.0.0.1:9/model.onnx".to_string(),
            class_names_url: "http://127.0.0.1:9/class_names.json".to_string(),
            model_hash: sha256_hex(model_bytes),
            class_names_hash: sha256_hex(class_names_bytes),
        }
    }

    fn write_artifacts(manager: &ModelManager, model_bytes: &[u8], class_names_bytes: &[u8]) {
        let model_path = manager.get_model_path(NAME);
        fs::create_dir_all(model_path.parent().unwrap()).unwrap();
        fs::write(&model_path, model_bytes).unwrap();
        fs::write(manager.get_class_names_path(NAME), class_names_bytes).unwrap();
    }

    #[test]
    fn test_artifact_paths() {
        let (_dir, manager) = temp_manager();
        assert!(manager.get_model_path(NAME).ends_with("mobilenet-v2-crop/crop_disease_classifier.onnx"));
        assert!(manager.get_class_names_path(NAME).ends_with("mobilenet-v2-crop/class_names.json"));
    }

    #[test]
    fn test_missing_model_is_reported() {
        let (_dir, manager) = temp_manager();
        let info = info_for(b"model", b"[]");
        assert!(!manager.is_model_downloaded(NAME));
        assert!(!manager.verify_model(&info).unwrap());
        assert!(matches!(manager.require_model(NAME), Err(ModelError::NotDownloaded(_))));
    }

    #[test]
    fn test_verification_detects_corruption() {
        let (_dir, manager) = temp_manager();
        let info = info_for(b"model weights", b"[\"Corn: Healthy\"]");
        write_artifacts(&manager, b"model weights", b"[\"Corn: Healthy\"]");
        assert!(manager.verify_model(&info).unwrap());

        fs::write(manager.get_model_path(NAME), "corrupted data").unwrap();
        assert!(manager.is_model_downloaded(NAME));
        assert!(!manager.verify_model(&info).unwrap());

        manager.remove_download(NAME).unwrap();
        assert!(!manager.is_model_downloaded(NAME));
    }

    #[tokio::test]
    async fn test_verified_files_skip_download() {
        // The URLs point at a closed port, so success proves nothing was fetched.
        let (_dir, manager) = temp_manager();
        let info = info_for(b"model weights", b"[]");
        write_artifacts(&manager, b"model weights", b"[]");
        manager.ensure_model_downloaded(&info).await.unwrap();
        assert!(manager.is_model_downloaded(NAME));
    }

    #[tokio::test]
    async fn test_failed_download_cleans_up() {
        let (_dir, manager) = temp_manager();
        let info = info_for(b"model weights", b"[]");
        // Class names are valid but the model is corrupt and cannot be refetched.
        write_artifacts(&manager, b"stale", b"[]");
        assert!(manager.download_model(&info).await.is_err());
        assert!(!manager.get_model_path(NAME).exists());
        assert!(!manager.get_class_names_path(NAME).exists());
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_default_models_dir() {
        env::set_var("CROPDOC_CACHE", "/tmp/test-cropdoc-cache");
        let path = ModelManager::get_default_models_dir();
        assert!(path.to_str().unwrap().contains("/tmp/test-cropdoc-cache/models"));
        env::remove_var("CROPDOC_CACHE");

        let path = ModelManager::get_default_models_dir();
        assert!(path.to_str().unwrap().contains("cropdoc"));
    }
}

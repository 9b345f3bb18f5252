//! Model location
//!
//! Resolves the weight file to a local path, downloading it on first run.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::LocateError;
use crate::storage::huggingface::{download_model, HuggingFaceUrl};
use crate::types::progress::{ProgressCallback, ProgressTracker};

#[async_trait]
pub trait ModelLocator: Send + Sync {
    /// Resolve a local model path, reporting download progress in percent
    async fn resolve(&self, progress: ProgressCallback) -> Result<PathBuf, LocateError>;
}

/// Looks for the model locally and falls back to the HuggingFace Hub
#[derive(Debug, Clone)]
pub struct HubLocator {
    /// Explicit path that bypasses every other lookup
    pub model_path: Option<PathBuf>,
    pub models_dir: PathBuf,
    /// Hub reference; empty means "use whatever is in `models_dir`"
    pub source: String,
}

impl HubLocator {
    pub fn new(model_path: Option<PathBuf>, models_dir: PathBuf, source: impl Into<String>) -> Self {
        Self {
            model_path,
            models_dir,
            source: source.into(),
        }
    }
}

/// First `.gguf` file in `dir`, in name order
pub fn find_local_model(dir: &Path) -> Option<PathBuf> {
    let pattern = dir.join("*.gguf");
    let mut found: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    found.sort();
    found.into_iter().next()
}

#[async_trait]
impl ModelLocator for HubLocator {
    async fn resolve(&self, progress: ProgressCallback) -> Result<PathBuf, LocateError> {
        if let Some(path) = &self.model_path {
            if path.is_file() {
                tracing::info!("Using configured model path {:?}", path);
                progress(100);
                return Ok(path.clone());
            }
            return Err(LocateError::NotFound(path.display().to_string()));
        }

        if self.source.trim().is_empty() {
            return match find_local_model(&self.models_dir) {
                Some(path) => {
                    tracing::info!("Using local model {:?}", path);
                    progress(100);
                    Ok(path)
                }
                None => Err(LocateError::NotFound(self.models_dir.display().to_string())),
            };
        }

        let reference = HuggingFaceUrl::parse(&self.source)?;
        let mut tracker = ProgressTracker::new(progress.clone());
        let downloaded = download_model(&reference, &self.models_dir, move |done, total| {
            tracker.report_bytes(done, total);
        })
        .await;
        match downloaded {
            Ok(path) => Ok(path),
            Err(e) => fall_back_to_local(e, &reference, &self.models_dir, progress),
        }
    }
}

/// A repo-only reference needs the Hub to pick a file. When that fails,
/// whatever an earlier run left in `models_dir` is still usable.
fn fall_back_to_local(
    error: LocateError,
    reference: &HuggingFaceUrl,
    models_dir: &Path,
    progress: ProgressCallback,
) -> Result<PathBuf, LocateError> {
    if !reference.filename.is_empty() {
        return Err(error);
    }
    match find_local_model(models_dir) {
        Some(path) => {
            tracing::warn!("{}; using local model {:?}", error, path);
            progress(100);
            Ok(path)
        }
        None => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::progress::no_progress;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("custom.gguf");
        std::fs::write(&model, b"GGUF").unwrap();

        let locator = HubLocator::new(Some(model.clone()), dir.path().to_path_buf(), "owner/repo/x.gguf");
        assert_eq!(locator.resolve(no_progress()).await.unwrap(), model);
    }

    #[tokio::test]
    async fn test_missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let locator = HubLocator::new(
            Some(dir.path().join("nope.gguf")),
            dir.path().to_path_buf(),
            "",
        );
        assert!(matches!(
            locator.resolve(no_progress()).await,
            Err(LocateError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_scan_when_no_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.gguf"), b"GGUF").unwrap();
        std::fs::write(dir.path().join("a.gguf"), b"GGUF").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let locator = HubLocator::new(None, dir.path().to_path_buf(), "");
        let path = locator
            .resolve(Arc::new(move |p: u8| sink.lock().unwrap().push(p)))
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("a.gguf"));
        assert_eq!(*seen.lock().unwrap(), vec![100]);
    }

    #[tokio::test]
    async fn test_empty_models_dir() {
        let dir = tempfile::tempdir().unwrap();
        let locator = HubLocator::new(None, dir.path().to_path_buf(), "");
        assert!(locator.resolve(no_progress()).await.is_err());
    }

    #[tokio::test]
    async fn test_downloaded_file_is_found_offline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.gguf"), b"GGUF").unwrap();
        let locator = HubLocator::new(None, dir.path().to_path_buf(), "owner/repo/model.gguf");
        assert_eq!(
            locator.resolve(no_progress()).await.unwrap(),
            dir.path().join("model.gguf")
        );
    }

    #[test]
    fn test_repo_only_source_falls_back_offline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cached.gguf"), b"GGUF").unwrap();
        let reference = HuggingFaceUrl::parse("owner/repo").unwrap();
        let offline = || LocateError::Download("failed to fetch repo info".to_string());

        let path = fall_back_to_local(offline(), &reference, dir.path(), no_progress()).unwrap();
        assert_eq!(path, dir.path().join("cached.gguf"));

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(
            fall_back_to_local(offline(), &reference, empty.path(), no_progress()),
            Err(LocateError::Download(_))
        ));
    }

    #[test]
    fn test_named_file_does_not_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("other.gguf"), b"GGUF").unwrap();
        let reference = HuggingFaceUrl::parse("owner/repo/wanted.gguf").unwrap();

        let result = fall_back_to_local(
            LocateError::Download("offline".to_string()),
            &reference,
            dir.path(),
            no_progress(),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invalid_source() {
        let dir = tempfile::tempdir().unwrap();
        let locator = HubLocator::new(None, dir.path().to_path_buf(), "not-a-repo");
        assert!(matches!(
            locator.resolve(no_progress()).await,
            Err(LocateError::InvalidReference(_))
        ));
    }
}

//! Settings storage
//!
//! Manages persistence of model, engine and sampling preferences.

use crate::inference::prompt::DEFAULT_SYSTEM_PROMPT;
use crate::storage::{get_data_dir, StorageError};
use crate::system::hardware::HardwareProfile;
use crate::types::config::{SamplingParams, SessionConfig, DEFAULT_STOP};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Model fetched on first run
pub const DEFAULT_MODEL_SOURCE: &str =
    "Qwen/Qwen2.5-0.5B-Instruct-GGUF/qwen2.5-0.5b-instruct-q4_k_m.gguf";

const VALID_CONTEXT_SIZES: [u32; 6] = [512, 1024, 2048, 4096, 8192, 16384];

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// HuggingFace reference of the model to download when none is present
    pub model_source: String,
    /// Explicit model file, bypassing lookup and download
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    /// Directory where model files (.gguf) are stored
    pub models_directory: PathBuf,
    /// System prompt placed before every user turn
    pub system_prompt: String,
    /// Context window size
    pub context_size: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Worker threads (0 = pick from the host)
    #[serde(default)]
    pub threads: u32,
    /// GPU layers to offload; `None` lets the hardware profile decide
    #[serde(default)]
    pub gpu_layers: Option<u32>,
    #[serde(default = "default_seed")]
    pub seed: u32,
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
    /// Temperature parameter for text generation (0.0 - 2.0)
    pub temperature: f32,
    /// Top-k sampling parameter
    pub top_k: u32,
    /// Top-p (nucleus sampling) parameter (0.0 - 1.0)
    pub top_p: f32,
    #[serde(default = "default_stop")]
    pub stop: Vec<String>,
}

fn default_batch_size() -> u32 {
    512
}

fn default_seed() -> u32 {
    1234
}

fn default_stop() -> Vec<String> {
    DEFAULT_STOP.iter().map(|s| s.to_string()).collect()
}

impl Default for AppSettings {
    fn default() -> Self {
        let session = SessionConfig::default();
        let sampling = SamplingParams::default();
        Self {
            model_source: DEFAULT_MODEL_SOURCE.to_string(),
            model_path: None,
            models_directory: get_data_dir()
                .ok()
                .map(|d| d.join("models"))
                .unwrap_or_else(|| PathBuf::from("./models")),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            context_size: session.context_size,
            batch_size: session.batch_size,
            threads: session.threads,
            gpu_layers: None,
            seed: session.seed,
            max_tokens: sampling.max_tokens,
            temperature: sampling.temperature,
            top_k: sampling.top_k,
            top_p: sampling.top_p,
            stop: sampling.stop,
        }
    }
}

impl AppSettings {
    /// Validate settings values
    ///
    /// Ensures all parameters are within acceptable ranges.
    pub fn validate(&mut self) {
        self.temperature = self.temperature.clamp(0.0, 2.0);
        self.top_p = self.top_p.clamp(0.0, 1.0);

        if self.top_k == 0 {
            self.top_k = 40;
        }

        if !VALID_CONTEXT_SIZES.contains(&self.context_size) {
            let requested = self.context_size as i64;
            self.context_size = VALID_CONTEXT_SIZES
                .iter()
                .copied()
                .min_by_key(|&size| (size as i64 - requested).abs())
                .unwrap_or(2048);
        }

        self.batch_size = self.batch_size.clamp(1, self.context_size);

        // Can't generate more than the context allows
        self.max_tokens = self.max_tokens.max(1);
        if self.max_tokens > self.context_size {
            self.max_tokens = self.context_size / 2;
        }

        self.stop.retain(|s| !s.is_empty());

        if self.system_prompt.trim().is_empty() {
            self.system_prompt = DEFAULT_SYSTEM_PROMPT.to_string();
        }
    }

    /// Apply `POCKETCHAT_MODEL_PATH` / `POCKETCHAT_MODELS_DIR` overrides
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = env_path("POCKETCHAT_MODEL_PATH") {
            tracing::info!("Model path overridden from environment: {:?}", path);
            self.model_path = Some(path);
        }
        if let Some(dir) = env_path("POCKETCHAT_MODELS_DIR") {
            self.models_directory = dir;
        }
    }

    /// Engine parameters, with automatic values filled in from `hardware`
    pub fn session_config(&self, hardware: &HardwareProfile) -> SessionConfig {
        SessionConfig {
            context_size: self.context_size,
            batch_size: self.batch_size,
            threads: if self.threads == 0 {
                hardware.recommended_threads()
            } else {
                self.threads
            },
            gpu_layers: self
                .gpu_layers
                .unwrap_or_else(|| hardware.recommended_gpu_layers()),
            seed: self.seed,
        }
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_k: self.top_k,
            top_p: self.top_p,
            stop: self.stop.clone(),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// Get the settings file path
fn get_settings_path() -> Result<PathBuf, StorageError> {
    Ok(get_data_dir()?.join("settings.json"))
}

/// Load settings from disk
///
/// Returns default settings if the file is unreadable or corrupted. On first
/// run the defaults are written out so they can be edited.
pub fn load_settings() -> AppSettings {
    let mut settings = match get_settings_path().and_then(|path| load_or_seed_settings(&path)) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            AppSettings::default()
        }
    };
    settings.apply_env_overrides();
    settings
}

/// Like [`load_settings_from`], but writes the defaults when `path` is missing
pub fn load_or_seed_settings(path: &Path) -> Result<AppSettings, StorageError> {
    let existed = path.exists();
    let settings = load_settings_from(path)?;
    if !existed {
        save_settings_to(&settings, path)?;
        tracing::info!("Wrote default settings to {:?}", path);
    }
    Ok(settings)
}

/// Load and validate settings from `path`; a missing file yields defaults
pub fn load_settings_from(path: &Path) -> Result<AppSettings, StorageError> {
    if !path.exists() {
        tracing::info!("Settings file not found, using defaults");
        return Ok(AppSettings::default());
    }

    let json = fs::read_to_string(path)?;
    let mut settings: AppSettings = serde_json::from_str(&json)?;
    settings.validate();

    tracing::debug!("Loaded settings from {:?}", path);
    Ok(settings)
}

/// Save settings to `path`, creating parent directories
pub fn save_settings_to(settings: &AppSettings, path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;

    tracing::debug!("Saved settings to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::hardware::GpuBackend;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.max_tokens, 200);
        assert_eq!(settings.model_source, DEFAULT_MODEL_SOURCE);
        assert_eq!(settings.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(settings.stop.len(), 3);
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = AppSettings::default();

        settings.temperature = 5.0;
        settings.validate();
        assert_eq!(settings.temperature, 2.0);

        settings.temperature = -1.0;
        settings.validate();
        assert_eq!(settings.temperature, 0.0);

        settings.top_p = 2.0;
        settings.validate();
        assert_eq!(settings.top_p, 1.0);

        settings.context_size = 3000;
        settings.validate();
        assert_eq!(settings.context_size, 2048);

        settings.max_tokens = 100_000;
        settings.batch_size = 100_000;
        settings.validate();
        assert_eq!(settings.max_tokens, 1024);
        assert_eq!(settings.batch_size, 2048);

        settings.stop = vec![String::new(), "<|im_end|>".to_string()];
        settings.system_prompt = "  ".to_string();
        settings.validate();
        assert_eq!(settings.stop, vec!["<|im_end|>"]);
        assert_eq!(settings.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_session_config_uses_hardware_for_auto_values() {
        let hardware = HardwareProfile {
            cpu_threads: 8,
            gpu_backend: GpuBackend::Metal,
        };
        let mut settings = AppSettings::default();
        let config = settings.session_config(&hardware);
        assert_eq!(config.threads, hardware.recommended_threads());
        assert_eq!(config.gpu_layers, hardware.recommended_gpu_layers());

        settings.threads = 2;
        settings.gpu_layers = Some(0);
        let config = settings.session_config(&hardware);
        assert_eq!(config.threads, 2);
        assert_eq!(config.gpu_layers, 0);
    }

    #[test]
    fn test_settings_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = AppSettings::default();
        settings.temperature = 0.2;
        settings.model_path = Some(PathBuf::from("/models/custom.gguf"));
        save_settings_to(&settings, &path).unwrap();

        let loaded = load_settings_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_settings_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded.max_tokens, AppSettings::default().max_tokens);
    }

    #[test]
    fn test_first_run_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("settings.json");

        let seeded = load_or_seed_settings(&path).unwrap();
        assert!(path.is_file());
        assert_eq!(seeded, AppSettings::default());

        let mut edited = seeded.clone();
        edited.max_tokens = 64;
        save_settings_to(&edited, &path).unwrap();
        assert_eq!(load_or_seed_settings(&path).unwrap().max_tokens, 64);
    }

    #[test]
    fn test_corrupted_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_settings_from(&path), Err(StorageError::Json(_))));
    }
}

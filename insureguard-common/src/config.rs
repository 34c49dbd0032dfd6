//! Configuration loading and storage root resolution
//!
//! Resolution priority for every setting, highest first:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "IG_CONFIG";

/// Environment variable overriding the storage root
pub const STORAGE_ROOT_ENV_VAR: &str = "IG_STORAGE_ROOT";

/// Top-level TOML configuration file
///
/// Every section is optional; a missing file or section falls back to
/// compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub logging: LoggingConfig,
    pub scoring: ScoringSection,
    pub vision: VisionSection,
    pub text_models: TextModelsSection,
    pub voice: VoiceSection,
    pub uploads: UploadsSection,
}

/// `[server]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Socket address to bind
    pub bind: String,
    /// Directory served as static assets (front-end), if any
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5780".to_string(),
            static_dir: None,
        }
    }
}

/// `[storage]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Root under which request-scoped upload directories are created
    pub root: Option<PathBuf>,
}

/// `[logging]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[scoring]`
///
/// Kept as raw values here; the service validates and converts them into
/// its typed policy objects at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    /// "independent" or "gated"
    pub mode: Option<String>,
    /// "three_tier" (default) or "two_tier"
    pub threshold_preset: Option<String>,
    pub authentic_min: Option<u8>,
    pub suspicious_min: Option<u8>,
    pub voice_match_threshold: f64,
    /// "continuous" (default) or "match_flag"
    pub voice_confidence: Option<String>,
    /// "segmented" (default) or "fixed"
    pub semantic_consistency: Option<String>,
    pub weights: WeightsSection,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            mode: None,
            threshold_preset: None,
            authentic_min: None,
            suspicious_min: None,
            voice_match_threshold: 0.55,
            voice_confidence: None,
            semantic_consistency: None,
            weights: WeightsSection::default(),
        }
    }
}

/// `[scoring.weights]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsSection {
    pub sentiment: f64,
    pub entity: f64,
    pub semantic: f64,
    pub fraud: f64,
}

impl Default for WeightsSection {
    fn default() -> Self {
        Self {
            sentiment: 0.35,
            entity: 0.25,
            semantic: 0.20,
            fraud: 0.20,
        }
    }
}

/// `[vision]` - remote document risk assessment API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSection {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for VisionSection {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// `[text_models]` - hosted inference endpoints for the text signals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextModelsSection {
    pub base_url: String,
    pub api_token: Option<String>,
    pub sentiment_model: String,
    pub ner_model: String,
    pub semantic_model: String,
    pub zero_shot_model: String,
    pub timeout_secs: u64,
}

impl Default for TextModelsSection {
    fn default() -> Self {
        Self {
            base_url: "https://api-inference.huggingface.co".to_string(),
            api_token: None,
            sentiment_model: "yiyanghkust/finbert-tone".to_string(),
            ner_model: "dslim/bert-base-NER".to_string(),
            semantic_model: "sentence-transformers/all-mpnet-base-v2".to_string(),
            zero_shot_model: "facebook/bart-large-mnli".to_string(),
            timeout_secs: 30,
        }
    }
}

/// `[voice]` - speaker embedding service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSection {
    pub encoder_url: String,
    pub timeout_secs: u64,
}

impl Default for VoiceSection {
    fn default() -> Self {
        Self {
            encoder_url: "http://127.0.0.1:5781/embed".to_string(),
            timeout_secs: 30,
        }
    }
}

/// `[uploads]` - per-modality payload limits in bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadsSection {
    pub max_image_bytes: usize,
    pub max_voice_bytes: usize,
    pub max_text_bytes: usize,
}

impl Default for UploadsSection {
    fn default() -> Self {
        Self {
            max_image_bytes: 5 * 1024 * 1024,
            max_voice_bytes: 10 * 1024 * 1024,
            max_text_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Locate the config file to load.
///
/// Priority: explicit path → `IG_CONFIG` → `<config_dir>/insureguard/config.toml`.
/// Returns `None` when nothing is found (defaults apply).
pub fn locate_config_file(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("insureguard").join("config.toml"))?;
    if user_config.exists() {
        Some(user_config)
    } else {
        None
    }
}

/// Load the TOML config, degrading to defaults when the file is missing.
///
/// A file that exists but cannot be parsed is a hard error: silently
/// ignoring a typo in scoring weights would change decisions.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        info!("No config file found, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!("Config file {} not found, using compiled defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Storage root resolution
pub struct StorageRootResolver<'a> {
    cli_arg: Option<&'a Path>,
    toml: &'a TomlConfig,
}

impl<'a> StorageRootResolver<'a> {
    pub fn new(cli_arg: Option<&'a Path>, toml: &'a TomlConfig) -> Self {
        Self { cli_arg, toml }
    }

    /// Resolve following CLI → ENV → TOML → compiled default
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = self.cli_arg {
            return path.to_path_buf();
        }

        if let Ok(path) = std::env::var(STORAGE_ROOT_ENV_VAR) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml.storage.root {
            return path.clone();
        }

        default_storage_root()
    }
}

/// OS-dependent default storage root
pub fn default_storage_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("insureguard"))
        .unwrap_or_else(|| PathBuf::from("./insureguard_data"))
}

/// Create the storage root if missing
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        info!("Created storage root {}", path.display());
    }
    Ok(())
}

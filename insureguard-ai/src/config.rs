//! Configuration resolution for insureguard-ai
//!
//! Turns the raw [`TomlConfig`] plus command-line and environment overrides
//! into validated, typed settings. Every failure here is a [`ConfigError`]
//! and stops startup before any request is served.
//!
//! Priority for each setting: CLI → ENV → TOML → compiled default.

use insureguard_common::config::{StorageRootResolver, TextModelsSection, TomlConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::evaluators::voice::VoiceConfidence;
use crate::scoring::{SemanticMode, ThresholdConfig, ThresholdPreset, WeightConfig};
use crate::types::{ConfigError, EvaluationMode};
use crate::uploads::UploadLimits;

/// Primary vision API key variable
pub const VISION_KEY_ENV_VAR: &str = "IG_VISION_API_KEY";

/// Fallback vision API key variable
pub const VISION_KEY_FALLBACK_ENV_VAR: &str = "GEMINI_API_KEY";

pub const BIND_ENV_VAR: &str = "IG_BIND";
pub const MODE_ENV_VAR: &str = "IG_MODE";

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<String>,
    pub storage_root: Option<PathBuf>,
    pub mode: Option<EvaluationMode>,
    pub static_dir: Option<PathBuf>,
}

/// Vision client settings
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// Hosted text model settings
#[derive(Debug, Clone)]
pub struct TextModelsConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub sentiment_model: String,
    pub ner_model: String,
    pub semantic_model: String,
    pub zero_shot_model: String,
    pub timeout: Duration,
}

impl From<&TextModelsSection> for TextModelsConfig {
    fn from(section: &TextModelsSection) -> Self {
        Self {
            base_url: section.base_url.clone(),
            api_token: section.api_token.clone().filter(|t| is_valid_key(t)),
            sentiment_model: section.sentiment_model.clone(),
            ner_model: section.ner_model.clone(),
            semantic_model: section.semantic_model.clone(),
            zero_shot_model: section.zero_shot_model.clone(),
            timeout: Duration::from_secs(section.timeout_secs),
        }
    }
}

impl Default for TextModelsConfig {
    fn default() -> Self {
        Self::from(&TextModelsSection::default())
    }
}

/// Speaker encoder settings
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub encoder_url: String,
    pub timeout: Duration,
}

/// Scoring policy handed to the engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub weights: WeightConfig,
    pub semantic_mode: SemanticMode,
    /// Similarity at or above which the speakers match, in [0,1]
    pub voice_match_threshold: f64,
    pub voice_confidence: VoiceConfidence,
    /// Whole-evaluation deadlines (a modality may make several calls)
    pub image_timeout: Duration,
    pub text_timeout: Duration,
    pub voice_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            weights: WeightConfig::default(),
            semantic_mode: SemanticMode::default(),
            voice_match_threshold: 0.55,
            voice_confidence: VoiceConfidence::default(),
            image_timeout: Duration::from_secs(60),
            text_timeout: Duration::from_secs(60),
            voice_timeout: Duration::from_secs(60),
        }
    }
}

impl EngineSettings {
    /// # Errors
    /// `ConfigError` if the voice match threshold lies outside [0,1]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        if !(0.0..=1.0).contains(&self.voice_match_threshold) {
            return Err(ConfigError::Invalid(format!(
                "voice_match_threshold must be within [0,1] (got {})",
                self.voice_match_threshold
            )));
        }
        Ok(())
    }
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind: String,
    pub storage_root: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub log_level: String,
    pub mode: EvaluationMode,
    pub thresholds: ThresholdConfig,
    pub engine: EngineSettings,
    pub vision: VisionConfig,
    pub text_models: TextModelsConfig,
    pub voice: VoiceConfig,
    pub upload_limits: UploadLimits,
}

impl ServiceConfig {
    /// Resolve and validate every setting
    ///
    /// # Errors
    /// `ConfigError` on invalid policy values or a missing vision credential
    pub fn resolve(toml: &TomlConfig, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let scoring = &toml.scoring;

        let mode = resolve_mode(overrides.mode, scoring.mode.as_deref())?;
        let thresholds = resolve_thresholds(toml)?;

        let weights = WeightConfig::new(
            scoring.weights.sentiment,
            scoring.weights.entity,
            scoring.weights.semantic,
            scoring.weights.fraud,
        )?;
        let semantic_mode: SemanticMode = scoring
            .semantic_consistency
            .as_deref()
            .map(str::parse)
            .transpose()?
            .unwrap_or_default();
        let voice_confidence: VoiceConfidence = scoring
            .voice_confidence
            .as_deref()
            .map(str::parse)
            .transpose()?
            .unwrap_or_default();

        let vision_timeout = Duration::from_secs(toml.vision.timeout_secs);
        let text_models = TextModelsConfig::from(&toml.text_models);
        let voice_timeout = Duration::from_secs(toml.voice.timeout_secs);

        let engine = EngineSettings {
            weights,
            semantic_mode,
            voice_match_threshold: scoring.voice_match_threshold,
            voice_confidence,
            image_timeout: vision_timeout * 2,
            text_timeout: text_models.timeout * 2,
            // Two embeddings per comparison
            voice_timeout: voice_timeout * 2,
        };
        engine.validate()?;

        let vision = VisionConfig {
            endpoint: toml.vision.endpoint.clone(),
            model: toml.vision.model.clone(),
            api_key: resolve_vision_api_key(toml)?,
            timeout: vision_timeout,
        };

        let bind = resolve_bind(overrides.bind.as_deref(), &toml.server.bind);
        let storage_root =
            StorageRootResolver::new(overrides.storage_root.as_deref(), toml).resolve();
        let static_dir = overrides
            .static_dir
            .clone()
            .or_else(|| toml.server.static_dir.clone());

        Ok(Self {
            bind,
            storage_root,
            static_dir,
            log_level: toml.logging.level.clone(),
            mode,
            thresholds,
            engine,
            vision,
            text_models,
            voice: VoiceConfig {
                encoder_url: toml.voice.encoder_url.clone(),
                timeout: voice_timeout,
            },
            upload_limits: UploadLimits::from(&toml.uploads),
        })
    }
}

fn resolve_mode(cli: Option<EvaluationMode>, toml: Option<&str>) -> Result<EvaluationMode, ConfigError> {
    if let Some(mode) = cli {
        return Ok(mode);
    }
    if let Ok(value) = std::env::var(MODE_ENV_VAR) {
        if !value.trim().is_empty() {
            return value.parse();
        }
    }
    toml.map(str::parse).transpose().map(Option::unwrap_or_default)
}

fn resolve_bind(cli: Option<&str>, toml: &str) -> String {
    if let Some(bind) = cli {
        return bind.to_string();
    }
    match std::env::var(BIND_ENV_VAR) {
        Ok(bind) if !bind.trim().is_empty() => bind,
        _ => toml.to_string(),
    }
}

/// Preset first, then individual bound overrides on top of it
pub fn resolve_thresholds(toml: &TomlConfig) -> Result<ThresholdConfig, ConfigError> {
    let scoring = &toml.scoring;
    let preset: ThresholdPreset = scoring
        .threshold_preset
        .as_deref()
        .map(str::parse)
        .transpose()?
        .unwrap_or_default();
    let base = ThresholdConfig::preset(preset);

    if scoring.authentic_min.is_none() && scoring.suspicious_min.is_none() {
        return Ok(base);
    }
    ThresholdConfig::new(
        scoring.authentic_min.unwrap_or(base.authentic_min()),
        scoring.suspicious_min.unwrap_or(base.suspicious_min()),
    )
}

/// Resolve the vision API key
///
/// **Priority:** `IG_VISION_API_KEY` → `GEMINI_API_KEY` → TOML
pub fn resolve_vision_api_key(toml: &TomlConfig) -> Result<String, ConfigError> {
    let candidates = [
        (VISION_KEY_ENV_VAR, std::env::var(VISION_KEY_ENV_VAR).ok()),
        (
            VISION_KEY_FALLBACK_ENV_VAR,
            std::env::var(VISION_KEY_FALLBACK_ENV_VAR).ok(),
        ),
        ("TOML", toml.vision.api_key.clone()),
    ];

    let sources: Vec<&str> = candidates
        .iter()
        .filter(|(_, key)| key.as_deref().is_some_and(is_valid_key))
        .map(|(source, _)| *source)
        .collect();

    if sources.len() > 1 {
        warn!(
            "Vision API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    for (source, key) in candidates {
        if let Some(key) = key.filter(|k| is_valid_key(k)) {
            info!("Vision API key loaded from {}", source);
            return Ok(key);
        }
    }

    Err(ConfigError::MissingCredential(format!(
        "vision API key not configured. Set one of:\n\
         1. Environment: {}=your-key\n\
         2. Environment: {}=your-key\n\
         3. TOML config: [vision] api_key = \"your-key\"",
        VISION_KEY_ENV_VAR, VISION_KEY_FALLBACK_ENV_VAR
    )))
}

/// Non-empty, non-whitespace
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

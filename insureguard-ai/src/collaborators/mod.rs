//! External analyzers consumed by the evaluators
//!
//! The core depends only on the traits below. Concrete HTTP-backed clients are
//! created once at startup and shared read-only across requests.
//!
//! # Example
//! ```rust,ignore
//! use insureguard_ai::collaborators::{ImageAnalyzer, ImageAssessment};
//!
//! pub struct FixedRisk(f64);
//!
//! #[async_trait::async_trait]
//! impl ImageAnalyzer for FixedRisk {
//!     fn name(&self) -> &'static str { "fixed" }
//!
//!     async fn analyze_image(&self, _path: &Path) -> Result<ImageAssessment, CollaboratorError> {
//!         Ok(ImageAssessment::scored(self.0))
//!     }
//! }
//! ```

pub mod inference_client;
pub mod json_extract;
pub mod speaker_client;
pub mod vision_client;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::ServiceConfig;
use crate::types::{CollaboratorError, ConfigError};

pub use inference_client::InferenceTextClient;
pub use speaker_client::SpeakerEmbeddingClient;
pub use vision_client::VisionRiskClient;

/// Label → probability
pub type LabelDistribution = BTreeMap<String, f64>;

/// Document image risk assessment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageAssessment {
    /// Risk in [0,1]
    pub risk_level: f64,
    /// The collaborator answer could not be parsed; `risk_level` is a default
    pub degraded: bool,
    pub summary: Option<String>,
    pub explanation: Option<String>,
}

impl ImageAssessment {
    pub fn scored(risk_level: f64) -> Self {
        Self {
            risk_level,
            degraded: false,
            summary: None,
            explanation: None,
        }
    }
}

/// One extracted entity span
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySpan {
    pub group: String,
    pub span: String,
    pub confidence: f64,
}

/// Speaker verification answer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceMatch {
    /// Continuous similarity in [0,1]
    Similarity(f64),
    /// Only a match decision is available
    Decision(bool),
}

/// Document image analyzer
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// Analyzer name for logs
    fn name(&self) -> &'static str;

    /// Assess the fraud risk of a claim document image
    async fn analyze_image(&self, path: &Path) -> Result<ImageAssessment, CollaboratorError>;
}

/// The four text signal collaborators
#[async_trait]
pub trait TextSignalAnalyzer: Send + Sync {
    /// Distribution over neutral / positive / negative
    async fn sentiment(&self, text: &str) -> Result<LabelDistribution, CollaboratorError>;

    /// Extracted entity spans with per-span confidence
    async fn entities(&self, text: &str) -> Result<Vec<EntitySpan>, CollaboratorError>;

    /// Average pairwise similarity across at least two segments
    async fn semantic_similarity(&self, segments: &[String]) -> Result<f64, CollaboratorError>;

    /// Distribution over fraudulent / legitimate
    async fn fraud_classification(&self, text: &str) -> Result<LabelDistribution, CollaboratorError>;
}

/// Speaker verification
#[async_trait]
pub trait VoiceMatcher: Send + Sync {
    /// Compare a claim recording against a reference recording
    async fn compare(&self, sample: &Path, reference: &Path) -> Result<VoiceMatch, CollaboratorError>;
}

/// Process-wide collaborator handles
///
/// Built once by [`Collaborators::connect`], then cloned (cheaply, via `Arc`)
/// into the engine. Never reconfigured per request.
#[derive(Clone)]
pub struct Collaborators {
    pub image: Arc<dyn ImageAnalyzer>,
    pub text: Arc<dyn TextSignalAnalyzer>,
    pub voice: Arc<dyn VoiceMatcher>,
}

impl Collaborators {
    /// Create the HTTP-backed clients from resolved configuration
    ///
    /// # Errors
    /// `ConfigError` if a client cannot be constructed
    pub fn connect(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let vision = VisionRiskClient::new(
            &config.vision.endpoint,
            &config.vision.model,
            config.vision.api_key.clone(),
            config.vision.timeout,
        )
        .map_err(|e| ConfigError::Invalid(format!("vision client: {}", e)))?;

        let text = InferenceTextClient::new(config.text_models.clone())
            .map_err(|e| ConfigError::Invalid(format!("text inference client: {}", e)))?;

        let voice = SpeakerEmbeddingClient::new(&config.voice.encoder_url, config.voice.timeout)
            .map_err(|e| ConfigError::Invalid(format!("speaker encoder client: {}", e)))?;

        info!(
            vision_model = %config.vision.model,
            text_base_url = %config.text_models.base_url,
            voice_encoder = %config.voice.encoder_url,
            "Collaborator clients initialized"
        );

        Ok(Self {
            image: Arc::new(vision),
            text: Arc::new(text),
            voice: Arc::new(voice),
        })
    }
}

/// Translate a transport failure, keeping timeouts distinguishable
pub(crate) fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> CollaboratorError {
    if err.is_timeout() {
        CollaboratorError::Timeout(timeout)
    } else if err.is_decode() {
        CollaboratorError::Parse(err.to_string())
    } else {
        CollaboratorError::Network(err.to_string())
    }
}

/// Fail with `Api` on non-success status, keeping the body for diagnostics
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CollaboratorError::Api {
        status: status.as_u16(),
        body: truncate(&body, 512),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

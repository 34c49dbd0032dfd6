//! Core types shared by the scoring policy, the evaluators and the engine
//!
//! Evidence flows through three layers:
//! - **Collaborators:** external analyzers (vision API, text models, speaker encoder)
//! - **Evaluators:** one per modality, converting raw collaborator output into a
//!   uniform [`ModalityResult`] and isolating failures
//! - **Engine:** orchestrates the evaluators and aggregates a [`FraudReport`]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::scoring::CombinedTextScore;

// ============================================================================
// Modalities and per-modality results
// ============================================================================

/// Evidence channel evaluated independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Image,
    Text,
    Voice,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Image => "image",
            Modality::Text => "text",
            Modality::Voice => "voice",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status bucket of one modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModalityStatus {
    Authentic,
    Suspicious,
    Fraudulent,
    Error,
}

impl ModalityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModalityStatus::Authentic => "authentic",
            ModalityStatus::Suspicious => "suspicious",
            ModalityStatus::Fraudulent => "fraudulent",
            ModalityStatus::Error => "error",
        }
    }
}

impl fmt::Display for ModalityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform result of evaluating one modality
#[derive(Debug, Clone, Serialize)]
pub struct ModalityResult {
    pub modality: Modality,

    /// Risk on the [0,1] axis; `None` for error results
    pub risk_score: Option<f64>,

    /// round((1 - risk) * 100)
    pub confidence: u8,

    pub status: ModalityStatus,

    /// Human-readable evidence, in the order it was produced
    pub indicators: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Produced from partial or defaulted evidence
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,

    /// `risk_score` is a fallback, not a measurement; excluded from aggregation
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub risk_defaulted: bool,

    /// Voice only: similarity met the match threshold
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub voice_match: Option<bool>,

    /// Text only: every intermediate signal, for audit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_signals: Option<CombinedTextScore>,
}

impl ModalityResult {
    /// Error result: zero confidence, no risk, cause recorded
    pub fn error(modality: Modality, message: impl Into<String>) -> Self {
        Self {
            modality,
            risk_score: None,
            confidence: 0,
            status: ModalityStatus::Error,
            indicators: Vec::new(),
            error: Some(message.into()),
            degraded: false,
            risk_defaulted: false,
            voice_match: None,
            text_signals: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ModalityStatus::Error
    }

    /// Risk contributed to the overall mean, if any
    pub fn aggregate_risk(&self) -> Option<f64> {
        if self.is_error() || self.risk_defaulted {
            None
        } else {
            self.risk_score
        }
    }
}

// ============================================================================
// Requests and reports
// ============================================================================

/// Engine operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    /// Every provided modality is evaluated concurrently
    #[default]
    Independent,
    /// Voice verification first; a non-match stops the pipeline
    Gated,
}

impl EvaluationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationMode::Independent => "independent",
            EvaluationMode::Gated => "gated",
        }
    }
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvaluationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "independent" => Ok(EvaluationMode::Independent),
            "gated" => Ok(EvaluationMode::Gated),
            other => Err(ConfigError::Invalid(format!(
                "unknown evaluation mode '{}' (expected 'independent' or 'gated')",
                other
            ))),
        }
    }
}

/// One piece of submitted evidence: usable, or rejected during intake
#[derive(Debug, Clone, PartialEq)]
pub enum Submission<T> {
    Provided(T),
    /// Validation failure; reported as an error result without calling any collaborator
    Rejected(String),
}

/// Voice verification input: the claim recording and the enrolled reference
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceEvidence {
    pub sample: PathBuf,
    pub reference: PathBuf,
}

/// Evidence for a single request; absent modalities are omitted from the report
#[derive(Debug, Clone, Default)]
pub struct Evidence {
    pub image: Option<Submission<PathBuf>>,
    pub text: Option<Submission<String>>,
    pub voice: Option<Submission<VoiceEvidence>>,
}

impl Evidence {
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.text.is_none() && self.voice.is_none()
    }
}

/// Final decision label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallLabel {
    Risk,
    NotRisk,
    Incomplete,
}

impl OverallLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallLabel::Risk => "RISK",
            OverallLabel::NotRisk => "NOT_RISK",
            OverallLabel::Incomplete => "INCOMPLETE",
        }
    }
}

impl fmt::Display for OverallLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal artifact of one request, owned by the caller
#[derive(Debug, Clone, Serialize)]
pub struct FraudReport {
    pub request_id: Uuid,
    pub mode: EvaluationMode,
    pub per_modality: BTreeMap<Modality, ModalityResult>,
    pub overall_risk: Option<f64>,
    pub overall_confidence: Option<u8>,
    pub overall_label: OverallLabel,
    /// The voice gate stopped evaluation before image/text ran
    pub gating_applied: bool,
}

// ============================================================================
// Errors
// ============================================================================

/// Failure reported by an external analyzer
///
/// Always recovered at the evaluator boundary.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// I/O error reading evidence
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Call exceeded its deadline
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success response
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Response could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Collaborator cannot serve this request
    #[error("Collaborator not available: {0}")]
    NotAvailable(String),
}

/// Invalid startup configuration; fatal before any request is served
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("signal weights must sum to 1.0 (got {sum:.6})")]
    WeightSum { sum: f64 },

    #[error("signal weight '{name}' must be a non-negative finite number (got {value})")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("threshold bounds inverted: authentic_min {authentic_min} < suspicious_min {suspicious_min}")]
    InvertedThresholds { authentic_min: u8, suspicious_min: u8 },

    #[error("threshold bound {0} exceeds 100")]
    ThresholdOutOfRange(u8),

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Request-level engine failure
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request was cancelled; partial results are discarded
    #[error("evaluation cancelled")]
    Cancelled,

    /// Gated mode requires voice evidence
    #[error("gated evaluation requires voice evidence")]
    MissingGateEvidence,
}

//! Weighted ensemble of four textual signals
//!
//! combined = Σ confidence(signal) × weight(signal)
//!
//! Each signal comes from an independent collaborator call. A failed call
//! yields a zero-confidence signal for that name instead of aborting the
//! whole text evaluation.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::collaborators::{EntitySpan, LabelDistribution, TextSignalAnalyzer};
use crate::types::{CollaboratorError, ConfigError};

/// Allowed deviation of the weight sum from 1.0
pub const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Fraud/legal classification label when P(fraudulent) ≥ P(legitimate)
pub const FRAUD_LABEL: &str = "fraud";

/// Fraud/legal classification label otherwise
pub const LEGAL_LABEL: &str = "legal";

/// Distribution keys expected from the fraud/legal classifier
pub const FRAUDULENT_KEY: &str = "fraudulent";
pub const LEGITIMATE_KEY: &str = "legitimate";

/// Sentiment labels
pub const SENTIMENT_LABELS: [&str; 3] = ["neutral", "positive", "negative"];

/// The four text signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalName {
    Sentiment,
    Entity,
    Semantic,
    Fraud,
}

impl SignalName {
    pub const ALL: [SignalName; 4] = [
        SignalName::Sentiment,
        SignalName::Entity,
        SignalName::Semantic,
        SignalName::Fraud,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalName::Sentiment => "sentiment",
            SignalName::Entity => "entity",
            SignalName::Semantic => "semantic",
            SignalName::Fraud => "fraud",
        }
    }
}

impl fmt::Display for SignalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal weights; immutable once validated
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightConfig {
    sentiment: f64,
    entity: f64,
    semantic: f64,
    fraud: f64,
}

impl WeightConfig {
    /// # Errors
    /// `ConfigError` if any weight is negative or non-finite, or the sum
    /// differs from 1.0 by more than [`WEIGHT_SUM_EPSILON`]
    pub fn new(sentiment: f64, entity: f64, semantic: f64, fraud: f64) -> Result<Self, ConfigError> {
        let weights = Self {
            sentiment,
            entity,
            semantic,
            fraud,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in SignalName::ALL {
            let value = self.get(name);
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    name: name.as_str(),
                    value,
                });
            }
        }
        let sum = self.sentiment + self.entity + self.semantic + self.fraud;
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ConfigError::WeightSum { sum });
        }
        Ok(())
    }

    pub fn get(&self, name: SignalName) -> f64 {
        match name {
            SignalName::Sentiment => self.sentiment,
            SignalName::Entity => self.entity,
            SignalName::Semantic => self.semantic,
            SignalName::Fraud => self.fraud,
        }
    }
}

impl Default for WeightConfig {
    /// 0.35 / 0.25 / 0.20 / 0.20
    fn default() -> Self {
        Self {
            sentiment: 0.35,
            entity: 0.25,
            semantic: 0.20,
            fraud: 0.20,
        }
    }
}

/// How the semantic-consistency signal is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticMode {
    /// Average pairwise similarity across sentence segments; 1.0 below two segments
    #[default]
    Segmented,
    /// Legacy behavior: always 1.0, a fixed neutral contribution
    Fixed,
}

impl FromStr for SemanticMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "segmented" => Ok(SemanticMode::Segmented),
            "fixed" => Ok(SemanticMode::Fixed),
            other => Err(ConfigError::Invalid(format!(
                "unknown semantic consistency mode '{}' (expected 'segmented' or 'fixed')",
                other
            ))),
        }
    }
}

/// Raw output of one signal
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SignalValue {
    Score(f64),
    Distribution(LabelDistribution),
}

/// One named sub-score
#[derive(Debug, Clone, Serialize)]
pub struct SignalResult {
    pub name: SignalName,
    pub raw_value: SignalValue,
    /// Contribution before weighting, in [0,1]
    pub confidence: f64,
    /// Chosen label for distribution-valued signals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Collaborator failure that zeroed this signal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SignalResult {
    fn failed(name: SignalName, err: &CollaboratorError) -> Self {
        Self {
            name,
            raw_value: SignalValue::Score(0.0),
            confidence: 0.0,
            label: None,
            error: Some(err.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Combined text score with every intermediate signal
#[derive(Debug, Clone, Serialize)]
pub struct CombinedTextScore {
    pub per_signal: BTreeMap<SignalName, SignalResult>,
    pub combined_score: f64,
    pub weights_used: WeightConfig,
}

impl CombinedTextScore {
    pub fn signal(&self, name: SignalName) -> Option<&SignalResult> {
        self.per_signal.get(&name)
    }

    /// Fraud/legal label and its probability, when the classifier answered
    pub fn fraud_label(&self) -> Option<(&str, f64)> {
        let signal = self.signal(SignalName::Fraud)?;
        if signal.is_failed() {
            return None;
        }
        signal.label.as_deref().map(|label| (label, signal.confidence))
    }

    pub fn failed_signals(&self) -> Vec<SignalName> {
        self.per_signal
            .values()
            .filter(|s| s.is_failed())
            .map(|s| s.name)
            .collect()
    }
}

/// Weighted four-signal text scorer
pub struct TextEnsembleScorer {
    analyzer: Arc<dyn TextSignalAnalyzer>,
    weights: WeightConfig,
    semantic_mode: SemanticMode,
}

impl TextEnsembleScorer {
    /// # Errors
    /// `ConfigError` if `weights` does not sum to 1.0
    pub fn new(
        analyzer: Arc<dyn TextSignalAnalyzer>,
        weights: WeightConfig,
        semantic_mode: SemanticMode,
    ) -> Result<Self, ConfigError> {
        weights.validate()?;
        Ok(Self {
            analyzer,
            weights,
            semantic_mode,
        })
    }

    pub fn weights(&self) -> &WeightConfig {
        &self.weights
    }

    /// Score one narrative; collaborator calls run concurrently
    pub async fn score(&self, text: &str) -> CombinedTextScore {
        let (sentiment, entities, semantic, fraud) = tokio::join!(
            self.sentiment_signal(text),
            self.entity_signal(text),
            self.semantic_signal(text),
            self.fraud_signal(text),
        );

        let per_signal: BTreeMap<SignalName, SignalResult> = [sentiment, entities, semantic, fraud]
            .into_iter()
            .map(|s| (s.name, s))
            .collect();

        let combined_score = per_signal
            .values()
            .map(|s| s.confidence.clamp(0.0, 1.0) * self.weights.get(s.name))
            .sum::<f64>()
            .clamp(0.0, 1.0);

        debug!(combined_score, "Text ensemble scored");

        CombinedTextScore {
            per_signal,
            combined_score,
            weights_used: self.weights,
        }
    }

    async fn sentiment_signal(&self, text: &str) -> SignalResult {
        let name = SignalName::Sentiment;
        match self.analyzer.sentiment(text).await.and_then(dominant_label) {
            Ok((distribution, label, probability)) => SignalResult {
                name,
                raw_value: SignalValue::Distribution(distribution),
                confidence: probability,
                label: Some(label),
                error: None,
            },
            Err(e) => signal_failure(name, e),
        }
    }

    async fn entity_signal(&self, text: &str) -> SignalResult {
        let name = SignalName::Entity;
        match self.analyzer.entities(text).await {
            Ok(spans) => {
                let average = average_entity_confidence(&spans);
                SignalResult {
                    name,
                    raw_value: SignalValue::Score(average),
                    confidence: average,
                    label: Some(format!("{} entities", spans.len())),
                    error: None,
                }
            }
            Err(e) => signal_failure(name, e),
        }
    }

    async fn semantic_signal(&self, text: &str) -> SignalResult {
        let name = SignalName::Semantic;
        let consistency = match self.semantic_mode {
            SemanticMode::Fixed => Ok(1.0),
            SemanticMode::Segmented => {
                let segments = split_segments(text);
                if segments.len() < 2 {
                    Ok(1.0)
                } else {
                    self.analyzer
                        .semantic_similarity(&segments)
                        .await
                        .map(|s| s.clamp(0.0, 1.0))
                }
            }
        };
        match consistency {
            Ok(score) => SignalResult {
                name,
                raw_value: SignalValue::Score(score),
                confidence: score,
                label: None,
                error: None,
            },
            Err(e) => signal_failure(name, e),
        }
    }

    async fn fraud_signal(&self, text: &str) -> SignalResult {
        let name = SignalName::Fraud;
        let classification = self.analyzer.fraud_classification(text).await.and_then(|d| {
            if d.contains_key(FRAUDULENT_KEY) && d.contains_key(LEGITIMATE_KEY) {
                Ok(d)
            } else {
                Err(CollaboratorError::Parse(format!(
                    "fraud classification lacks '{}'/'{}' probabilities",
                    FRAUDULENT_KEY, LEGITIMATE_KEY
                )))
            }
        });
        match classification {
            Ok(distribution) => {
                let (label, probability) = resolve_fraud_label(&distribution);
                SignalResult {
                    name,
                    raw_value: SignalValue::Distribution(distribution),
                    confidence: probability,
                    label: Some(label.to_string()),
                    error: None,
                }
            }
            Err(e) => signal_failure(name, e),
        }
    }
}

fn signal_failure(name: SignalName, err: CollaboratorError) -> SignalResult {
    warn!(signal = %name, error = %err, "Text signal failed, contributing zero confidence");
    SignalResult::failed(name, &err)
}

/// Argmax of a label distribution; ties resolve to the first label in key order
fn dominant_label(
    distribution: LabelDistribution,
) -> Result<(LabelDistribution, String, f64), CollaboratorError> {
    let (label, probability) = distribution
        .iter()
        .fold(None::<(&String, f64)>, |best, (label, &p)| match best {
            Some((_, best_p)) if best_p >= p => best,
            _ => Some((label, p)),
        })
        .map(|(label, p)| (label.clone(), p.clamp(0.0, 1.0)))
        .ok_or_else(|| CollaboratorError::Parse("empty sentiment distribution".to_string()))?;
    Ok((distribution, label, probability))
}

/// Mean per-span confidence; 0 when no entities were found
pub fn average_entity_confidence(spans: &[EntitySpan]) -> f64 {
    if spans.is_empty() {
        return 0.0;
    }
    let total: f64 = spans.iter().map(|s| s.confidence.clamp(0.0, 1.0)).sum();
    total / spans.len() as f64
}

/// Fraud/legal decision: ties go to fraud
pub fn resolve_fraud_label(distribution: &LabelDistribution) -> (&'static str, f64) {
    let fraudulent = distribution.get(FRAUDULENT_KEY).copied().unwrap_or(0.0);
    let legitimate = distribution.get(LEGITIMATE_KEY).copied().unwrap_or(0.0);
    if fraudulent >= legitimate {
        (FRAUD_LABEL, fraudulent.clamp(0.0, 1.0))
    } else {
        (LEGAL_LABEL, legitimate.clamp(0.0, 1.0))
    }
}

/// Split a narrative into sentence-level segments
///
/// A `.`, `!` or `?` ends a segment only when followed by whitespace or the end
/// of the text, so "$1.5k" stays whole. Newlines always end a segment.
pub fn split_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        let boundary = match c {
            '\n' => true,
            '.' | '!' | '?' => chars.peek().map_or(true, |&(_, next)| next.is_whitespace()),
            _ => false,
        };
        if boundary {
            segments.push(&text[start..idx]);
            start = idx + c.len_utf8();
        }
    }
    segments.push(&text[start..]);

    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .map(str::to_string)
        .collect()
}

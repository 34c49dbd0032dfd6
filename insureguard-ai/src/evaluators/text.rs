//! Claim narrative evaluator
//!
//! The combined ensemble score sits on the risk axis: a higher combined score
//! means higher fraud risk and therefore lower confidence.

use async_trait::async_trait;
use std::time::Duration;

use super::{scored_result, ModalityEvaluator};
use crate::scoring::{SignalName, SignalValue, TextEnsembleScorer, ThresholdConfig};
use crate::types::{CollaboratorError, Modality, ModalityResult};

pub struct TextEvaluator {
    scorer: TextEnsembleScorer,
    timeout: Duration,
}

impl TextEvaluator {
    pub fn new(scorer: TextEnsembleScorer, timeout: Duration) -> Self {
        Self { scorer, timeout }
    }
}

#[async_trait]
impl ModalityEvaluator for TextEvaluator {
    type Input = str;

    fn modality(&self) -> Modality {
        Modality::Text
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn assess(
        &self,
        text: &str,
        thresholds: &ThresholdConfig,
    ) -> Result<ModalityResult, CollaboratorError> {
        if text.trim().is_empty() {
            return Err(CollaboratorError::NotAvailable("empty claim narrative".to_string()));
        }

        let score = self.scorer.score(text).await;
        let failed = score.failed_signals();
        if failed.len() == SignalName::ALL.len() {
            let causes: Vec<String> = score
                .per_signal
                .values()
                .filter_map(|s| s.error.as_ref().map(|e| format!("{}: {}", s.name, e)))
                .collect();
            return Err(CollaboratorError::NotAvailable(format!(
                "every text signal failed ({})",
                causes.join("; ")
            )));
        }

        let mut result = scored_result(Modality::Text, score.combined_score, thresholds);
        let indicators = &mut result.indicators;

        match score.fraud_label() {
            Some((label, probability)) => indicators.push(format!(
                "Fraud classification: {} ({:.0}%)",
                label,
                probability * 100.0
            )),
            None => indicators.push("Fraud classification unavailable".to_string()),
        }
        indicators.push(format!("Combined text score: {:.2}", score.combined_score));

        if let Some(sentiment) = score.signal(SignalName::Sentiment).filter(|s| !s.is_failed()) {
            if let Some(label) = &sentiment.label {
                indicators.push(format!(
                    "Sentiment: {} ({:.0}%)",
                    label,
                    sentiment.confidence * 100.0
                ));
            }
        }
        if let Some(entities) = score.signal(SignalName::Entity).filter(|s| !s.is_failed()) {
            indicators.push(format!(
                "Entities: {}, average confidence {:.2}",
                entities.label.as_deref().unwrap_or("0 entities"),
                entities.confidence
            ));
        }
        if let Some(semantic) = score.signal(SignalName::Semantic).filter(|s| !s.is_failed()) {
            if let SignalValue::Score(consistency) = semantic.raw_value {
                indicators.push(format!("Semantic consistency: {:.2}", consistency));
            }
        }

        if !failed.is_empty() {
            let names: Vec<&str> = failed.iter().map(SignalName::as_str).collect();
            indicators.push(format!("Signals unavailable: {}", names.join(", ")));
            result.degraded = true;
        }

        result.text_signals = Some(score);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{EntitySpan, LabelDistribution, TextSignalAnalyzer};
    use crate::scoring::ensemble::{FRAUDULENT_KEY, LEGITIMATE_KEY};
    use crate::scoring::{SemanticMode, WeightConfig};
    use crate::types::ModalityStatus;
    use std::sync::Arc;

    struct Signals {
        fail_sentiment: bool,
        fail_all: bool,
        fraudulent: f64,
    }

    #[async_trait]
    impl TextSignalAnalyzer for Signals {
        async fn sentiment(&self, _text: &str) -> Result<LabelDistribution, CollaboratorError> {
            if self.fail_sentiment || self.fail_all {
                return Err(CollaboratorError::Network("connection refused".to_string()));
            }
            Ok([("neutral".to_string(), 0.6), ("negative".to_string(), 0.4)].into())
        }

        async fn entities(&self, _text: &str) -> Result<Vec<EntitySpan>, CollaboratorError> {
            if self.fail_all {
                return Err(CollaboratorError::Network("connection refused".to_string()));
            }
            Ok(vec![])
        }

        async fn semantic_similarity(&self, _segments: &[String]) -> Result<f64, CollaboratorError> {
            if self.fail_all {
                return Err(CollaboratorError::Network("connection refused".to_string()));
            }
            Ok(0.5)
        }

        async fn fraud_classification(&self, _text: &str) -> Result<LabelDistribution, CollaboratorError> {
            if self.fail_all {
                return Err(CollaboratorError::Network("connection refused".to_string()));
            }
            Ok([
                (FRAUDULENT_KEY.to_string(), self.fraudulent),
                (LEGITIMATE_KEY.to_string(), 1.0 - self.fraudulent),
            ]
            .into())
        }
    }

    fn evaluator(signals: Signals) -> TextEvaluator {
        let scorer = TextEnsembleScorer::new(
            Arc::new(signals),
            WeightConfig::default(),
            SemanticMode::Segmented,
        )
        .unwrap();
        TextEvaluator::new(scorer, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_label_and_score_indicators() {
        let result = evaluator(Signals {
            fail_sentiment: false,
            fail_all: false,
            fraudulent: 0.1,
        })
        .evaluate("claim is legitimate", &ThresholdConfig::default())
        .await;

        // 0.6*0.35 + 0*0.25 + 1.0*0.20 (single segment) + 0.9*0.20 = 0.59
        let risk = result.risk_score.unwrap();
        assert!((risk - 0.59).abs() < 1e-9);
        assert_eq!(result.confidence, 41);
        assert_eq!(result.status, ModalityStatus::Fraudulent);
        assert_eq!(result.indicators[0], "Fraud classification: legal (90%)");
        assert!(!result.degraded);
        assert!(result.text_signals.is_some());
    }

    #[tokio::test]
    async fn test_partial_signal_failure_is_degraded() {
        let result = evaluator(Signals {
            fail_sentiment: true,
            fail_all: false,
            fraudulent: 0.7,
        })
        .evaluate("Water damage in the kitchen.", &ThresholdConfig::default())
        .await;

        assert_ne!(result.status, ModalityStatus::Error);
        assert!(result.degraded);
        assert!(result
            .indicators
            .iter()
            .any(|i| i == "Signals unavailable: sentiment"));
    }

    #[tokio::test]
    async fn test_all_signals_failing_is_error() {
        let result = evaluator(Signals {
            fail_sentiment: false,
            fail_all: true,
            fraudulent: 0.0,
        })
        .evaluate("Stolen bicycle.", &ThresholdConfig::default())
        .await;

        assert_eq!(result.status, ModalityStatus::Error);
        assert!(result.error.unwrap().contains("every text signal failed"));
    }

    #[tokio::test]
    async fn test_blank_narrative_is_error() {
        let result = evaluator(Signals {
            fail_sentiment: false,
            fail_all: false,
            fraudulent: 0.0,
        })
        .evaluate("   ", &ThresholdConfig::default())
        .await;
        assert_eq!(result.status, ModalityStatus::Error);
    }
}

//! Claim document image evaluator

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{scored_result, ModalityEvaluator};
use crate::collaborators::ImageAnalyzer;
use crate::scoring::ThresholdConfig;
use crate::types::{CollaboratorError, Modality, ModalityResult, ModalityStatus};

pub struct ImageEvaluator {
    analyzer: Arc<dyn ImageAnalyzer>,
    timeout: Duration,
}

impl ImageEvaluator {
    pub fn new(analyzer: Arc<dyn ImageAnalyzer>, timeout: Duration) -> Self {
        Self { analyzer, timeout }
    }
}

#[async_trait]
impl ModalityEvaluator for ImageEvaluator {
    type Input = Path;

    fn modality(&self) -> Modality {
        Modality::Image
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn assess(
        &self,
        path: &Path,
        thresholds: &ThresholdConfig,
    ) -> Result<ModalityResult, CollaboratorError> {
        let assessment = self.analyzer.analyze_image(path).await?;

        let mut result = if assessment.degraded {
            // Unusable answer: keep the defaulted risk visible, but report no confidence
            ModalityResult {
                risk_score: Some(assessment.risk_level),
                confidence: 0,
                status: ModalityStatus::Suspicious,
                degraded: true,
                risk_defaulted: true,
                indicators: vec![format!(
                    "{} answer had no usable risk_level; defaulted to {:.2}",
                    self.analyzer.name(),
                    assessment.risk_level
                )],
                ..scored_result(Modality::Image, assessment.risk_level, thresholds)
            }
        } else {
            let mut result = scored_result(Modality::Image, assessment.risk_level, thresholds);
            result
                .indicators
                .push(format!("Document risk score: {:.2}", assessment.risk_level));
            result
        };

        if let Some(summary) = assessment.summary {
            result.indicators.push(summary);
        }
        if let Some(explanation) = assessment.explanation {
            result.indicators.push(explanation);
        }
        Ok(result)
    }
}

//! Speaker verification evaluator
//!
//! The match flag is always derived from the similarity and the configured
//! threshold. Confidence comes from one of two policies:
//! - **Continuous** (default): risk = 1 - similarity, classified like any other modality
//! - **MatchFlag**: fixed 85 when matched, 30 otherwise

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::{scored_result, ModalityEvaluator};
use crate::collaborators::{VoiceMatch, VoiceMatcher};
use crate::scoring::ThresholdConfig;
use crate::types::{CollaboratorError, ConfigError, Modality, ModalityResult, VoiceEvidence};

/// Confidence reported for a matching voice under [`VoiceConfidence::MatchFlag`]
pub const MATCHED_CONFIDENCE: u8 = 85;

/// Confidence reported for a non-matching voice under [`VoiceConfidence::MatchFlag`]
pub const UNMATCHED_CONFIDENCE: u8 = 30;

/// Width of the band just below the match threshold reported as uncertain
pub const UNCERTAIN_MARGIN: f64 = 0.05;

/// How voice confidence is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceConfidence {
    #[default]
    Continuous,
    MatchFlag,
}

impl FromStr for VoiceConfidence {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "continuous" => Ok(VoiceConfidence::Continuous),
            "match_flag" => Ok(VoiceConfidence::MatchFlag),
            other => Err(ConfigError::Invalid(format!(
                "unknown voice confidence policy '{}' (expected 'continuous' or 'match_flag')",
                other
            ))),
        }
    }
}

pub struct VoiceEvaluator {
    matcher: Arc<dyn VoiceMatcher>,
    match_threshold: f64,
    confidence_policy: VoiceConfidence,
    timeout: Duration,
}

impl VoiceEvaluator {
    pub fn new(
        matcher: Arc<dyn VoiceMatcher>,
        match_threshold: f64,
        confidence_policy: VoiceConfidence,
        timeout: Duration,
    ) -> Self {
        Self {
            matcher,
            match_threshold,
            confidence_policy,
            timeout,
        }
    }
}

fn flag_risk(matched: bool) -> f64 {
    let confidence = if matched {
        MATCHED_CONFIDENCE
    } else {
        UNMATCHED_CONFIDENCE
    };
    1.0 - f64::from(confidence) / 100.0
}

#[async_trait]
impl ModalityEvaluator for VoiceEvaluator {
    type Input = VoiceEvidence;

    fn modality(&self) -> Modality {
        Modality::Voice
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn assess(
        &self,
        evidence: &VoiceEvidence,
        thresholds: &ThresholdConfig,
    ) -> Result<ModalityResult, CollaboratorError> {
        let answer = self.matcher.compare(&evidence.sample, &evidence.reference).await?;

        let (similarity, matched) = match answer {
            VoiceMatch::Similarity(s) => {
                let s = if s.is_nan() { 0.0 } else { s.clamp(0.0, 1.0) };
                (Some(s), s >= self.match_threshold)
            }
            VoiceMatch::Decision(matched) => (None, matched),
        };

        let risk = match (self.confidence_policy, similarity) {
            (VoiceConfidence::Continuous, Some(s)) => 1.0 - s,
            _ => flag_risk(matched),
        };

        let mut result = scored_result(Modality::Voice, risk, thresholds);
        if let Some(s) = similarity {
            result.indicators.push(format!(
                "Speaker similarity: {:.2} (match threshold {:.2})",
                s, self.match_threshold
            ));
        }
        let near_miss = similarity
            .is_some_and(|s| !matched && s >= self.match_threshold - UNCERTAIN_MARGIN);
        result.indicators.push(if matched {
            "Voice matches the reference recording".to_string()
        } else if near_miss {
            "Possibly the same speaker (uncertain, just below the match threshold)".to_string()
        } else {
            "Voice does not match the reference recording".to_string()
        });
        result.voice_match = Some(matched);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModalityStatus;
    use std::path::{Path, PathBuf};

    struct FixedMatch(VoiceMatch);

    #[async_trait]
    impl VoiceMatcher for FixedMatch {
        async fn compare(&self, _sample: &Path, _reference: &Path) -> Result<VoiceMatch, CollaboratorError> {
            Ok(self.0)
        }
    }

    fn evidence() -> VoiceEvidence {
        VoiceEvidence {
            sample: PathBuf::from("claim.wav"),
            reference: PathBuf::from("enrolled.wav"),
        }
    }

    async fn evaluate(answer: VoiceMatch, policy: VoiceConfidence) -> ModalityResult {
        VoiceEvaluator::new(Arc::new(FixedMatch(answer)), 0.55, policy, Duration::from_secs(1))
            .evaluate(&evidence(), &ThresholdConfig::default())
            .await
    }

    #[tokio::test]
    async fn test_continuous_similarity_drives_confidence() {
        let result = evaluate(VoiceMatch::Similarity(0.9), VoiceConfidence::Continuous).await;
        assert_eq!(result.confidence, 90);
        assert_eq!(result.status, ModalityStatus::Authentic);
        assert_eq!(result.voice_match, Some(true));

        let result = evaluate(VoiceMatch::Similarity(0.6), VoiceConfidence::Continuous).await;
        assert_eq!(result.confidence, 60);
        assert_eq!(result.status, ModalityStatus::Suspicious);
        assert_eq!(result.voice_match, Some(true));
    }

    #[tokio::test]
    async fn test_match_flag_policy() {
        let result = evaluate(VoiceMatch::Similarity(0.9), VoiceConfidence::MatchFlag).await;
        assert_eq!(result.confidence, 85);
        assert_eq!(result.voice_match, Some(true));

        let result = evaluate(VoiceMatch::Similarity(0.3), VoiceConfidence::MatchFlag).await;
        assert_eq!(result.confidence, 30);
        assert_eq!(result.voice_match, Some(false));
        assert_eq!(result.status, ModalityStatus::Fraudulent);
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let result = evaluate(VoiceMatch::Similarity(0.55), VoiceConfidence::Continuous).await;
        assert_eq!(result.voice_match, Some(true));
    }

    #[tokio::test]
    async fn test_near_miss_reported_as_uncertain() {
        let result = evaluate(VoiceMatch::Similarity(0.52), VoiceConfidence::Continuous).await;
        assert_eq!(result.voice_match, Some(false));
        assert!(result.indicators[1].contains("uncertain"));

        let result = evaluate(VoiceMatch::Similarity(0.45), VoiceConfidence::Continuous).await;
        assert_eq!(result.indicators[1], "Voice does not match the reference recording");
    }

    #[tokio::test]
    async fn test_decision_only_answer_uses_fixed_confidence() {
        let result = evaluate(VoiceMatch::Decision(false), VoiceConfidence::Continuous).await;
        assert_eq!(result.confidence, 30);
        assert_eq!(result.voice_match, Some(false));
        assert_eq!(result.indicators, vec!["Voice does not match the reference recording"]);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("match-flag".parse::<VoiceConfidence>().unwrap(), VoiceConfidence::MatchFlag);
        assert_eq!("continuous".parse::<VoiceConfidence>().unwrap(), VoiceConfidence::Continuous);
        assert!("boolean".parse::<VoiceConfidence>().is_err());
    }
}

//! Fraud decision engine
//!
//! Orchestrates the modality evaluators for one request and fuses their
//! results into a [`FraudReport`].
//!
//! **Modes:**
//! - **Independent:** every provided modality runs concurrently; absent ones are omitted
//! - **Gated:** voice verification runs first; unless it reports a match, image
//!   and text are never started and the report is `INCOMPLETE`
//!
//! The engine performs no retries and holds no reference to a report after
//! returning it.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::collaborators::Collaborators;
use crate::config::EngineSettings;
use crate::evaluators::{ImageEvaluator, ModalityEvaluator, TextEvaluator, VoiceEvaluator};
use crate::scoring::threshold::risk_to_confidence;
use crate::scoring::{TextEnsembleScorer, ThresholdConfig};
use crate::types::{
    ConfigError, EngineError, EvaluationMode, Evidence, FraudReport, Modality, ModalityResult,
    OverallLabel, Submission,
};

/// Overall risk strictly above this is labelled RISK
pub const RISK_LABEL_THRESHOLD: f64 = 0.6;

type PerModality = BTreeMap<Modality, ModalityResult>;

pub struct FraudDecisionEngine {
    image: ImageEvaluator,
    text: TextEvaluator,
    voice: VoiceEvaluator,
}

impl FraudDecisionEngine {
    /// Build the evaluators over shared collaborator handles
    ///
    /// # Errors
    /// `ConfigError` if the weights or the voice match threshold are invalid
    pub fn new(collaborators: &Collaborators, settings: &EngineSettings) -> Result<Self, ConfigError> {
        settings.validate()?;

        let scorer = TextEnsembleScorer::new(
            collaborators.text.clone(),
            settings.weights,
            settings.semantic_mode,
        )?;

        Ok(Self {
            image: ImageEvaluator::new(collaborators.image.clone(), settings.image_timeout),
            text: TextEvaluator::new(scorer, settings.text_timeout),
            voice: VoiceEvaluator::new(
                collaborators.voice.clone(),
                settings.voice_match_threshold,
                settings.voice_confidence,
                settings.voice_timeout,
            ),
        })
    }

    /// Evaluate the evidence and fuse the results
    ///
    /// # Errors
    /// [`EngineError::MissingGateEvidence`] in gated mode without voice evidence
    pub async fn decide(
        &self,
        evidence: &Evidence,
        mode: EvaluationMode,
        thresholds: &ThresholdConfig,
    ) -> Result<FraudReport, EngineError> {
        self.decide_with_cancel(evidence, mode, thresholds, &CancellationToken::new())
            .await
    }

    /// [`decide`](Self::decide), abandoning in-flight evaluations when `cancel` fires
    ///
    /// Partially completed modalities are discarded on cancellation.
    pub async fn decide_with_cancel(
        &self,
        evidence: &Evidence,
        mode: EvaluationMode,
        thresholds: &ThresholdConfig,
        cancel: &CancellationToken,
    ) -> Result<FraudReport, EngineError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("decide", %request_id, mode = %mode);

        let evaluation = async {
            match mode {
                EvaluationMode::Independent => Ok(self.run_independent(evidence, thresholds).await),
                EvaluationMode::Gated => self.run_gated(evidence, thresholds).await,
            }
        }
        .instrument(span);

        let (per_modality, gating_applied) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(%request_id, "Evaluation cancelled, discarding partial results");
                return Err(EngineError::Cancelled);
            }
            outcome = evaluation => outcome?,
        };

        let report = build_report(request_id, mode, per_modality, gating_applied);
        info!(
            %request_id,
            mode = %mode,
            modalities = report.per_modality.len(),
            overall_risk = ?report.overall_risk,
            overall_label = %report.overall_label,
            gating_applied = report.gating_applied,
            "Fraud decision complete"
        );
        Ok(report)
    }

    async fn run_independent(&self, evidence: &Evidence, thresholds: &ThresholdConfig) -> (PerModality, bool) {
        let (image, text, voice) = tokio::join!(
            run_submission(&self.image, evidence.image.as_ref(), thresholds),
            run_submission(&self.text, evidence.text.as_ref(), thresholds),
            run_submission(&self.voice, evidence.voice.as_ref(), thresholds),
        );
        (keyed([image, text, voice]), false)
    }

    async fn run_gated(
        &self,
        evidence: &Evidence,
        thresholds: &ThresholdConfig,
    ) -> Result<(PerModality, bool), EngineError> {
        let voice = run_submission(&self.voice, evidence.voice.as_ref(), thresholds)
            .await
            .ok_or(EngineError::MissingGateEvidence)?;

        if voice.voice_match != Some(true) {
            info!(status = %voice.status, "Voice gate closed, image and text skipped");
            return Ok((keyed([Some(voice)]), true));
        }

        let (image, text) = tokio::join!(
            run_submission(&self.image, evidence.image.as_ref(), thresholds),
            run_submission(&self.text, evidence.text.as_ref(), thresholds),
        );
        Ok((keyed([image, text, Some(voice)]), false))
    }
}

/// Evaluate one optional submission; rejected evidence never reaches a collaborator
async fn run_submission<E, T>(
    evaluator: &E,
    submission: Option<&Submission<T>>,
    thresholds: &ThresholdConfig,
) -> Option<ModalityResult>
where
    E: ModalityEvaluator,
    T: Borrow<E::Input>,
{
    match submission? {
        Submission::Provided(input) => Some(evaluator.evaluate(input.borrow(), thresholds).await),
        Submission::Rejected(reason) => {
            warn!(modality = %evaluator.modality(), reason = %reason, "Evidence rejected at intake");
            Some(ModalityResult::error(evaluator.modality(), reason.clone()))
        }
    }
}

fn keyed<const N: usize>(results: [Option<ModalityResult>; N]) -> PerModality {
    results
        .into_iter()
        .flatten()
        .map(|result| (result.modality, result))
        .collect()
}

/// Mean risk over results that contribute to aggregation
pub fn aggregate_risk<'a>(results: impl IntoIterator<Item = &'a ModalityResult>) -> Option<f64> {
    let risks: Vec<f64> = results
        .into_iter()
        .filter_map(ModalityResult::aggregate_risk)
        .collect();
    if risks.is_empty() {
        None
    } else {
        Some(risks.iter().sum::<f64>() / risks.len() as f64)
    }
}

/// RISK above 0.6, NOT_RISK at or below, INCOMPLETE when nothing aggregated or the gate closed
pub fn overall_label(overall_risk: Option<f64>, gating_applied: bool) -> OverallLabel {
    match overall_risk {
        _ if gating_applied => OverallLabel::Incomplete,
        None => OverallLabel::Incomplete,
        Some(risk) if risk > RISK_LABEL_THRESHOLD => OverallLabel::Risk,
        Some(_) => OverallLabel::NotRisk,
    }
}

fn build_report(
    request_id: Uuid,
    mode: EvaluationMode,
    per_modality: PerModality,
    gating_applied: bool,
) -> FraudReport {
    let overall_risk = if gating_applied {
        None
    } else {
        aggregate_risk(per_modality.values())
    };

    FraudReport {
        request_id,
        mode,
        overall_confidence: overall_risk.map(risk_to_confidence),
        overall_label: overall_label(overall_risk, gating_applied),
        per_modality,
        overall_risk,
        gating_applied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::scored_result;

    fn scored(modality: Modality, risk: f64) -> ModalityResult {
        scored_result(modality, risk, &ThresholdConfig::default())
    }

    #[test]
    fn test_mean_excludes_error_and_defaulted_risk() {
        let mut degraded = scored(Modality::Image, 0.0);
        degraded.degraded = true;
        degraded.risk_defaulted = true;
        let results = [
            degraded,
            scored(Modality::Text, 0.8),
            scored(Modality::Voice, 0.4),
            ModalityResult::error(Modality::Image, "timeout"),
        ];
        let mean = aggregate_risk(results.iter()).unwrap();
        assert!((mean - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_degraded_but_measured_risk_counts() {
        let mut partial_text = scored(Modality::Text, 0.75);
        partial_text.degraded = true;
        let results = [scored(Modality::Image, 0.2), partial_text];
        let mean = aggregate_risk(results.iter()).unwrap();
        assert!((mean - 0.475).abs() < 1e-9);
    }

    #[test]
    fn test_mean_of_nothing_is_none() {
        assert_eq!(aggregate_risk([ModalityResult::error(Modality::Text, "x")].iter()), None);
        assert_eq!(aggregate_risk(std::iter::empty()), None);
    }

    #[test]
    fn test_label_boundaries() {
        assert_eq!(overall_label(Some(0.6), false), OverallLabel::NotRisk);
        assert_eq!(overall_label(Some(0.600_001), false), OverallLabel::Risk);
        assert_eq!(overall_label(Some(0.0), false), OverallLabel::NotRisk);
        assert_eq!(overall_label(None, false), OverallLabel::Incomplete);
        assert_eq!(overall_label(Some(0.1), true), OverallLabel::Incomplete);
    }

    #[test]
    fn test_report_confidence_mirrors_risk() {
        let per_modality = keyed([Some(scored(Modality::Text, 0.25)), None]);
        let report = build_report(Uuid::new_v4(), EvaluationMode::Independent, per_modality, false);
        assert_eq!(report.overall_risk, Some(0.25));
        assert_eq!(report.overall_confidence, Some(75));
        assert_eq!(report.overall_label, OverallLabel::NotRisk);
    }

    #[test]
    fn test_gated_report_has_no_risk() {
        let mut voice = scored(Modality::Voice, 0.7);
        voice.voice_match = Some(false);
        let report = build_report(Uuid::new_v4(), EvaluationMode::Gated, keyed([Some(voice)]), true);
        assert_eq!(report.overall_risk, None);
        assert_eq!(report.overall_confidence, None);
        assert_eq!(report.overall_label, OverallLabel::Incomplete);
        assert_eq!(report.per_modality.len(), 1);
    }
}

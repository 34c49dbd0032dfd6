//! Per-modality evaluators
//!
//! Each evaluator wraps one collaborator, converts its raw output through the
//! threshold policy and yields a uniform [`ModalityResult`]. Failures stop at
//! this boundary: collaborator errors, deadline overruns and panics all become
//! `status: error` results and never reach the engine.

pub mod image;
pub mod text;
pub mod voice;

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::scoring::ThresholdConfig;
use crate::types::{CollaboratorError, Modality, ModalityResult};

pub use image::ImageEvaluator;
pub use text::TextEvaluator;
pub use voice::{VoiceConfidence, VoiceEvaluator};

/// Uniform evaluation contract for one modality
///
/// Implementors provide [`assess`](ModalityEvaluator::assess); callers use
/// [`evaluate`](ModalityEvaluator::evaluate), which never fails.
///
/// # Example
/// ```rust,ignore
/// #[async_trait::async_trait]
/// impl ModalityEvaluator for FixedEvaluator {
///     type Input = Path;
///
///     fn modality(&self) -> Modality { Modality::Image }
///     fn timeout(&self) -> Duration { Duration::from_secs(5) }
///
///     async fn assess(&self, _input: &Path, cfg: &ThresholdConfig)
///         -> Result<ModalityResult, CollaboratorError> {
///         Ok(scored_result(Modality::Image, 0.2, cfg))
///     }
/// }
/// ```
#[async_trait]
pub trait ModalityEvaluator: Send + Sync {
    /// Evidence consumed by this evaluator
    type Input: ?Sized + Sync;

    fn modality(&self) -> Modality;

    /// Deadline for the whole evaluation, collaborator calls included
    fn timeout(&self) -> Duration;

    /// Produce a result, or fail with the collaborator's error
    async fn assess(
        &self,
        input: &Self::Input,
        thresholds: &ThresholdConfig,
    ) -> Result<ModalityResult, CollaboratorError>;

    /// Evaluate with failure isolation
    async fn evaluate(&self, input: &Self::Input, thresholds: &ThresholdConfig) -> ModalityResult {
        let modality = self.modality();
        let deadline = self.timeout();
        let started = Instant::now();

        let outcome = tokio::time::timeout(
            deadline,
            AssertUnwindSafe(self.assess(input, thresholds)).catch_unwind(),
        )
        .await;

        let result = match outcome {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => {
                warn!(modality = %modality, error = %e, "Collaborator failed");
                ModalityResult::error(modality, e.to_string())
            }
            Ok(Err(_)) => {
                error!(modality = %modality, "Evaluator panicked");
                ModalityResult::error(modality, "internal evaluator failure")
            }
            Err(_) => {
                let e = CollaboratorError::Timeout(deadline);
                warn!(modality = %modality, error = %e, "Evaluation deadline exceeded");
                ModalityResult::error(modality, e.to_string())
            }
        };

        info!(
            modality = %modality,
            risk_score = ?result.risk_score,
            confidence = result.confidence,
            status = %result.status,
            degraded = result.degraded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Modality evaluated"
        );
        result
    }
}

/// Successful result for a risk score, classified under `thresholds`
pub fn scored_result(modality: Modality, risk_score: f64, thresholds: &ThresholdConfig) -> ModalityResult {
    let risk_score = crate::scoring::threshold::clamp_risk(risk_score);
    let (confidence, status) = crate::scoring::classify(risk_score, thresholds);
    ModalityResult {
        modality,
        risk_score: Some(risk_score),
        confidence,
        status,
        indicators: Vec::new(),
        error: None,
        degraded: false,
        risk_defaulted: false,
        voice_match: None,
        text_signals: None,
    }
}

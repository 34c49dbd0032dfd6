//! Claim analysis endpoint
//!
//! POST /analyze (multipart/form-data)
//!
//! Parts, all optional:
//! - `image`: claim document (png, jpg, jpeg, webp)
//! - `text`: claim narrative, as a .txt file or an inline form field
//! - `voice` + `voice_reference`: claimant recording and enrolled reference (mp3, wav, ogg, m4a)
//!
//! A rejected part becomes an error result for its modality; the rest of the
//! request proceeds.

use axum::{
    extract::{multipart::Field, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::types::{
    EvaluationMode, Evidence, FraudReport, Modality, ModalityResult, OverallLabel, Submission,
    VoiceEvidence,
};
use crate::uploads::{
    check_payload, decode_text, validate_extension, RequestStorage, UploadKind, UploadLimits,
    ValidationError,
};
use crate::AppState;

/// Report-level fields returned under `summary`
#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub request_id: Uuid,
    pub mode: EvaluationMode,
    pub overall_risk: Option<f64>,
    pub overall_confidence: Option<u8>,
    pub overall_label: OverallLabel,
    pub gating_applied: bool,
}

/// POST /analyze response: one key per evaluated modality plus `summary`
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub modalities: BTreeMap<Modality, ModalityResult>,
    pub summary: ReportSummary,
}

impl From<FraudReport> for AnalyzeResponse {
    fn from(report: FraudReport) -> Self {
        Self {
            summary: ReportSummary {
                request_id: report.request_id,
                mode: report.mode,
                overall_risk: report.overall_risk,
                overall_confidence: report.overall_confidence,
                overall_label: report.overall_label,
                gating_applied: report.gating_applied,
            },
            modalities: report.per_modality,
        }
    }
}

/// POST /analyze
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<AnalyzeResponse>> {
    let storage = RequestStorage::create(&state.storage_root)
        .map_err(|e| ApiError::Internal(format!("Cannot create upload directory: {}", e)))?;

    let evidence = read_evidence(multipart, &storage, &state.upload_limits).await?;
    if evidence.is_empty() {
        return Err(ApiError::BadRequest(
            "No evidence provided (expected image, text or voice parts)".to_string(),
        ));
    }

    let report = state
        .engine
        .decide(&evidence, state.mode, &state.thresholds)
        .await?;
    drop(storage);

    Ok(Json(AnalyzeResponse::from(report)))
}

#[derive(Default)]
struct Intake {
    image: Option<Submission<PathBuf>>,
    text: Option<Submission<String>>,
    voice: Option<Submission<PathBuf>>,
    voice_reference: Option<Submission<PathBuf>>,
}

async fn read_evidence(
    mut multipart: Multipart,
    storage: &RequestStorage,
    limits: &UploadLimits,
) -> ApiResult<Evidence> {
    let mut intake = Intake::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "image" => {
                let submission = accept_file(field, UploadKind::Image, "image", storage, limits).await?;
                set_once(&mut intake.image, &name, submission)?;
            }
            "voice" => {
                let submission = accept_file(field, UploadKind::Voice, "voice", storage, limits).await?;
                set_once(&mut intake.voice, &name, submission)?;
            }
            "voice_reference" => {
                let submission =
                    accept_file(field, UploadKind::Voice, "voice-reference", storage, limits).await?;
                set_once(&mut intake.voice_reference, &name, submission)?;
            }
            "text" => {
                let submission = accept_text(field, limits).await?;
                set_once(&mut intake.text, &name, submission)?;
            }
            other => debug!(part = other, "Ignoring unknown multipart part"),
        }
    }

    Ok(Evidence {
        image: intake.image,
        text: intake.text,
        voice: pair_voice(intake.voice, intake.voice_reference),
    })
}

fn set_once<T>(slot: &mut Option<T>, name: &str, value: T) -> ApiResult<()> {
    if slot.is_some() {
        return Err(ApiError::BadRequest(format!("Duplicate '{}' part", name)));
    }
    *slot = Some(value);
    Ok(())
}

async fn accept_file(
    mut field: Field<'_>,
    kind: UploadKind,
    role: &str,
    storage: &RequestStorage,
    limits: &UploadLimits,
) -> ApiResult<Submission<PathBuf>> {
    let declared = field.file_name().map(str::to_string);
    let extension = match declared.as_deref() {
        Some(file_name) => validate_extension(kind, file_name),
        None => validate_extension(kind, ""),
    };
    let extension = match extension {
        Ok(extension) => extension,
        Err(e) => return Ok(rejected(role, e)),
    };

    let bytes = match read_limited(&mut field, kind, limits.for_kind(kind)).await? {
        Ok(bytes) => bytes,
        Err(e) => return Ok(rejected(role, e)),
    };
    if let Err(e) = check_payload(kind, &bytes, limits) {
        return Ok(rejected(role, e));
    }

    let path = storage.store(role, extension, &bytes).await?;
    debug!(role, bytes = bytes.len(), path = %path.display(), "Upload accepted");
    Ok(Submission::Provided(path))
}

async fn accept_text(mut field: Field<'_>, limits: &UploadLimits) -> ApiResult<Submission<String>> {
    if let Some(file_name) = field.file_name().map(str::to_string) {
        if let Err(e) = validate_extension(UploadKind::Text, &file_name) {
            return Ok(rejected("text", e));
        }
    }

    let bytes = match read_limited(&mut field, UploadKind::Text, limits.max_text_bytes).await? {
        Ok(bytes) => bytes,
        Err(e) => return Ok(rejected("text", e)),
    };
    let text = check_payload(UploadKind::Text, &bytes, limits).and_then(|()| decode_text(bytes));
    Ok(match text {
        Ok(text) => Submission::Provided(text),
        Err(e) => rejected("text", e),
    })
}

/// Read a part, stopping as soon as it exceeds `limit`
async fn read_limited(
    field: &mut Field<'_>,
    kind: UploadKind,
    limit: usize,
) -> ApiResult<Result<Vec<u8>, ValidationError>> {
    let mut buffer = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if buffer.len() + chunk.len() > limit {
            return Ok(Err(ValidationError::TooLarge {
                kind: kind.as_str(),
                limit,
            }));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(Ok(buffer))
}

fn rejected<T>(role: &str, err: ValidationError) -> Submission<T> {
    warn!(part = role, error = %err, "Upload rejected");
    Submission::Rejected(err.to_string())
}

fn pair_voice(
    sample: Option<Submission<PathBuf>>,
    reference: Option<Submission<PathBuf>>,
) -> Option<Submission<VoiceEvidence>> {
    let paired = match (sample, reference) {
        (None, None) => return None,
        (Some(Submission::Provided(sample)), Some(Submission::Provided(reference))) => {
            Submission::Provided(VoiceEvidence { sample, reference })
        }
        (Some(Submission::Rejected(reason)), _) => Submission::Rejected(reason),
        (_, Some(Submission::Rejected(reason))) => {
            Submission::Rejected(format!("voice reference: {}", reason))
        }
        (Some(Submission::Provided(_)), None) => Submission::Rejected(
            ValidationError::MissingCompanion(
                "a voice_reference part is required with voice".to_string(),
            )
            .to_string(),
        ),
        (None, Some(Submission::Provided(_))) => Submission::Rejected(
            ValidationError::MissingCompanion(
                "a voice part is required with voice_reference".to_string(),
            )
            .to_string(),
        ),
    };
    Some(paired)
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new().route("/analyze", post(analyze))
}

//! insureguard-pipeline - command-line claim fraud pipeline
//!
//! Verifies the claimant's voice against an enrolled reference, then assesses
//! the claim document and narrative. Runs in gated mode unless told otherwise.
//!
//! ```text
//! insureguard-pipeline claim.wav enrolled.wav claim.png "Rear-ended at a red light..."
//! insureguard-pipeline claim.wav enrolled.wav claim.png --text-file narrative.txt --json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::warn;

use insureguard_ai::collaborators::Collaborators;
use insureguard_ai::config::{ConfigOverrides, ServiceConfig};
use insureguard_ai::engine::FraudDecisionEngine;
use insureguard_ai::types::{EvaluationMode, Evidence, FraudReport, Submission, VoiceEvidence};
use insureguard_ai::uploads::{
    check_payload, decode_text, validate_extension, UploadKind, UploadLimits,
};
use insureguard_common::config::{load_toml_config, locate_config_file};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "insureguard-pipeline")]
#[command(about = "Score one insurance claim from voice, document image and narrative")]
#[command(version)]
struct Args {
    /// Claimant voice recording
    voice_sample: PathBuf,

    /// Enrolled reference recording of the policyholder
    voice_reference: PathBuf,

    /// Claim document image
    image: PathBuf,

    /// Claim narrative (inline)
    #[arg(conflicts_with = "text_file")]
    text: Option<String>,

    /// Read the claim narrative from a .txt file
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// Evaluation mode: gated or independent
    #[arg(short, long, default_value = "gated")]
    mode: EvaluationMode,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,

    /// Path to TOML config file
    #[arg(short, long, env = "IG_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = locate_config_file(args.config.as_deref());
    let toml_config = load_toml_config(config_path.as_deref())?;
    insureguard_common::logging::init_cli_tracing("warn");

    let overrides = ConfigOverrides {
        mode: Some(args.mode),
        ..Default::default()
    };
    let config = ServiceConfig::resolve(&toml_config, &overrides).context("Invalid configuration")?;

    let collaborators = Collaborators::connect(&config).context("Collaborator setup failed")?;
    let engine = FraudDecisionEngine::new(&collaborators, &config.engine)
        .context("Decision engine setup failed")?;

    let limits = config.upload_limits;
    let evidence = Evidence {
        image: Some(local_file(&args.image, UploadKind::Image, &limits).await),
        text: local_text(args.text, args.text_file.as_deref(), &limits).await,
        voice: Some(
            match (
                local_file(&args.voice_sample, UploadKind::Voice, &limits).await,
                local_file(&args.voice_reference, UploadKind::Voice, &limits).await,
            ) {
                (Submission::Provided(sample), Submission::Provided(reference)) => {
                    Submission::Provided(VoiceEvidence { sample, reference })
                }
                (Submission::Rejected(reason), _) => Submission::Rejected(reason),
                (_, Submission::Rejected(reason)) => {
                    Submission::Rejected(format!("voice reference: {}", reason))
                }
            },
        ),
    };

    let report = engine
        .decide(&evidence, config.mode, &config.thresholds)
        .await
        .context("Evaluation failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Validate a local evidence file the same way uploads are validated
async fn local_file(path: &Path, kind: UploadKind, limits: &UploadLimits) -> Submission<PathBuf> {
    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    if let Err(e) = validate_extension(kind, &file_name) {
        return rejected(path, e.to_string());
    }
    match tokio::fs::read(path).await {
        Ok(bytes) => match check_payload(kind, &bytes, limits) {
            Ok(()) => Submission::Provided(path.to_path_buf()),
            Err(e) => rejected(path, e.to_string()),
        },
        Err(e) => rejected(path, format!("cannot read {}: {}", path.display(), e)),
    }
}

async fn local_text(
    inline: Option<String>,
    file: Option<&Path>,
    limits: &UploadLimits,
) -> Option<Submission<String>> {
    let bytes = match (inline, file) {
        (Some(text), _) => text.into_bytes(),
        (None, Some(path)) => {
            let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            if let Err(e) = validate_extension(UploadKind::Text, &file_name) {
                return Some(rejected(path, e.to_string()));
            }
            match tokio::fs::read(path).await {
                Ok(bytes) => bytes,
                Err(e) => return Some(rejected(path, format!("cannot read {}: {}", path.display(), e))),
            }
        }
        (None, None) => return None,
    };

    let text = check_payload(UploadKind::Text, &bytes, limits).and_then(|()| decode_text(bytes));
    Some(match text {
        Ok(text) => Submission::Provided(text),
        Err(e) => rejected(Path::new("text"), e.to_string()),
    })
}

fn rejected<T>(path: &Path, reason: String) -> Submission<T> {
    warn!(evidence = %path.display(), reason = %reason, "Evidence rejected");
    Submission::Rejected(reason)
}

fn print_report(report: &FraudReport) {
    println!("Claim fraud report");
    println!("  request: {}", report.request_id);
    println!("  mode:    {}", report.mode);
    println!();

    for result in report.per_modality.values() {
        let risk = result
            .risk_score
            .map(|r| format!("{:.2}", r))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "[{}] {} | confidence {} | risk {}{}",
            result.modality,
            result.status,
            result.confidence,
            risk,
            if result.degraded { " | degraded" } else { "" }
        );
        if let Some(error) = &result.error {
            println!("    error: {}", error);
        }
        for indicator in &result.indicators {
            println!("    - {}", indicator);
        }
    }
    println!();

    if report.gating_applied {
        println!("Overall: {} (voice verification failed, image and text not evaluated)", report.overall_label);
        return;
    }
    match (report.overall_risk, report.overall_confidence) {
        (Some(risk), Some(confidence)) => println!(
            "Overall: {} (risk {:.2}, confidence {})",
            report.overall_label, risk, confidence
        ),
        _ => println!("Overall: {} (no modality produced a usable score)", report.overall_label),
    }
}

//! Risk → confidence → status mapping applied uniformly across modalities
//!
//! Two threshold policies exist as named presets:
//! - **Three-tier** (default): authentic ≥ 80, suspicious ≥ 50, else fraudulent
//! - **Two-tier**: authentic ≥ 70, else suspicious (never fraudulent)

use serde::Serialize;
use std::str::FromStr;

use crate::types::{ConfigError, ModalityStatus};

/// Ordered status boundaries on the 0-100 confidence scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThresholdConfig {
    authentic_min: u8,
    suspicious_min: u8,
}

impl ThresholdConfig {
    /// Three-tier 80/50 policy
    pub const THREE_TIER: ThresholdConfig = ThresholdConfig {
        authentic_min: 80,
        suspicious_min: 50,
    };

    /// Two-tier policy: a single 70 split between authentic and suspicious
    pub const TWO_TIER: ThresholdConfig = ThresholdConfig {
        authentic_min: 70,
        suspicious_min: 0,
    };

    /// Build a custom policy
    ///
    /// # Errors
    /// `ConfigError` if a bound exceeds 100 or `authentic_min < suspicious_min`
    pub fn new(authentic_min: u8, suspicious_min: u8) -> Result<Self, ConfigError> {
        for bound in [authentic_min, suspicious_min] {
            if bound > 100 {
                return Err(ConfigError::ThresholdOutOfRange(bound));
            }
        }
        if authentic_min < suspicious_min {
            return Err(ConfigError::InvertedThresholds {
                authentic_min,
                suspicious_min,
            });
        }
        Ok(Self {
            authentic_min,
            suspicious_min,
        })
    }

    pub fn preset(preset: ThresholdPreset) -> Self {
        match preset {
            ThresholdPreset::ThreeTier => Self::THREE_TIER,
            ThresholdPreset::TwoTier => Self::TWO_TIER,
        }
    }

    pub fn authentic_min(&self) -> u8 {
        self.authentic_min
    }

    pub fn suspicious_min(&self) -> u8 {
        self.suspicious_min
    }

    /// Status for an already-computed confidence
    pub fn status_for(&self, confidence: u8) -> ModalityStatus {
        if confidence >= self.authentic_min {
            ModalityStatus::Authentic
        } else if confidence >= self.suspicious_min {
            ModalityStatus::Suspicious
        } else {
            ModalityStatus::Fraudulent
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::THREE_TIER
    }
}

/// Named threshold policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdPreset {
    #[default]
    ThreeTier,
    TwoTier,
}

impl FromStr for ThresholdPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "three_tier" => Ok(ThresholdPreset::ThreeTier),
            "two_tier" => Ok(ThresholdPreset::TwoTier),
            other => Err(ConfigError::Invalid(format!(
                "unknown threshold preset '{}' (expected 'three_tier' or 'two_tier')",
                other
            ))),
        }
    }
}

/// Clamp a risk score into [0,1]; NaN counts as maximal risk
pub fn clamp_risk(risk_score: f64) -> f64 {
    if risk_score.is_nan() {
        1.0
    } else {
        risk_score.clamp(0.0, 1.0)
    }
}

/// confidence = round((1 - risk) * 100)
pub fn risk_to_confidence(risk_score: f64) -> u8 {
    ((1.0 - clamp_risk(risk_score)) * 100.0).round() as u8
}

/// Map a risk score to (confidence, status)
///
/// Out-of-range input is clamped, never rejected.
pub fn classify(risk_score: f64, cfg: &ThresholdConfig) -> (u8, ModalityStatus) {
    let confidence = risk_to_confidence(risk_score);
    (confidence, cfg.status_for(confidence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_formula_over_unit_interval() {
        for step in 0..=1000 {
            let r = step as f64 / 1000.0;
            let (confidence, _) = classify(r, &ThresholdConfig::default());
            assert_eq!(confidence, ((1.0 - r) * 100.0).round() as u8, "r = {}", r);
            assert!(confidence <= 100);
        }
    }

    #[test]
    fn test_confidence_non_increasing_in_risk() {
        let cfg = ThresholdConfig::default();
        let mut previous = u8::MAX;
        for step in 0..=1000 {
            let (confidence, _) = classify(step as f64 / 1000.0, &cfg);
            assert!(confidence <= previous);
            previous = confidence;
        }
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let cfg = ThresholdConfig::default();
        assert_eq!(classify(-0.5, &cfg), (100, ModalityStatus::Authentic));
        assert_eq!(classify(1.7, &cfg), (0, ModalityStatus::Fraudulent));
        assert_eq!(classify(f64::NAN, &cfg), (0, ModalityStatus::Fraudulent));
    }

    #[test]
    fn test_three_tier_buckets() {
        let cfg = ThresholdConfig::THREE_TIER;
        assert_eq!(classify(0.20, &cfg), (80, ModalityStatus::Authentic));
        assert_eq!(classify(0.21, &cfg), (79, ModalityStatus::Suspicious));
        assert_eq!(classify(0.50, &cfg), (50, ModalityStatus::Suspicious));
        assert_eq!(classify(0.51, &cfg), (49, ModalityStatus::Fraudulent));
    }

    #[test]
    fn test_boundary_depends_on_configured_policy() {
        // confidence 80 under the default policy vs authentic_min = 81
        let default_cfg = ThresholdConfig::THREE_TIER;
        let stricter = ThresholdConfig::new(81, 50).unwrap();

        assert_eq!(classify(0.2, &default_cfg).1, ModalityStatus::Authentic);
        assert_eq!(classify(0.2, &stricter).1, ModalityStatus::Suspicious);
    }

    #[test]
    fn test_two_tier_never_fraudulent() {
        let cfg = ThresholdConfig::preset(ThresholdPreset::TwoTier);
        assert_eq!(classify(0.30, &cfg).1, ModalityStatus::Authentic);
        assert_eq!(classify(0.31, &cfg).1, ModalityStatus::Suspicious);
        assert_eq!(classify(1.0, &cfg).1, ModalityStatus::Suspicious);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        assert!(matches!(
            ThresholdConfig::new(40, 60),
            Err(ConfigError::InvertedThresholds { .. })
        ));
        assert!(matches!(
            ThresholdConfig::new(101, 50),
            Err(ConfigError::ThresholdOutOfRange(101))
        ));
        assert!(ThresholdConfig::new(60, 60).is_ok());
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!("three_tier".parse::<ThresholdPreset>().unwrap(), ThresholdPreset::ThreeTier);
        assert_eq!("Two-Tier".parse::<ThresholdPreset>().unwrap(), ThresholdPreset::TwoTier);
        assert!("four_tier".parse::<ThresholdPreset>().is_err());
    }
}

//! Quality thresholds for surveyed samples.
//!
//! A survey passes only if every statistic is inside its bound.

use super::statistics::{StatisticalTests, CHI_SQUARE_255DOF_P001};
use serde::{Deserialize, Serialize};

/// Quality thresholds for entropy surveys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Minimum bytes before any other check is meaningful.
    pub min_samples: usize,
    /// Maximum acceptable bit bias (absolute value).
    pub max_bit_bias: f64,
    /// Maximum acceptable byte-histogram chi-square.
    pub max_byte_chi_square: f64,
    /// Minimum acceptable variance.
    pub min_variance: f64,
    /// Maximum acceptable autocorrelation (absolute value).
    pub max_autocorrelation: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_samples: 2560,
            max_bit_bias: 0.05,
            max_byte_chi_square: CHI_SQUARE_255DOF_P001,
            min_variance: 500.0,
            max_autocorrelation: 0.3,
        }
    }
}

impl QualityThresholds {
    /// Creates more conservative thresholds.
    pub fn conservative() -> Self {
        Self {
            min_samples: 10_240,
            max_bit_bias: 0.02,
            max_byte_chi_square: CHI_SQUARE_255DOF_P001,
            min_variance: 1000.0,
            max_autocorrelation: 0.1,
        }
    }

    /// Creates more permissive thresholds (for testing).
    pub fn permissive() -> Self {
        Self {
            min_samples: 256,
            max_bit_bias: 0.2,
            max_byte_chi_square: f64::INFINITY,
            min_variance: 100.0,
            max_autocorrelation: 0.5,
        }
    }

    /// Checks statistics against thresholds.
    pub fn check(&self, stats: &StatisticalTests) -> Result<(), ThresholdViolation> {
        if stats.sample_size < self.min_samples {
            return Err(ThresholdViolation::TooFewSamples {
                observed: stats.sample_size,
                required: self.min_samples,
            });
        }

        if stats.bit_bias.abs() > self.max_bit_bias {
            return Err(ThresholdViolation::BitBias {
                observed: stats.bit_bias,
                threshold: self.max_bit_bias,
            });
        }

        if stats.byte_chi_square > self.max_byte_chi_square {
            return Err(ThresholdViolation::NonUniformBytes {
                observed: stats.byte_chi_square,
                threshold: self.max_byte_chi_square,
            });
        }

        if stats.variance < self.min_variance {
            return Err(ThresholdViolation::LowVariance {
                observed: stats.variance,
                threshold: self.min_variance,
            });
        }

        if stats.autocorrelation.abs() > self.max_autocorrelation {
            return Err(ThresholdViolation::HighAutocorrelation {
                observed: stats.autocorrelation,
                threshold: self.max_autocorrelation,
            });
        }

        Ok(())
    }
}

/// Threshold violation types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ThresholdViolation {
    #[error("only {observed} samples, need at least {required}")]
    TooFewSamples { observed: usize, required: usize },

    #[error("bit bias {observed:.4} exceeds threshold {threshold:.4}")]
    BitBias { observed: f64, threshold: f64 },

    #[error("byte chi-square {observed:.2} exceeds threshold {threshold:.2}")]
    NonUniformBytes { observed: f64, threshold: f64 },

    #[error("variance {observed:.2} below threshold {threshold:.2}")]
    LowVariance { observed: f64, threshold: f64 },

    #[error("autocorrelation {observed:.4} exceeds threshold {threshold:.4}")]
    HighAutocorrelation { observed: f64, threshold: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;
    use rand_core::{RngCore, SeedableRng};

    #[test]
    fn test_good_data_passes() {
        let mut data = vec![0u8; 10_240];
        ChaCha8Rng::seed_from_u64(1).fill_bytes(&mut data);
        let stats = StatisticalTests::analyze(&data);

        assert!(QualityThresholds::default().check(&stats).is_ok());
        assert!(QualityThresholds::permissive().check(&stats).is_ok());
    }

    #[test]
    fn test_short_sample_fails() {
        let stats = StatisticalTests::analyze(&[0x5A; 100]);
        assert!(matches!(
            QualityThresholds::default().check(&stats),
            Err(ThresholdViolation::TooFewSamples { observed: 100, .. })
        ));
    }

    #[test]
    fn test_biased_data_fails() {
        let stats = StatisticalTests::analyze(&[0xFFu8; 4096]);
        assert!(matches!(
            QualityThresholds::default().check(&stats),
            Err(ThresholdViolation::BitBias { .. })
        ));
    }

    #[test]
    fn test_constant_balanced_data_fails_uniformity() {
        // Four bits set per byte: unbiased bits, degenerate histogram.
        let stats = StatisticalTests::analyze(&[0x0Fu8; 4096]);
        assert!(matches!(
            QualityThresholds::default().check(&stats),
            Err(ThresholdViolation::NonUniformBytes { .. })
        ));
    }

    #[test]
    fn test_constant_data_fails_variance_when_permissive() {
        let stats = StatisticalTests::analyze(&[0x0Fu8; 1000]);
        assert!(matches!(
            QualityThresholds::permissive().check(&stats),
            Err(ThresholdViolation::LowVariance { .. })
        ));
    }

    #[test]
    fn test_thresholds_deserialize_with_defaults() {
        let thresholds: QualityThresholds = toml::from_str("max_bit_bias = 0.01").unwrap();
        assert_eq!(thresholds.max_bit_bias, 0.01);
        assert_eq!(thresholds.min_samples, 2560);
    }
}

//! Statistical quality checks for entropy output.
//!
//! This module provides statistical tests and thresholds for surveying
//! the output of an entropy source. These are sanity checks, not
//! cryptographic proofs of entropy.

mod statistics;
mod threshold;

pub use statistics::{
    bit_bias, chi_square_uniform, StatisticalTests, CHI_SQUARE_1DOF_P001, CHI_SQUARE_255DOF_P001,
};
pub use threshold::{QualityThresholds, ThresholdViolation};

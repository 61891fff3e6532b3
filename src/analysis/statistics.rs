//! Statistical tests for entropy quality.
//!
//! These tests are sanity checks to detect obvious problems,
//! not proofs of entropy quality. Passing these tests is necessary
//! but not sufficient for good entropy.

/// Chi-square critical value for 1 degree of freedom at p = 0.001.
pub const CHI_SQUARE_1DOF_P001: f64 = 10.828;

/// Chi-square critical value for 255 degrees of freedom at p = 0.001.
pub const CHI_SQUARE_255DOF_P001: f64 = 330.52;

/// Pearson's chi-square statistic of `counts` against a uniform expectation.
///
/// Returns 0.0 when there are no observations.
pub fn chi_square_uniform(counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    if total == 0 || counts.is_empty() {
        return 0.0;
    }

    let expected = total as f64 / counts.len() as f64;
    counts
        .iter()
        .map(|&observed| (observed as f64 - expected).powi(2) / expected)
        .sum()
}

/// Fraction of set bits minus 0.5.
pub fn bit_bias(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let ones: u64 = data.iter().map(|b| u64::from(b.count_ones())).sum();
    let total = (data.len() * 8) as f64;
    (ones as f64 / total) - 0.5
}

/// Statistical test results.
#[derive(Debug, Clone)]
pub struct StatisticalTests {
    /// Bit bias (deviation from 0.5).
    pub bit_bias: f64,
    /// Chi-square of the byte-value histogram (255 degrees of freedom).
    pub byte_chi_square: f64,
    /// Byte-level variance.
    pub variance: f64,
    /// Lag-1 autocorrelation.
    pub autocorrelation: f64,
    /// Number of bytes analyzed.
    pub sample_size: usize,
}

impl StatisticalTests {
    /// Runs all statistical tests on a byte sample.
    pub fn analyze(data: &[u8]) -> Self {
        Self {
            bit_bias: bit_bias(data),
            byte_chi_square: Self::compute_byte_chi_square(data),
            variance: Self::compute_variance(data),
            autocorrelation: Self::compute_autocorrelation(data),
            sample_size: data.len(),
        }
    }

    fn compute_byte_chi_square(data: &[u8]) -> f64 {
        let mut counts = [0u64; 256];
        for &b in data {
            counts[usize::from(b)] += 1;
        }
        chi_square_uniform(&counts)
    }

    /// Computes the variance of byte values.
    fn compute_variance(data: &[u8]) -> f64 {
        if data.is_empty() {
            return 0.0;
        }

        let n = data.len() as f64;
        let mean: f64 = data.iter().map(|&b| b as f64).sum::<f64>() / n;
        data.iter().map(|&b| (b as f64 - mean).powi(2)).sum::<f64>() / n
    }

    /// Computes lag-1 autocorrelation.
    ///
    /// Measures correlation between consecutive bytes.
    /// High values indicate predictable patterns.
    fn compute_autocorrelation(data: &[u8]) -> f64 {
        if data.len() < 2 {
            return 0.0;
        }

        let n = data.len() as f64;
        let mean: f64 = data.iter().map(|&b| b as f64).sum::<f64>() / n;

        let variance: f64 = data.iter().map(|&b| (b as f64 - mean).powi(2)).sum::<f64>();

        if variance == 0.0 {
            return 1.0; // All same value = perfect correlation
        }

        let covariance: f64 = data
            .windows(2)
            .map(|w| (w[0] as f64 - mean) * (w[1] as f64 - mean))
            .sum();

        covariance / variance
    }

    /// Returns true if results look reasonable (not proof of quality).
    pub fn looks_reasonable(&self) -> bool {
        // Loose sanity checks, not security guarantees
        let bias_ok = self.bit_bias.abs() < 0.1;
        let variance_ok = self.variance > 100.0;
        let autocorr_ok = self.autocorrelation.abs() < 0.5;

        bias_ok && variance_ok && autocorr_ok
    }
}

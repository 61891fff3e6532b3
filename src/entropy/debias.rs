//! Two-sample debiasing of analog low bits.
//!
//! A single analog reading's low bit is biased by whatever is wired to
//! the pin. Reading the same channel twice in quick succession and
//! keeping only unequal pairs removes that bias: with independent
//! samples, `P(0,1) == P(1,0)` whatever the marginal probability of a 1.
//!
//! | first | second | result     |
//! |-------|--------|------------|
//! | 0     | 0      | discard    |
//! | 0     | 1      | emit 1     |
//! | 1     | 0      | emit 0     |
//! | 1     | 1      | discard    |

use super::{AnalogInput, AnalogSampler, DrawStats, EntropyError, EntropySource};

/// Raw reads allowed per output bit unless configured otherwise.
pub const DEFAULT_PER_BIT_BUDGET: u32 = 100;

/// Applies the two-sample transform to one pair of readings.
///
/// Returns the second reading when the two differ, `None` otherwise.
#[inline]
pub fn debias_pair(first: bool, second: bool) -> Option<bool> {
    (first != second).then_some(second)
}

/// Debiased bits from rotating analog channels.
///
/// Each attempt reads one channel twice; a discarded pair moves on to
/// the next channel so that a single stuck or slowly drifting input
/// cannot stall a draw.
#[derive(Debug)]
pub struct PairedChannelDebiasedSource<A> {
    sampler: AnalogSampler<A>,
    per_bit_budget: u32,
    stats: DrawStats,
}

impl<A: AnalogInput> PairedChannelDebiasedSource<A> {
    /// Creates a source using [`DEFAULT_PER_BIT_BUDGET`].
    pub fn new(sampler: AnalogSampler<A>) -> Self {
        Self::with_budget(sampler, DEFAULT_PER_BIT_BUDGET)
    }

    /// Creates a source with an explicit per-bit read budget.
    pub fn with_budget(sampler: AnalogSampler<A>, per_bit_budget: u32) -> Self {
        Self {
            sampler,
            per_bit_budget,
            stats: DrawStats::default(),
        }
    }

    /// Returns the per-bit budget used by [`EntropySource`] draws.
    pub fn per_bit_budget(&self) -> u32 {
        self.per_bit_budget
    }

    /// Returns the channel sampler.
    pub fn sampler(&self) -> &AnalogSampler<A> {
        &self.sampler
    }

    /// Produces one unbiased bit using at most `retry_budget` raw reads.
    ///
    /// Every attempt costs two reads and at least one attempt is always
    /// made, so budgets below two still read one pair.
    pub fn random_bit(&mut self, retry_budget: u32) -> Result<bool, EntropyError> {
        self.draw_bit(retry_budget).ok_or_else(|| {
            self.stats.failed_draws += 1;
            tracing::debug!(bit = 0, of = 1, budget = retry_budget, "Analog draw exhausted");
            EntropyError::InsufficientEntropy {
                bit: 0,
                budget: retry_budget,
            }
        })
    }

    /// Assembles `n` bits, most significant first.
    ///
    /// Each bit gets its own `per_bit_budget`; if any bit runs out the
    /// whole draw fails and nothing is returned.
    pub fn random_bits(&mut self, n: u32, per_bit_budget: u32) -> Result<u32, EntropyError> {
        if n > u32::BITS {
            return Err(EntropyError::TooManyBits { requested: n });
        }

        let mut result = 0u32;
        for bit in 0..n {
            match self.draw_bit(per_bit_budget) {
                Some(b) => result = (result << 1) | u32::from(b),
                None => {
                    self.stats.failed_draws += 1;
                    tracing::debug!(bit, of = n, budget = per_bit_budget, "Analog draw exhausted");
                    return Err(EntropyError::InsufficientEntropy {
                        bit,
                        budget: per_bit_budget,
                    });
                }
            }
        }
        Ok(result)
    }

    fn draw_bit(&mut self, retry_budget: u32) -> Option<bool> {
        let mut remaining = retry_budget;
        loop {
            let channel = self.sampler.next_channel();
            let first = self.sampler.read_low_bit(channel);
            let second = self.sampler.read_low_bit(channel);
            self.stats.raw_reads += 2;

            if let Some(bit) = debias_pair(first, second) {
                self.stats.bits_emitted += 1;
                return Some(bit);
            }

            self.stats.pairs_discarded += 1;
            tracing::trace!(channel, value = first, "Discarded equal pair");

            remaining = remaining.saturating_sub(2);
            if remaining == 0 {
                return None;
            }
        }
    }
}

impl<A: AnalogInput> EntropySource for PairedChannelDebiasedSource<A> {
    fn random_byte(&mut self) -> Result<u8, EntropyError> {
        // Eight bits never exceed u8.
        self.random_bits(8, self.per_bit_budget).map(|v| v as u8)
    }

    fn random_u32(&mut self) -> Result<u32, EntropyError> {
        self.random_bits(32, self.per_bit_budget)
    }

    fn stats(&self) -> DrawStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{chi_square_uniform, CHI_SQUARE_1DOF_P001, CHI_SQUARE_255DOF_P001};
    use rand_chacha::ChaCha8Rng;
    use rand_core::{RngCore, SeedableRng};
    use std::collections::VecDeque;

    /// Replays scripted low bits and records which channel each read hit.
    struct Scripted {
        bits: VecDeque<bool>,
        reads: Vec<u8>,
    }

    impl Scripted {
        fn new(bits: &[u8]) -> Self {
            Self {
                bits: bits.iter().map(|&b| b == 1).collect(),
                reads: Vec::new(),
            }
        }
    }

    impl AnalogInput for Scripted {
        fn read(&mut self, channel: u8) -> u16 {
            self.reads.push(channel);
            // Exhausted scripts read as a constant, which never debiases.
            u16::from(self.bits.pop_front().unwrap_or(false))
        }
    }

    /// Independent samples whose low bit is 1 with probability `p_one`.
    struct Biased {
        rng: ChaCha8Rng,
        threshold: u32,
    }

    impl Biased {
        fn new(seed: u64, p_one: f64) -> Self {
            Self {
                rng: ChaCha8Rng::seed_from_u64(seed),
                threshold: (p_one * f64::from(u32::MAX)) as u32,
            }
        }
    }

    impl AnalogInput for Biased {
        fn read(&mut self, _channel: u8) -> u16 {
            let low = u16::from(self.rng.next_u32() < self.threshold);
            0x200 | low
        }
    }

    fn scripted_source(bits: &[u8], channels: Vec<u8>) -> PairedChannelDebiasedSource<Scripted> {
        let sampler = AnalogSampler::new(Scripted::new(bits), channels).unwrap();
        PairedChannelDebiasedSource::new(sampler)
    }

    #[test]
    fn test_pair_table() {
        assert_eq!(debias_pair(false, false), None);
        assert_eq!(debias_pair(false, true), Some(true));
        assert_eq!(debias_pair(true, false), Some(false));
        assert_eq!(debias_pair(true, true), None);
    }

    #[test]
    fn test_emits_second_of_unequal_pair() {
        let mut source = scripted_source(&[0, 0, 1, 1, 1, 0], vec![0, 1, 2]);
        assert_eq!(source.random_bit(100), Ok(false));
        assert_eq!(source.stats().pairs_discarded, 2);
        assert_eq!(source.stats().raw_reads, 6);
    }

    #[test]
    fn test_pairs_share_a_channel_and_rotate() {
        let mut source = scripted_source(&[0, 0, 1, 1, 0, 1, 1, 0], vec![3, 4, 5]);
        assert_eq!(source.random_bit(100), Ok(true));
        assert_eq!(source.random_bit(100), Ok(false));
        // Three attempts for the first bit, one for the second; the
        // cursor carries over between calls.
        assert_eq!(source.sampler().input().reads, vec![3, 3, 4, 4, 5, 5, 3, 3]);
    }

    #[test]
    fn test_budget_counts_raw_reads() {
        let mut source = scripted_source(&[], vec![0]);
        assert_eq!(
            source.random_bit(10),
            Err(EntropyError::InsufficientEntropy { bit: 0, budget: 10 })
        );
        assert_eq!(source.stats().raw_reads, 10);
        assert_eq!(source.stats().failed_draws, 1);

        let mut source = scripted_source(&[], vec![0]);
        assert!(source.random_bit(0).is_err());
        assert_eq!(source.stats().raw_reads, 2);
    }

    #[test]
    fn test_byte_draws_use_configured_budget() {
        let sampler = AnalogSampler::new(Scripted::new(&[]), vec![0]).unwrap();
        let mut source = PairedChannelDebiasedSource::with_budget(sampler, 6);
        assert_eq!(source.per_bit_budget(), 6);
        assert_eq!(
            source.random_byte(),
            Err(EntropyError::InsufficientEntropy { bit: 0, budget: 6 })
        );
        assert_eq!(source.stats().raw_reads, 6);
    }

    #[test]
    fn test_bits_are_msb_first() {
        // 1, 0, 1, 1
        let mut source = scripted_source(&[0, 1, 1, 0, 0, 1, 0, 1], vec![0]);
        assert_eq!(source.random_bits(4, 100), Ok(0b1011));
    }

    #[test]
    fn test_failed_bit_fails_whole_draw() {
        // Two good bits, then a stuck channel.
        let mut source = scripted_source(&[0, 1, 1, 0], vec![0]);
        assert_eq!(
            source.random_bits(8, 20),
            Err(EntropyError::InsufficientEntropy { bit: 2, budget: 20 })
        );
        assert_eq!(source.stats().failed_draws, 1);
    }

    #[test]
    fn test_too_many_bits() {
        let mut source = scripted_source(&[], vec![0]);
        assert_eq!(
            source.random_bits(33, 100),
            Err(EntropyError::TooManyBits { requested: 33 })
        );
    }

    #[test]
    fn test_zero_bits_is_zero() {
        let mut source = scripted_source(&[], vec![0]);
        assert_eq!(source.random_bits(0, 100), Ok(0));
    }

    #[test]
    fn test_heavily_biased_input_yields_fair_bits() {
        let sampler = AnalogSampler::new(Biased::new(0x5eed, 0.1), vec![0, 1, 2, 3]).unwrap();
        let mut source = PairedChannelDebiasedSource::with_budget(sampler, 1000);

        let mut counts = [0u64; 2];
        for _ in 0..20_000 {
            let bit = source.random_bit(1000).unwrap();
            counts[usize::from(bit)] += 1;
        }

        let chi2 = chi_square_uniform(&counts);
        assert!(chi2 < CHI_SQUARE_1DOF_P001, "chi-square {chi2} for counts {counts:?}");
        // Raw input is 90% zeros, so most pairs are discarded.
        assert!(source.stats().pairs_discarded > source.stats().bits_emitted);
    }

    #[test]
    fn test_heavily_biased_input_yields_uniform_bytes() {
        let sampler = AnalogSampler::new(Biased::new(0xfeed, 0.1), vec![0, 1]).unwrap();
        let mut source = PairedChannelDebiasedSource::with_budget(sampler, 1000);

        let mut counts = [0u64; 256];
        for _ in 0..10_000 {
            counts[usize::from(source.random_byte().unwrap())] += 1;
        }

        let chi2 = chi_square_uniform(&counts);
        assert!(chi2 < CHI_SQUARE_255DOF_P001, "chi-square {chi2}");
    }

    #[test]
    fn test_raw_bias_is_visible_without_debiasing() {
        let mut raw = Biased::new(0x5eed, 0.1);
        let mut counts = [0u64; 2];
        for _ in 0..20_000 {
            counts[usize::from(raw.read(0) & 1)] += 1;
        }
        assert!(chi_square_uniform(&counts) > CHI_SQUARE_1DOF_P001);
    }
}

//! Unbiased random draws from noisy hardware.
//!
//! Two raw channels are supported, both behind the [`EntropySource`]
//! trait so address generation never depends on a particular mechanism:
//!
//! - [`PairedChannelDebiasedSource`] reads the low bit of analog samples,
//!   rotating across channels, and debiases pairs of readings.
//! - [`TimerJitterDigestSource`] captures a free-running timer at each
//!   watchdog interrupt and folds the window into a 32-bit digest.
//!
//! Every draw has a finite budget and fails closed with an
//! [`EntropyError`] instead of returning a weak value.

mod analog;
mod debias;
#[cfg(test)]
pub(crate) mod fake;
mod jitter;

pub use analog::{AnalogInput, AnalogSampler};
pub use debias::{debias_pair, PairedChannelDebiasedSource, DEFAULT_PER_BIT_BUDGET};
pub use jitter::{
    CaptureSession, CaptureState, CapturedWindow, InterruptSource, JitterDigest,
    TimerJitterDigestSource, DEFAULT_CAPTURE_SAMPLES, MAX_CAPTURE_SAMPLES, MIN_CAPTURE_SAMPLES,
};

use std::time::Duration;
use thiserror::Error;

/// Errors produced by entropy draws.
///
/// All of these are recoverable: the caller may retry later or
/// widen the budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntropyError {
    #[error("insufficient entropy: bit {bit} not produced within {budget} reads")]
    InsufficientEntropy { bit: u32, budget: u32 },

    #[error("cannot draw {requested} bits at once (maximum 32)")]
    TooManyBits { requested: u32 },

    #[error("no analog channels configured")]
    NoChannels,

    #[error("capture window timed out after {waited:?} with {remaining} interrupts outstanding")]
    CaptureTimeout { remaining: i32, waited: Duration },

    #[error("no acceptable value after {attempts} redraws")]
    RejectionExhausted { attempts: u32 },
}

/// Counters describing the work a source has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    /// Raw channel reads performed.
    pub raw_reads: u64,
    /// Debiased bits emitted.
    pub bits_emitted: u64,
    /// Sample pairs discarded because both readings agreed.
    pub pairs_discarded: u64,
    /// Capture windows completed by the jitter sampler.
    pub captures: u64,
    /// Draws that failed for any reason.
    pub failed_draws: u64,
}

impl DrawStats {
    /// Sums two sets of counters.
    pub fn merged(self, other: DrawStats) -> DrawStats {
        DrawStats {
            raw_reads: self.raw_reads + other.raw_reads,
            bits_emitted: self.bits_emitted + other.bits_emitted,
            pairs_discarded: self.pairs_discarded + other.pairs_discarded,
            captures: self.captures + other.captures,
            failed_draws: self.failed_draws + other.failed_draws,
        }
    }
}

/// A source of unbiased random bytes and words.
///
/// Implementations carry their own effort budget; a draw either returns
/// a uniformly distributed value or fails without a partial result.
pub trait EntropySource {
    /// Draws 8 random bits.
    fn random_byte(&mut self) -> Result<u8, EntropyError>;

    /// Draws 32 random bits.
    fn random_u32(&mut self) -> Result<u32, EntropyError>;

    /// Fills `dest` with random bytes.
    ///
    /// On failure the contents of `dest` are unspecified.
    fn fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        for byte in dest.iter_mut() {
            *byte = self.random_byte()?;
        }
        Ok(())
    }

    /// Returns counters for the work done so far.
    fn stats(&self) -> DrawStats {
        DrawStats::default()
    }
}

impl<S: EntropySource + ?Sized> EntropySource for &mut S {
    fn random_byte(&mut self) -> Result<u8, EntropyError> {
        (**self).random_byte()
    }

    fn random_u32(&mut self) -> Result<u32, EntropyError> {
        (**self).random_u32()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        (**self).fill_bytes(dest)
    }

    fn stats(&self) -> DrawStats {
        (**self).stats()
    }
}

impl<S: EntropySource + ?Sized> EntropySource for Box<S> {
    fn random_byte(&mut self) -> Result<u8, EntropyError> {
        (**self).random_byte()
    }

    fn random_u32(&mut self) -> Result<u32, EntropyError> {
        (**self).random_u32()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        (**self).fill_bytes(dest)
    }

    fn stats(&self) -> DrawStats {
        (**self).stats()
    }
}

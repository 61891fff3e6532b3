//! Deterministic sources for tests.

use super::{DrawStats, EntropyError, EntropySource};
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};
use std::collections::VecDeque;

/// Replays a fixed byte sequence, then fails.
///
/// `random_u32` consumes four bytes, most significant first.
pub(crate) struct ScriptedSource {
    bytes: VecDeque<u8>,
    drawn: u64,
}

impl ScriptedSource {
    pub(crate) fn bytes(bytes: impl IntoIterator<Item = u8>) -> Self {
        Self {
            bytes: bytes.into_iter().collect(),
            drawn: 0,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len()
    }
}

impl EntropySource for ScriptedSource {
    fn random_byte(&mut self) -> Result<u8, EntropyError> {
        let byte = self
            .bytes
            .pop_front()
            .ok_or(EntropyError::InsufficientEntropy { bit: 0, budget: 0 })?;
        self.drawn += 1;
        Ok(byte)
    }

    fn random_u32(&mut self) -> Result<u32, EntropyError> {
        let mut word = 0u32;
        for _ in 0..4 {
            word = (word << 8) | u32::from(self.random_byte()?);
        }
        Ok(word)
    }

    fn stats(&self) -> DrawStats {
        DrawStats {
            bits_emitted: self.drawn * 8,
            ..Default::default()
        }
    }
}

/// Uniform bytes from a seeded ChaCha stream. Never fails.
pub(crate) struct RngSource(ChaCha8Rng);

impl RngSource {
    pub(crate) fn seeded(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl EntropySource for RngSource {
    fn random_byte(&mut self) -> Result<u8, EntropyError> {
        Ok(self.0.next_u32() as u8)
    }

    fn random_u32(&mut self) -> Result<u32, EntropyError> {
        Ok(self.0.next_u32())
    }
}

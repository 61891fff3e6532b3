//! Floating analog pins.

use crate::entropy::AnalogInput;
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};
use std::collections::HashMap;

/// Mid-scale reading of a 10-bit converter.
const MID_SCALE: u16 = 0x200;

/// Default probability that a channel's low bit reads as 1.
const DEFAULT_P_ONE: f64 = 0.35;

/// Unconnected analog inputs whose low bit has a fixed bias.
///
/// Readings hover around mid-scale with a few counts of noise. Each
/// channel's low bit is 1 with its own probability, so the raw stream is
/// visibly biased until it is debiased.
#[derive(Debug)]
pub struct SimulatedAnalogInput {
    rng: ChaCha8Rng,
    default_p_one: f64,
    channel_p_one: HashMap<u8, f64>,
    reads: u64,
}

impl SimulatedAnalogInput {
    /// Creates a reproducible input from `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Creates an input seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self::with_rng(ChaCha8Rng::from_entropy())
    }

    fn with_rng(rng: ChaCha8Rng) -> Self {
        Self {
            rng,
            default_p_one: DEFAULT_P_ONE,
            channel_p_one: HashMap::new(),
            reads: 0,
        }
    }

    /// Sets the low-bit bias of every channel without its own setting.
    pub fn with_bias(mut self, p_one: f64) -> Self {
        self.default_p_one = p_one.clamp(0.0, 1.0);
        self
    }

    /// Sets the low-bit bias of one channel.
    pub fn with_channel_bias(mut self, channel: u8, p_one: f64) -> Self {
        self.channel_p_one.insert(channel, p_one.clamp(0.0, 1.0));
        self
    }

    /// Returns the probability that `channel` reads an odd value.
    pub fn bias(&self, channel: u8) -> f64 {
        self.channel_p_one
            .get(&channel)
            .copied()
            .unwrap_or(self.default_p_one)
    }

    /// Number of samples taken.
    pub fn reads(&self) -> u64 {
        self.reads
    }
}

impl AnalogInput for SimulatedAnalogInput {
    fn read(&mut self, channel: u8) -> u16 {
        self.reads += 1;
        let threshold = (self.bias(channel) * f64::from(u32::MAX)) as u32;
        let low = u16::from(self.rng.next_u32() < threshold);
        let noise = (self.rng.next_u32() % 8) as u16;
        ((MID_SCALE + noise * 2) & 0x3FE) | low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn odd_fraction(input: &mut SimulatedAnalogInput, channel: u8) -> f64 {
        let n = 20_000;
        let odd = (0..n).filter(|_| input.read(channel) & 1 == 1).count();
        odd as f64 / n as f64
    }

    #[test]
    fn test_readings_stay_near_mid_scale() {
        let mut input = SimulatedAnalogInput::seeded(1);
        for _ in 0..1000 {
            let sample = input.read(0);
            assert!((MID_SCALE..MID_SCALE + 16).contains(&sample), "{sample:#x}");
        }
        assert_eq!(input.reads(), 1000);
    }

    #[test]
    fn test_low_bit_follows_bias() {
        let mut input = SimulatedAnalogInput::seeded(2)
            .with_bias(0.1)
            .with_channel_bias(3, 0.8);
        assert!((odd_fraction(&mut input, 0) - 0.1).abs() < 0.02);
        assert!((odd_fraction(&mut input, 3) - 0.8).abs() < 0.02);
    }

    #[test]
    fn test_same_seed_same_readings() {
        let mut a = SimulatedAnalogInput::seeded(9);
        let mut b = SimulatedAnalogInput::seeded(9);
        for channel in 0..16 {
            assert_eq!(a.read(channel), b.read(channel));
        }
    }

    #[test]
    fn test_bias_is_clamped() {
        let input = SimulatedAnalogInput::seeded(0).with_channel_bias(1, 3.0);
        assert_eq!(input.bias(1), 1.0);
        assert_eq!(input.bias(2), DEFAULT_P_ONE);
    }
}

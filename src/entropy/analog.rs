//! Analog input sampling.

use super::EntropyError;

/// A hardware analog-to-digital converter.
///
/// Only the least significant bit of each sample is used, so the
/// reading's scale and reference voltage do not matter.
pub trait AnalogInput {
    /// Takes one raw sample from `channel`.
    fn read(&mut self, channel: u8) -> u16;
}

impl<A: AnalogInput + ?Sized> AnalogInput for &mut A {
    fn read(&mut self, channel: u8) -> u16 {
        (**self).read(channel)
    }
}

/// Rotates reads across an ordered list of analog channels.
///
/// The cursor is the only state: it advances by one channel per
/// [`next_channel`](Self::next_channel) call and wraps at the end of
/// the list, persisting across draws.
#[derive(Debug)]
pub struct AnalogSampler<A> {
    input: A,
    channels: Vec<u8>,
    next: usize,
}

impl<A: AnalogInput> AnalogSampler<A> {
    /// Creates a sampler over `channels`, in the order given.
    pub fn new(input: A, channels: impl Into<Vec<u8>>) -> Result<Self, EntropyError> {
        let channels = channels.into();
        if channels.is_empty() {
            return Err(EntropyError::NoChannels);
        }
        Ok(Self {
            input,
            channels,
            next: 0,
        })
    }

    /// Returns the channel to sample next and advances the cursor.
    pub fn next_channel(&mut self) -> u8 {
        let channel = self.channels[self.next];
        self.next = (self.next + 1) % self.channels.len();
        channel
    }

    /// Reads the low-order bit of one sample from `channel`.
    #[inline]
    pub fn read_low_bit(&mut self, channel: u8) -> bool {
        self.input.read(channel) & 1 == 1
    }

    /// Returns the configured channels.
    pub fn channels(&self) -> &[u8] {
        &self.channels
    }

    /// Returns the position of the cursor within [`channels`](Self::channels).
    pub fn cursor(&self) -> usize {
        self.next
    }

    /// Returns the underlying input.
    pub fn input(&self) -> &A {
        &self.input
    }

    /// Consumes the sampler, returning the underlying input.
    pub fn into_inner(self) -> A {
        self.input
    }
}

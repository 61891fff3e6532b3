//! Timer-jitter capture driven by a watchdog interrupt.
//!
//! The watchdog runs from its own low-frequency oscillator while the
//! sampled counter runs from the main clock. The phase between the two
//! drifts irregularly, so the counter's low byte at each interrupt is
//! noisy. A capture window collects a fixed number of those bytes and
//! folds them into a 32-bit digest.
//!
//! # Sharing with the interrupt handler
//!
//! [`CaptureState`] is the only memory shared with the handler. It is
//! written by [`CaptureState::on_interrupt`] while the interrupt is
//! enabled and read by a [`CaptureSession`] only after the interrupt has
//! been disabled again. Enable/disable of the single interrupt source is
//! the whole synchronisation scheme; no lock is taken.

use super::{DrawStats, EntropyError, EntropySource};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI32, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Size of the capture buffer.
pub const MAX_CAPTURE_SAMPLES: usize = 64;

/// Smallest window whose `ShiftXor` digest fills all 32 bits.
pub const MIN_CAPTURE_SAMPLES: usize = 4;

/// Interrupts per window unless configured otherwise.
pub const DEFAULT_CAPTURE_SAMPLES: usize = 32;

/// A periodic interrupt that can be masked.
///
/// While enabled, each firing must call [`CaptureState::on_interrupt`]
/// with the low byte of the free-running counter. Once `disable` returns
/// the handler must not run again until the next `enable`.
pub trait InterruptSource {
    /// Unmasks the interrupt.
    fn enable(&mut self);

    /// Masks the interrupt.
    fn disable(&mut self);
}

/// Capture buffer and countdown shared with the interrupt handler.
#[derive(Debug)]
pub struct CaptureState {
    countdown: AtomicI32,
    cursor: AtomicUsize,
    samples: [AtomicU8; MAX_CAPTURE_SAMPLES],
}

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SAMPLE: AtomicU8 = AtomicU8::new(0);

impl CaptureState {
    /// Creates an idle capture state.
    pub const fn new() -> Self {
        Self {
            countdown: AtomicI32::new(0),
            cursor: AtomicUsize::new(0),
            samples: [EMPTY_SAMPLE; MAX_CAPTURE_SAMPLES],
        }
    }

    /// Records one interrupt.
    ///
    /// This is the handler body. Firings after the countdown has reached
    /// zero are ignored.
    pub fn on_interrupt(&self, counter_low: u8) {
        if self.countdown.load(Ordering::Acquire) <= 0 {
            return;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        if index < MAX_CAPTURE_SAMPLES {
            self.samples[index].store(counter_low, Ordering::Relaxed);
        }
        self.countdown.fetch_sub(1, Ordering::Release);
    }

    /// Returns the number of interrupts still expected.
    pub fn remaining(&self) -> i32 {
        self.countdown.load(Ordering::Acquire)
    }

    fn arm(&self, samples: usize) {
        self.cursor.store(0, Ordering::Relaxed);
        // Bounded by MAX_CAPTURE_SAMPLES.
        self.countdown.store(samples as i32, Ordering::Release);
    }

    fn snapshot(&self) -> Vec<u8> {
        let len = self.cursor.load(Ordering::Acquire).min(MAX_CAPTURE_SAMPLES);
        self.samples[..len]
            .iter()
            .map(|s| s.load(Ordering::Relaxed))
            .collect()
    }
}

impl Default for CaptureState {
    fn default() -> Self {
        Self::new()
    }
}

/// How a capture window is folded into 32 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JitterDigest {
    /// `acc = (acc << 8) ^ sample`.
    ///
    /// Only the last four samples of a window survive the shifts, so a
    /// longer window does not add entropy.
    #[default]
    ShiftXor,
    /// `acc = acc.rotate_left(1) ^ sample`; every sample contributes.
    RotateXor,
}

impl JitterDigest {
    /// Folds `samples` into a digest.
    pub fn fold(self, samples: &[u8]) -> u32 {
        samples.iter().fold(0u32, |acc, &s| match self {
            JitterDigest::ShiftXor => (acc << 8) ^ u32::from(s),
            JitterDigest::RotateXor => acc.rotate_left(1) ^ u32::from(s),
        })
    }
}

/// Counter samples from one completed window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedWindow {
    samples: Vec<u8>,
}

impl CapturedWindow {
    /// Returns the captured counter bytes in firing order.
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Folds the window with `digest`.
    pub fn digest(&self, digest: JitterDigest) -> u32 {
        digest.fold(&self.samples)
    }
}

/// Exclusive use of the interrupt and capture buffer for one window.
///
/// Beginning a session masks the interrupt, arms the buffer and only
/// then unmasks it. The interrupt is masked again before the buffer is
/// read, and also when the session is dropped on any other path.
pub struct CaptureSession<'a, I: InterruptSource> {
    irq: &'a mut I,
    state: &'a CaptureState,
    masked: bool,
}

impl<'a, I: InterruptSource> CaptureSession<'a, I> {
    /// Starts capturing `samples` interrupts.
    ///
    /// `samples` is clamped to [`MAX_CAPTURE_SAMPLES`].
    pub fn begin(irq: &'a mut I, state: &'a CaptureState, samples: usize) -> Self {
        irq.disable();
        state.arm(samples.min(MAX_CAPTURE_SAMPLES));
        irq.enable();
        Self {
            irq,
            state,
            masked: false,
        }
    }

    /// Busy-waits for the window to fill, then returns its samples.
    pub fn wait(mut self, timeout: Duration) -> Result<CapturedWindow, EntropyError> {
        let started = Instant::now();
        while self.state.remaining() > 0 {
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(EntropyError::CaptureTimeout {
                    remaining: self.state.remaining(),
                    waited,
                });
            }
            std::hint::spin_loop();
        }

        self.mask();
        Ok(CapturedWindow {
            samples: self.state.snapshot(),
        })
    }

    fn mask(&mut self) {
        if !self.masked {
            self.irq.disable();
            self.masked = true;
        }
    }
}

impl<I: InterruptSource> Drop for CaptureSession<'_, I> {
    fn drop(&mut self) {
        self.mask();
    }
}

/// 32-bit words from timer-jitter capture windows.
///
/// Each [`random_u32`](EntropySource::random_u32) runs one full window;
/// [`random_byte`](EntropySource::random_byte) returns the digest's low
/// byte. The digest is not debiased: its fairness depends on how evenly
/// the counter bytes are distributed.
pub struct TimerJitterDigestSource<I> {
    irq: I,
    state: Arc<CaptureState>,
    samples: usize,
    digest: JitterDigest,
    timeout: Duration,
    stats: DrawStats,
}

impl<I: InterruptSource> TimerJitterDigestSource<I> {
    /// Creates a source with default window size, digest and timeout.
    pub fn new(irq: I, state: Arc<CaptureState>) -> Self {
        Self {
            irq,
            state,
            samples: DEFAULT_CAPTURE_SAMPLES,
            digest: JitterDigest::default(),
            timeout: Duration::from_secs(2),
            stats: DrawStats::default(),
        }
    }

    /// Sets the number of interrupts per window.
    ///
    /// Clamped to `MIN_CAPTURE_SAMPLES..=MAX_CAPTURE_SAMPLES`.
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples.clamp(MIN_CAPTURE_SAMPLES, MAX_CAPTURE_SAMPLES);
        self
    }

    /// Sets the digest used to fold each window.
    pub fn with_digest(mut self, digest: JitterDigest) -> Self {
        self.digest = digest;
        self
    }

    /// Sets how long to wait for a window before failing.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs one capture window and returns its raw samples.
    pub fn capture(&mut self) -> Result<CapturedWindow, EntropyError> {
        let session = CaptureSession::begin(&mut self.irq, &self.state, self.samples);
        match session.wait(self.timeout) {
            Ok(window) => {
                self.stats.captures += 1;
                self.stats.raw_reads += window.samples().len() as u64;
                tracing::trace!(samples = window.samples().len(), "Capture window complete");
                Ok(window)
            }
            Err(e) => {
                self.stats.failed_draws += 1;
                tracing::debug!(error = %e, "Capture window failed");
                Err(e)
            }
        }
    }

    /// Returns the interrupt source.
    pub fn interrupt(&self) -> &I {
        &self.irq
    }
}

impl<I: InterruptSource> EntropySource for TimerJitterDigestSource<I> {
    fn random_byte(&mut self) -> Result<u8, EntropyError> {
        let digest = self.capture()?.digest(self.digest);
        self.stats.bits_emitted += 8;
        Ok(digest.to_le_bytes()[0])
    }

    fn random_u32(&mut self) -> Result<u32, EntropyError> {
        let digest = self.capture()?.digest(self.digest);
        self.stats.bits_emitted += 32;
        Ok(digest)
    }

    fn stats(&self) -> DrawStats {
        self.stats
    }
}

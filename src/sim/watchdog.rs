//! A watchdog interrupt emulated by a host thread.

use crate::entropy::{CaptureState, InterruptSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Interval between simulated interrupts.
pub const DEFAULT_WATCHDOG_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct Shared {
    /// Held by the thread for the whole handler call.
    enabled: Mutex<bool>,
    shutdown: AtomicBool,
}

impl Shared {
    fn enabled(&self) -> MutexGuard<'_, bool> {
        self.enabled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Fires the capture handler from a background thread.
///
/// The thread sleeps for the period, then delivers the low byte of the
/// host's nanosecond clock. Scheduler wake-up latency plays the part of
/// the oscillator drift on a real device.
#[derive(Debug)]
pub struct HostWatchdog {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl HostWatchdog {
    /// Starts the interrupt thread, initially masked.
    pub fn spawn(state: Arc<CaptureState>, period: Duration) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            enabled: Mutex::new(false),
            shutdown: AtomicBool::new(false),
        });

        let worker = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("host-watchdog".to_string())
            .spawn(move || {
                let epoch = Instant::now();
                while !worker.shutdown.load(Ordering::Acquire) {
                    thread::sleep(period);
                    let enabled = worker.enabled();
                    if *enabled {
                        let counter_low = epoch.elapsed().as_nanos() as u8;
                        tracing::trace!(counter_low, "Watchdog fired");
                        state.on_interrupt(counter_low);
                    }
                }
            })?;

        tracing::debug!(?period, "Host watchdog started");
        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Returns true while the interrupt is unmasked.
    pub fn is_enabled(&self) -> bool {
        *self.shared.enabled()
    }
}

impl InterruptSource for HostWatchdog {
    fn enable(&mut self) {
        *self.shared.enabled() = true;
    }

    fn disable(&mut self) {
        // Waits out a handler call in progress.
        *self.shared.enabled() = false;
    }
}

impl Drop for HostWatchdog {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("Host watchdog thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::{CaptureSession, EntropySource, TimerJitterDigestSource};

    #[test]
    fn test_starts_masked() {
        let state = Arc::new(CaptureState::new());
        let watchdog = HostWatchdog::spawn(state, DEFAULT_WATCHDOG_PERIOD).unwrap();
        assert!(!watchdog.is_enabled());
    }

    #[test]
    fn test_fills_a_capture_window() {
        let state = Arc::new(CaptureState::new());
        let mut watchdog = HostWatchdog::spawn(state.clone(), DEFAULT_WATCHDOG_PERIOD).unwrap();

        let session = CaptureSession::begin(&mut watchdog, &state, 8);
        let window = session.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(window.samples().len(), 8);
        assert!(!watchdog.is_enabled());
    }

    #[test]
    fn test_drives_jitter_source() {
        let state = Arc::new(CaptureState::new());
        let watchdog = HostWatchdog::spawn(state.clone(), DEFAULT_WATCHDOG_PERIOD).unwrap();
        let mut source = TimerJitterDigestSource::new(watchdog, state)
            .with_samples(4)
            .with_timeout(Duration::from_secs(5));

        source.random_u32().unwrap();
        assert_eq!(source.stats().captures, 1);
        assert!(!source.interrupt().is_enabled());
    }

    #[test]
    fn test_masked_watchdog_does_not_fire() {
        let state = Arc::new(CaptureState::new());
        let mut watchdog = HostWatchdog::spawn(state.clone(), DEFAULT_WATCHDOG_PERIOD).unwrap();

        let session = CaptureSession::begin(&mut watchdog, &state, 8);
        drop(session);
        let remaining = state.remaining();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(state.remaining(), remaining);
    }
}

//! Simulated hardware for running on a host.
//!
//! The CLI has no pins or watchdog to sample, so it drives the entropy
//! sources with these stand-ins. They are deliberately imperfect: the
//! analog channels are biased and the watchdog is a sleeping thread.

mod analog;
mod watchdog;

pub use analog::SimulatedAnalogInput;
pub use watchdog::{HostWatchdog, DEFAULT_WATCHDOG_PERIOD};

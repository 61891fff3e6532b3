//! Prometheus metrics for entropy draws and record storage.
//!
//! Metrics are gathered into a registry and rendered in the Prometheus
//! text format; the CLI prints them at the end of a run.
//!
//! # Metrics Exposed
//!
//! ## Entropy Metrics
//! - `device_identity_entropy_raw_reads_total` - Raw channel reads
//! - `device_identity_entropy_bits_emitted_total` - Bits handed to callers
//! - `device_identity_entropy_pairs_discarded_total` - Equal pairs thrown away
//! - `device_identity_entropy_captures_total` - Jitter windows completed
//! - `device_identity_entropy_failed_draws_total` - Draws that failed closed
//!
//! ## Store Metrics
//! - `device_identity_record_saves_total` - Records written
//! - `device_identity_record_hits_total` - Records verified on load
//! - `device_identity_record_name_misses_total` - Loads rejected on name
//! - `device_identity_record_crc_misses_total` - Loads rejected on checksum
//!
//! ## Survey Metrics
//! - `device_identity_survey_bit_bias` - Bit bias (deviation from 0.5)
//! - `device_identity_survey_byte_chi_square` - Byte histogram chi-square
//! - `device_identity_survey_autocorrelation` - Lag-1 autocorrelation
//!
//! # Example
//!
//! ```
//! use device_identity::metrics::{MetricsRegistry, MetricsSnapshot};
//! use device_identity::storage::StoreStats;
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let snapshot = MetricsSnapshot {
//!     store: StoreStats { saves: 1, ..Default::default() },
//!     ..Default::default()
//! };
//! registry.update(&snapshot);
//!
//! assert!(registry.encode().unwrap().contains("device_identity_record_saves_total 1"));
//! ```

mod collector;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};

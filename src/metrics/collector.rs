//! Metrics collection and registry.

use crate::analysis::StatisticalTests;
use crate::entropy::DrawStats;
use crate::storage::StoreStats;
use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of system state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Entropy source counters.
    pub draws: DrawStats,
    /// Record store counters.
    pub store: StoreStats,
    /// Results of the latest survey, if one ran.
    pub survey: Option<StatisticalTests>,
}

/// Prometheus metrics registry for identity provisioning.
pub struct MetricsRegistry {
    registry: Registry,

    // Entropy metrics
    raw_reads_total: IntCounter,
    bits_emitted_total: IntCounter,
    pairs_discarded_total: IntCounter,
    captures_total: IntCounter,
    failed_draws_total: IntCounter,

    // Store metrics
    record_saves_total: IntCounter,
    record_hits_total: IntCounter,
    record_name_misses_total: IntCounter,
    record_crc_misses_total: IntCounter,

    // Survey metrics
    bit_bias: Gauge,
    byte_chi_square: Gauge,
    autocorrelation: Gauge,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, MetricsError> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, MetricsError> {
    let gauge = Gauge::new(name, help)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Advances a counter to `target`; counters never move backwards.
fn advance(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let raw_reads_total = counter(
            &registry,
            "device_identity_entropy_raw_reads_total",
            "Raw channel reads performed",
        )?;
        let bits_emitted_total = counter(
            &registry,
            "device_identity_entropy_bits_emitted_total",
            "Random bits emitted by the entropy source",
        )?;
        let pairs_discarded_total = counter(
            &registry,
            "device_identity_entropy_pairs_discarded_total",
            "Sample pairs discarded by the debiaser",
        )?;
        let captures_total = counter(
            &registry,
            "device_identity_entropy_captures_total",
            "Timer-jitter capture windows completed",
        )?;
        let failed_draws_total = counter(
            &registry,
            "device_identity_entropy_failed_draws_total",
            "Entropy draws that failed closed",
        )?;

        let record_saves_total = counter(
            &registry,
            "device_identity_record_saves_total",
            "Records written",
        )?;
        let record_hits_total = counter(
            &registry,
            "device_identity_record_hits_total",
            "Records loaded and verified",
        )?;
        let record_name_misses_total = counter(
            &registry,
            "device_identity_record_name_misses_total",
            "Record loads rejected on name mismatch",
        )?;
        let record_crc_misses_total = counter(
            &registry,
            "device_identity_record_crc_misses_total",
            "Record loads rejected on checksum mismatch",
        )?;

        let bit_bias = gauge(
            &registry,
            "device_identity_survey_bit_bias",
            "Bit bias of the latest survey (deviation from 0.5)",
        )?;
        let byte_chi_square = gauge(
            &registry,
            "device_identity_survey_byte_chi_square",
            "Byte histogram chi-square of the latest survey",
        )?;
        let autocorrelation = gauge(
            &registry,
            "device_identity_survey_autocorrelation",
            "Lag-1 autocorrelation of the latest survey",
        )?;

        Ok(Self {
            registry,
            raw_reads_total,
            bits_emitted_total,
            pairs_discarded_total,
            captures_total,
            failed_draws_total,
            record_saves_total,
            record_hits_total,
            record_name_misses_total,
            record_crc_misses_total,
            bit_bias,
            byte_chi_square,
            autocorrelation,
        })
    }

    /// Updates all metrics from a snapshot of system state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        let draws = &snapshot.draws;
        advance(&self.raw_reads_total, draws.raw_reads);
        advance(&self.bits_emitted_total, draws.bits_emitted);
        advance(&self.pairs_discarded_total, draws.pairs_discarded);
        advance(&self.captures_total, draws.captures);
        advance(&self.failed_draws_total, draws.failed_draws);

        let store = &snapshot.store;
        advance(&self.record_saves_total, store.saves);
        advance(&self.record_hits_total, store.hits);
        advance(&self.record_name_misses_total, store.name_misses);
        advance(&self.record_crc_misses_total, store.crc_misses);

        // Only update if present
        if let Some(stats) = &snapshot.survey {
            self.bit_bias.set(stats.bit_bias);
            self.byte_chi_square.set(stats.byte_chi_square);
            self.autocorrelation.set(stats.autocorrelation);
        }
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

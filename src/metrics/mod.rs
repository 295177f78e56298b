//! Prometheus metrics for schedule generation
//!
//! Tracks runs, assignments, reruns, skipped slots, prefetch failures and run
//! duration.
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If it is never called, or registration fails, recording is a no-op.

use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder, Histogram,
    TextEncoder,
};
use std::sync::OnceLock;

use crate::scheduler::schedule::GenerationSummary;

// ============================================================================
// Metrics Storage
// ============================================================================

struct EngineMetrics {
    runs: CounterVec,
    assignments: Counter,
    reruns: Counter,
    skipped_slots: Counter,
    prefetch_failures: Counter,
    generation_duration: Histogram,
}

static ENGINE_METRICS: OnceLock<EngineMetrics> = OnceLock::new();

static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; only the first call registers anything.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = showrunner::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = EngineMetrics {
        runs: register_counter_vec!(
            "showrunner_generation_runs_total",
            "Generation runs by outcome",
            &["status"]
        )?,
        assignments: register_counter!(
            "showrunner_assignments_total",
            "Schedule items produced, reruns included"
        )?,
        reruns: register_counter!("showrunner_reruns_total", "Rerun assignments produced")?,
        skipped_slots: register_counter!(
            "showrunner_skipped_slots_total",
            "Slots left empty because nothing was eligible"
        )?,
        prefetch_failures: register_counter!(
            "showrunner_prefetch_failures_total",
            "Episode prefetches that failed and were dropped"
        )?,
        generation_duration: register_histogram!(
            "showrunner_generation_duration_seconds",
            "Wall time of one generation run in seconds",
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
        )?,
    };

    ENGINE_METRICS
        .set(metrics)
        .map_err(|_| "Engine metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    ENGINE_METRICS.get().is_some()
}

// ============================================================================
// Recording
// ============================================================================

/// Record a finished generation run
pub fn record_generation(summary: &GenerationSummary, status: &str) {
    let Some(m) = ENGINE_METRICS.get() else {
        return;
    };

    m.runs.with_label_values(&[status]).inc();
    m.assignments.inc_by(summary.scheduled as f64);
    m.reruns.inc_by(summary.reruns as f64);
    m.skipped_slots.inc_by(summary.skipped_slots as f64);
    m.generation_duration
        .observe(summary.elapsed_ms as f64 / 1000.0);
}

/// Record a failed generation run
pub fn record_generation_error() {
    if let Some(m) = ENGINE_METRICS.get() {
        m.runs.with_label_values(&["error"]).inc();
    }
}

/// Record dropped prefetches
pub fn record_prefetch_failures(count: usize) {
    if count == 0 {
        return;
    }
    if let Some(m) = ENGINE_METRICS.get() {
        m.prefetch_failures.inc_by(count as f64);
    }
}

/// Encode all metrics to Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

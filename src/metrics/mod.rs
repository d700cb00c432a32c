//! Prometheus metrics for the delay queue service.
//!
//! Counters are bumped by the queue engine as operations happen. Gauges are
//! refreshed from registry stats when `/metrics` is scraped.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "tdq";

lazy_static! {
    /// Queue operations recorded into history, by operation
    pub static ref QUEUE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_queue_operations_total", METRIC_PREFIX),
        "Total add/retrieve operations recorded by delay queues",
        &["operation"]
    ).unwrap();

    /// Messages accepted by add
    pub static ref QUEUE_ADDED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_added_total", METRIC_PREFIX),
        "Total messages accepted into delay queues"
    ).unwrap();

    /// Adds rejected because the id was already pending
    pub static ref QUEUE_DUPLICATES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_duplicates_total", METRIC_PREFIX),
        "Total adds rejected as duplicates"
    ).unwrap();

    /// Messages handed out by retrieve
    pub static ref QUEUE_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_delivered_total", METRIC_PREFIX),
        "Total messages delivered from delay queues"
    ).unwrap();

    /// Retrieves that found nothing eligible
    pub static ref QUEUE_EMPTY_RETRIEVES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_empty_retrieves_total", METRIC_PREFIX),
        "Total retrieves that returned no message"
    ).unwrap();

    /// Transient messages dropped after their lifetime
    pub static ref QUEUE_EXPIRED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_expired_total", METRIC_PREFIX),
        "Total transient messages expired"
    ).unwrap();

    /// Messages currently pending across all channels
    pub static ref QUEUE_PENDING: IntGauge = register_int_gauge!(
        format!("{}_queue_pending", METRIC_PREFIX),
        "Messages currently pending across all channels"
    ).unwrap();

    /// Channels with a live queue
    pub static ref CHANNELS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_channels_active", METRIC_PREFIX),
        "Number of channels with a delay queue"
    ).unwrap();
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper for recording queue engine events
pub struct QueueMetrics;

impl QueueMetrics {
    pub fn record_add(accepted: bool) {
        QUEUE_OPERATIONS_TOTAL.with_label_values(&["add"]).inc();
        if accepted {
            QUEUE_ADDED_TOTAL.inc();
        } else {
            QUEUE_DUPLICATES_TOTAL.inc();
        }
    }

    pub fn record_retrieve(delivered: bool) {
        QUEUE_OPERATIONS_TOTAL.with_label_values(&["retrieve"]).inc();
        if delivered {
            QUEUE_DELIVERED_TOTAL.inc();
        } else {
            QUEUE_EMPTY_RETRIEVES_TOTAL.inc();
        }
    }

    pub fn record_expired(count: usize) {
        if count > 0 {
            QUEUE_EXPIRED_TOTAL.inc_by(count as u64);
        }
    }

    /// Refresh gauges from a registry snapshot
    pub fn set_registry_gauges(channels: usize, pending: usize) {
        CHANNELS_ACTIVE.set(channels as i64);
        QUEUE_PENDING.set(pending as i64);
    }
}

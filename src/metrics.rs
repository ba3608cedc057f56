use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, GaugeVec, Opts, Registry};

/// Metric name prefix for all scraper metrics
const PREFIX: &str = "songs_scraper";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Write-behind buffer
    pub static ref FLUSHES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_flushes_total"),
        "Total number of committed flushes"
    ).expect("Failed to create flushes_total metric");

    pub static ref FLUSHED_RECORDS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_flushed_records_total"), "Records committed by flushes"),
        &["kind"]
    ).expect("Failed to create flushed_records_total metric");

    pub static ref FLUSH_FAILURES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_flush_failures_total"),
        "Total number of flushes rolled back and requeued"
    ).expect("Failed to create flush_failures_total metric");

    // Genius API
    pub static ref API_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_api_failures_total"), "Failed Genius API calls by endpoint"),
        &["endpoint"]
    ).expect("Failed to create api_failures_total metric");

    // Work queues
    pub static ref QUEUE_DEPTH: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_queue_depth"), "Items waiting in each work queue"),
        &["queue"]
    ).expect("Failed to create queue_depth metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(FLUSHES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(FLUSHED_RECORDS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(FLUSH_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(API_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(QUEUE_DEPTH.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record a committed flush and how many records of each kind it carried
pub fn record_flush(artists: usize, songs: usize, authorships: usize, lyrics: usize) {
    FLUSHES_TOTAL.inc();
    for (kind, count) in [
        ("artist", artists),
        ("song", songs),
        ("authorship", authorships),
        ("lyrics", lyrics),
    ] {
        FLUSHED_RECORDS_TOTAL
            .with_label_values(&[kind])
            .inc_by(count as f64);
    }
}

pub fn record_flush_failure() {
    FLUSH_FAILURES_TOTAL.inc();
}

pub fn record_api_failure(endpoint: &str) {
    API_FAILURES_TOTAL.with_label_values(&[endpoint]).inc();
}

pub fn set_queue_depth(queue: &str, depth: usize) {
    QUEUE_DEPTH.with_label_values(&[queue]).set(depth as f64);
}

pub fn flushes_total() -> u64 {
    FLUSHES_TOTAL.get() as u64
}

pub fn flush_failures_total() -> u64 {
    FLUSH_FAILURES_TOTAL.get() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_repeatable() {
        init_metrics();
        init_metrics();
        assert!(!REGISTRY.gather().is_empty());
    }

    #[test]
    fn test_record_flush_counts_by_kind() {
        let before = FLUSHED_RECORDS_TOTAL.with_label_values(&["song"]).get();
        let flushes_before = flushes_total();

        record_flush(1, 3, 3, 0);

        let after = FLUSHED_RECORDS_TOTAL.with_label_values(&["song"]).get();
        assert!(after - before >= 3.0);
        assert!(flushes_total() > flushes_before);
    }

    #[test]
    fn test_queue_depth_gauge() {
        set_queue_depth("metrics_test_queue", 7);
        assert_eq!(
            QUEUE_DEPTH.with_label_values(&["metrics_test_queue"]).get(),
            7.0
        );
    }
}

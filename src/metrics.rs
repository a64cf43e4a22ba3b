//! Session metrics
//!
//! Atomic counters and latency histograms for the box-opening pipeline,
//! exportable in Prometheus text format.

use crate::session::SessionState;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomic counter metric
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Atomic gauge metric
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, v: u64) {
        self.value.store(v, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Simple histogram for latency tracking
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    bucket_bounds: Vec<f64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Create histogram with default latency buckets (ms)
    pub fn new() -> Self {
        Self::with_buckets(vec![
            1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
            30000.0, 60000.0,
        ])
    }

    /// Create histogram with custom buckets
    pub fn with_buckets(bounds: Vec<f64>) -> Self {
        let buckets = (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect();

        Self {
            buckets,
            bucket_bounds: bounds,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Observe a value
    pub fn observe(&self, value: f64) {
        let value_bits = (value * 1000.0) as u64;
        self.sum.fetch_add(value_bits, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let slot = self
            .bucket_bounds
            .iter()
            .position(|bound| value <= *bound)
            .unwrap_or(self.bucket_bounds.len());
        self.buckets[slot].fetch_add(1, Ordering::Relaxed);
    }

    /// Cumulative bucket counts, ending with the `+Inf` bucket
    pub fn get_buckets(&self) -> Vec<(f64, u64)> {
        let mut result = Vec::with_capacity(self.buckets.len());
        let mut cumulative = 0u64;

        for (i, bound) in self.bucket_bounds.iter().enumerate() {
            cumulative += self.buckets[i].load(Ordering::Relaxed);
            result.push((*bound, cumulative));
        }

        cumulative += self.buckets[self.bucket_bounds.len()].load(Ordering::Relaxed);
        result.push((f64::INFINITY, cumulative));

        result
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer for measuring stage duration
pub struct Timer<'a> {
    start: Instant,
    histogram: &'a Histogram,
}

impl<'a> Timer<'a> {
    pub fn new(histogram: &'a Histogram) -> Self {
        Self {
            start: Instant::now(),
            histogram,
        }
    }

    /// Record the elapsed milliseconds and return them
    pub fn observe_duration(self) -> f64 {
        let duration = self.start.elapsed().as_secs_f64() * 1000.0;
        self.histogram.observe(duration);
        duration
    }
}

/// Metrics of every session driven by one manager
#[derive(Default)]
pub struct SessionMetrics {
    pub opens_started_total: Counter,
    pub opens_revealed_total: Counter,
    pub opens_failed_total: Counter,
    pub limit_rejections_total: Counter,
    pub invalid_selections_total: Counter,
    pub catalog_refresh_failures_total: Counter,
    pub reward_total: Counter,
    pub sessions_active: Gauge,

    pub encrypt_latency: Histogram,
    pub send_latency: Histogram,
    pub confirm_latency: Histogram,
    pub decrypt_latency: Histogram,

    labels: RwLock<Vec<(String, String)>>,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a label to all metrics
    pub fn add_label(&self, key: impl Into<String>, value: impl Into<String>) {
        self.labels.write().push((key.into(), value.into()));
    }

    /// Latency histogram of a pipeline stage
    pub fn stage_histogram(&self, stage: SessionState) -> Option<&Histogram> {
        match stage {
            SessionState::Encrypting => Some(&self.encrypt_latency),
            SessionState::Sending => Some(&self.send_latency),
            SessionState::Confirming => Some(&self.confirm_latency),
            SessionState::Decrypting => Some(&self.decrypt_latency),
            _ => None,
        }
    }

    pub fn record_revealed(&self, reward: u64) {
        self.opens_revealed_total.inc();
        self.reward_total.inc_by(reward);
    }

    /// Export metrics in Prometheus format
    pub fn export(&self) -> String {
        let labels = self.labels.read();
        let label_str = if labels.is_empty() {
            String::new()
        } else {
            let pairs: Vec<String> = labels
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, v))
                .collect();
            format!("{{{}}}", pairs.join(","))
        };
        let bucket_labels = |le: &str| {
            let mut pairs: Vec<String> = labels
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, v))
                .collect();
            pairs.push(format!("le=\"{}\"", le));
            format!("{{{}}}", pairs.join(","))
        };

        let mut output = String::new();

        macro_rules! export_scalar {
            ($kind:literal, $name:expr, $help:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP secretbox_{} {}\n# TYPE secretbox_{} {}\nsecretbox_{}{} {}\n",
                    $name, $help, $name, $kind, $name, label_str, $value
                ));
            };
        }

        macro_rules! export_histogram {
            ($name:expr, $help:expr, $hist:expr) => {
                output.push_str(&format!(
                    "# HELP secretbox_{} {}\n# TYPE secretbox_{} histogram\n",
                    $name, $help, $name
                ));
                for (bound, count) in $hist.get_buckets() {
                    let le = if bound.is_infinite() {
                        "+Inf".to_string()
                    } else {
                        bound.to_string()
                    };
                    output.push_str(&format!(
                        "secretbox_{}_bucket{} {}\n",
                        $name,
                        bucket_labels(&le),
                        count
                    ));
                }
                output.push_str(&format!(
                    "secretbox_{}_sum{} {}\nsecretbox_{}_count{} {}\n",
                    $name,
                    label_str,
                    $hist.sum(),
                    $name,
                    label_str,
                    $hist.count()
                ));
            };
        }

        export_scalar!("counter", "opens_started_total", "Pipelines started", self.opens_started_total.get());
        export_scalar!("counter", "opens_revealed_total", "Pipelines that revealed a reward", self.opens_revealed_total.get());
        export_scalar!("counter", "opens_failed_total", "Pipelines that ended in error", self.opens_failed_total.get());
        export_scalar!("counter", "limit_rejections_total", "Opens rejected by the open limit", self.limit_rejections_total.get());
        export_scalar!("counter", "invalid_selections_total", "Opens rejected for an out-of-range box", self.invalid_selections_total.get());
        export_scalar!("counter", "catalog_refresh_failures_total", "Failed numberOfBoxes reads", self.catalog_refresh_failures_total.get());
        export_scalar!("counter", "reward_total", "Sum of revealed rewards", self.reward_total.get());
        export_scalar!("gauge", "sessions_active", "Identities with a live session", self.sessions_active.get());

        export_histogram!("encrypt_latency_ms", "Encryption stage latency in ms", self.encrypt_latency);
        export_histogram!("send_latency_ms", "Prediction and submission latency in ms", self.send_latency);
        export_histogram!("confirm_latency_ms", "Confirmation wait in ms", self.confirm_latency);
        export_histogram!("decrypt_latency_ms", "Decryption stage latency in ms", self.decrypt_latency);

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        counter.inc();
        counter.inc_by(4);
        assert_eq!(counter.get(), 5);
    }

    #[test]
    fn test_histogram_buckets() {
        let hist = Histogram::with_buckets(vec![10.0, 100.0]);
        hist.observe(5.0);
        hist.observe(50.0);
        hist.observe(500.0);

        let buckets = hist.get_buckets();
        assert_eq!(buckets[0], (10.0, 1));
        assert_eq!(buckets[1], (100.0, 2));
        assert_eq!(buckets[2].1, 3);
        assert!(buckets[2].0.is_infinite());
        assert_eq!(hist.count(), 3);
        assert!((hist.sum() - 555.0).abs() < 0.01);
    }

    #[test]
    fn test_stage_histograms() {
        let metrics = SessionMetrics::new();
        assert!(metrics.stage_histogram(SessionState::Encrypting).is_some());
        assert!(metrics.stage_histogram(SessionState::Decrypting).is_some());
        assert!(metrics.stage_histogram(SessionState::Idle).is_none());
        assert!(metrics.stage_histogram(SessionState::Revealed).is_none());
    }

    #[test]
    fn test_export() {
        let metrics = SessionMetrics::new();
        metrics.opens_started_total.inc();
        metrics.record_revealed(250);
        metrics.confirm_latency.observe(12.0);

        let output = metrics.export();
        assert!(output.contains("secretbox_opens_started_total 1"));
        assert!(output.contains("secretbox_opens_revealed_total 1"));
        assert!(output.contains("secretbox_reward_total 250"));
        assert!(output.contains("# TYPE secretbox_confirm_latency_ms histogram"));
        assert!(output.contains("secretbox_confirm_latency_ms_count 1"));
    }

    #[test]
    fn test_export_with_labels() {
        let metrics = SessionMetrics::new();
        metrics.add_label("chain", "11155111");

        let output = metrics.export();
        assert!(output.contains("secretbox_opens_started_total{chain=\"11155111\"} 0"));
        assert!(output.contains("secretbox_encrypt_latency_ms_bucket{chain=\"11155111\",le=\"+Inf\"} 0"));
    }
}

use crate::snapshot::{MethodMetrics, MetricsSnapshot};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

const NUM_HISTOGRAM_BINS: usize = 100;

/// Configuration for metrics size limits.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Maximum number of distinct method names tracked individually.
    ///
    /// Calls to methods beyond this limit still count towards the global
    /// totals but get no per-method entry.
    pub max_methods: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { max_methods: 1000 }
    }
}

/// Logarithmic histogram for percentile estimation.
///
/// Each power of ten is split into ten bins keyed on the leading digit, so
/// bin `d * 10 + k` covers `[k * 10^d, (k + 1) * 10^d)` microseconds. With
/// 100 bins the histogram spans 1μs to roughly 2.7 hours; anything longer
/// lands in the last bin.
#[derive(Debug)]
struct LatencyHistogram {
    bins: [AtomicU64; NUM_HISTOGRAM_BINS],
    total_latency: AtomicU64,
    sample_count: AtomicU64,
}

impl LatencyHistogram {
    fn new() -> Self {
        Self {
            bins: std::array::from_fn(|_| AtomicU64::new(0)),
            total_latency: AtomicU64::new(0),
            sample_count: AtomicU64::new(0),
        }
    }

    fn record(&self, latency_us: u64) {
        let bin = Self::latency_to_bin(latency_us);
        self.bins[bin].fetch_add(1, Ordering::Relaxed);
        self.total_latency.fetch_add(latency_us, Ordering::Relaxed);
        self.sample_count.fetch_add(1, Ordering::Relaxed);
    }

    fn latency_to_bin(latency_us: u64) -> usize {
        if latency_us == 0 {
            return 0;
        }

        let decade = latency_us.ilog10();
        let leading = latency_us / 10u64.pow(decade);
        let bin = decade as usize * 10 + leading as usize;

        bin.min(NUM_HISTOGRAM_BINS - 1)
    }

    /// Lower bound of a bin, in microseconds.
    fn bin_to_latency(bin: usize) -> u64 {
        if bin == 0 {
            return 1;
        }

        let decade = (bin / 10) as u32;
        let leading = (bin % 10).max(1) as u64;
        10u64.saturating_pow(decade).saturating_mul(leading)
    }

    /// Estimates the latency at `percentile` (0-100), interpolating linearly
    /// inside the bin that holds the target sample.
    fn estimate_percentile(&self, percentile: u64) -> u64 {
        let total = self.sample_count.load(Ordering::Relaxed);
        if total == 0 {
            return 0;
        }

        let target = ((total * percentile).div_ceil(100)).max(1);
        let mut cumulative = 0;

        for (idx, bin) in self.bins.iter().enumerate() {
            let count = bin.load(Ordering::Relaxed);
            if count > 0 && cumulative + count >= target {
                let start = Self::bin_to_latency(idx);
                let end = Self::bin_to_latency(idx + 1);
                let fraction = (target - cumulative) as f64 / count as f64;
                return start + (fraction * end.saturating_sub(start) as f64) as u64;
            }
            cumulative += count;
        }

        Self::bin_to_latency(NUM_HISTOGRAM_BINS)
    }

    /// Returns `(avg, p50, p95, p99)` in microseconds.
    fn calculate_percentiles(&self) -> (u64, u64, u64, u64) {
        let total = self.sample_count.load(Ordering::Relaxed);
        if total == 0 {
            return (0, 0, 0, 0);
        }

        let avg = self.total_latency.load(Ordering::Relaxed) / total;
        (
            avg,
            self.estimate_percentile(50),
            self.estimate_percentile(95),
            self.estimate_percentile(99),
        )
    }
}

/// Per-method counters. All fields are updated lock-free.
#[derive(Debug)]
struct MethodStats {
    call_count: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    latencies: LatencyHistogram,
}

impl MethodStats {
    fn new() -> Self {
        Self {
            call_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            latencies: LatencyHistogram::new(),
        }
    }

    fn record(&self, latency_us: u64, success: bool) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if success {
            self.success_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
        self.latencies.record(latency_us);
    }

    fn snapshot(&self) -> MethodMetrics {
        let (avg_latency_us, p50_latency_us, p95_latency_us, p99_latency_us) =
            self.latencies.calculate_percentiles();

        MethodMetrics {
            call_count: self.call_count.load(Ordering::Relaxed),
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            avg_latency_us,
            p50_latency_us,
            p95_latency_us,
            p99_latency_us,
        }
    }
}

/// Thread-safe metrics storage.
///
/// Global counters and per-method counters are atomics updated with relaxed
/// ordering; snapshots are best-effort and eventually consistent. The method
/// table is behind an `RwLock` that is only written when a method is seen for
/// the first time.
///
/// # Example
///
/// ```rust
/// use msgrpc_metrics::MetricsRegistry;
///
/// let registry = MetricsRegistry::new();
/// registry.record_method_call("add", 150, true);
///
/// let snapshot = registry.snapshot();
/// assert_eq!(snapshot.total_requests, 1);
/// assert_eq!(snapshot.methods["add"].success_count, 1);
/// ```
#[derive(Debug)]
pub struct MetricsRegistry {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    active_connections: AtomicU64,
    methods: RwLock<HashMap<String, Arc<MethodStats>>>,
    start_time: Instant,
    config: MetricsConfig,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_config(MetricsConfig::default())
    }

    pub fn with_config(config: MetricsConfig) -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            methods: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
            config,
        }
    }

    /// Call this when a connection is accepted.
    pub fn increment_active_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Call this when a connection is closed.
    pub fn decrement_active_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Records a call that was not attributed to any method (unknown name).
    pub fn record_unattributed_failure(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a method call with its latency and outcome.
    pub fn record_method_call(&self, method: &str, latency_us: u64, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(stats) = self.method_stats(method) {
            stats.record(latency_us, success);
        }
    }

    fn method_stats(&self, method: &str) -> Option<Arc<MethodStats>> {
        if let Some(stats) = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
        {
            return Some(Arc::clone(stats));
        }

        let mut methods = self.methods.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(stats) = methods.get(method) {
            return Some(Arc::clone(stats));
        }
        if methods.len() >= self.config.max_methods {
            tracing::debug!("Method table full, not tracking '{}'", method);
            return None;
        }
        let stats = Arc::new(MethodStats::new());
        methods.insert(method.to_string(), Arc::clone(&stats));
        Some(stats)
    }

    pub fn uptime_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Takes a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::new(self.uptime_ms());
        snapshot.total_requests = self.total_requests.load(Ordering::Relaxed);
        snapshot.successful_requests = self.successful_requests.load(Ordering::Relaxed);
        snapshot.failed_requests = self.failed_requests.load(Ordering::Relaxed);
        snapshot.active_connections = self.active_connections.load(Ordering::Relaxed);

        let methods = self.methods.read().unwrap_or_else(PoisonError::into_inner);
        snapshot.methods = methods
            .iter()
            .map(|(name, stats)| (name.clone(), stats.snapshot()))
            .collect();

        snapshot
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Metrics Recorder Trait
//!
//! The ring reports through [`MetricsRecorder`] so simulations and tests
//! can capture every metric in memory while production wiring stays a
//! no-op or forwards to a real sink.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub trait MetricsRecorder: Send + Sync + 'static {
    /// Increment a counter by 1
    fn incr(&self, name: &str, tags: &[&str]);

    /// Record a histogram/distribution value
    fn histogram(&self, name: &str, value: f64, tags: &[&str]);

    /// Set a gauge value
    fn gauge(&self, name: &str, value: f64, tags: &[&str]);

    /// Record a timing in milliseconds
    fn timing(&self, name: &str, duration_ms: f64, tags: &[&str]);

    /// Record a routed request and the hops it took
    fn record_route(&self, operation: &str, hops: usize, success: bool) {
        let status = if success { "success" } else { "error" };
        let op_tag = format!("operation:{}", operation);
        let status_tag = format!("status:{}", status);

        self.histogram("route.hops", hops as f64, &[&op_tag, &status_tag]);
        self.incr("route.count", &[&op_tag, &status_tag]);
    }

    /// Record a join or leave and the resulting ring size
    fn record_membership(&self, event: &str, node_count: usize) {
        let event_tag = format!("event:{}", event);
        self.incr("membership.events", &[&event_tag]);
        self.gauge("ring.nodes", node_count as f64, &[]);
    }

    /// Record keys moved between owners on join/leave
    fn record_migration(&self, event: &str, keys: usize) {
        if keys > 0 {
            let event_tag = format!("event:{}", event);
            self.histogram("migration.keys", keys as f64, &[&event_tag]);
        }
    }

    /// Record how many predecessors received a replica
    fn record_replication(&self, copies: usize) {
        self.histogram("replication.copies", copies as f64, &[]);
    }
}

/// No-op metrics recorder
#[derive(Clone, Default)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    #[inline]
    fn incr(&self, _name: &str, _tags: &[&str]) {}
    #[inline]
    fn histogram(&self, _name: &str, _value: f64, _tags: &[&str]) {}
    #[inline]
    fn gauge(&self, _name: &str, _value: f64, _tags: &[&str]) {}
    #[inline]
    fn timing(&self, _name: &str, _duration_ms: f64, _tags: &[&str]) {}
}

#[derive(Debug, Clone)]
pub struct RecordedMetric {
    pub name: String,
    pub value: f64,
    pub tags: Vec<String>,
    pub metric_type: MetricType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
    Timing,
}

/// In-memory recorder for tests and simulation runs
#[derive(Default)]
pub struct SimulatedMetrics {
    recorded: Mutex<Vec<RecordedMetric>>,
    route_count: AtomicU64,
    membership_count: AtomicU64,
    migrated_keys: AtomicU64,
}

impl SimulatedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_recorded(&self) -> Vec<RecordedMetric> {
        self.recorded.lock().clone()
    }

    pub fn get_by_name(&self, name: &str) -> Vec<RecordedMetric> {
        self.recorded
            .lock()
            .iter()
            .filter(|m| m.name == name)
            .cloned()
            .collect()
    }

    pub fn route_count(&self) -> u64 {
        self.route_count.load(Ordering::SeqCst)
    }

    pub fn membership_count(&self) -> u64 {
        self.membership_count.load(Ordering::SeqCst)
    }

    pub fn migrated_keys(&self) -> u64 {
        self.migrated_keys.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.recorded.lock().clear();
        self.route_count.store(0, Ordering::SeqCst);
        self.membership_count.store(0, Ordering::SeqCst);
        self.migrated_keys.store(0, Ordering::SeqCst);
    }

    pub fn assert_metric(&self, name: &str, metric_type: MetricType) -> bool {
        self.recorded
            .lock()
            .iter()
            .any(|m| m.name == name && m.metric_type == metric_type)
    }

    fn push(&self, name: &str, value: f64, tags: &[&str], metric_type: MetricType) {
        self.recorded.lock().push(RecordedMetric {
            name: name.to_string(),
            value,
            tags: tags.iter().map(|s| s.to_string()).collect(),
            metric_type,
        });
    }
}

impl MetricsRecorder for SimulatedMetrics {
    fn incr(&self, name: &str, tags: &[&str]) {
        self.push(name, 1.0, tags, MetricType::Counter);
    }

    fn histogram(&self, name: &str, value: f64, tags: &[&str]) {
        self.push(name, value, tags, MetricType::Histogram);
    }

    fn gauge(&self, name: &str, value: f64, tags: &[&str]) {
        self.push(name, value, tags, MetricType::Gauge);
    }

    fn timing(&self, name: &str, duration_ms: f64, tags: &[&str]) {
        self.push(name, duration_ms, tags, MetricType::Timing);
    }

    fn record_route(&self, operation: &str, hops: usize, success: bool) {
        self.route_count.fetch_add(1, Ordering::SeqCst);

        let status = if success { "success" } else { "error" };
        let op_tag = format!("operation:{}", operation);
        let status_tag = format!("status:{}", status);

        self.histogram("route.hops", hops as f64, &[&op_tag, &status_tag]);
        self.incr("route.count", &[&op_tag, &status_tag]);
    }

    fn record_membership(&self, event: &str, node_count: usize) {
        self.membership_count.fetch_add(1, Ordering::SeqCst);
        let event_tag = format!("event:{}", event);
        self.incr("membership.events", &[&event_tag]);
        self.gauge("ring.nodes", node_count as f64, &[]);
    }

    fn record_migration(&self, event: &str, keys: usize) {
        if keys > 0 {
            self.migrated_keys.fetch_add(keys as u64, Ordering::SeqCst);
            let event_tag = format!("event:{}", event);
            self.histogram("migration.keys", keys as f64, &[&event_tag]);
        }
    }
}

pub type SharedMetrics = Arc<dyn MetricsRecorder>;

pub fn noop_metrics() -> SharedMetrics {
    Arc::new(NoopMetrics)
}

pub fn simulated_metrics() -> Arc<SimulatedMetrics> {
    Arc::new(SimulatedMetrics::new())
}

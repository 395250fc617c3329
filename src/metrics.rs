//! Prometheus metrics, exposed over the `/metrics` HTTP endpoint exactly as
//! the teacher's `src/main.rs` wires its registry.

use prometheus::{histogram_opts, opts, HistogramVec, IntCounter, IntCounterVec, Registry};
use tokio::time::Instant;

use crate::Error;

#[derive(Clone)]
pub struct Metrics {
    pub reconciliations: IntCounter,
    pub failures: IntCounterVec,
    pub reconcile_duration: HistogramVec,
    pub gc_sweeps: IntCounterVec,
    pub gc_failures: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        let reconcile_duration = HistogramVec::new(
            histogram_opts!(
                "agent_reconcile_duration_seconds",
                "Duration of an Agent reconcile in seconds",
            )
            .buckets(vec![0.01, 0.1, 0.25, 0.5, 1., 5., 15., 60.]),
            &["instance"],
        )
        .unwrap();
        let failures = IntCounterVec::new(
            opts!("agent_reconcile_errors_total", "Agent reconcile errors"),
            &["instance", "error"],
        )
        .unwrap();
        let reconciliations = IntCounter::new("agent_reconciliations_total", "Agent reconciliations").unwrap();
        let gc_sweeps = IntCounterVec::new(
            opts!("agent_gc_sweeps_total", "garbage collector sweeps run"),
            &["sweep"],
        )
        .unwrap();
        let gc_failures = IntCounterVec::new(
            opts!("agent_gc_sweep_failures_total", "garbage collector sweep failures"),
            &["sweep"],
        )
        .unwrap();
        Metrics {
            reconciliations,
            failures,
            reconcile_duration,
            gc_sweeps,
            gc_failures,
        }
    }
}

impl Metrics {
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.reconcile_duration.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        registry.register(Box::new(self.reconciliations.clone()))?;
        registry.register(Box::new(self.gc_sweeps.clone()))?;
        registry.register(Box::new(self.gc_failures.clone()))?;
        Ok(self)
    }

    pub fn reconcile_failure(&self, agent_name: &str, e: &Error) {
        self.failures
            .with_label_values(&[agent_name, e.metric_label().as_ref()])
            .inc()
    }

    pub fn count_and_measure(&self) -> ReconcileMeasurer {
        self.reconciliations.inc();
        ReconcileMeasurer {
            start: Instant::now(),
            metric: self.reconcile_duration.clone(),
            instance: "agent".to_string(),
        }
    }

    pub fn gc_sweep_ran(&self, sweep: &str) {
        self.gc_sweeps.with_label_values(&[sweep]).inc();
    }

    pub fn gc_sweep_failed(&self, sweep: &str) {
        self.gc_failures.with_label_values(&[sweep]).inc();
    }
}

pub struct ReconcileMeasurer {
    start: Instant,
    metric: HistogramVec,
    instance: String,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric
            .with_label_values(&[self.instance.as_str()])
            .observe(duration);
    }
}

//! Component E: periodic, leader-gated sweeps that deregister inactive
//! clusters and permanently delete orphaned entities (§4.E). Each sweep is
//! single-shot per tick, independent across ticks, and safe to drop — the
//! thresholds move forward monotonically with wall-clock time (I5).

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::backend::{Backend, ObjectStore};
use crate::config::GcConfig;
use crate::leader::SharedLeaderElector;
use crate::metrics::Metrics;

pub struct GarbageCollector {
    backend: Arc<dyn Backend>,
    leader: SharedLeaderElector,
    config: GcConfig,
    object_store: Arc<dyn ObjectStore>,
    metrics: Arc<Metrics>,
}

impl GarbageCollector {
    pub fn new(
        backend: Arc<dyn Backend>,
        leader: SharedLeaderElector,
        config: GcConfig,
        object_store: Arc<dyn ObjectStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            backend,
            leader,
            config,
            object_store,
            metrics,
        }
    }

    /// Deregister clusters that have been inactive longer than
    /// `DeregisterInactiveAfter`. Deliberately NOT leader-gated — the backend
    /// enforces its own coordination (§4.E, §9 Open Question 2).
    pub async fn deregister_inactive_clusters(&self) {
        let older_than = Utc::now() - self.config.deregister_inactive_after();
        debug!("deregistering inactive clusters older than {}", older_than);
        self.metrics.gc_sweep_ran("deregister_inactive");
        if let Err(e) = self
            .backend
            .inactive_cluster_deregister(older_than, self.object_store.as_ref())
            .await
        {
            self.metrics.gc_sweep_failed("deregister_inactive");
            error!("failed to deregister inactive clusters: {e}");
        }
    }

    /// Permanently delete clusters/hosts that were de-registered before
    /// `DeletedUnregisteredAfter`. Leader-gated: no-op when not leader. A
    /// failure of the cluster-deletion pass aborts the host-deletion pass for
    /// this tick only; the next tick retries both (§4.E).
    pub async fn permanently_delete_unregistered_clusters_and_hosts(&self) {
        if !self.leader.is_leader() {
            debug!("not leader, skipping permanent clusters/hosts deletion");
            return;
        }

        let older_than = Utc::now() - self.config.deleted_unregistered_after();
        self.metrics.gc_sweep_ran("permanent_delete");

        debug!("permanently deleting clusters deregistered before {}", older_than);
        if let Err(e) = self
            .backend
            .permanent_clusters_deletion(older_than, self.object_store.as_ref())
            .await
        {
            self.metrics.gc_sweep_failed("permanent_delete");
            error!("failed deleting de-registered clusters: {e}");
            return;
        }

        debug!("permanently deleting hosts soft-deleted before {}", older_than);
        if let Err(e) = self.backend.permanent_hosts_deletion(older_than).await {
            self.metrics.gc_sweep_failed("permanent_delete");
            error!("failed deleting soft-deleted hosts: {e}");
        }
    }

    /// Run both sweeps once; used by the scheduler and by tests. Logs and
    /// swallows all business errors per §7.
    pub async fn run_once(&self) {
        self.deregister_inactive_clusters().await;
        self.permanently_delete_unregistered_clusters_and_hosts().await;
        info!("garbage collection tick complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{CallLog, FakeBackend, NoopObjectStore};
    use crate::leader::StaticLeaderElector;

    fn config() -> GcConfig {
        GcConfig::default()
    }

    #[tokio::test]
    async fn non_leader_skips_permanent_delete() {
        let calls = Arc::new(CallLog::default());
        let backend = Arc::new(FakeBackend::new(calls.clone()));
        let leader = Arc::new(StaticLeaderElector(false));
        let gc = GarbageCollector::new(
            backend,
            leader,
            config(),
            Arc::new(NoopObjectStore),
            Arc::new(Metrics::default()),
        );

        gc.permanently_delete_unregistered_clusters_and_hosts().await;
        assert!(!calls.contains("permanent_clusters_deletion"));
        assert!(!calls.contains("permanent_hosts_deletion"));
    }

    #[tokio::test]
    async fn leader_runs_permanent_delete_in_order() {
        let calls = Arc::new(CallLog::default());
        let backend = Arc::new(FakeBackend::new(calls.clone()));
        let leader = Arc::new(StaticLeaderElector(true));
        let gc = GarbageCollector::new(
            backend,
            leader,
            config(),
            Arc::new(NoopObjectStore),
            Arc::new(Metrics::default()),
        );

        gc.permanently_delete_unregistered_clusters_and_hosts().await;
        assert_eq!(
            calls.ordered(),
            vec!["permanent_clusters_deletion".to_string(), "permanent_hosts_deletion".to_string()]
        );
    }

    #[tokio::test]
    async fn deregister_inactive_does_not_require_leadership() {
        let calls = Arc::new(CallLog::default());
        let backend = Arc::new(FakeBackend::new(calls.clone()));
        let leader = Arc::new(StaticLeaderElector(false));
        let gc = GarbageCollector::new(
            backend,
            leader,
            config(),
            Arc::new(NoopObjectStore),
            Arc::new(Metrics::default()),
        );

        gc.deregister_inactive_clusters().await;
        assert!(calls.contains("inactive_cluster_deregister"));
    }
}

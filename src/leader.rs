//! Component F: leader predicate and periodic scheduler driving the garbage
//! collector's two sweeps (§4.F), each on its own independent
//! `tokio::time::interval` loop via `run_periodic` since only the
//! permanent-delete sweep is leader-gated. The predicate is read once per
//! tick, never cached (§5 "Leader discipline").

use std::sync::Arc;

use kube::{
    api::{Api, Patch, PatchParams},
    Client,
};
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use serde_json::json;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, warn};

pub trait LeaderElector: Send + Sync {
    fn is_leader(&self) -> bool;
}

/// Test/standalone-deployment elector: always reports a fixed answer.
pub struct StaticLeaderElector(pub bool);

impl LeaderElector for StaticLeaderElector {
    fn is_leader(&self) -> bool {
        self.0
    }
}

/// Leader election backed by a `coordination.k8s.io/v1` `Lease`, the
/// standard controller-runtime primitive for exclusive cluster-wide work.
/// `refresh` must be polled periodically (via `run_periodic`, see `main.rs`)
/// to renew or acquire the lease; `is_leader` itself never performs I/O,
/// matching the "read once per tick, not cached across ticks" contract at
/// the *call* level while still reflecting the most recent refresh.
pub struct LeaseLeaderElector {
    client: Client,
    namespace: String,
    lease_name: String,
    identity: String,
    lease_duration: Duration,
    held: std::sync::atomic::AtomicBool,
}

impl LeaseLeaderElector {
    pub fn new(client: Client, namespace: impl Into<String>, lease_name: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            lease_name: lease_name.into(),
            identity: identity.into(),
            lease_duration: Duration::from_secs(15),
            held: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Attempt to acquire or renew the lease. Safe to call concurrently with
    /// `is_leader` reads; errors are logged and treated as "not leader".
    pub async fn refresh(&self) {
        let leases: Api<Lease> = Api::namespaced(self.client.clone(), &self.namespace);
        let now = chrono::Utc::now();

        let current = leases.get_opt(&self.lease_name).await;
        let acquired = match current {
            Ok(Some(lease)) => {
                let holder = lease.spec.as_ref().and_then(|s| s.holder_identity.clone());
                let renew_time = lease
                    .spec
                    .as_ref()
                    .and_then(|s| s.renew_time.as_ref())
                    .map(|t| t.0);
                let expired = renew_time
                    .map(|t| now.signed_duration_since(t).num_seconds() as u64 > self.lease_duration.as_secs())
                    .unwrap_or(true);
                holder.as_deref() == Some(self.identity.as_str()) || expired
            }
            Ok(None) => true,
            Err(e) => {
                warn!("lease lookup failed, assuming not leader: {e}");
                false
            }
        };

        if !acquired {
            self.held.store(false, std::sync::atomic::Ordering::SeqCst);
            return;
        }

        let patch = Patch::Apply(json!({
            "apiVersion": "coordination.k8s.io/v1",
            "kind": "Lease",
            "metadata": { "name": self.lease_name, "namespace": self.namespace },
            "spec": LeaseSpec {
                holder_identity: Some(self.identity.clone()),
                renew_time: Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::MicroTime(now)),
                lease_duration_seconds: Some(self.lease_duration.as_secs() as i32),
                ..Default::default()
            }
        }));
        let ps = PatchParams::apply("agent-reconciler-leader-election").force();
        match leases.patch(&self.lease_name, &ps, &patch).await {
            Ok(_) => {
                self.held.store(true, std::sync::atomic::Ordering::SeqCst);
                debug!("acquired/renewed leader lease {}", self.lease_name);
            }
            Err(e) => {
                warn!("failed to renew leader lease: {e}");
                self.held.store(false, std::sync::atomic::Ordering::SeqCst);
            }
        }
    }
}

impl LeaderElector for LeaseLeaderElector {
    fn is_leader(&self) -> bool {
        self.held.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Drives a sweep on a fixed period, coalescing any tick that would overlap
/// a still-running previous tick rather than queuing it (§4.F "cooperative
/// ... overlapping ticks ... should be prevented").
pub async fn run_periodic<F, Fut>(period: Duration, mut sweep: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        sweep().await;
    }
}

pub type SharedLeaderElector = Arc<dyn LeaderElector>;

//! Test-only fake standing in for the relational-store-backed production
//! implementation of `Backend` (a Non-goal per §1). Grounded in the
//! original's `bminventory.MockInstallerInternals` gomock double — here
//! hand-written with a call log, since the pack carries no async-mocking
//! crate.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::backend::{
    Backend, BackendCluster, BackendError, BackendHost, BackendResult, ClusterKey, ClusterUpdateParams,
    HostInstallerArgsParams, ObjectStore,
};
use tokio_util::sync::CancellationToken;

pub use crate::backend::NoopObjectStore;

#[derive(Default)]
pub struct CallLog {
    calls: Mutex<Vec<String>>,
}

impl CallLog {
    pub fn push(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|c| c == name)
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == name).count()
    }

    pub fn ordered(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

pub enum ClusterLookup {
    Found(BackendCluster),
    NotFound,
    Transient(String),
}

pub enum HostLookup {
    Found(BackendHost),
    Transient(String),
}

/// Scripted fake. Each field is consumed by exactly the calls the test
/// expects; panics (via `expect`) surface a test author's mistake loudly,
/// same spirit as a gomock `.Times(1)` expectation mismatch.
pub struct FakeBackend {
    pub calls: std::sync::Arc<CallLog>,
    pub cluster: Mutex<Option<ClusterLookup>>,
    pub host: Mutex<Option<HostLookup>>,
    pub update_cluster_result: Mutex<Option<BackendResult<BackendCluster>>>,
    pub update_installer_args_result: Mutex<Option<BackendResult<BackendHost>>>,
    pub last_cluster_update: Mutex<Option<ClusterUpdateParams>>,
    pub last_installer_args: Mutex<Option<HostInstallerArgsParams>>,
    pub last_approved: Mutex<Option<(String, String, bool)>>,
}

impl FakeBackend {
    pub fn new(calls: std::sync::Arc<CallLog>) -> Self {
        Self {
            calls,
            cluster: Mutex::new(None),
            host: Mutex::new(None),
            update_cluster_result: Mutex::new(None),
            update_installer_args_result: Mutex::new(None),
            last_cluster_update: Mutex::new(None),
            last_installer_args: Mutex::new(None),
            last_approved: Mutex::new(None),
        }
    }

    pub fn with_cluster(self, lookup: ClusterLookup) -> Self {
        *self.cluster.lock().unwrap() = Some(lookup);
        self
    }

    pub fn with_host(self, lookup: HostLookup) -> Self {
        *self.host.lock().unwrap() = Some(lookup);
        self
    }

    pub fn with_update_cluster_result(self, result: BackendResult<BackendCluster>) -> Self {
        *self.update_cluster_result.lock().unwrap() = Some(result);
        self
    }

    pub fn with_update_installer_args_result(self, result: BackendResult<BackendHost>) -> Self {
        *self.update_installer_args_result.lock().unwrap() = Some(result);
        self
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn get_cluster_by_kube_key(&self, _key: &ClusterKey) -> BackendResult<BackendCluster> {
        self.calls.push("get_cluster_by_kube_key");
        match self.cluster.lock().unwrap().as_ref() {
            Some(ClusterLookup::Found(c)) => Ok(c.clone()),
            Some(ClusterLookup::NotFound) => Err(BackendError::NotFound),
            Some(ClusterLookup::Transient(msg)) => Err(BackendError::Transient(msg.clone())),
            None => Err(BackendError::NotFound),
        }
    }

    async fn get_common_host_internal(
        &self,
        _cancel: &CancellationToken,
        _cluster_id: &str,
        _host_id: &str,
    ) -> BackendResult<BackendHost> {
        self.calls.push("get_common_host_internal");
        match self.host.lock().unwrap().as_ref() {
            Some(HostLookup::Found(h)) => Ok(h.clone()),
            Some(HostLookup::Transient(msg)) => Err(BackendError::Transient(msg.clone())),
            None => Ok(BackendHost::default()),
        }
    }

    async fn update_cluster_internal(
        &self,
        _cancel: &CancellationToken,
        params: ClusterUpdateParams,
    ) -> BackendResult<BackendCluster> {
        self.calls.push("update_cluster_internal");
        *self.last_cluster_update.lock().unwrap() = Some(params);
        self.update_cluster_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(BackendCluster::default()))
    }

    async fn update_host_approved_internal(
        &self,
        _cancel: &CancellationToken,
        cluster_id: &str,
        host_id: &str,
        approved: bool,
    ) -> BackendResult<()> {
        self.calls.push("update_host_approved_internal");
        *self.last_approved.lock().unwrap() = Some((cluster_id.to_string(), host_id.to_string(), approved));
        Ok(())
    }

    async fn update_host_installer_args_internal(
        &self,
        _cancel: &CancellationToken,
        params: HostInstallerArgsParams,
    ) -> BackendResult<BackendHost> {
        self.calls.push("update_host_installer_args_internal");
        *self.last_installer_args.lock().unwrap() = Some(params);
        self.update_installer_args_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(BackendHost::default()))
    }

    async fn inactive_cluster_deregister(
        &self,
        _older_than: DateTime<Utc>,
        _object_store: &dyn ObjectStore,
    ) -> BackendResult<()> {
        self.calls.push("inactive_cluster_deregister");
        Ok(())
    }

    async fn permanent_clusters_deletion(
        &self,
        _older_than: DateTime<Utc>,
        _object_store: &dyn ObjectStore,
    ) -> BackendResult<()> {
        self.calls.push("permanent_clusters_deletion");
        Ok(())
    }

    async fn permanent_hosts_deletion(&self, _older_than: DateTime<Utc>) -> BackendResult<()> {
        self.calls.push("permanent_hosts_deletion");
        Ok(())
    }
}

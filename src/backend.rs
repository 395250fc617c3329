//! Component A: the narrow capability surface the reconciler and garbage
//! collector consume to read/write internal cluster and host state (§4.A).
//!
//! The relational store backing this facade is a Non-goal (§1) — only the
//! trait and its domain types live here. Call sites match `BackendError`
//! exhaustively, re-expressing the original's HTTP-status-based
//! classification as a tagged variant (§9 "Duck-typed error classification").

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::types::HostState;

/// Opaque handle to the object-storage wrapper; passed through untouched to
/// the two deletion sweeps. The wrapper's implementation is a Non-goal (§1).
pub trait ObjectStore: Send + Sync {}

/// Placeholder object-store handle; the wrapper's implementation is a
/// Non-goal (§1) so this crate has nothing to store inside it.
pub struct NoopObjectStore;
impl ObjectStore for NoopObjectStore {}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    InputError(String),
    #[error("{0}")]
    Transient(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Clone, Debug, Default)]
pub struct BackendHost {
    pub id: String,
    /// JSON-encoded inventory snapshot.
    pub inventory: String,
    pub status: Option<HostState>,
    pub status_info: String,
    /// JSON-encoded grouped validation outcomes.
    pub validations_info: String,
    pub installation_disk_id: String,
    pub approved: bool,
    /// Canonicalized JSON array of strings.
    pub installer_args: String,
    pub requested_hostname: String,
    pub role: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default)]
pub struct BackendCluster {
    pub id: String,
    pub hosts: Vec<BackendHost>,
    pub deregistered_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default)]
pub struct ClusterKey {
    pub name: String,
    pub namespace: String,
}

/// Per-host fields carried on an `UpdateClusterInternal` call (§4.C step 2).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiskSelection {
    pub disk_id: String,
    pub role: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterUpdateParams {
    pub cluster_id: String,
    pub hosts_names: Vec<(String, String)>,
    pub hosts_roles: Vec<(String, String)>,
    pub disks_selected_config: Vec<(String, Vec<DiskSelection>)>,
}

#[derive(Clone, Debug, Default)]
pub struct HostInstallerArgsParams {
    pub cluster_id: String,
    pub host_id: String,
    pub installer_args: String,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn get_cluster_by_kube_key(&self, key: &ClusterKey) -> BackendResult<BackendCluster>;

    async fn get_common_host_internal(
        &self,
        cancel: &CancellationToken,
        cluster_id: &str,
        host_id: &str,
    ) -> BackendResult<BackendHost>;

    async fn update_cluster_internal(
        &self,
        cancel: &CancellationToken,
        params: ClusterUpdateParams,
    ) -> BackendResult<BackendCluster>;

    async fn update_host_approved_internal(
        &self,
        cancel: &CancellationToken,
        cluster_id: &str,
        host_id: &str,
        approved: bool,
    ) -> BackendResult<()>;

    async fn update_host_installer_args_internal(
        &self,
        cancel: &CancellationToken,
        params: HostInstallerArgsParams,
    ) -> BackendResult<BackendHost>;

    async fn inactive_cluster_deregister(
        &self,
        older_than: DateTime<Utc>,
        object_store: &dyn ObjectStore,
    ) -> BackendResult<()>;

    async fn permanent_clusters_deletion(
        &self,
        older_than: DateTime<Utc>,
        object_store: &dyn ObjectStore,
    ) -> BackendResult<()>;

    async fn permanent_hosts_deletion(&self, older_than: DateTime<Utc>) -> BackendResult<()>;
}

/// Placeholder `Backend` for deployments that have not wired in a relational
/// store yet; every call reports a transient failure rather than panicking.
/// The relational store itself is a Non-goal — see module docs.
pub struct UnimplementedBackend;

#[async_trait]
impl Backend for UnimplementedBackend {
    async fn get_cluster_by_kube_key(&self, _key: &ClusterKey) -> BackendResult<BackendCluster> {
        Err(BackendError::Transient("backend not configured".to_string()))
    }

    async fn get_common_host_internal(
        &self,
        _cancel: &CancellationToken,
        _cluster_id: &str,
        _host_id: &str,
    ) -> BackendResult<BackendHost> {
        Err(BackendError::Transient("backend not configured".to_string()))
    }

    async fn update_cluster_internal(
        &self,
        _cancel: &CancellationToken,
        _params: ClusterUpdateParams,
    ) -> BackendResult<BackendCluster> {
        Err(BackendError::Transient("backend not configured".to_string()))
    }

    async fn update_host_approved_internal(
        &self,
        _cancel: &CancellationToken,
        _cluster_id: &str,
        _host_id: &str,
        _approved: bool,
    ) -> BackendResult<()> {
        Err(BackendError::Transient("backend not configured".to_string()))
    }

    async fn update_host_installer_args_internal(
        &self,
        _cancel: &CancellationToken,
        _params: HostInstallerArgsParams,
    ) -> BackendResult<BackendHost> {
        Err(BackendError::Transient("backend not configured".to_string()))
    }

    async fn inactive_cluster_deregister(
        &self,
        _older_than: DateTime<Utc>,
        _object_store: &dyn ObjectStore,
    ) -> BackendResult<()> {
        Err(BackendError::Transient("backend not configured".to_string()))
    }

    async fn permanent_clusters_deletion(
        &self,
        _older_than: DateTime<Utc>,
        _object_store: &dyn ObjectStore,
    ) -> BackendResult<()> {
        Err(BackendError::Transient("backend not configured".to_string()))
    }

    async fn permanent_hosts_deletion(&self, _older_than: DateTime<Utc>) -> BackendResult<()> {
        Err(BackendError::Transient("backend not configured".to_string()))
    }
}

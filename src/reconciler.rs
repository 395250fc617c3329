//! Component D: the driver. Resolves references, invokes the differ and
//! backend facade, projects status, decides requeue (§4.D). The
//! status-computation core (`compute`) is factored out from the
//! Kubernetes I/O (`reconcile`) so it can be exercised without a live
//! apiserver — a deliberate redesign from the original's fake-client test
//! harness (recorded in DESIGN.md), since this pack carries no `kube`
//! test-server dependency.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::{
    api::{Api, Patch, PatchParams, ResourceExt},
    runtime::{
        controller::{Action, Controller},
        events::Reporter,
        watcher::Config,
    },
    Client,
};
use serde_json::json;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, field, info, instrument, warn, Span};

use crate::backend::{Backend, BackendCluster, BackendError, BackendHost, ClusterKey, ClusterUpdateParams, HostInstallerArgsParams};
use crate::clusterdeployment::ClusterDeployment;
use crate::conditions::{project_conditions, unknown_conditions};
use crate::differ::{diff, UpdatePlan};
use crate::metrics::Metrics;
use crate::telemetry;
use crate::types::{self, Agent, AgentStatus, Disk, Interface, Inventory};
use crate::Error;

/// Fixed short requeue delay for transient backend faults (§4.D, on the
/// order of seconds).
pub const DEFAULT_REQUEUE_AFTER_ON_ERROR: Duration = Duration::from_secs(30);

pub const FIELD_MANAGER: &str = "agent-reconciler";

/// Resolves whether a `ClusterDeployment` exists, abstracting over
/// `kube::Api<ClusterDeployment>::get` so the reconciler core is testable
/// without a live apiserver (§1 Non-goal: the declarative-resource client
/// library itself).
#[async_trait]
pub trait ClusterDeploymentResolver: Send + Sync {
    async fn exists(&self, name: &str, namespace: &str) -> Result<bool, kube::Error>;
}

pub struct KubeClusterDeploymentResolver {
    client: Api<ClusterDeployment>,
}

impl KubeClusterDeploymentResolver {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            client: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl ClusterDeploymentResolver for KubeClusterDeploymentResolver {
    async fn exists(&self, name: &str, _namespace: &str) -> Result<bool, kube::Error> {
        match self.client.get_opt(name).await? {
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }
}

/// Outcome of a single reconcile cycle's status computation, independent of
/// how it gets persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileResult {
    /// No re-queue requested.
    Empty,
    /// Re-queue after the given duration (transient backend failure).
    RequeueAfter(Duration),
}

pub struct AgentOutcome {
    pub status: Option<AgentStatus>,
    pub result: ReconcileResult,
}

impl AgentOutcome {
    fn unchanged(result: ReconcileResult) -> Self {
        Self { status: None, result }
    }
}

fn spec_synced(previous: Option<&Condition>, status: &str, reason: &str, message: String) -> Condition {
    let last_transition_time = match previous {
        Some(prev) if prev.status == status => prev.last_transition_time.clone(),
        _ => Time(Utc::now()),
    };
    Condition {
        type_: types::SPEC_SYNCED_CONDITION.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message,
        last_transition_time,
        observed_generation: None,
    }
}

fn prev_spec_synced(previous_status: Option<&AgentStatus>) -> Option<&Condition> {
    previous_status.and_then(|s| s.conditions.iter().find(|c| c.type_ == types::SPEC_SYNCED_CONDITION))
}

fn status_with(spec_synced: Condition, rest: [Condition; 4]) -> AgentStatus {
    let mut conditions = vec![spec_synced];
    conditions.extend(rest);
    AgentStatus {
        conditions,
        inventory: Inventory::default(),
    }
}

fn parse_inventory(raw: &str) -> Inventory {
    #[derive(serde::Deserialize, Default)]
    #[serde(rename_all = "PascalCase")]
    struct WireInventory {
        #[serde(default)]
        interfaces: Vec<WireInterface>,
        #[serde(default)]
        disks: Vec<WireDisk>,
    }
    #[derive(serde::Deserialize, Default)]
    #[serde(rename_all = "PascalCase")]
    struct WireInterface {
        #[serde(default)]
        name: String,
        #[serde(default)]
        mac_address: String,
        #[serde(default)]
        i_pv4_addresses: Vec<String>,
        #[serde(default)]
        i_pv6_addresses: Vec<String>,
    }
    #[derive(serde::Deserialize, Default)]
    #[serde(rename_all = "PascalCase")]
    struct WireDisk {
        #[serde(default)]
        path: String,
        #[serde(default)]
        bootable: bool,
    }

    let wire: WireInventory = serde_json::from_str(raw).unwrap_or_default();
    Inventory {
        interfaces: wire
            .interfaces
            .into_iter()
            .map(|i| Interface {
                name: i.name,
                mac_address: i.mac_address,
                ipv4_addresses: i.i_pv4_addresses,
                ipv6_addresses: i.i_pv6_addresses,
            })
            .collect(),
        disks: wire.disks.into_iter().map(|d| Disk { path: d.path, bootable: d.bootable }).collect(),
    }
}

/// Applies the differ's plan against the backend, in the fixed axis order
/// (§4.D step 8, §5 "Ordering guarantees"). Returns the refreshed cluster
/// view when any backend write occurred.
async fn apply_plan(
    backend: &dyn Backend,
    cancel: &CancellationToken,
    cluster: &BackendCluster,
    host: &BackendHost,
    plan: UpdatePlan,
) -> Result<Option<BackendCluster>, BackendError> {
    let mut refreshed = None;

    if let Some(installer_args) = plan.installer_args {
        backend
            .update_host_installer_args_internal(
                cancel,
                HostInstallerArgsParams {
                    cluster_id: cluster.id.clone(),
                    host_id: host.id.clone(),
                    installer_args,
                },
            )
            .await?;
    }

    if let Some(update) = plan.cluster_update {
        let updated = backend
            .update_cluster_internal(
                cancel,
                ClusterUpdateParams {
                    cluster_id: cluster.id.clone(),
                    ..update
                },
            )
            .await?;
        refreshed = Some(updated);
    }

    if let Some(approved) = plan.approved {
        backend
            .update_host_approved_internal(cancel, &cluster.id, &host.id, approved)
            .await?;
    }

    Ok(refreshed)
}

fn locate_host<'a>(cluster: &'a BackendCluster, agent_name: &str) -> Option<&'a BackendHost> {
    let mut matches = cluster.hosts.iter().filter(|h| h.id == agent_name);
    let first = matches.next();
    if matches.next().is_some() {
        warn!("multiple hosts with id {agent_name} in cluster {}; invariant violated", cluster.id);
    }
    first
}

/// Compute the new `AgentStatus` and requeue decision for one reconcile
/// cycle (§4.D steps 2-11). Returns `None` status when no ClusterDeployment
/// is referenced (Agent unbound, step 2) — the caller must leave the
/// existing status untouched in that case. `previous_status` is the Agent's
/// current status, consulted so each condition's `lastTransitionTime` only
/// advances when its `status` changes.
pub async fn compute(
    backend: &dyn Backend,
    cd_resolver: &dyn ClusterDeploymentResolver,
    cancel: &CancellationToken,
    agent_namespace: &str,
    agent_name: &str,
    spec: &types::AgentSpec,
    previous_status: Option<&AgentStatus>,
) -> AgentOutcome {
    let prev_synced = prev_spec_synced(previous_status);
    let prev_conditions: &[Condition] = previous_status.map(|s| s.conditions.as_slice()).unwrap_or(&[]);

    // Step 2: no ClusterDeployment ref -> unbound, nothing to do.
    let Some(cd_ref) = spec.cluster_deployment_name.clone() else {
        return AgentOutcome::unchanged(ReconcileResult::Empty);
    };

    // Step 3: resolve ClusterDeployment.
    match cd_resolver.exists(&cd_ref.name, &cd_ref.namespace).await {
        Ok(true) => {}
        Ok(false) => {
            let msg = format!(
                "{} failed to get clusterDeployment with name {} in namespace {}: clusterdeployment not found",
                types::INPUT_ERROR_MSG, cd_ref.name, cd_ref.namespace
            );
            let status = status_with(
                spec_synced(prev_synced, "False", types::INPUT_ERROR_REASON, msg),
                unknown_conditions(prev_conditions),
            );
            return AgentOutcome { status: Some(status), result: ReconcileResult::Empty };
        }
        Err(e) => {
            let msg = format!(
                "{} failed to get clusterDeployment with name {} in namespace {}: {}",
                types::INPUT_ERROR_MSG, cd_ref.name, cd_ref.namespace, e
            );
            let status = status_with(
                spec_synced(prev_synced, "False", types::INPUT_ERROR_REASON, msg),
                unknown_conditions(prev_conditions),
            );
            return AgentOutcome { status: Some(status), result: ReconcileResult::Empty };
        }
    }

    let key = ClusterKey { name: cd_ref.name.clone(), namespace: cd_ref.namespace.clone() };

    // Step 4: load backend cluster.
    let cluster = match backend.get_cluster_by_kube_key(&key).await {
        Ok(c) => c,
        Err(BackendError::NotFound) => {
            let status = status_with(
                spec_synced(prev_synced, "False", types::INPUT_ERROR_REASON, format!("{} record not found", types::INPUT_ERROR_MSG)),
                unknown_conditions(prev_conditions),
            );
            return AgentOutcome { status: Some(status), result: ReconcileResult::Empty };
        }
        Err(BackendError::InputError(msg)) => {
            let status = status_with(
                spec_synced(prev_synced, "False", types::INPUT_ERROR_REASON, format!("{} {}", types::INPUT_ERROR_MSG, msg)),
                unknown_conditions(prev_conditions),
            );
            return AgentOutcome { status: Some(status), result: ReconcileResult::Empty };
        }
        Err(BackendError::Transient(msg)) => {
            let status = status_with(
                spec_synced(prev_synced, "False", types::BACKEND_ERROR_REASON, format!("{} {}", types::BACKEND_ERROR_MSG, msg)),
                unknown_conditions(prev_conditions),
            );
            return AgentOutcome { status: Some(status), result: ReconcileResult::RequeueAfter(DEFAULT_REQUEUE_AFTER_ON_ERROR) };
        }
    };

    // Step 5: locate host by Agent name == backend host UUID (I1).
    let Some(host) = locate_host(&cluster, agent_name) else {
        let status = status_with(
            spec_synced(prev_synced, "False", types::INPUT_ERROR_REASON, format!("{} host not found in cluster", types::INPUT_ERROR_MSG)),
            unknown_conditions(prev_conditions),
        );
        return AgentOutcome { status: Some(status), result: ReconcileResult::Empty };
    };

    // Step 6: load common host.
    let common_host = match backend.get_common_host_internal(cancel, &cluster.id, &host.id).await {
        Ok(h) => h,
        Err(BackendError::Transient(msg)) => {
            let status = status_with(
                spec_synced(prev_synced, "False", types::BACKEND_ERROR_REASON, format!("{} {}", types::BACKEND_ERROR_MSG, msg)),
                unknown_conditions(prev_conditions),
            );
            return AgentOutcome { status: Some(status), result: ReconcileResult::RequeueAfter(DEFAULT_REQUEUE_AFTER_ON_ERROR) };
        }
        Err(BackendError::NotFound) => {
            let status = status_with(
                spec_synced(prev_synced, "False", types::INPUT_ERROR_REASON, format!("{} record not found", types::INPUT_ERROR_MSG)),
                unknown_conditions(prev_conditions),
            );
            return AgentOutcome { status: Some(status), result: ReconcileResult::Empty };
        }
        Err(BackendError::InputError(msg)) => {
            let status = status_with(
                spec_synced(prev_synced, "False", types::INPUT_ERROR_REASON, format!("{} {}", types::INPUT_ERROR_MSG, msg)),
                unknown_conditions(prev_conditions),
            );
            return AgentOutcome { status: Some(status), result: ReconcileResult::Empty };
        }
    };

    // Step 7: run differ.
    let plan = match diff(spec, &common_host, &cluster) {
        Ok(p) => p,
        Err(BackendError::InputError(msg)) => {
            let status = status_with(
                spec_synced(prev_synced, "False", types::INPUT_ERROR_REASON, format!("{} {}", types::INPUT_ERROR_MSG, msg)),
                unknown_conditions(prev_conditions),
            );
            return AgentOutcome { status: Some(status), result: ReconcileResult::Empty };
        }
        Err(other) => {
            let status = status_with(
                spec_synced(prev_synced, "False", types::BACKEND_ERROR_REASON, format!("{} {}", types::BACKEND_ERROR_MSG, other)),
                unknown_conditions(prev_conditions),
            );
            return AgentOutcome { status: Some(status), result: ReconcileResult::RequeueAfter(DEFAULT_REQUEUE_AFTER_ON_ERROR) };
        }
    };

    // Step 8: execute plan.
    let refreshed = match apply_plan(backend, cancel, &cluster, &host, plan).await {
        Ok(r) => r,
        Err(BackendError::InputError(msg)) => {
            let status = status_with(
                spec_synced(prev_synced, "False", types::INPUT_ERROR_REASON, format!("{} {}", types::INPUT_ERROR_MSG, msg)),
                unknown_conditions(prev_conditions),
            );
            return AgentOutcome { status: Some(status), result: ReconcileResult::Empty };
        }
        Err(BackendError::Transient(msg)) => {
            let status = status_with(
                spec_synced(prev_synced, "False", types::BACKEND_ERROR_REASON, format!("{} {}", types::BACKEND_ERROR_MSG, msg)),
                unknown_conditions(prev_conditions),
            );
            return AgentOutcome { status: Some(status), result: ReconcileResult::RequeueAfter(DEFAULT_REQUEUE_AFTER_ON_ERROR) };
        }
        Err(BackendError::NotFound) => {
            let status = status_with(
                spec_synced(prev_synced, "False", types::BACKEND_ERROR_REASON, format!("{} record not found", types::BACKEND_ERROR_MSG)),
                unknown_conditions(prev_conditions),
            );
            return AgentOutcome { status: Some(status), result: ReconcileResult::RequeueAfter(DEFAULT_REQUEUE_AFTER_ON_ERROR) };
        }
    };

    // Step 9: refresh host view if the update returned one, else reuse.
    let final_host = match &refreshed {
        Some(refreshed_cluster) => locate_host(refreshed_cluster, agent_name).cloned().unwrap_or(host.clone()),
        None => host.clone(),
    };

    // Step 10: project conditions.
    let host_state = final_host.status.unwrap_or(types::HostState::Discovering);
    let projected = project_conditions(prev_conditions, host_state, &final_host.status_info, &final_host.validations_info);

    // Step 11: inventory snapshot.
    let inventory = parse_inventory(&final_host.inventory);

    let mut status = status_with(
        spec_synced(prev_synced, "True", types::SYNCED_OK_REASON, types::SYNCED_OK_MSG.to_string()),
        projected,
    );
    status.inventory = inventory;

    AgentOutcome { status: Some(status), result: ReconcileResult::Empty }
}

/// State shared between the controller and the web server.
#[derive(Clone, Default)]
pub struct State {
    diagnostics: Arc<RwLock<Diagnostics>>,
    registry: prometheus::Registry,
}

impl State {
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    pub fn to_context(&self, client: Client, backend: Arc<dyn Backend>) -> Arc<Context> {
        Arc::new(Context {
            client,
            backend,
            metrics: Arc::new(Metrics::default().register(&self.registry).unwrap()),
            diagnostics: self.diagnostics.clone(),
        })
    }
}

#[derive(Clone, serde::Serialize)]
pub struct Diagnostics {
    pub last_event: chrono::DateTime<Utc>,
    #[serde(skip)]
    pub reporter: Reporter,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reporter: "agent-reconciler".into(),
        }
    }
}

pub struct Context {
    pub client: Client,
    pub backend: Arc<dyn Backend>,
    pub metrics: Arc<Metrics>,
    pub diagnostics: Arc<RwLock<Diagnostics>>,
}

#[instrument(skip(agent, ctx), fields(trace_id))]
pub async fn reconcile(agent: Arc<Agent>, ctx: Arc<Context>) -> Result<Action, Error> {
    let trace_id = telemetry::get_trace_id();
    Span::current().record("trace_id", field::display(&trace_id));
    let _timer = ctx.metrics.count_and_measure();
    ctx.diagnostics.write().await.last_event = Utc::now();

    let ns = agent.namespace().unwrap_or_default();
    let name = agent.name_any();
    info!("reconciling agent {name} in {ns}");

    let cd_resolver = KubeClusterDeploymentResolver::new(ctx.client.clone(), &ns);
    let cancel = CancellationToken::new();

    let outcome = compute(ctx.backend.as_ref(), &cd_resolver, &cancel, &ns, &name, &agent.spec, agent.status.as_ref()).await;

    if let Some(status) = outcome.status {
        let agents: Api<Agent> = Api::namespaced(ctx.client.clone(), &ns);
        let patch = Patch::Apply(json!({
            "apiVersion": "agent-install.openshift.io/v1beta1",
            "kind": "Agent",
            "status": status,
        }));
        let ps = PatchParams::apply(FIELD_MANAGER).force();
        agents
            .patch_status(&name, &ps, &patch)
            .await
            .map_err(Error::Kube)?;
    }

    match outcome.result {
        ReconcileResult::Empty => Ok(Action::await_change()),
        ReconcileResult::RequeueAfter(d) => Ok(Action::requeue(d)),
    }
}

pub fn error_policy(agent: Arc<Agent>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&agent.name_any(), error);
    Action::requeue(Duration::from_secs(5 * 60))
}

/// Initialize the controller and shared state (given the CRD is installed).
pub async fn run(state: State, backend: Arc<dyn Backend>) {
    let client = Client::try_default().await.expect("failed to create kube Client");

    let agents = Api::<Agent>::all(client.clone());
    if let Err(e) = agents.list(&Default::default()).await {
        error!("CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        std::process::exit(1);
    }

    Controller::new(agents, Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state.to_context(client, backend))
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
}

//! The `Agent` custom resource: spec/status shape and the stable condition
//! vocabulary external consumers key off of (§3, §6 of the reconciliation
//! spec). Mirrors the teacher's `NeonCluster`/`NeonStorage` `#[derive(CustomResource)]`
//! idiom in `neon_cluster::controller`.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to an externally-managed `ClusterDeployment` by (name, namespace).
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct ClusterDeploymentRef {
    pub name: String,
    pub namespace: String,
}

/// Host role as declared by the user; validated by the backend, not here (Open Question 3).
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HostRole {
    #[default]
    AutoAssign,
    Master,
    Worker,
    Bootstrap,
}

impl std::fmt::Display for HostRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HostRole::AutoAssign => "auto-assign",
            HostRole::Master => "master",
            HostRole::Worker => "worker",
            HostRole::Bootstrap => "bootstrap",
        };
        write!(f, "{s}")
    }
}

/// Declarative desired state for a single registered host.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(
    kind = "Agent",
    group = "agent-install.openshift.io",
    version = "v1beta1",
    namespaced
)]
#[kube(status = "AgentStatus", shortname = "agent")]
pub struct AgentSpec {
    /// Reference to the ClusterDeployment this host is bound to. Unset means the Agent is unbound.
    pub cluster_deployment_name: Option<ClusterDeploymentRef>,
    #[serde(default)]
    pub hostname: String,
    /// `None` means no opinion on role, same convention as `hostname`/`installation_disk_id`.
    #[serde(default)]
    pub role: Option<HostRole>,
    #[serde(default)]
    pub installation_disk_id: String,
    /// JSON array literal of string arguments, or empty for "no opinion".
    #[serde(default)]
    pub installer_args: String,
    #[serde(default)]
    pub approved: bool,
}

/// The status object of `Agent`.
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
pub struct AgentStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub inventory: Inventory,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
pub struct Inventory {
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub disks: Vec<Disk>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
pub struct Interface {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default)]
    pub ipv4_addresses: Vec<String>,
    #[serde(default)]
    pub ipv6_addresses: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
pub struct Disk {
    pub path: String,
    pub bootable: bool,
}

/// Internal host lifecycle phase, mirrored from the backend's closed enumeration (§3).
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostState {
    Discovering,
    Known,
    Insufficient,
    Disconnected,
    Disabled,
    PreparingForInstallation,
    PendingForInput,
    Installing,
    InstallingInProgress,
    Finalizing,
    Installed,
    Error,
    ResettingPendingUserAction,
    AddedToExistingCluster,
    Cancelled,
    Resetting,
}

// ---- Condition vocabulary (stable strings, §6) ----

pub const SPEC_SYNCED_CONDITION: &str = "SpecSynced";
pub const CONNECTED_CONDITION: &str = "Connected";
pub const READY_FOR_INSTALLATION_CONDITION: &str = "ReadyForInstallation";
pub const INSTALLED_CONDITION: &str = "Installed";
pub const VALIDATED_CONDITION: &str = "Validated";

pub const SYNCED_OK_REASON: &str = "SyncedOk";
pub const INPUT_ERROR_REASON: &str = "InputError";
pub const BACKEND_ERROR_REASON: &str = "BackendError";
pub const AGENT_CONNECTED_REASON: &str = "AgentConnected";
pub const AGENT_DISCONNECTED_REASON: &str = "AgentDisconnected";
pub const AGENT_READY_REASON: &str = "AgentReady";
pub const AGENT_NOT_READY_REASON: &str = "AgentNotReady";
pub const AGENT_ALREADY_INSTALLING_REASON: &str = "AgentAlreadyInstalling";
pub const AGENT_INSTALLATION_NOT_STARTED_REASON: &str = "AgentInstallationNotStarted";
pub const AGENT_INSTALLATION_IN_PROGRESS_REASON: &str = "AgentInstallationInProgress";
pub const AGENT_INSTALLED_REASON: &str = "AgentInstalled";
pub const AGENT_INSTALLATION_FAILED_REASON: &str = "AgentInstallationFailed";
pub const AGENT_VALIDATIONS_PASSING_REASON: &str = "AgentValidationsPassing";
pub const AGENT_VALIDATIONS_FAILING_REASON: &str = "AgentValidationsFailing";
pub const NOT_AVAILABLE_REASON: &str = "NotAvailable";

pub const SYNCED_OK_MSG: &str = "SyncedOk";
pub const INPUT_ERROR_MSG: &str = "Input Error:";
pub const BACKEND_ERROR_MSG: &str = "Backend Error:";
pub const AGENT_CONNECTED_MSG: &str = "The agent's connection to the installation service is unimpaired";
pub const AGENT_DISCONNECTED_MSG: &str = "The agent's connection to the installation service has been lost";
pub const AGENT_READY_MSG: &str = "The agent is ready to begin the installation";
pub const AGENT_NOT_READY_MSG: &str = "The agent is not ready to begin the installation";
pub const AGENT_ALREADY_INSTALLING_MSG: &str = "Installation already started and is progressing";
pub const AGENT_INSTALLATION_NOT_STARTED_MSG: &str = "Installation has not yet started";
pub const AGENT_INSTALLATION_IN_PROGRESS_MSG: &str = "Installation in progress";
pub const AGENT_INSTALLED_MSG: &str = "The installation has completed:";
pub const AGENT_INSTALLATION_FAILED_MSG: &str = "The installation has failed:";
pub const AGENT_VALIDATIONS_PASSING_MSG: &str = "Validations are passing";
pub const AGENT_VALIDATIONS_FAILING_MSG: &str = "Validations are failing:";
pub const NOT_AVAILABLE_MSG: &str = "Not available";

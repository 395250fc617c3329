//! Minimal read-only view of the externally-owned `ClusterDeployment` resource.
//!
//! The declarative-resource client library and scheme registration are out of
//! scope (§1) — this crate only needs enough of a type to `Api::<ClusterDeployment>::get`
//! by (name, namespace) and confirm existence; it never writes one.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    kind = "ClusterDeployment",
    group = "hive.openshift.io",
    version = "v1",
    namespaced
)]
pub struct ClusterDeploymentSpec {
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub base_domain: String,
}

//! Component C: computes whether the declared Agent spec differs from the
//! backend host record along four orthogonal axes (§4.C). Idempotent: a
//! second run against an already-converged backend record schedules nothing.

use crate::backend::{BackendCluster, BackendError, BackendHost, ClusterUpdateParams, DiskSelection};
use crate::types::AgentSpec;

const DISK_ROLE_INSTALL: &str = "install";

#[derive(Debug, Default, Clone)]
pub struct UpdatePlan {
    pub installer_args: Option<String>,
    pub cluster_update: Option<ClusterUpdateParams>,
    pub approved: Option<bool>,
}

impl UpdatePlan {
    pub fn is_empty(&self) -> bool {
        self.installer_args.is_none() && self.cluster_update.is_none() && self.approved.is_none()
    }
}

fn canonicalize_installer_args(raw: &str) -> Result<String, BackendError> {
    let parsed: Vec<String> = serde_json::from_str(raw)
        .map_err(|_| BackendError::InputError("invalid installer args".to_string()))?;
    serde_json::to_string(&parsed)
        .map_err(|_| BackendError::InputError("invalid installer args".to_string()))
}

/// Axis 1: installer args, parsed/canonicalized and semantically compared (§9).
fn diff_installer_args(spec: &AgentSpec, host: &BackendHost) -> Result<Option<String>, BackendError> {
    if spec.installer_args.is_empty() {
        return Ok(None);
    }
    let canonical = canonicalize_installer_args(&spec.installer_args)?;
    if canonical == host.installer_args {
        Ok(None)
    } else {
        Ok(Some(canonical))
    }
}

/// Axis 2: hostname / role / installation disk. Empty spec fields mean "no opinion".
fn diff_cluster_fields(
    spec: &AgentSpec,
    host: &BackendHost,
    cluster_id: &str,
) -> Option<ClusterUpdateParams> {
    let hostname_differs = !spec.hostname.is_empty() && spec.hostname != host.requested_hostname;
    let spec_role = spec.role.as_ref().map(|r| r.to_string()).unwrap_or_default();
    let role_differs = spec.role.is_some() && spec_role != host.role;
    let disk_differs =
        !spec.installation_disk_id.is_empty() && spec.installation_disk_id != host.installation_disk_id;

    if !hostname_differs && !role_differs && !disk_differs {
        return None;
    }

    Some(ClusterUpdateParams {
        cluster_id: cluster_id.to_string(),
        hosts_names: vec![(host.id.clone(), spec.hostname.clone())],
        hosts_roles: vec![(host.id.clone(), spec_role)],
        disks_selected_config: vec![(
            host.id.clone(),
            vec![DiskSelection {
                disk_id: spec.installation_disk_id.clone(),
                role: DISK_ROLE_INSTALL.to_string(),
            }],
        )],
    })
}

/// Axis 3: approval toggle.
fn diff_approved(spec: &AgentSpec, host: &BackendHost) -> Option<bool> {
    (spec.approved != host.approved).then_some(spec.approved)
}

/// Compute the update plan for an Agent spec against the resolved backend
/// host. `cluster` is used only for its id; the host is assumed to already
/// have been located within it by the caller (§4.D step 5).
pub fn diff(spec: &AgentSpec, host: &BackendHost, cluster: &BackendCluster) -> Result<UpdatePlan, BackendError> {
    let installer_args = diff_installer_args(spec, host)?;
    let cluster_update = diff_cluster_fields(spec, host, &cluster.id);
    let approved = diff_approved(spec, host);
    Ok(UpdatePlan {
        installer_args,
        cluster_update,
        approved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HostRole;

    fn base_spec() -> AgentSpec {
        AgentSpec {
            cluster_deployment_name: None,
            hostname: String::new(),
            role: None,
            installation_disk_id: String::new(),
            installer_args: String::new(),
            approved: false,
        }
    }

    fn base_host(id: &str) -> BackendHost {
        BackendHost {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn no_spec_change_is_idempotent() {
        let spec = base_spec();
        let host = base_host("h1");
        let cluster = BackendCluster { id: "c1".into(), ..Default::default() };
        let plan = diff(&spec, &host, &cluster).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn hostname_role_disk_triggers_single_cluster_update() {
        let mut spec = base_spec();
        spec.hostname = "hostname123".to_string();
        spec.role = Some(HostRole::Worker);
        spec.installation_disk_id = "/dev/disk/by-id/wwn-0x6141877064533b0020adf3bb03167694".to_string();
        let host = base_host("H");
        let cluster = BackendCluster { id: "c1".into(), ..Default::default() };

        let plan = diff(&spec, &host, &cluster).unwrap();
        let update = plan.cluster_update.expect("expected a cluster update");
        assert_eq!(update.hosts_names, vec![("H".to_string(), "hostname123".to_string())]);
        assert_eq!(update.hosts_roles, vec![("H".to_string(), "worker".to_string())]);
        assert_eq!(
            update.disks_selected_config,
            vec![(
                "H".to_string(),
                vec![DiskSelection {
                    disk_id: "/dev/disk/by-id/wwn-0x6141877064533b0020adf3bb03167694".to_string(),
                    role: "install".to_string(),
                }]
            )]
        );
        assert!(plan.installer_args.is_none());
        assert!(plan.approved.is_none());
    }

    #[test]
    fn empty_disk_id_does_not_clear_existing_backend_disk() {
        let spec = base_spec();
        let mut host = base_host("H");
        host.installation_disk_id = "/dev/disk/by-id/wwn-0x111".to_string();
        let cluster = BackendCluster { id: "c1".into(), ..Default::default() };

        let plan = diff(&spec, &host, &cluster).unwrap();
        assert!(plan.cluster_update.is_none());
    }

    #[test]
    fn unset_role_does_not_overwrite_host_role_on_other_axis_change() {
        let mut spec = base_spec();
        spec.hostname = "hostname123".to_string();
        let mut host = base_host("H");
        host.role = "master".to_string();
        let cluster = BackendCluster { id: "c1".into(), ..Default::default() };

        let plan = diff(&spec, &host, &cluster).unwrap();
        let update = plan.cluster_update.expect("expected a cluster update for the hostname change");
        assert_eq!(update.hosts_roles, vec![("H".to_string(), String::new())]);
    }

    #[test]
    fn installer_args_round_trip_then_no_op() {
        let mut spec = base_spec();
        spec.installer_args =
            r#"["--append-karg","ip=x","--save-partindex","1","-n"]"#.to_string();
        let host = base_host("H");
        let cluster = BackendCluster { id: "c1".into(), ..Default::default() };

        let plan = diff(&spec, &host, &cluster).unwrap();
        let canonical = plan.installer_args.expect("expected an installer-args update");

        let mut host2 = base_host("H");
        host2.installer_args = canonical;
        let plan2 = diff(&spec, &host2, &cluster).unwrap();
        assert!(plan2.installer_args.is_none());
    }

    #[test]
    fn bad_installer_args_json_is_input_error() {
        let mut spec = base_spec();
        spec.installer_args = r#""--append-karg", "ip=x"]"#.to_string();
        let host = base_host("H");
        let cluster = BackendCluster { id: "c1".into(), ..Default::default() };

        let err = diff(&spec, &host, &cluster).unwrap_err();
        assert!(matches!(err, BackendError::InputError(_)));
    }

    #[test]
    fn approval_change_is_scheduled() {
        let mut spec = base_spec();
        spec.approved = true;
        let host = base_host("H");
        let cluster = BackendCluster { id: "c1".into(), ..Default::default() };

        let plan = diff(&spec, &host, &cluster).unwrap();
        assert_eq!(plan.approved, Some(true));
    }
}

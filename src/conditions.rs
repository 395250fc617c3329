//! Component B: pure function mapping backend host state to the four
//! observable conditions (§4.B). Generalizes the teacher's `util/status.rs`
//! `set_status_condition` convention — a condition's `lastTransitionTime`
//! only advances when its `status` actually changes — by threading the
//! previous `Agent.status.conditions` through projection.

use chrono::Utc;
use indexmap::IndexMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use serde::Deserialize;

use crate::types::{self, HostState};

fn find_previous<'a>(previous: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    previous.iter().find(|c| c.type_ == type_)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ValidationStatus {
    Success,
    Failure,
    Pending,
}

#[derive(Debug, Deserialize)]
struct ValidationResult {
    #[serde(default)]
    #[allow(dead_code)]
    id: String,
    status: ValidationStatus,
    message: String,
}

fn new_condition(previous: &[Condition], type_: &str, status: &str, reason: &str, message: String) -> Condition {
    let last_transition_time = match find_previous(previous, type_) {
        Some(prev) if prev.status == status => prev.last_transition_time.clone(),
        _ => Time(Utc::now()),
    };
    Condition {
        type_: type_.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message,
        last_transition_time,
        observed_generation: None,
    }
}

fn is_installing_or_later(state: HostState) -> bool {
    matches!(
        state,
        HostState::Installing
            | HostState::InstallingInProgress
            | HostState::PreparingForInstallation
            | HostState::Finalizing
            | HostState::Installed
            | HostState::Error
            | HostState::AddedToExistingCluster
            | HostState::Resetting
            | HostState::ResettingPendingUserAction
            | HostState::Cancelled
    )
}

fn connected(previous: &[Condition], state: HostState) -> Condition {
    if state == HostState::Disconnected {
        new_condition(
            previous,
            types::CONNECTED_CONDITION,
            "False",
            types::AGENT_DISCONNECTED_REASON,
            types::AGENT_DISCONNECTED_MSG.to_string(),
        )
    } else {
        new_condition(
            previous,
            types::CONNECTED_CONDITION,
            "True",
            types::AGENT_CONNECTED_REASON,
            types::AGENT_CONNECTED_MSG.to_string(),
        )
    }
}

fn installed(previous: &[Condition], state: HostState, status_info: &str) -> Condition {
    match state {
        HostState::Installed | HostState::AddedToExistingCluster => new_condition(
            previous,
            types::INSTALLED_CONDITION,
            "True",
            types::AGENT_INSTALLED_REASON,
            format!("{} {}", types::AGENT_INSTALLED_MSG, status_info),
        ),
        HostState::Installing
        | HostState::InstallingInProgress
        | HostState::PreparingForInstallation
        | HostState::Finalizing => new_condition(
            previous,
            types::INSTALLED_CONDITION,
            "False",
            types::AGENT_INSTALLATION_IN_PROGRESS_REASON,
            format!("{} {}", types::AGENT_INSTALLATION_IN_PROGRESS_MSG, status_info),
        ),
        HostState::Error => new_condition(
            previous,
            types::INSTALLED_CONDITION,
            "False",
            types::AGENT_INSTALLATION_FAILED_REASON,
            format!("{} {}", types::AGENT_INSTALLATION_FAILED_MSG, status_info),
        ),
        _ => new_condition(
            previous,
            types::INSTALLED_CONDITION,
            "False",
            types::AGENT_INSTALLATION_NOT_STARTED_REASON,
            types::AGENT_INSTALLATION_NOT_STARTED_MSG.to_string(),
        ),
    }
}

fn ready_for_installation(previous: &[Condition], state: HostState) -> Condition {
    if state == HostState::Known {
        new_condition(
            previous,
            types::READY_FOR_INSTALLATION_CONDITION,
            "True",
            types::AGENT_READY_REASON,
            types::AGENT_READY_MSG.to_string(),
        )
    } else if is_installing_or_later(state) {
        new_condition(
            previous,
            types::READY_FOR_INSTALLATION_CONDITION,
            "False",
            types::AGENT_ALREADY_INSTALLING_REASON,
            types::AGENT_ALREADY_INSTALLING_MSG.to_string(),
        )
    } else {
        new_condition(
            previous,
            types::READY_FOR_INSTALLATION_CONDITION,
            "False",
            types::AGENT_NOT_READY_REASON,
            types::AGENT_NOT_READY_MSG.to_string(),
        )
    }
}

fn validated(previous: &[Condition], validations_info: &str) -> Condition {
    if validations_info.is_empty() {
        return new_condition(
            previous,
            types::VALIDATED_CONDITION,
            "Unknown",
            types::NOT_AVAILABLE_REASON,
            types::NOT_AVAILABLE_MSG.to_string(),
        );
    }

    let parsed: Result<IndexMap<String, Vec<ValidationResult>>, _> =
        serde_json::from_str(validations_info);

    let Ok(groups) = parsed else {
        return new_condition(
            previous,
            types::VALIDATED_CONDITION,
            "Unknown",
            types::NOT_AVAILABLE_REASON,
            types::NOT_AVAILABLE_MSG.to_string(),
        );
    };

    let mut failures = Vec::new();
    for results in groups.values() {
        for r in results {
            if matches!(r.status, ValidationStatus::Failure) {
                failures.push(r.message.clone());
            }
        }
    }

    if failures.is_empty() {
        new_condition(
            previous,
            types::VALIDATED_CONDITION,
            "True",
            types::AGENT_VALIDATIONS_PASSING_REASON,
            types::AGENT_VALIDATIONS_PASSING_MSG.to_string(),
        )
    } else {
        new_condition(
            previous,
            types::VALIDATED_CONDITION,
            "False",
            types::AGENT_VALIDATIONS_FAILING_REASON,
            format!(
                "{} {}",
                types::AGENT_VALIDATIONS_FAILING_MSG,
                failures.join(",")
            ),
        )
    }
}

/// Project the four host-lifecycle conditions. Total over `HostState` (I4).
/// `previous` is the Agent's prior `status.conditions`, consulted so a
/// condition's `lastTransitionTime` only advances when its `status` changes.
pub fn project_conditions(previous: &[Condition], state: HostState, status_info: &str, validations_info: &str) -> [Condition; 4] {
    [
        connected(previous, state),
        ready_for_installation(previous, state),
        installed(previous, state, status_info),
        validated(previous, validations_info),
    ]
}

/// The four conditions set to Unknown/NotAvailable, used when projection is
/// skipped (spec-sync failure before the host was resolved, or a transient
/// backend error during update application, §4.B/§4.D step 8).
pub fn unknown_conditions(previous: &[Condition]) -> [Condition; 4] {
    let unknown = |type_: &str| {
        new_condition(
            previous,
            type_,
            "Unknown",
            types::NOT_AVAILABLE_REASON,
            types::NOT_AVAILABLE_MSG.to_string(),
        )
    };
    [
        unknown(types::CONNECTED_CONDITION),
        unknown(types::READY_FOR_INSTALLATION_CONDITION),
        unknown(types::INSTALLED_CONDITION),
        unknown(types::VALIDATED_CONDITION),
    ]
}

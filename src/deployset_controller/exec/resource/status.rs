// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::deployset_controller::exec::error::ReconcileError;
use crate::deployset_controller::exec::resource::deployment::desired_replicas;
use crate::deployset_controller::trusted::spec_types::{DeploySet, DeploySetStatus};
use crate::kubernetes_api_objects::error::APIError;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

pub const CONDITION_AVAILABLE: &str = "Available";
pub const CONDITION_REPLICAS_SYNCED: &str = "ReplicasSynced";
pub const CONDITION_DEGRADED: &str = "Degraded";

const STATUS_TRUE: &str = "True";
const STATUS_FALSE: &str = "False";

fn status_str(b: bool) -> &'static str {
    if b {
        STATUS_TRUE
    } else {
        STATUS_FALSE
    }
}

// set_condition adds or replaces the condition of the same type.
// lastTransitionTime only moves when the status flips.
pub fn set_condition(conditions: &mut Vec<Condition>, mut new_condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == new_condition.type_) {
        Some(existing) => {
            if existing.status == new_condition.status {
                new_condition.last_transition_time = existing.last_transition_time.clone();
            }
            *existing = new_condition;
        }
        None => conditions.push(new_condition),
    }
}

pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

fn condition(ds: &DeploySet, type_: &str, status: bool, reason: &str, message: String, now: &Time) -> Condition {
    Condition {
        type_: type_.to_string(),
        status: status_str(status).to_string(),
        reason: reason.to_string(),
        message,
        observed_generation: ds.metadata.generation,
        last_transition_time: now.clone(),
    }
}

fn current_status(ds: &DeploySet) -> DeploySetStatus {
    ds.status.clone().unwrap_or_default()
}

/// The status after a reconcile that got to observe the Deployment.
/// scale_failure is the error of a replica update that did not go through, if any.
/// Without a Deployment (a creation race lost to another reconcile) the stored
/// replica counts are kept.
pub fn make_status(ds: &DeploySet, deployment: Option<&Deployment>, scale_failure: Option<APIError>, now: &Time) -> DeploySetStatus {
    let desired = desired_replicas(ds);
    let mut status = current_status(ds);
    if let Some(deployment) = deployment {
        let deployment_status = deployment.status.as_ref();
        status.ready_replicas = deployment_status.and_then(|s| s.ready_replicas).unwrap_or(0);
        status.available_replicas = deployment_status.and_then(|s| s.available_replicas).unwrap_or(0);
    }
    let available_replicas = status.available_replicas;

    let available = available_replicas >= desired;
    set_condition(
        &mut status.condition,
        condition(
            ds,
            CONDITION_AVAILABLE,
            available,
            if available { "MinimumReplicasAvailable" } else { "ReplicasUnavailable" },
            format!("{}/{} replicas available", available_replicas, desired),
            now,
        ),
    );
    let synced = match scale_failure {
        Some(err) => condition(
            ds,
            CONDITION_REPLICAS_SYNCED,
            false,
            ReconcileError::ScaleDeploymentFailed(err).reason(),
            format!("failed to set Deployment replicas to {}: {}", desired, err),
            now,
        ),
        None => condition(
            ds,
            CONDITION_REPLICAS_SYNCED,
            true,
            "ReplicasMatch",
            format!("Deployment replicas set to {}", desired),
            now,
        ),
    };
    set_condition(&mut status.condition, synced);
    set_condition(
        &mut status.condition,
        condition(ds, CONDITION_DEGRADED, false, "ReconcileSucceeded", String::new(), now),
    );
    status
}

/// The status after a hard failure. The replica counts are left as they were.
pub fn make_degraded_status(ds: &DeploySet, err: &ReconcileError, now: &Time) -> DeploySetStatus {
    let mut status = current_status(ds);
    set_condition(
        &mut status.condition,
        condition(ds, CONDITION_DEGRADED, true, err.reason(), err.to_string(), now),
    );
    status
}

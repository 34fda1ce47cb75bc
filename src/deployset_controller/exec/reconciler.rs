// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::deployset_controller::exec::apply::*;
use crate::deployset_controller::exec::error::ReconcileError;
use crate::deployset_controller::exec::observe::{observe, observe_with_object, Observed};
use crate::deployset_controller::exec::resource::{deployment::*, status::*};
use crate::deployset_controller::trusted::config::ReconcilerConfig;
use crate::deployset_controller::trusted::spec_types::{DeploySet, DeploySetStatus};
use crate::deployset_controller::trusted::step::DeploySetReconcileStep;
use crate::kubernetes_api_objects::api_method::{KubeAPIRequest, KubeAPIResponse};
use crate::kubernetes_api_objects::error::APIError;
use crate::kubernetes_api_objects::object_ref::ObjectRef;
use crate::reconciler::exec::reconciler::{Outcome, Reconciler, Requeue};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::chrono::{SubsecRound, Utc};
use tracing::{info, warn};

pub struct DeploySetReconcileState {
    pub reconcile_step: DeploySetReconcileStep,
    // The DeploySet as last read in this reconcile.
    pub deploy_set: Option<DeploySet>,
    // The Deployment as last read or written in this reconcile.
    pub deployment: Option<Deployment>,
    pub requeue: Requeue,
    // A replica update that did not go through. It does not fail the reconcile.
    pub scale_failure: Option<APIError>,
    // The error the reconcile ends with once the failure is reported.
    pub pending_error: Option<ReconcileError>,
    // Stamped on status conditions that change in this reconcile.
    pub now: Time,
}

#[derive(Default)]
pub struct DeploySetReconciler {
    pub config: ReconcilerConfig,
}

impl DeploySetReconciler {
    pub fn new(config: ReconcilerConfig) -> DeploySetReconciler {
        DeploySetReconciler { config }
    }
}

impl Reconciler for DeploySetReconciler {
    type S = DeploySetReconcileState;
    type E = ReconcileError;

    fn reconcile_init_state(&self) -> DeploySetReconcileState {
        reconcile_init_state(Time(Utc::now().trunc_subsecs(0)))
    }

    fn reconcile_core(
        &self, key: &ObjectRef, resp_o: Option<KubeAPIResponse>, state: DeploySetReconcileState,
    ) -> (DeploySetReconcileState, Option<KubeAPIRequest>) {
        reconcile_core(&self.config, key, resp_o, state)
    }

    fn reconcile_done(&self, state: &DeploySetReconcileState) -> bool {
        state.reconcile_step == DeploySetReconcileStep::Done
    }

    fn reconcile_error(&self, state: &DeploySetReconcileState) -> bool {
        state.reconcile_step == DeploySetReconcileStep::Error
    }

    fn reconcile_outcome(&self, state: &DeploySetReconcileState) -> Outcome<ReconcileError> {
        reconcile_outcome(state)
    }
}

pub fn reconcile_init_state(now: Time) -> DeploySetReconcileState {
    DeploySetReconcileState {
        reconcile_step: DeploySetReconcileStep::Init,
        deploy_set: None,
        deployment: None,
        requeue: Requeue::AwaitChange,
        scale_failure: None,
        pending_error: None,
        now,
    }
}

pub fn reconcile_outcome(state: &DeploySetReconcileState) -> Outcome<ReconcileError> {
    match state.reconcile_step {
        DeploySetReconcileStep::Done => match state.scale_failure {
            Some(err) => Outcome::RetryOnNextTrigger(ReconcileError::ScaleDeploymentFailed(err)),
            None => Outcome::Done(state.requeue),
        },
        _ => Outcome::RetryViaDispatcher(
            state.pending_error.clone().unwrap_or(ReconcileError::UnexpectedResponse),
        ),
    }
}

pub fn reconcile_core(
    config: &ReconcilerConfig, key: &ObjectRef, resp_o: Option<KubeAPIResponse>, state: DeploySetReconcileState,
) -> (DeploySetReconcileState, Option<KubeAPIRequest>) {
    let step = state.reconcile_step;
    match step {
        DeploySetReconcileStep::Init => {
            let req = get_request::<DeploySet>(key);
            let state_prime = DeploySetReconcileState {
                reconcile_step: DeploySetReconcileStep::AfterGetDeploySet,
                ..state
            };
            (state_prime, Some(req))
        }
        DeploySetReconcileStep::AfterGetDeploySet => match observe::<DeploySet>(resp_o) {
            Some(Observed::Present(ds)) => {
                let req = get_request::<Deployment>(key);
                let state_prime = DeploySetReconcileState {
                    reconcile_step: DeploySetReconcileStep::AfterGetDeployment,
                    deploy_set: Some(ds),
                    ..state
                };
                (state_prime, Some(req))
            }
            // The trigger outlived the DeploySet; its Deployment is left to the garbage collector.
            Some(Observed::Absent) => {
                info!("DeploySet {} not found, end reconcile", key);
                (done_state(state), None)
            }
            Some(Observed::Failed(err)) => (error_state(state, ReconcileError::GetDeploySetFailed(err)), None),
            None => (error_state(state, ReconcileError::UnexpectedResponse), None),
        },
        DeploySetReconcileStep::AfterGetDeployment => {
            let ds = match state.deploy_set.clone() {
                Some(ds) => ds,
                None => return (error_state(state, ReconcileError::UnexpectedResponse), None),
            };
            match observe_with_object::<Deployment>(resp_o) {
                Some(Observed::Absent) => create_deployment(config, key, &ds, state),
                Some(Observed::Present((deployment, raw))) => {
                    let owner_ref = match controller_owner_reference(&deployment, &ds) {
                        Some(owner_ref) => owner_ref,
                        None => return report_failure(key, state, ReconcileError::DeploymentNotControlled),
                    };
                    let desired = desired_replicas(&ds);
                    if observed_replicas(&deployment) == desired {
                        let state_prime = DeploySetReconcileState {
                            deployment: Some(deployment),
                            ..state
                        };
                        return sync_status(key, &ds, state_prime);
                    }
                    info!("Scaling Deployment {} from {} to {} replicas", key, observed_replicas(&deployment), desired);
                    let req = scale_deployment_request(&raw, owner_ref, desired, key);
                    let state_prime = DeploySetReconcileState {
                        reconcile_step: DeploySetReconcileStep::AfterScaleDeployment,
                        deployment: Some(deployment),
                        ..state
                    };
                    (state_prime, Some(req))
                }
                // Nothing is known about the Deployment, so nothing is written to it.
                Some(Observed::Failed(err)) => report_failure(key, state, ReconcileError::GetDeploymentFailed(err)),
                None => (error_state(state, ReconcileError::UnexpectedResponse), None),
            }
        }
        DeploySetReconcileStep::AfterCreateDeployment => match CreateOutcome::from_response(resp_o) {
            Some(CreateOutcome::Created(deployment)) => {
                let state_prime = DeploySetReconcileState {
                    deployment: deployment.or(state.deployment),
                    requeue: Requeue::After(config.cool_down),
                    ..state
                };
                refresh_deploy_set(key, state_prime)
            }
            Some(CreateOutcome::AlreadyExists) => {
                info!("Deployment {} was created by someone else", key);
                let state_prime = DeploySetReconcileState {
                    deployment: None,
                    requeue: Requeue::After(config.cool_down),
                    ..state
                };
                refresh_deploy_set(key, state_prime)
            }
            Some(CreateOutcome::Failed(err)) => report_failure(key, state, ReconcileError::CreateDeploymentFailed(err)),
            None => (error_state(state, ReconcileError::UnexpectedResponse), None),
        },
        DeploySetReconcileStep::AfterScaleDeployment => match UpdateOutcome::from_response(resp_o) {
            Some(UpdateOutcome::Updated(deployment)) => {
                let state_prime = DeploySetReconcileState {
                    deployment: deployment.or(state.deployment),
                    ..state
                };
                refresh_deploy_set(key, state_prime)
            }
            Some(UpdateOutcome::Failed(err)) => {
                warn!("Failed to update replicas of Deployment {}: {}, will retry on next trigger", key, err);
                let state_prime = DeploySetReconcileState {
                    scale_failure: Some(err),
                    ..state
                };
                refresh_deploy_set(key, state_prime)
            }
            None => (error_state(state, ReconcileError::UnexpectedResponse), None),
        },
        DeploySetReconcileStep::AfterRefreshDeploySet => match observe::<DeploySet>(resp_o) {
            Some(Observed::Present(ds)) => {
                let state_prime = DeploySetReconcileState {
                    deploy_set: Some(ds.clone()),
                    ..state
                };
                sync_status(key, &ds, state_prime)
            }
            Some(Observed::Absent) => (done_state(state), None),
            Some(Observed::Failed(err)) => (error_state(state, ReconcileError::RefreshDeploySetFailed(err)), None),
            None => (error_state(state, ReconcileError::UnexpectedResponse), None),
        },
        DeploySetReconcileStep::AfterUpdateStatus => {
            // Status is best-effort.
            if let Some(err) = resp_o.as_ref().and_then(KubeAPIResponse::error) {
                warn!("Failed to update status of DeploySet {}: {}", key, err);
            }
            (done_state(state), None)
        }
        DeploySetReconcileStep::AfterReportFailure => {
            let err = state.pending_error.clone().unwrap_or(ReconcileError::UnexpectedResponse);
            (error_state(state, err), None)
        }
        DeploySetReconcileStep::Done | DeploySetReconcileStep::Error => (state, None),
    }
}

fn done_state(state: DeploySetReconcileState) -> DeploySetReconcileState {
    DeploySetReconcileState {
        reconcile_step: DeploySetReconcileStep::Done,
        ..state
    }
}

fn error_state(state: DeploySetReconcileState, err: ReconcileError) -> DeploySetReconcileState {
    DeploySetReconcileState {
        reconcile_step: DeploySetReconcileStep::Error,
        pending_error: Some(err),
        ..state
    }
}

fn create_deployment(
    config: &ReconcilerConfig, key: &ObjectRef, ds: &DeploySet, state: DeploySetReconcileState,
) -> (DeploySetReconcileState, Option<KubeAPIRequest>) {
    let deployment = match make_deployment(ds, config) {
        Ok(deployment) => deployment,
        Err(err) => return report_failure(key, state, err.into()),
    };
    match create_deployment_request(&deployment, key) {
        Ok(req) => {
            info!("Creating Deployment {} with {} replicas", key, desired_replicas(ds));
            let state_prime = DeploySetReconcileState {
                reconcile_step: DeploySetReconcileStep::AfterCreateDeployment,
                ..state
            };
            (state_prime, Some(req))
        }
        Err(err) => report_failure(key, state, err.into()),
    }
}

fn refresh_deploy_set(key: &ObjectRef, state: DeploySetReconcileState) -> (DeploySetReconcileState, Option<KubeAPIRequest>) {
    let state_prime = DeploySetReconcileState {
        reconcile_step: DeploySetReconcileStep::AfterRefreshDeploySet,
        ..state
    };
    (state_prime, Some(get_request::<DeploySet>(key)))
}

// Writes the observed status, unless it is already what is stored.
fn sync_status(key: &ObjectRef, ds: &DeploySet, state: DeploySetReconcileState) -> (DeploySetReconcileState, Option<KubeAPIRequest>) {
    let status = make_status(ds, state.deployment.as_ref(), state.scale_failure, &state.now);
    write_status(key, ds, status, DeploySetReconcileStep::AfterUpdateStatus, DeploySetReconcileStep::Done, state)
}

// A hard failure after the DeploySet was loaded is surfaced in its status before the reconcile errors out.
fn report_failure(key: &ObjectRef, state: DeploySetReconcileState, err: ReconcileError) -> (DeploySetReconcileState, Option<KubeAPIRequest>) {
    let ds = match state.deploy_set.clone() {
        Some(ds) => ds,
        None => return (error_state(state, err), None),
    };
    let status = make_degraded_status(&ds, &err, &state.now);
    let state_prime = DeploySetReconcileState {
        pending_error: Some(err),
        ..state
    };
    write_status(key, &ds, status, DeploySetReconcileStep::AfterReportFailure, DeploySetReconcileStep::Error, state_prime)
}

fn write_status(
    key: &ObjectRef, ds: &DeploySet, status: DeploySetStatus, after_write: DeploySetReconcileStep,
    unchanged: DeploySetReconcileStep, state: DeploySetReconcileState,
) -> (DeploySetReconcileState, Option<KubeAPIRequest>) {
    if ds.status.as_ref() == Some(&status) {
        let state_prime = DeploySetReconcileState {
            reconcile_step: unchanged,
            ..state
        };
        return (state_prime, None);
    }
    match update_status_request(ds, status, key) {
        Ok(req) => {
            let state_prime = DeploySetReconcileState {
                reconcile_step: after_write,
                ..state
            };
            (state_prime, Some(req))
        }
        Err(err) => {
            warn!("Failed to encode status of DeploySet {}: {}", key, err);
            let state_prime = DeploySetReconcileState {
                reconcile_step: unchanged,
                ..state
            };
            (state_prime, None)
        }
    }
}

// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::deployset_controller::exec::error::ReconcileError;
use crate::deployset_controller::exec::observe::ObserveError;
use crate::deployset_controller::exec::resource::status::*;
use crate::deployset_controller::trusted::config::ReconcilerConfig;
use crate::kubernetes_api_objects::error::APIError;
use crate::reconciler::exec::reconciler::{Outcome, Requeue};
use crate::unit_tests::harness::*;
use std::time::Duration;

fn web(api: &TestApiServer) {
    api.create_deploy_set(&deploy_set("web", 3, "nginx:1.25", 80));
}

#[test]
pub fn test_create_web() {
    println!("Testing creating a Deployment for a new DeploySet...");
    let api = TestApiServer::new();
    web(&api);
    let config = ReconcilerConfig::default();

    let outcome = api.reconcile(&config, "web", at(1));
    assert_eq!(outcome, Outcome::Done(Requeue::After(Duration::from_secs(60))));

    let ds = api.deploy_set("web").unwrap();
    let deployment = api.deployment("web").unwrap();
    let spec = deployment.spec.clone().unwrap();
    assert_eq!(spec.replicas, Some(3));
    let template_labels = spec.template.metadata.unwrap().labels.unwrap();
    assert_eq!(spec.selector.match_labels, Some(template_labels));
    let containers = spec.template.spec.unwrap().containers;
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].name, "web");
    assert_eq!(containers[0].image.as_deref(), Some("nginx:1.25"));
    let ports = containers[0].ports.clone().unwrap();
    assert_eq!(ports[0].container_port, 80);
    assert_eq!(ports[0].name.as_deref(), Some("deployset"));

    let owner_refs = deployment.metadata.owner_references.unwrap();
    assert_eq!(owner_refs.len(), 1);
    assert_eq!(owner_refs[0].controller, Some(true));
    assert_eq!(Some(owner_refs[0].uid.clone()), ds.metadata.uid);

    assert_eq!(
        api.writes(),
        vec![("Create", deployment_key("web")), ("UpdateStatus", ds_key("web"))]
    );
    let status = ds.status.unwrap();
    assert_eq!(status.ready_replicas, 0);
    assert_eq!(find_condition(&status.condition, CONDITION_AVAILABLE).unwrap().status, "False");
    assert_eq!(find_condition(&status.condition, CONDITION_DEGRADED).unwrap().status, "False");
}

#[test]
pub fn test_scale_web_to_five() {
    println!("Testing scaling a DeploySet...");
    let api = TestApiServer::new();
    web(&api);
    let config = ReconcilerConfig::default();
    api.reconcile(&config, "web", at(1));
    api.set_deployment_ready("web", 3);
    api.reconcile(&config, "web", at(2));
    let before = api.deployment("web").unwrap();

    api.update_deploy_set_spec("web", |spec| spec.replica.count = 5);
    api.clear_requests();
    let outcome = api.reconcile(&config, "web", at(3));
    assert_eq!(outcome, Outcome::Done(Requeue::AwaitChange));

    let deployment_writes: Vec<_> = api.writes().into_iter().filter(|(_, key)| key.kind == "Deployment").collect();
    assert_eq!(deployment_writes, vec![("GetThenUpdate", deployment_key("web"))]);

    let mut after = api.deployment("web").unwrap();
    assert_eq!(after.spec.as_ref().unwrap().replicas, Some(5));
    // Nothing but the replicas changed.
    after.spec.as_mut().unwrap().replicas = Some(3);
    after.metadata.resource_version = before.metadata.resource_version.clone();
    after.metadata.generation = before.metadata.generation;
    assert_eq!(after, before);
}

#[test]
pub fn test_transient_deployment_read_error() {
    println!("Testing a transient error reading the Deployment...");
    let api = TestApiServer::new();
    web(&api);
    api.inject("Get", "Deployment", APIError::ServerTimeout, 1);

    let outcome = api.reconcile(&ReconcilerConfig::default(), "web", at(1));
    assert_eq!(
        outcome,
        Outcome::RetryViaDispatcher(ReconcileError::GetDeploymentFailed(ObserveError::Api(APIError::ServerTimeout)))
    );
    assert!(api.writes().iter().all(|(_, key)| key.kind != "Deployment"));
    assert_eq!(api.deployment_count(), 0);

    let degraded = api.deploy_set("web").unwrap().status.unwrap();
    let degraded = find_condition(&degraded.condition, CONDITION_DEGRADED).unwrap();
    assert_eq!(degraded.status, "True");
    assert_eq!(degraded.reason, "GetDeploymentFailed");

    // The next attempt goes through and clears the condition.
    let outcome = api.reconcile(&ReconcilerConfig::default(), "web", at(2));
    assert_eq!(outcome, Outcome::Done(Requeue::After(Duration::from_secs(60))));
    let status = api.deploy_set("web").unwrap().status.unwrap();
    assert_eq!(find_condition(&status.condition, CONDITION_DEGRADED).unwrap().status, "False");
}

#[test]
pub fn test_deleted_deploy_set() {
    println!("Testing a reconcile triggered after the DeploySet is gone...");
    let api = TestApiServer::new();
    let outcome = api.reconcile(&ReconcilerConfig::default(), "web", at(1));
    assert_eq!(outcome, Outcome::Done(Requeue::AwaitChange));
    assert!(api.writes().is_empty());
}

#[test]
pub fn test_deploy_set_deleted_during_reconcile() {
    println!("Testing a DeploySet deleted right after its Deployment is created...");
    let api = TestApiServer::new();
    web(&api);
    let config = ReconcilerConfig::default();
    let mut stepper = Stepper::new(ds_key("web"), at(1));
    assert_eq!(stepper.step(&config, &api), Some("Get"));
    assert_eq!(stepper.step(&config, &api), Some("Get"));
    assert_eq!(stepper.step(&config, &api), Some("Create"));
    api.delete(&ds_key("web"));
    assert_eq!(stepper.step(&config, &api), Some("Get"));
    assert_eq!(stepper.step(&config, &api), None);
    assert_eq!(stepper.outcome(), Outcome::Done(Requeue::After(Duration::from_secs(60))));
}

#[test]
pub fn test_transient_deploy_set_read_error() {
    println!("Testing a transient error reading the DeploySet...");
    let api = TestApiServer::new();
    web(&api);
    api.inject("Get", "DeploySet", APIError::InternalError, 1);
    let outcome = api.reconcile(&ReconcilerConfig::default(), "web", at(1));
    assert!(outcome.is_hard_failure());
    assert!(api.writes().is_empty());
}

#[test]
pub fn test_create_failure_is_hard() {
    println!("Testing a failed Deployment creation...");
    let api = TestApiServer::new();
    web(&api);
    api.inject("Create", "Deployment", APIError::Invalid, 1);
    let outcome = api.reconcile(&ReconcilerConfig::default(), "web", at(1));
    assert_eq!(
        outcome,
        Outcome::RetryViaDispatcher(ReconcileError::CreateDeploymentFailed(APIError::Invalid))
    );
}

#[test]
pub fn test_scale_failure_is_soft() {
    println!("Testing a failed replica update...");
    let api = TestApiServer::new();
    web(&api);
    let config = ReconcilerConfig::default();
    api.reconcile(&config, "web", at(1));
    api.update_deploy_set_spec("web", |spec| spec.replica.count = 5);
    api.inject("GetThenUpdate", "Deployment", APIError::Conflict, 1);

    let outcome = api.reconcile(&config, "web", at(2));
    assert_eq!(outcome, Outcome::RetryOnNextTrigger(ReconcileError::ScaleDeploymentFailed(APIError::Conflict)));
    assert_eq!(api.deployment("web").unwrap().spec.unwrap().replicas, Some(3));
    let status = api.deploy_set("web").unwrap().status.unwrap();
    let synced = find_condition(&status.condition, CONDITION_REPLICAS_SYNCED).unwrap();
    assert_eq!(synced.status, "False");
    assert_eq!(synced.reason, "ReplicaPatchFailed");

    let outcome = api.reconcile(&config, "web", at(3));
    assert_eq!(outcome, Outcome::Done(Requeue::AwaitChange));
    assert_eq!(api.deployment("web").unwrap().spec.unwrap().replicas, Some(5));
    let status = api.deploy_set("web").unwrap().status.unwrap();
    assert_eq!(find_condition(&status.condition, CONDITION_REPLICAS_SYNCED).unwrap().status, "True");
}

#[test]
pub fn test_status_write_failure_is_ignored() {
    println!("Testing a failed status write...");
    let api = TestApiServer::new();
    web(&api);
    api.inject("UpdateStatus", "DeploySet", APIError::Conflict, 1);
    let outcome = api.reconcile(&ReconcilerConfig::default(), "web", at(1));
    assert_eq!(outcome, Outcome::Done(Requeue::After(Duration::from_secs(60))));
    assert!(api.deploy_set("web").unwrap().status.is_none());
}

#[test]
pub fn test_foreign_deployment_is_left_alone() {
    println!("Testing a Deployment owned by someone else...");
    let api = TestApiServer::new();
    web(&api);
    let config = ReconcilerConfig::default();
    api.reconcile(&config, "web", at(1));
    // The DeploySet is recreated and gets a new uid; the old Deployment is not its own.
    api.delete(&ds_key("web"));
    api.create_deploy_set(&deploy_set("web", 4, "nginx:1.25", 80));
    api.clear_requests();

    let outcome = api.reconcile(&config, "web", at(2));
    assert_eq!(outcome, Outcome::RetryViaDispatcher(ReconcileError::DeploymentNotControlled));
    assert_eq!(api.writes(), vec![("UpdateStatus", ds_key("web"))]);
    assert_eq!(api.deployment("web").unwrap().spec.unwrap().replicas, Some(3));
}

#[test]
pub fn test_cool_down_from_config() {
    println!("Testing the configured cool-down...");
    let api = TestApiServer::new();
    web(&api);
    let config = ReconcilerConfig {
        cool_down: Duration::from_secs(5),
        ..ReconcilerConfig::default()
    };
    assert_eq!(api.reconcile(&config, "web", at(1)), Outcome::Done(Requeue::After(Duration::from_secs(5))));
}

#[test]
pub fn test_concurrent_creates() {
    println!("Testing two reconciles of the same DeploySet racing to create...");
    let api = TestApiServer::new();
    web(&api);
    let config = ReconcilerConfig::default();
    let mut first = Stepper::new(ds_key("web"), at(1));
    let mut second = Stepper::new(ds_key("web"), at(1));
    while !first.finished() || !second.finished() {
        first.step(&config, &api);
        second.step(&config, &api);
    }
    let cool_down = Outcome::Done(Requeue::After(Duration::from_secs(60)));
    assert_eq!(first.outcome(), cool_down);
    assert_eq!(second.outcome(), cool_down);
    assert_eq!(api.deployment_count(), 1);
    assert_eq!(
        api.writes().iter().filter(|(verb, _)| *verb == "Create").count(),
        2
    );
    assert_eq!(api.deployment("web").unwrap().metadata.owner_references.unwrap().len(), 1);
}

#[test]
pub fn test_concurrent_scales() {
    println!("Testing two reconciles of the same DeploySet racing to scale...");
    let api = TestApiServer::new();
    web(&api);
    let config = ReconcilerConfig::default();
    api.reconcile(&config, "web", at(1));
    api.update_deploy_set_spec("web", |spec| spec.replica.count = 5);

    let mut first = Stepper::new(ds_key("web"), at(2));
    let mut second = Stepper::new(ds_key("web"), at(2));
    while !first.finished() || !second.finished() {
        first.step(&config, &api);
        second.step(&config, &api);
    }
    // Both read replicas 3; the second update carries a stale resourceVersion.
    assert_eq!(first.outcome(), Outcome::Done(Requeue::AwaitChange));
    assert_eq!(
        second.outcome(),
        Outcome::RetryOnNextTrigger(ReconcileError::ScaleDeploymentFailed(APIError::Conflict))
    );
    assert_eq!(api.deployment("web").unwrap().spec.unwrap().replicas, Some(5));

    assert_eq!(api.reconcile(&config, "web", at(3)), Outcome::Done(Requeue::AwaitChange));
}

#[test]
pub fn test_scale_keeps_unknown_fields() {
    println!("Testing scaling keeps Deployment fields the controller does not model...");
    let api = TestApiServer::new();
    web(&api);
    let config = ReconcilerConfig::default();
    api.reconcile(&config, "web", at(1));
    api.server.update_state(|s| {
        let rv = s.next_resource_version();
        let obj = s.resources.get_mut(&deployment_key("web")).unwrap();
        obj.data["spec"]["futureField"] = serde_json::json!("set-by-someone-else");
        obj.metadata.resource_version = Some(rv);
    });

    api.update_deploy_set_spec("web", |spec| spec.replica.count = 5);
    let outcome = api.reconcile(&config, "web", at(2));
    assert_eq!(outcome, Outcome::Done(Requeue::AwaitChange));

    let stored = api.server.state().get(&deployment_key("web")).cloned().unwrap();
    assert_eq!(stored.data["spec"]["replicas"], serde_json::json!(5));
    assert_eq!(stored.data["spec"]["futureField"], serde_json::json!("set-by-someone-else"));
}

#[test]
pub fn test_lost_create_race_keeps_status_counts() {
    println!("Testing a reconcile that loses the creation race keeps the reported replicas...");
    let api = TestApiServer::new();
    web(&api);
    let config = ReconcilerConfig::default();
    let mut late = Stepper::new(ds_key("web"), at(1));
    assert_eq!(late.step(&config, &api), Some("Get"));
    assert_eq!(late.step(&config, &api), Some("Get"));

    // Another reconcile creates the Deployment, which then becomes ready.
    api.reconcile(&config, "web", at(2));
    api.set_deployment_ready("web", 3);
    api.reconcile(&config, "web", at(3));
    let converged = api.deploy_set("web").unwrap().status.unwrap();
    assert_eq!(converged.ready_replicas, 3);

    api.clear_requests();
    assert_eq!(late.step(&config, &api), Some("Create"));
    while !late.finished() {
        late.step(&config, &api);
    }
    assert_eq!(late.outcome(), Outcome::Done(Requeue::After(Duration::from_secs(60))));
    assert_eq!(api.writes(), vec![("Create", deployment_key("web"))]);
    let status = api.deploy_set("web").unwrap().status.unwrap();
    assert_eq!(status, converged);
    assert_eq!(find_condition(&status.condition, CONDITION_AVAILABLE).unwrap().status, "True");
}

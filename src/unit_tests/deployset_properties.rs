// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::deployset_controller::exec::resource::deployment::{make_deployment, make_labels};
use crate::deployset_controller::trusted::config::ReconcilerConfig;
use crate::kubernetes_api_objects::error::APIError;
use crate::reconciler::exec::reconciler::{Outcome, Requeue};
use crate::unit_tests::harness::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Fault {
    verb: &'static str,
    kind: &'static str,
    error: APIError,
}

fn fault_strategy() -> impl Strategy<Value = Fault> {
    let requests = prop_oneof![
        Just(("Get", "DeploySet")),
        Just(("Get", "Deployment")),
        Just(("Create", "Deployment")),
        Just(("GetThenUpdate", "Deployment")),
        Just(("UpdateStatus", "DeploySet")),
    ];
    let errors = prop_oneof![
        Just(APIError::Conflict),
        Just(APIError::InternalError),
        Just(APIError::ServerTimeout),
        Just(APIError::Timeout),
    ];
    (requests, errors).prop_map(|((verb, kind), error)| Fault { verb, kind, error })
}

// Each round edits the replica count and may fail one request of the reconcile that follows.
fn rounds_strategy() -> impl Strategy<Value = Vec<(i32, Option<Fault>)>> {
    prop::collection::vec((0..8i32, prop::option::of(fault_strategy())), 1..6)
}

proptest! {
    #[test]
    fn test_converges_after_faults(rounds in rounds_strategy()) {
        let api = TestApiServer::new();
        let config = ReconcilerConfig::default();
        api.create_deploy_set(&deploy_set("web", 1, "nginx:1.25", 80));
        let mut now = 0;
        for (count, fault) in rounds.iter() {
            api.update_deploy_set_spec("web", |spec| spec.replica.count = *count);
            if let Some(fault) = fault {
                api.inject(fault.verb, fault.kind, fault.error, 1);
            }
            now += 1;
            api.reconcile(&config, "web", at(now));
            prop_assert!(api.deployment_count() <= 1);
        }
        api.clear_faults();
        now += 1;
        let outcome = api.reconcile(&config, "web", at(now));
        prop_assert!(!outcome.is_hard_failure());

        let last = rounds.last().unwrap().0;
        let ds = api.deploy_set("web").unwrap();
        let deployment = api.deployment("web").unwrap();
        prop_assert_eq!(api.deployment_count(), 1);
        prop_assert_eq!(deployment.spec.as_ref().unwrap().replicas, Some(last));
        let owner_refs = deployment.metadata.owner_references.clone().unwrap();
        prop_assert_eq!(owner_refs.len(), 1);
        prop_assert_eq!(Some(owner_refs[0].uid.clone()), ds.metadata.uid);
    }

    #[test]
    fn test_converged_reconcile_writes_nothing(count in 0..8i32, ready_first in any::<bool>()) {
        let api = TestApiServer::new();
        let config = ReconcilerConfig::default();
        api.create_deploy_set(&deploy_set("web", count, "nginx:1.25", 80));
        api.reconcile(&config, "web", at(1));
        if ready_first {
            api.set_deployment_ready("web", count);
        }
        api.reconcile(&config, "web", at(2));

        api.clear_requests();
        let outcome = api.reconcile(&config, "web", at(3));
        prop_assert_eq!(outcome, Outcome::Done(Requeue::AwaitChange));
        prop_assert!(api.writes().is_empty());
    }

    #[test]
    fn test_selector_matches_template_labels(
        name in "[a-z][a-z0-9]{0,15}",
        image in "[a-z]{1,10}:[0-9]\\.[0-9]{1,2}",
        port in 1..65536i32,
        count in 0..100i32,
    ) {
        let mut ds = deploy_set(&name, count, &image, port);
        ds.metadata.uid = Some("uid-1".to_string());
        let deployment = make_deployment(&ds, &ReconcilerConfig::default()).unwrap();
        let labels = make_labels(&ds);
        let spec = deployment.spec.unwrap();
        prop_assert_eq!(spec.selector.match_labels.as_ref(), Some(&labels));
        let template_labels = spec.template.metadata.unwrap().labels;
        prop_assert_eq!(template_labels.as_ref(), Some(&labels));
        prop_assert_eq!(deployment.metadata.name.as_deref(), Some(name.as_str()));
        prop_assert_eq!(spec.replicas, Some(count));
    }
}

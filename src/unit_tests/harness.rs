// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::deployset_controller::exec::error::ReconcileError;
use crate::deployset_controller::exec::reconciler::{reconcile_core, reconcile_init_state, reconcile_outcome, DeploySetReconcileState};
use crate::deployset_controller::trusted::config::ReconcilerConfig;
use crate::deployset_controller::trusted::spec_types::{Container, DeploySet, DeploySetSpec, Replica};
use crate::deployset_controller::trusted::step::DeploySetReconcileStep;
use crate::executable_model::api_server::ExecutableApiServer;
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::error::APIError;
use crate::kubernetes_api_objects::object_ref::ObjectRef;
use crate::kubernetes_api_objects::resource::ResourceWrapper;
use crate::reconciler::exec::reconciler::Outcome;
use crate::shim_layer::kube_api::ApiServerClient;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::chrono::{TimeZone, Utc};
use std::sync::Mutex;

pub const NAMESPACE: &str = "default";

pub fn at(secs: i64) -> Time {
    Time(Utc.timestamp_opt(secs, 0).unwrap())
}

pub fn ds_key(name: &str) -> ObjectRef {
    ObjectRef::new("DeploySet", NAMESPACE, name)
}

pub fn deployment_key(name: &str) -> ObjectRef {
    ObjectRef::new("Deployment", NAMESPACE, name)
}

pub fn deploy_set(name: &str, count: i32, image: &str, port: i32) -> DeploySet {
    let mut ds = DeploySet::new(
        name,
        DeploySetSpec {
            replica: Replica {
                count,
                version: "v1".to_string(),
            },
            container: Container {
                image: image.to_string(),
                port,
            },
        },
    );
    ds.metadata.namespace = Some(NAMESPACE.to_string());
    ds
}

#[derive(Debug, Clone)]
struct Fault {
    verb: &'static str,
    kind: String,
    error: APIError,
    remaining: usize,
}

// TestApiServer wraps the executable API server model, records every request
// the reconciler sends and can fail chosen requests with a chosen error.
#[derive(Default)]
pub struct TestApiServer {
    pub server: ExecutableApiServer,
    requests: Mutex<Vec<(&'static str, ObjectRef)>>,
    faults: Mutex<Vec<Fault>>,
}

fn error_response(req: &KubeAPIRequest, err: APIError) -> KubeAPIResponse {
    match req {
        KubeAPIRequest::GetRequest(_) => KubeAPIResponse::GetResponse(KubeGetResponse { res: Err(err) }),
        KubeAPIRequest::CreateRequest(_) => KubeAPIResponse::CreateResponse(KubeCreateResponse { res: Err(err) }),
        KubeAPIRequest::UpdateRequest(_) => KubeAPIResponse::UpdateResponse(KubeUpdateResponse { res: Err(err) }),
        KubeAPIRequest::UpdateStatusRequest(_) => {
            KubeAPIResponse::UpdateStatusResponse(KubeUpdateStatusResponse { res: Err(err) })
        }
        KubeAPIRequest::GetThenUpdateRequest(_) => {
            KubeAPIResponse::GetThenUpdateResponse(KubeGetThenUpdateResponse { res: Err(err) })
        }
    }
}

impl TestApiServer {
    pub fn new() -> TestApiServer {
        TestApiServer::default()
    }

    /// Fails the next `times` requests with this verb on this kind.
    pub fn inject(&self, verb: &'static str, kind: &str, error: APIError, times: usize) {
        self.faults.lock().unwrap().push(Fault {
            verb,
            kind: kind.to_string(),
            error,
            remaining: times,
        });
    }

    pub fn requests(&self) -> Vec<(&'static str, ObjectRef)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(&'static str, ObjectRef)> {
        self.requests().into_iter().filter(|(verb, _)| *verb != "Get").collect()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    pub fn clear_faults(&self) {
        self.faults.lock().unwrap().clear();
    }

    pub fn handle(&self, req: KubeAPIRequest) -> KubeAPIResponse {
        let key = req.key();
        self.requests.lock().unwrap().push((req.verb(), key.clone()));
        let mut faults = self.faults.lock().unwrap();
        if let Some(fault) = faults
            .iter_mut()
            .find(|f| f.remaining > 0 && f.verb == req.verb() && f.kind == key.kind)
        {
            fault.remaining -= 1;
            return error_response(&req, fault.error);
        }
        drop(faults);
        self.server.handle(req)
    }

    pub fn create_deploy_set(&self, ds: &DeploySet) -> DeploySet {
        let resp = self.server.handle(KubeAPIRequest::CreateRequest(KubeCreateRequest {
            api_resource: DeploySet::api_resource(),
            namespace: NAMESPACE.to_string(),
            obj: ds.marshal().unwrap(),
        }));
        match resp {
            KubeAPIResponse::CreateResponse(resp) => DeploySet::unmarshal(resp.res.unwrap()).unwrap(),
            other => panic!("unexpected response {:?}", other),
        }
    }

    /// What a user editing the DeploySet would do.
    pub fn update_deploy_set_spec(&self, name: &str, f: impl FnOnce(&mut DeploySetSpec)) {
        let mut ds = self.deploy_set(name).unwrap();
        f(&mut ds.spec);
        let resp = self.server.handle(KubeAPIRequest::UpdateRequest(KubeUpdateRequest {
            api_resource: DeploySet::api_resource(),
            name: name.to_string(),
            namespace: NAMESPACE.to_string(),
            obj: ds.marshal().unwrap(),
        }));
        assert!(resp.is_ok(), "{:?}", resp);
    }

    pub fn delete(&self, key: &ObjectRef) {
        self.server.update_state(|s| s.resources.remove(key));
    }

    pub fn deploy_set(&self, name: &str) -> Option<DeploySet> {
        self.server
            .state()
            .get(&ds_key(name))
            .map(|obj| DeploySet::unmarshal(obj.clone()).unwrap())
    }

    pub fn deployment(&self, name: &str) -> Option<Deployment> {
        self.server
            .state()
            .get(&deployment_key(name))
            .map(|obj| Deployment::unmarshal(obj.clone()).unwrap())
    }

    pub fn deployment_count(&self) -> usize {
        self.server.state().objects_of_kind("Deployment").count()
    }

    /// What the Deployment's own controller would report once all pods run.
    pub fn set_deployment_ready(&self, name: &str, ready: i32) {
        self.server.update_state(|s| {
            let rv = s.next_resource_version();
            let obj = s.resources.get_mut(&deployment_key(name)).unwrap();
            obj.data["status"] = serde_json::json!({
                "replicas": ready,
                "readyReplicas": ready,
                "availableReplicas": ready,
            });
            obj.metadata.resource_version = Some(rv);
        });
    }

    /// Runs one reconcile to the end, sending each request through this server.
    pub fn reconcile(&self, config: &ReconcilerConfig, name: &str, now: Time) -> Outcome<ReconcileError> {
        let mut stepper = Stepper::new(ds_key(name), now);
        while !stepper.finished() {
            stepper.step(config, self);
        }
        stepper.outcome()
    }
}

#[async_trait]
impl ApiServerClient for TestApiServer {
    async fn handle_request(&self, req: KubeAPIRequest) -> KubeAPIResponse {
        self.handle(req)
    }
}

// Stepper runs a reconcile one request at a time, so several reconciles of the
// same object can be interleaved in a chosen order.
pub struct Stepper {
    key: ObjectRef,
    state: Option<DeploySetReconcileState>,
    resp_o: Option<KubeAPIResponse>,
}

impl Stepper {
    pub fn new(key: ObjectRef, now: Time) -> Stepper {
        Stepper {
            key,
            state: Some(reconcile_init_state(now)),
            resp_o: None,
        }
    }

    pub fn finished(&self) -> bool {
        matches!(
            self.state.as_ref().map(|s| s.reconcile_step),
            Some(DeploySetReconcileStep::Done) | Some(DeploySetReconcileStep::Error)
        )
    }

    /// Advances until the next request has been sent, or the reconcile ends.
    /// Returns the verb of the request sent, if any.
    pub fn step(&mut self, config: &ReconcilerConfig, api: &TestApiServer) -> Option<&'static str> {
        while !self.finished() {
            let state = self.state.take().unwrap();
            let (state_prime, req_o) = reconcile_core(config, &self.key, self.resp_o.take(), state);
            self.state = Some(state_prime);
            if let Some(req) = req_o {
                let verb = req.verb();
                self.resp_o = Some(api.handle(req));
                return Some(verb);
            }
        }
        None
    }

    pub fn outcome(&self) -> Outcome<ReconcileError> {
        reconcile_outcome(self.state.as_ref().unwrap())
    }
}

// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::config::RuntimeConfig;
use crate::kubernetes_api_objects::api_method::KubeAPIResponse;
use crate::kubernetes_api_objects::object_ref::ObjectRef;
use crate::reconciler::exec::reconciler::{Outcome, Reconciler, Requeue};
use crate::shim_layer::fault_injection::FaultInjector;
use crate::shim_layer::kube_api::{ApiServerClient, KubeApi};
use crate::Error;
use core::fmt::Debug;
use futures::StreamExt;
use kube::{
    api::{Api, Resource},
    runtime::{
        controller::{Action, Controller},
        watcher,
    },
    Client,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{error, info, warn};

// The shim layer connects the reconciler to the kube-rs APIs.
// The key is to implement the reconcile function (impl FnMut(Arc<K>, Arc<Ctx>) -> ReconcilerFut),
// which is required by the kube-rs framework to build a controller,
// on top of reconcile_core, which is provided by the developer.

// run_controller prepares and runs the controller. It requires:
// K: the custom resource type
// O: the type of the objects owned by the custom resource; their changes also trigger reconcile
// R: the reconciler type
pub async fn run_controller<K, O, R>(reconciler: R, runtime: RuntimeConfig, fault_injection: bool) -> anyhow::Result<()>
where
    K: Clone + Resource<DynamicType = ()> + DeserializeOwned + Debug + Send + Sync + 'static,
    O: Clone + Resource<DynamicType = ()> + DeserializeOwned + Debug + Send + Sync + 'static,
    R: Reconciler + Send + Sync + 'static,
    R::S: Send,
{
    let client = Client::try_default().await?;
    let crs = Api::<K>::all(client.clone());
    let owned = Api::<O>::all(client.clone());

    let fault_injector = if fault_injection {
        Some(FaultInjector::new(client.clone(), runtime.fault_injection_namespace.clone()))
    } else {
        None
    };
    let data = Arc::new(Data {
        client,
        reconciler,
        runtime,
        fault_injector,
    });

    info!("starting controller");
    Controller::new(crs, watcher::Config::default())
        .owns(owned, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile::<K, R>, error_policy::<K, R>, data)
        .for_each(|res| async move {
            match res {
                Ok(o) => info!("reconciled {:?}", o),
                Err(e) => warn!("reconcile failed: {}", e),
            }
        })
        .await;
    info!("controller terminated");
    Ok(())
}

// The watch event only names the object; the reconciler reads it again itself.
async fn reconcile<K, R>(cr: Arc<K>, data: Arc<Data<R>>) -> Result<Action, Error>
where
    K: Resource<DynamicType = ()> + Send + Sync,
    R: Reconciler + Send + Sync,
    R::S: Send,
{
    let key = ObjectRef::from_resource(cr.as_ref()).ok_or_else(|| {
        Error::ShimLayerError("Custom resource misses \".metadata.name\" or \".metadata.namespace\"".to_string())
    })?;
    let api = KubeApi::new(data.client.clone());
    reconcile_with(&data.reconciler, &key, &api, data.fault_injector.as_ref(), &data.runtime).await
}

// reconcile_with implements one reconcile by repeatedly invoking reconciler.reconcile_core.
// It starts with reconciler.reconcile_init_state, and in each iteration it invokes reconciler.reconcile_core
// with the new state and the response to the request returned by the previous invocation.
// Each request is sent through api.
// It ends the loop when the reconciler reports the reconcile is done (reconciler.reconcile_done)
// or encounters error (reconciler.reconcile_error), and turns reconciler.reconcile_outcome into
// what kube-rs expects.
pub async fn reconcile_with<R, A>(
    reconciler: &R, key: &ObjectRef, api: &A, fault_injector: Option<&FaultInjector>, runtime: &RuntimeConfig,
) -> Result<Action, Error>
where
    R: Reconciler,
    A: ApiServerClient + ?Sized,
{
    let log_header = format!("Reconciling {}:", key);
    let mut state = reconciler.reconcile_init_state();
    let mut resp_option: Option<KubeAPIResponse> = None;

    loop {
        if reconciler.reconcile_done(&state) || reconciler.reconcile_error(&state) {
            break;
        }
        let (state_prime, request_option) = reconciler.reconcile_core(key, resp_option, state);
        resp_option = match request_option {
            Some(req) => {
                let verb = req.verb();
                let req_key = req.key();
                // Only a write can leave the cluster in a state worth crashing in.
                let check_fault_timing = req.is_write();
                let resp = api.handle_request(req).await;
                match resp.error() {
                    Some(err) => info!("{} {} {} failed with error: {}", log_header, verb, req_key, err),
                    None => info!("{} {} {} done", log_header, verb, req_key),
                }
                if check_fault_timing {
                    if let Some(fault_injector) = fault_injector {
                        if let Err(err) = fault_injector.crash_or_continue(&log_header).await {
                            warn!("{} crash_or_continue fails due to {}", log_header, err);
                        }
                    }
                }
                Some(resp)
            }
            None => None,
        };
        state = state_prime;
    }

    match reconciler.reconcile_outcome(&state) {
        Outcome::Done(requeue) => {
            info!("{} done", log_header);
            Ok(requeue_action(requeue, runtime))
        }
        Outcome::RetryOnNextTrigger(err) => {
            warn!("{} {}, will retry on next trigger", log_header, err);
            Ok(requeue_action(Requeue::AwaitChange, runtime))
        }
        Outcome::RetryViaDispatcher(err) => {
            error!("{} error: {}", log_header, err);
            Err(Error::ReconcileCoreError(Box::new(err)))
        }
    }
}

// Waiting for a change falls back to the periodic resync when one is configured.
pub fn requeue_action(requeue: Requeue, runtime: &RuntimeConfig) -> Action {
    match requeue {
        Requeue::AwaitChange => match runtime.resync {
            Some(resync) => Action::requeue(resync),
            None => Action::await_change(),
        },
        Requeue::After(duration) => Action::requeue(duration),
    }
}

// error_policy defines the controller's behavior when the reconcile ends with an error.
pub fn error_policy<K, R>(_object: Arc<K>, _error: &Error, data: Arc<Data<R>>) -> Action {
    Action::requeue(data.runtime.error_requeue)
}

// Data is passed to reconcile_with.
// It carries the client that communicates with Kubernetes API.
pub struct Data<R> {
    pub client: Client,
    pub reconciler: R,
    pub runtime: RuntimeConfig,
    pub fault_injector: Option<FaultInjector>,
}

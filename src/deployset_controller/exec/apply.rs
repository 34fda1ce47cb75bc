// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::deployset_controller::trusted::spec_types::{DeploySet, DeploySetStatus};
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::error::{APIError, CodecError};
use crate::kubernetes_api_objects::object_ref::ObjectRef;
use crate::kubernetes_api_objects::resource::ResourceWrapper;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;
use serde_json::{json, Value};

pub fn get_request<K: ResourceWrapper>(key: &ObjectRef) -> KubeAPIRequest {
    KubeAPIRequest::GetRequest(KubeGetRequest {
        api_resource: K::api_resource(),
        name: key.name.clone(),
        namespace: key.namespace.clone(),
    })
}

pub fn create_deployment_request(deployment: &Deployment, key: &ObjectRef) -> Result<KubeAPIRequest, CodecError> {
    Ok(KubeAPIRequest::CreateRequest(KubeCreateRequest {
        api_resource: Deployment::api_resource(),
        namespace: key.namespace.clone(),
        obj: deployment.marshal()?,
    }))
}

// The new Deployment is the observed object, as read and not through its typed
// form, with only .spec.replicas changed. Fields the typed form does not know
// about are written back untouched. It keeps the observed resourceVersion, so the
// write is rejected with Conflict if anyone changed the Deployment after it was
// read, and the owner_ref guard rejects it with TransactionAbort if the
// Deployment changed hands.
pub fn scale_deployment_request(
    observed: &DynamicObject, owner_ref: OwnerReference, replicas: i32, key: &ObjectRef,
) -> KubeAPIRequest {
    let mut scaled = observed.clone();
    set_replicas(&mut scaled.data, replicas);
    KubeAPIRequest::GetThenUpdateRequest(KubeGetThenUpdateRequest {
        api_resource: Deployment::api_resource(),
        name: key.name.clone(),
        namespace: key.namespace.clone(),
        owner_ref,
        obj: scaled,
    })
}

fn set_replicas(data: &mut Value, replicas: i32) {
    if let Some(data) = data.as_object_mut() {
        let spec = data.entry("spec").or_insert_with(|| json!({}));
        if !spec.is_object() {
            *spec = json!({});
        }
        if let Some(spec) = spec.as_object_mut() {
            spec.insert("replicas".to_string(), json!(replicas));
        }
    }
}

pub fn update_status_request(ds: &DeploySet, status: DeploySetStatus, key: &ObjectRef) -> Result<KubeAPIRequest, CodecError> {
    let mut ds = ds.clone();
    ds.status = Some(status);
    Ok(KubeAPIRequest::UpdateStatusRequest(KubeUpdateStatusRequest {
        api_resource: DeploySet::api_resource(),
        name: key.name.clone(),
        namespace: key.namespace.clone(),
        obj: ds.marshal()?,
    }))
}

/// Losing a creation race to a concurrent reconcile is not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(Option<Deployment>),
    AlreadyExists,
    Failed(APIError),
}

impl CreateOutcome {
    pub fn from_response(resp_o: Option<KubeAPIResponse>) -> Option<CreateOutcome> {
        match resp_o {
            Some(KubeAPIResponse::CreateResponse(resp)) => Some(match resp.res {
                Ok(obj) => CreateOutcome::Created(Deployment::unmarshal(obj).ok()),
                Err(APIError::ObjectAlreadyExists) => CreateOutcome::AlreadyExists,
                Err(err) => CreateOutcome::Failed(err),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(Option<Deployment>),
    Failed(APIError),
}

impl UpdateOutcome {
    pub fn from_response(resp_o: Option<KubeAPIResponse>) -> Option<UpdateOutcome> {
        match resp_o {
            Some(KubeAPIResponse::GetThenUpdateResponse(resp)) => Some(match resp.res {
                Ok(obj) => UpdateOutcome::Updated(Deployment::unmarshal(obj).ok()),
                Err(err) => UpdateOutcome::Failed(err),
            }),
            _ => None,
        }
    }
}

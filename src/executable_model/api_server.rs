// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::executable_model::api_server_state::ApiServerState;
use crate::kubernetes_api_objects::{api_method::*, error::APIError, object_ref::ObjectRef};
use crate::shim_layer::kube_api::ApiServerClient;
use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject, TypeMeta};
use serde_json::Value;
use std::sync::{Mutex, PoisonError};

// The executable API server model stores objects in memory and answers the same
// requests the shim layer sends to a real API server, following the semantics
// the reconciler relies on: uid and resourceVersion stamping, AlreadyExists on
// create, Conflict on a stale resourceVersion, owner-guarded get-then-update and
// a status subresource that is written separately from the rest of the object.
// It is what the unit tests run the reconciler against.
pub struct ExecutableApiServer {
    state: Mutex<ApiServerState>,
}

impl Default for ExecutableApiServer {
    fn default() -> Self {
        ExecutableApiServer::new(ApiServerState::new())
    }
}

impl ExecutableApiServer {
    pub fn new(state: ApiServerState) -> ExecutableApiServer {
        ExecutableApiServer {
            state: Mutex::new(state),
        }
    }

    /// A copy of the stored state.
    pub fn state(&self) -> ApiServerState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Changes the stored state directly, bypassing admission.
    pub fn update_state<T>(&self, f: impl FnOnce(&mut ApiServerState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn handle(&self, req: KubeAPIRequest) -> KubeAPIResponse {
        self.update_state(|s| handle_request(req, s))
    }
}

#[async_trait]
impl ApiServerClient for ExecutableApiServer {
    async fn handle_request(&self, req: KubeAPIRequest) -> KubeAPIResponse {
        self.handle(req)
    }
}

pub fn handle_request(req: KubeAPIRequest, s: &mut ApiServerState) -> KubeAPIResponse {
    match req {
        KubeAPIRequest::GetRequest(req) => KubeAPIResponse::GetResponse(handle_get_request(&req, s)),
        KubeAPIRequest::CreateRequest(req) => KubeAPIResponse::CreateResponse(handle_create_request(&req, s)),
        KubeAPIRequest::UpdateRequest(req) => KubeAPIResponse::UpdateResponse(handle_update_request(&req, s)),
        KubeAPIRequest::UpdateStatusRequest(req) => {
            KubeAPIResponse::UpdateStatusResponse(handle_update_status_request(&req, s))
        }
        KubeAPIRequest::GetThenUpdateRequest(req) => {
            KubeAPIResponse::GetThenUpdateResponse(handle_get_then_update_request(&req, s))
        }
    }
}

fn object_key(api_resource: &ApiResource, namespace: &str, name: &str) -> ObjectRef {
    ObjectRef::new(&api_resource.kind, namespace, name)
}

fn status_of(obj: &DynamicObject) -> Option<&Value> {
    obj.data.get("status")
}

fn set_status(obj: &mut DynamicObject, status: Option<Value>) {
    if !obj.data.is_object() {
        obj.data = Value::Object(serde_json::Map::new());
    }
    if let Some(fields) = obj.data.as_object_mut() {
        match status {
            Some(status) => {
                fields.insert("status".to_string(), status);
            }
            None => {
                fields.remove("status");
            }
        }
    }
}

// Everything under data except status, i.e., what the generation tracks.
fn data_without_status(obj: &DynamicObject) -> Value {
    let mut data = obj.data.clone();
    if let Some(fields) = data.as_object_mut() {
        fields.remove("status");
    }
    data
}

// An object can have at most one controller reference.
fn metadata_validity_check(obj: &DynamicObject) -> Option<APIError> {
    let controllers = obj
        .metadata
        .owner_references
        .iter()
        .flatten()
        .filter(|owner_ref| owner_ref.controller == Some(true))
        .count();
    if controllers > 1 {
        Some(APIError::Invalid)
    } else {
        None
    }
}

pub fn handle_get_request(req: &KubeGetRequest, s: &ApiServerState) -> KubeGetResponse {
    match s.get(&req.key()) {
        Some(obj) => KubeGetResponse { res: Ok(obj.clone()) },
        None => KubeGetResponse {
            res: Err(APIError::ObjectNotFound),
        },
    }
}

fn create_request_admission_check(req: &KubeCreateRequest, s: &ApiServerState) -> Option<APIError> {
    let name = match req.obj.metadata.name.as_ref() {
        Some(name) => name,
        None => return Some(APIError::Invalid),
    };
    if matches!(req.obj.metadata.namespace.as_ref(), Some(namespace) if namespace != &req.namespace) {
        Some(APIError::BadRequest)
    } else if s.contains(&object_key(&req.api_resource, &req.namespace, name)) {
        Some(APIError::ObjectAlreadyExists)
    } else {
        metadata_validity_check(&req.obj)
    }
}

pub fn handle_create_request(req: &KubeCreateRequest, s: &mut ApiServerState) -> KubeCreateResponse {
    if let Some(err) = create_request_admission_check(req, s) {
        return KubeCreateResponse { res: Err(err) };
    }
    let mut created_obj = req.obj.clone();
    created_obj.types = Some(TypeMeta {
        api_version: req.api_resource.api_version.clone(),
        kind: req.api_resource.kind.clone(),
    });
    created_obj.metadata.namespace = Some(req.namespace.clone());
    created_obj.metadata.uid = Some(s.next_uid());
    created_obj.metadata.resource_version = Some(s.next_resource_version());
    created_obj.metadata.generation = Some(1);
    // Status can only be written through the status subresource.
    set_status(&mut created_obj, None);
    s.resources.insert(req.key(), created_obj.clone());
    KubeCreateResponse { res: Ok(created_obj) }
}

fn update_request_admission_check(name: &str, namespace: &str, obj: &DynamicObject, current_obj: Option<&DynamicObject>) -> Option<APIError> {
    if obj.metadata.name.as_deref() != Some(name) {
        return Some(APIError::BadRequest);
    }
    if matches!(obj.metadata.namespace.as_deref(), Some(obj_namespace) if obj_namespace != namespace) {
        return Some(APIError::BadRequest);
    }
    let current_obj = match current_obj {
        Some(current_obj) => current_obj,
        None => return Some(APIError::ObjectNotFound),
    };
    if obj.metadata.resource_version.is_some() && obj.metadata.resource_version != current_obj.metadata.resource_version {
        Some(APIError::Conflict)
    } else if obj.metadata.uid.is_some() && obj.metadata.uid != current_obj.metadata.uid {
        Some(APIError::InternalError)
    } else {
        None
    }
}

pub fn handle_update_request(req: &KubeUpdateRequest, s: &mut ApiServerState) -> KubeUpdateResponse {
    let key = req.key();
    let old_obj = match update_request_admission_check(&req.name, &req.namespace, &req.obj, s.get(&key)) {
        Some(err) => return KubeUpdateResponse { res: Err(err) },
        None => match s.get(&key) {
            Some(old_obj) => old_obj.clone(),
            None => return KubeUpdateResponse {
                res: Err(APIError::ObjectNotFound),
            },
        },
    };
    let mut updated_obj = req.obj.clone();
    updated_obj.types = old_obj.types.clone();
    updated_obj.metadata.namespace = Some(req.namespace.clone());
    updated_obj.metadata.uid = old_obj.metadata.uid.clone();
    updated_obj.metadata.resource_version = old_obj.metadata.resource_version.clone();
    updated_obj.metadata.generation = old_obj.metadata.generation;
    updated_obj.metadata.creation_timestamp = old_obj.metadata.creation_timestamp.clone();
    set_status(&mut updated_obj, status_of(&old_obj).cloned());
    if let Some(err) = metadata_validity_check(&updated_obj) {
        return KubeUpdateResponse { res: Err(err) };
    }
    if updated_obj.metadata == old_obj.metadata && updated_obj.data == old_obj.data {
        // Nothing changed, so nothing is written and the resourceVersion stays.
        return KubeUpdateResponse { res: Ok(old_obj) };
    }
    if data_without_status(&updated_obj) != data_without_status(&old_obj) {
        updated_obj.metadata.generation = Some(old_obj.metadata.generation.unwrap_or(0) + 1);
    }
    updated_obj.metadata.resource_version = Some(s.next_resource_version());
    s.resources.insert(key, updated_obj.clone());
    KubeUpdateResponse { res: Ok(updated_obj) }
}

// get_then_update reads the current object and overwrites it with req.obj only if
// the current object is owned by req.owner_ref. The resourceVersion carried by
// req.obj, if any, still guards against concurrent writes.
pub fn handle_get_then_update_request(req: &KubeGetThenUpdateRequest, s: &mut ApiServerState) -> KubeGetThenUpdateResponse {
    if !req.well_formed() {
        return KubeGetThenUpdateResponse {
            res: Err(APIError::BadRequest),
        };
    }
    let current_obj = match s.get(&req.key()) {
        Some(current_obj) => current_obj,
        None => {
            return KubeGetThenUpdateResponse {
                res: Err(APIError::ObjectNotFound),
            }
        }
    };
    let owned = current_obj
        .metadata
        .owner_references
        .iter()
        .flatten()
        .any(|owner_ref| owner_ref == &req.owner_ref);
    if !owned {
        return KubeGetThenUpdateResponse {
            res: Err(APIError::TransactionAbort),
        };
    }
    let mut obj = req.obj.clone();
    if obj.metadata.resource_version.is_none() {
        obj.metadata.resource_version = current_obj.metadata.resource_version.clone();
    }
    let update_req = KubeUpdateRequest {
        api_resource: req.api_resource.clone(),
        name: req.name.clone(),
        namespace: req.namespace.clone(),
        obj,
    };
    KubeGetThenUpdateResponse {
        res: handle_update_request(&update_req, s).res,
    }
}

pub fn handle_update_status_request(req: &KubeUpdateStatusRequest, s: &mut ApiServerState) -> KubeUpdateStatusResponse {
    let key = req.key();
    let old_obj = match update_request_admission_check(&req.name, &req.namespace, &req.obj, s.get(&key)) {
        Some(err) => return KubeUpdateStatusResponse { res: Err(err) },
        None => match s.get(&key) {
            Some(old_obj) => old_obj.clone(),
            None => return KubeUpdateStatusResponse {
                res: Err(APIError::ObjectNotFound),
            },
        },
    };
    // Only the status is taken from the request.
    let mut status_updated_obj = old_obj.clone();
    set_status(&mut status_updated_obj, status_of(&req.obj).cloned());
    if status_updated_obj.data == old_obj.data {
        return KubeUpdateStatusResponse { res: Ok(old_obj) };
    }
    status_updated_obj.metadata.resource_version = Some(s.next_resource_version());
    s.resources.insert(key, status_updated_obj.clone());
    KubeUpdateStatusResponse {
        res: Ok(status_updated_obj),
    }
}

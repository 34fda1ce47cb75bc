// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::error::APIError;
use crate::kubernetes_api_objects::object_ref::ObjectRef;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{ApiResource, DynamicObject};

// KubeAPIRequest represents the API requests a reconciler can issue.
//
// kube-rs uses a generic type kube::api::Api as an api handle to send
// requests to the Kubernetes API.
// So KubeAPIRequest wraps around the variables used to instantiate kube::api::Api
// and to call its methods. Objects are carried as DynamicObject so that one
// request type covers every kind.
#[derive(Debug, Clone)]
pub enum KubeAPIRequest {
    GetRequest(KubeGetRequest),
    CreateRequest(KubeCreateRequest),
    UpdateRequest(KubeUpdateRequest),
    UpdateStatusRequest(KubeUpdateStatusRequest),
    GetThenUpdateRequest(KubeGetThenUpdateRequest),
}

impl KubeAPIRequest {
    pub fn key(&self) -> ObjectRef {
        match self {
            KubeAPIRequest::GetRequest(req) => req.key(),
            KubeAPIRequest::CreateRequest(req) => req.key(),
            KubeAPIRequest::UpdateRequest(req) => req.key(),
            KubeAPIRequest::UpdateStatusRequest(req) => req.key(),
            KubeAPIRequest::GetThenUpdateRequest(req) => req.key(),
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            KubeAPIRequest::GetRequest(_) => "Get",
            KubeAPIRequest::CreateRequest(_) => "Create",
            KubeAPIRequest::UpdateRequest(_) => "Update",
            KubeAPIRequest::UpdateStatusRequest(_) => "UpdateStatus",
            KubeAPIRequest::GetThenUpdateRequest(_) => "GetThenUpdate",
        }
    }

    /// Whether the request may change the stored state.
    pub fn is_write(&self) -> bool {
        !matches!(self, KubeAPIRequest::GetRequest(_))
    }
}

// KubeGetRequest has the name as the parameter of Api.get(), and namespace to instantiate an Api.
#[derive(Debug, Clone)]
pub struct KubeGetRequest {
    pub api_resource: ApiResource,
    pub name: String,
    pub namespace: String,
}

impl KubeGetRequest {
    pub fn key(&self) -> ObjectRef {
        ObjectRef::new(&self.api_resource.kind, &self.namespace, &self.name)
    }
}

// KubeCreateRequest has the obj as the parameter of Api.create().
#[derive(Debug, Clone)]
pub struct KubeCreateRequest {
    pub api_resource: ApiResource,
    pub namespace: String,
    pub obj: DynamicObject,
}

impl KubeCreateRequest {
    pub fn key(&self) -> ObjectRef {
        ObjectRef::new(
            &self.api_resource.kind,
            &self.namespace,
            self.obj.metadata.name.clone().unwrap_or_default(),
        )
    }
}

// KubeUpdateRequest has the name and the obj as the parameters of Api.replace().
// The obj's resourceVersion, if set, is used for optimistic concurrency control.
#[derive(Debug, Clone)]
pub struct KubeUpdateRequest {
    pub api_resource: ApiResource,
    pub name: String,
    pub namespace: String,
    pub obj: DynamicObject,
}

impl KubeUpdateRequest {
    pub fn key(&self) -> ObjectRef {
        ObjectRef::new(&self.api_resource.kind, &self.namespace, &self.name)
    }
}

// KubeUpdateStatusRequest has the name and the obj as the parameters of Api.replace_status().
#[derive(Debug, Clone)]
pub struct KubeUpdateStatusRequest {
    pub api_resource: ApiResource,
    pub name: String,
    pub namespace: String,
    pub obj: DynamicObject,
}

impl KubeUpdateStatusRequest {
    pub fn key(&self) -> ObjectRef {
        ObjectRef::new(&self.api_resource.kind, &self.namespace, &self.name)
    }
}

// KubeGetThenUpdateRequest has the name as the parameter of Api.get() and the obj as the parameter of Api.replace().
// The update only goes through if the current object is owned by owner_ref,
// and, since obj carries the resourceVersion it was derived from, only if nobody wrote the object in between.
#[derive(Debug, Clone)]
pub struct KubeGetThenUpdateRequest {
    pub api_resource: ApiResource,
    pub name: String,
    pub namespace: String,
    pub owner_ref: OwnerReference,
    pub obj: DynamicObject,
}

impl KubeGetThenUpdateRequest {
    pub fn key(&self) -> ObjectRef {
        ObjectRef::new(&self.api_resource.kind, &self.namespace, &self.name)
    }

    /// The guard must be a controller reference.
    pub fn well_formed(&self) -> bool {
        self.owner_ref.controller == Some(true)
    }
}

// KubeAPIResponse represents API results used in exec controller code.
#[derive(Debug, Clone)]
pub enum KubeAPIResponse {
    GetResponse(KubeGetResponse),
    CreateResponse(KubeCreateResponse),
    UpdateResponse(KubeUpdateResponse),
    UpdateStatusResponse(KubeUpdateStatusResponse),
    GetThenUpdateResponse(KubeGetThenUpdateResponse),
}

impl KubeAPIResponse {
    pub fn is_ok(&self) -> bool {
        self.error().is_none()
    }

    pub fn error(&self) -> Option<APIError> {
        let res = match self {
            KubeAPIResponse::GetResponse(resp) => &resp.res,
            KubeAPIResponse::CreateResponse(resp) => &resp.res,
            KubeAPIResponse::UpdateResponse(resp) => &resp.res,
            KubeAPIResponse::UpdateStatusResponse(resp) => &resp.res,
            KubeAPIResponse::GetThenUpdateResponse(resp) => &resp.res,
        };
        res.as_ref().err().copied()
    }
}

#[derive(Debug, Clone)]
pub struct KubeGetResponse {
    pub res: Result<DynamicObject, APIError>,
}

#[derive(Debug, Clone)]
pub struct KubeCreateResponse {
    pub res: Result<DynamicObject, APIError>,
}

#[derive(Debug, Clone)]
pub struct KubeUpdateResponse {
    pub res: Result<DynamicObject, APIError>,
}

#[derive(Debug, Clone)]
pub struct KubeUpdateStatusResponse {
    pub res: Result<DynamicObject, APIError>,
}

#[derive(Debug, Clone)]
pub struct KubeGetThenUpdateResponse {
    pub res: Result<DynamicObject, APIError>,
}

// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::{api_method::*, error::APIError};
use async_trait::async_trait;
use kube::{
    api::{Api, DynamicObject, PostParams},
    Client,
};
use tracing::debug;

// ApiServerClient is where a reconcile's requests leave the process.
// KubeApi sends them to a real Kubernetes API via kube-rs; the executable
// API server model answers them in memory.
#[async_trait]
pub trait ApiServerClient: Send + Sync {
    async fn handle_request(&self, req: KubeAPIRequest) -> KubeAPIResponse;
}

pub struct KubeApi {
    client: Client,
}

impl KubeApi {
    pub fn new(client: Client) -> KubeApi {
        KubeApi { client }
    }

    fn api(&self, namespace: &str, api_resource: &kube::api::ApiResource) -> Api<DynamicObject> {
        Api::<DynamicObject>::namespaced_with(self.client.clone(), namespace, api_resource)
    }

    async fn get(&self, req: &KubeGetRequest) -> Result<DynamicObject, APIError> {
        self.api(&req.namespace, &req.api_resource)
            .get(&req.name)
            .await
            .map_err(|err| log_and_translate("Get", &req.key(), &err))
    }

    async fn create(&self, req: &KubeCreateRequest) -> Result<DynamicObject, APIError> {
        self.api(&req.namespace, &req.api_resource)
            .create(&PostParams::default(), &req.obj)
            .await
            .map_err(|err| log_and_translate("Create", &req.key(), &err))
    }

    async fn update(&self, req: &KubeUpdateRequest) -> Result<DynamicObject, APIError> {
        self.api(&req.namespace, &req.api_resource)
            .replace(&req.name, &PostParams::default(), &req.obj)
            .await
            .map_err(|err| log_and_translate("Update", &req.key(), &err))
    }

    async fn update_status(&self, req: &KubeUpdateStatusRequest) -> Result<DynamicObject, APIError> {
        let data = serde_json::to_vec(&req.obj).map_err(|err| {
            debug!("UpdateStatus {} failed to serialize object: {}", req.key(), err);
            APIError::BadRequest
        })?;
        self.api(&req.namespace, &req.api_resource)
            .replace_status(&req.name, &PostParams::default(), data)
            .await
            .map_err(|err| log_and_translate("UpdateStatus", &req.key(), &err))
    }

    // The owner check and the write are two calls. The write carries the
    // resourceVersion of the object the caller observed (or, failing that, the one
    // just read), so a concurrent change between them surfaces as Conflict.
    async fn get_then_update(&self, req: &KubeGetThenUpdateRequest) -> Result<DynamicObject, APIError> {
        if !req.well_formed() {
            return Err(APIError::BadRequest);
        }
        let api = self.api(&req.namespace, &req.api_resource);
        let current_obj = api
            .get(&req.name)
            .await
            .map_err(|err| log_and_translate("GetThenUpdate", &req.key(), &err))?;
        let owned = current_obj
            .metadata
            .owner_references
            .iter()
            .flatten()
            .any(|owner_ref| owner_ref == &req.owner_ref);
        if !owned {
            return Err(APIError::TransactionAbort);
        }
        let mut obj = req.obj.clone();
        if obj.metadata.resource_version.is_none() {
            obj.metadata.resource_version = current_obj.metadata.resource_version;
        }
        api.replace(&req.name, &PostParams::default(), &obj)
            .await
            .map_err(|err| log_and_translate("GetThenUpdate", &req.key(), &err))
    }
}

#[async_trait]
impl ApiServerClient for KubeApi {
    async fn handle_request(&self, req: KubeAPIRequest) -> KubeAPIResponse {
        match req {
            KubeAPIRequest::GetRequest(req) => KubeAPIResponse::GetResponse(KubeGetResponse {
                res: self.get(&req).await,
            }),
            KubeAPIRequest::CreateRequest(req) => KubeAPIResponse::CreateResponse(KubeCreateResponse {
                res: self.create(&req).await,
            }),
            KubeAPIRequest::UpdateRequest(req) => KubeAPIResponse::UpdateResponse(KubeUpdateResponse {
                res: self.update(&req).await,
            }),
            KubeAPIRequest::UpdateStatusRequest(req) => KubeAPIResponse::UpdateStatusResponse(KubeUpdateStatusResponse {
                res: self.update_status(&req).await,
            }),
            KubeAPIRequest::GetThenUpdateRequest(req) => KubeAPIResponse::GetThenUpdateResponse(KubeGetThenUpdateResponse {
                res: self.get_then_update(&req).await,
            }),
        }
    }
}

fn log_and_translate(verb: &str, key: &crate::kubernetes_api_objects::object_ref::ObjectRef, err: &kube::Error) -> APIError {
    debug!("{} {} failed with error: {}", verb, key, err);
    kube_error_to_api_error(err)
}

// kube_error_to_api_error translates the API error from kube-rs APIs
// to the form that can be processed by reconcile_core.
pub fn kube_error_to_api_error(error: &kube::Error) -> APIError {
    match error {
        kube::Error::Api(error_resp) => match error_resp.reason.as_str() {
            "NotFound" => APIError::ObjectNotFound,
            "AlreadyExists" => APIError::ObjectAlreadyExists,
            "BadRequest" => APIError::BadRequest,
            "Conflict" => APIError::Conflict,
            "Invalid" => APIError::Invalid,
            "InternalError" => APIError::InternalError,
            "Timeout" => APIError::Timeout,
            "ServerTimeout" => APIError::ServerTimeout,
            _ => APIError::Other,
        },
        _ => APIError::Other,
    }
}

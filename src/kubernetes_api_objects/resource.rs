// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::error::CodecError;
use kube::api::{ApiResource, DynamicObject, Resource};
use serde::{de::DeserializeOwned, Serialize};

/// ResourceWrapper bridges a typed object and the DynamicObject carried by
/// KubeAPIRequest/KubeAPIResponse, so the reconciler can speak one request
/// vocabulary for every kind it touches.
pub trait ResourceWrapper: Sized {
    fn api_resource() -> ApiResource;

    fn marshal(&self) -> Result<DynamicObject, CodecError>;

    fn unmarshal(obj: DynamicObject) -> Result<Self, CodecError>;
}

impl<K> ResourceWrapper for K
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
{
    fn api_resource() -> ApiResource {
        ApiResource::erase::<K>(&())
    }

    fn marshal(&self) -> Result<DynamicObject, CodecError> {
        serde_json::to_value(self)
            .and_then(serde_json::from_value)
            .map_err(|err| CodecError::new(K::kind(&()), err))
    }

    fn unmarshal(obj: DynamicObject) -> Result<Self, CodecError> {
        let kind = K::kind(&());
        if let Some(types) = obj.types.as_ref() {
            if types.kind != kind {
                return Err(CodecError {
                    kind: kind.to_string(),
                    message: format!("unexpected kind {}", types.kind),
                });
            }
        }
        serde_json::to_value(obj)
            .and_then(serde_json::from_value)
            .map_err(|err| CodecError::new(kind, err))
    }
}

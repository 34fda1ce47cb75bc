// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::api_method::KubeAPIResponse;
use crate::kubernetes_api_objects::error::{APIError, CodecError};
use crate::kubernetes_api_objects::resource::ResourceWrapper;
use kube::api::DynamicObject;

/// What a read of one object found. NotFound is the only way to get Absent;
/// any other API error, or an object that does not decode, is Failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed<T> {
    Present(T),
    Absent,
    Failed(ObserveError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObserveError {
    #[error("{0}")]
    Api(#[source] APIError),
    #[error("{0}")]
    Decode(#[source] CodecError),
}

impl<T> Observed<T> {
    fn from_api_error(err: APIError) -> Observed<T> {
        match err {
            APIError::ObjectNotFound => Observed::Absent,
            err => Observed::Failed(ObserveError::Api(err)),
        }
    }
}

impl<T: ResourceWrapper> Observed<T> {
    pub fn from_result(res: Result<DynamicObject, APIError>) -> Observed<T> {
        match res {
            Ok(obj) => match T::unmarshal(obj) {
                Ok(obj) => Observed::Present(obj),
                Err(err) => Observed::Failed(ObserveError::Decode(err)),
            },
            Err(err) => Observed::from_api_error(err),
        }
    }
}

/// Returns None if resp_o is not the response to a get request.
pub fn observe<T: ResourceWrapper>(resp_o: Option<KubeAPIResponse>) -> Option<Observed<T>> {
    match resp_o {
        Some(KubeAPIResponse::GetResponse(resp)) => Some(Observed::from_result(resp.res)),
        _ => None,
    }
}

/// Like observe, but a present object also comes back as it was read, including
/// the fields its typed form does not know about.
pub fn observe_with_object<T: ResourceWrapper>(resp_o: Option<KubeAPIResponse>) -> Option<Observed<(T, DynamicObject)>> {
    match resp_o {
        Some(KubeAPIResponse::GetResponse(resp)) => Some(match resp.res {
            Ok(raw) => match T::unmarshal(raw.clone()) {
                Ok(obj) => Observed::Present((obj, raw)),
                Err(err) => Observed::Failed(ObserveError::Decode(err)),
            },
            Err(err) => Observed::from_api_error(err),
        }),
        _ => None,
    }
}

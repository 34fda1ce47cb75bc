// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT

/// APIError is the error taxonomy the reconciler sees for every request it sends.
/// It mirrors the `reason` field of the Kubernetes Status object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum APIError {
    #[error("object not found")]
    ObjectNotFound,
    #[error("object already exists")]
    ObjectAlreadyExists,
    #[error("bad request")]
    BadRequest,
    #[error("conflict")]
    Conflict,
    #[error("invalid object")]
    Invalid,
    #[error("internal error")]
    InternalError,
    #[error("timeout")]
    Timeout,
    #[error("server timeout")]
    ServerTimeout,
    // The object exists but the guard attached to the request did not hold.
    #[error("transaction aborted")]
    TransactionAbort,
    #[error("other error")]
    Other,
}

impl APIError {
    pub fn is_object_not_found(&self) -> bool {
        matches!(self, APIError::ObjectNotFound)
    }

    pub fn is_object_already_exists(&self) -> bool {
        matches!(self, APIError::ObjectAlreadyExists)
    }
}

/// CodecError is returned when an object cannot be converted between its typed
/// form and the DynamicObject form carried by requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to convert {kind} object: {message}")]
pub struct CodecError {
    pub kind: String,
    pub message: String,
}

impl CodecError {
    pub fn new(kind: impl Into<String>, err: serde_json::Error) -> CodecError {
        CodecError {
            kind: kind.into(),
            message: err.to_string(),
        }
    }
}

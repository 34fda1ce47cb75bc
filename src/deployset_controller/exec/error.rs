// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::deployset_controller::exec::observe::ObserveError;
use crate::kubernetes_api_objects::error::{APIError, CodecError};

/// The owner reference to a DeploySet cannot be built without these fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OwnershipLinkError {
    #[error("DeploySet misses .metadata.name")]
    MissingName,
    #[error("DeploySet misses .metadata.namespace")]
    MissingNamespace,
    #[error("DeploySet misses .metadata.uid")]
    MissingUid,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to get DeploySet: {0}")]
    GetDeploySetFailed(#[source] ObserveError),
    #[error("failed to get Deployment: {0}")]
    GetDeploymentFailed(#[source] ObserveError),
    #[error("Deployment exists but is not controlled by this DeploySet")]
    DeploymentNotControlled,
    #[error("failed to link Deployment to its owner: {0}")]
    OwnershipLinkFailed(#[source] OwnershipLinkError),
    #[error("failed to create Deployment: {0}")]
    CreateDeploymentFailed(#[source] APIError),
    #[error("failed to update Deployment replicas: {0}")]
    ScaleDeploymentFailed(#[source] APIError),
    #[error("failed to re-fetch DeploySet: {0}")]
    RefreshDeploySetFailed(#[source] ObserveError),
    #[error("{0}")]
    EncodeFailed(#[source] CodecError),
    #[error("received a response that does not match the pending request")]
    UnexpectedResponse,
}

impl ReconcileError {
    /// CamelCase reason used in status conditions.
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcileError::GetDeploySetFailed(_) => "GetDeploySetFailed",
            ReconcileError::GetDeploymentFailed(_) => "GetDeploymentFailed",
            ReconcileError::DeploymentNotControlled => "DeploymentNotControlled",
            ReconcileError::OwnershipLinkFailed(_) => "OwnershipLinkFailed",
            ReconcileError::CreateDeploymentFailed(_) => "CreateDeploymentFailed",
            ReconcileError::ScaleDeploymentFailed(_) => "ReplicaPatchFailed",
            ReconcileError::RefreshDeploySetFailed(_) => "RefreshDeploySetFailed",
            ReconcileError::EncodeFailed(_) => "EncodeFailed",
            ReconcileError::UnexpectedResponse => "UnexpectedResponse",
        }
    }
}

impl From<OwnershipLinkError> for ReconcileError {
    fn from(err: OwnershipLinkError) -> Self {
        ReconcileError::OwnershipLinkFailed(err)
    }
}

impl From<CodecError> for ReconcileError {
    fn from(err: CodecError) -> Self {
        ReconcileError::EncodeFailed(err)
    }
}

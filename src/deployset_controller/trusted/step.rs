// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT

// Each step names the request whose response the reconciler waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploySetReconcileStep {
    Init,
    AfterGetDeploySet,
    AfterGetDeployment,
    AfterCreateDeployment,
    AfterScaleDeployment,
    AfterRefreshDeploySet,
    AfterUpdateStatus,
    AfterReportFailure,
    Done,
    Error,
}

// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod apply;
pub mod error;
pub mod observe;
pub mod reconciler;
pub mod resource;

// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod api_method;
pub mod error;
pub mod object_ref;
pub mod resource;

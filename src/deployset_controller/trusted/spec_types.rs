// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, ObjectMeta};

// DeploySet declares one container workload; the controller keeps a Deployment
// with the same name and namespace in line with it.
// The bounds below end up in the CRD's OpenAPI schema, so objects violating
// them are rejected before they reach the controller.
#[derive(
    kube::CustomResource,
    Default,
    Debug,
    Clone,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
    PartialEq,
)]
#[kube(group = "deploy.nagesh-node.me", version = "v1", kind = "DeploySet")]
#[kube(shortname = "ds", namespaced)]
#[kube(status = "DeploySetStatus", derive = "PartialEq")]
pub struct DeploySetSpec {
    pub replica: Replica,
    pub container: Container,
}

#[derive(Default, Debug, Clone, serde::Deserialize, serde::Serialize, schemars::JsonSchema, PartialEq)]
pub struct Replica {
    // Number of pods to run.
    #[schemars(range(min = 0))]
    pub count: i32,
    pub version: String,
}

#[derive(Default, Debug, Clone, serde::Deserialize, serde::Serialize, schemars::JsonSchema, PartialEq)]
pub struct Container {
    #[schemars(length(min = 1))]
    pub image: String,
    #[schemars(range(min = 1, max = 65535))]
    pub port: i32,
}

// DeploySetStatus is what the controller last observed. It is never read back
// to make a decision about the Deployment.
#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema, PartialEq)]
pub struct DeploySetStatus {
    #[serde(rename = "readyReplicas")]
    pub ready_replicas: i32,
    #[serde(rename = "availableReplicas")]
    pub available_replicas: i32,
    #[serde(default)]
    pub condition: Vec<Condition>,
}

impl Default for DeploySet {
    fn default() -> Self {
        Self {
            metadata: ObjectMeta::default(),
            spec: DeploySetSpec::default(),
            status: None,
        }
    }
}

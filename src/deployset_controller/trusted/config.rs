// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const LABEL_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
pub const LABEL_VERSION: &str = "app.kubernetes.io/version";
pub const LABEL_PART_OF: &str = "app.kubernetes.io/part-of";
pub const LABEL_CREATED_BY: &str = "app.kubernetes.io/created-by";

pub const LABEL_NAME_VALUE: &str = "DeploySet";
pub const LABEL_VERSION_VALUE: &str = "v1";
pub const LABEL_PART_OF_VALUE: &str = "deployset-operator";
pub const LABEL_CREATED_BY_VALUE: &str = "controller-manager";

pub const CONTAINER_PORT_NAME: &str = "deployset";

pub const DEFAULT_COOL_DOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImagePullPolicy {
    Always,
    #[default]
    IfNotPresent,
    Never,
}

impl ImagePullPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImagePullPolicy::Always => "Always",
            ImagePullPolicy::IfNotPresent => "IfNotPresent",
            ImagePullPolicy::Never => "Never",
        }
    }
}

impl fmt::Display for ImagePullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown image pull policy {0:?}, expected Always, IfNotPresent or Never")]
pub struct UnknownImagePullPolicy(pub String);

impl FromStr for ImagePullPolicy {
    type Err = UnknownImagePullPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Always" => Ok(ImagePullPolicy::Always),
            "IfNotPresent" => Ok(ImagePullPolicy::IfNotPresent),
            "Never" => Ok(ImagePullPolicy::Never),
            _ => Err(UnknownImagePullPolicy(s.to_string())),
        }
    }
}

/// Knobs of the DeploySet reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// How long to wait before reconciling again after creating a Deployment.
    pub cool_down: Duration,
    pub image_pull_policy: ImagePullPolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        ReconcilerConfig {
            cool_down: DEFAULT_COOL_DOWN,
            image_pull_policy: ImagePullPolicy::default(),
        }
    }
}

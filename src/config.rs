// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::deployset_controller::trusted::config::{ImagePullPolicy, ReconcilerConfig, DEFAULT_COOL_DOWN};
use std::time::Duration;

pub const COOL_DOWN_SECS_ENV: &str = "DEPLOYSET_COOL_DOWN_SECS";
pub const IMAGE_PULL_POLICY_ENV: &str = "DEPLOYSET_IMAGE_PULL_POLICY";
pub const ERROR_REQUEUE_SECS_ENV: &str = "DEPLOYSET_ERROR_REQUEUE_SECS";
pub const RESYNC_SECS_ENV: &str = "DEPLOYSET_RESYNC_SECS";
pub const FAULT_INJECTION_NAMESPACE_ENV: &str = "DEPLOYSET_FAULT_INJECTION_NAMESPACE";

const DEFAULT_ERROR_REQUEUE: Duration = Duration::from_secs(10);
const DEFAULT_RESYNC: Duration = Duration::from_secs(300);
const DEFAULT_FAULT_INJECTION_NAMESPACE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a whole number of seconds, got {value:?}")]
    InvalidSeconds { name: &'static str, value: String },
    #[error("{name}: {message}")]
    InvalidImagePullPolicy { name: &'static str, message: String },
}

/// How the shim layer schedules reconciles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub error_requeue: Duration,
    // None means a successful reconcile only waits for the next change.
    pub resync: Option<Duration>,
    pub fault_injection_namespace: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            error_requeue: DEFAULT_ERROR_REQUEUE,
            resync: Some(DEFAULT_RESYNC),
            fault_injection_namespace: DEFAULT_FAULT_INJECTION_NAMESPACE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControllerConfig {
    pub reconciler: ReconcilerConfig,
    pub runtime: RuntimeConfig,
}

impl ControllerConfig {
    pub fn from_env() -> Result<ControllerConfig, ConfigError> {
        ControllerConfig::from_lookup(|name| std::env::var(name).ok())
    }

    /// Every setting is optional; lookup returns the raw value of a variable if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<ControllerConfig, ConfigError> {
        let cool_down = seconds(&lookup, COOL_DOWN_SECS_ENV)?.unwrap_or(DEFAULT_COOL_DOWN);
        let image_pull_policy = match lookup(IMAGE_PULL_POLICY_ENV) {
            Some(value) => value.trim().parse::<ImagePullPolicy>().map_err(|err| ConfigError::InvalidImagePullPolicy {
                name: IMAGE_PULL_POLICY_ENV,
                message: err.to_string(),
            })?,
            None => ImagePullPolicy::default(),
        };
        let error_requeue = seconds(&lookup, ERROR_REQUEUE_SECS_ENV)?.unwrap_or(DEFAULT_ERROR_REQUEUE);
        let resync = match seconds(&lookup, RESYNC_SECS_ENV)? {
            Some(Duration::ZERO) => None,
            Some(resync) => Some(resync),
            None => Some(DEFAULT_RESYNC),
        };
        let fault_injection_namespace =
            lookup(FAULT_INJECTION_NAMESPACE_ENV).unwrap_or_else(|| DEFAULT_FAULT_INJECTION_NAMESPACE.to_string());
        Ok(ControllerConfig {
            reconciler: ReconcilerConfig {
                cool_down,
                image_pull_policy,
            },
            runtime: RuntimeConfig {
                error_requeue,
                resync,
                fault_injection_namespace,
            },
        })
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<Duration>, ConfigError> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| ConfigError::InvalidSeconds { name, value }),
        None => Ok(None),
    }
}

// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    api::{Api, PostParams},
    Client,
};
use std::collections::BTreeMap;
use std::num::ParseIntError;
use tracing::{debug, error};

pub const FAULT_INJECTION_CONFIG_NAME: &str = "fault-injection-config";

#[derive(Debug, thiserror::Error)]
pub enum FaultInjectionError {
    #[error("failed to get fault-injection-config: {0}")]
    GetConfig(#[source] kube::Error),
    #[error("fault-injection-config misses data.{0}")]
    MissingField(&'static str),
    #[error("failed to parse data.{field} of fault-injection-config: {source}")]
    ParseField {
        field: &'static str,
        #[source]
        source: ParseIntError,
    },
    #[error("failed to update fault-injection-config: {0}")]
    UpdateConfig(#[source] kube::Error),
}

// The crash point is described by two counters in the ConfigMap:
// current counts the writes done so far and expected is the write after which to crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrashCounter {
    pub current: i32,
    pub expected: i32,
}

impl CrashCounter {
    pub fn from_data(data: &BTreeMap<String, String>) -> Result<CrashCounter, FaultInjectionError> {
        Ok(CrashCounter {
            current: parse_field(data, "current")?,
            expected: parse_field(data, "expected")?,
        })
    }

    pub fn should_crash(&self) -> bool {
        self.current == self.expected
    }

    pub fn advanced(&self) -> CrashCounter {
        CrashCounter {
            current: self.current.saturating_add(1),
            ..*self
        }
    }
}

fn parse_field(data: &BTreeMap<String, String>, field: &'static str) -> Result<i32, FaultInjectionError> {
    data.get(field)
        .ok_or(FaultInjectionError::MissingField(field))?
        .parse::<i32>()
        .map_err(|source| FaultInjectionError::ParseField { field, source })
}

pub struct FaultInjector {
    client: Client,
    namespace: String,
}

impl FaultInjector {
    pub fn new(client: Client, namespace: impl Into<String>) -> FaultInjector {
        FaultInjector {
            client,
            namespace: namespace.into(),
        }
    }

    // crash_or_continue is called right after each write request of a reconcile.
    // It bumps the write counter and aborts the process when the counter hits the expected value.
    pub async fn crash_or_continue(&self, log_header: &str) -> Result<(), FaultInjectionError> {
        let config_map_api = Api::<ConfigMap>::namespaced(self.client.clone(), &self.namespace);
        let mut config_map = config_map_api
            .get(FAULT_INJECTION_CONFIG_NAME)
            .await
            .map_err(FaultInjectionError::GetConfig)?;
        let data = config_map.data.get_or_insert_with(BTreeMap::new);
        let counter = CrashCounter::from_data(data)?;
        debug!("{} {} at {:?}", log_header, FAULT_INJECTION_CONFIG_NAME, counter);
        data.insert("current".to_string(), counter.advanced().current.to_string());
        config_map_api
            .replace(FAULT_INJECTION_CONFIG_NAME, &PostParams::default(), &config_map)
            .await
            .map_err(FaultInjectionError::UpdateConfig)?;

        if counter.should_crash() {
            error!("{} crashing as configured by {}", log_header, FAULT_INJECTION_CONFIG_NAME);
            std::process::abort();
        }
        Ok(())
    }
}

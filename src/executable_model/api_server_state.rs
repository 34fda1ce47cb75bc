// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::object_ref::ObjectRef;
use kube::api::DynamicObject;
use std::collections::BTreeMap;

// ApiServerState is the "etcd" of the executable API server model:
// every stored object keyed by (kind, namespace, name), plus the counters
// used to stamp uid and resourceVersion.
#[derive(Debug, Clone, Default)]
pub struct ApiServerState {
    pub resources: BTreeMap<ObjectRef, DynamicObject>,
    pub uid_counter: u64,
    pub resource_version_counter: u64,
}

impl ApiServerState {
    pub fn new() -> ApiServerState {
        ApiServerState::default()
    }

    pub fn get(&self, key: &ObjectRef) -> Option<&DynamicObject> {
        self.resources.get(key)
    }

    pub fn contains(&self, key: &ObjectRef) -> bool {
        self.resources.contains_key(key)
    }

    pub fn objects_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a DynamicObject> + 'a {
        self.resources.iter().filter(move |(key, _)| key.kind == kind).map(|(_, obj)| obj)
    }

    pub(crate) fn next_uid(&mut self) -> String {
        self.uid_counter += 1;
        format!("uid-{}", self.uid_counter)
    }

    pub(crate) fn next_resource_version(&mut self) -> String {
        self.resource_version_counter += 1;
        self.resource_version_counter.to_string()
    }
}

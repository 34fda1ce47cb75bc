// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use kube::api::Resource;
use std::fmt;

/// ObjectRef is the stable identity of an object in the store: (kind, namespace, name).
/// A reconcile is triggered with nothing more than this.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ObjectRef {
    pub fn new(kind: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>) -> ObjectRef {
        ObjectRef {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Returns None if the object misses .metadata.name or .metadata.namespace.
    pub fn from_resource<K>(obj: &K) -> Option<ObjectRef>
    where
        K: Resource<DynamicType = ()>,
    {
        let meta = obj.meta();
        Some(ObjectRef {
            kind: K::kind(&()).to_string(),
            namespace: meta.namespace.clone()?,
            name: meta.name.clone()?,
        })
    }

    /// The same (namespace, name) under another kind.
    pub fn with_kind(&self, kind: impl Into<String>) -> ObjectRef {
        ObjectRef {
            kind: kind.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

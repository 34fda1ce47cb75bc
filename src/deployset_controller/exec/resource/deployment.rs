// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::deployset_controller::exec::error::OwnershipLinkError;
use crate::deployset_controller::trusted::{config::*, spec_types::DeploySet};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use kube::Resource;
use std::collections::BTreeMap;

// The labels are fixed apart from the instance, so the pod template labels and
// the selector are equal by construction.
pub fn make_labels(ds: &DeploySet) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), LABEL_NAME_VALUE.to_string()),
        (LABEL_INSTANCE.to_string(), ds.metadata.name.clone().unwrap_or_default()),
        (LABEL_VERSION.to_string(), LABEL_VERSION_VALUE.to_string()),
        (LABEL_PART_OF.to_string(), LABEL_PART_OF_VALUE.to_string()),
        (LABEL_CREATED_BY.to_string(), LABEL_CREATED_BY_VALUE.to_string()),
    ])
}

pub fn make_owner_reference(ds: &DeploySet) -> Result<OwnerReference, OwnershipLinkError> {
    Ok(OwnerReference {
        api_version: DeploySet::api_version(&()).to_string(),
        kind: DeploySet::kind(&()).to_string(),
        name: ds.metadata.name.clone().ok_or(OwnershipLinkError::MissingName)?,
        uid: ds.metadata.uid.clone().ok_or(OwnershipLinkError::MissingUid)?,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}

/// The controller owner reference of deployment, if it points at ds.
pub fn controller_owner_reference(deployment: &Deployment, ds: &DeploySet) -> Option<OwnerReference> {
    let uid = ds.metadata.uid.as_ref()?;
    deployment
        .metadata
        .owner_references
        .iter()
        .flatten()
        .find(|owner_ref| owner_ref.controller == Some(true) && &owner_ref.uid == uid)
        .cloned()
}

pub fn desired_replicas(ds: &DeploySet) -> i32 {
    ds.spec.replica.count
}

// The API server defaults an unset replica count to 1.
pub fn observed_replicas(deployment: &Deployment) -> i32 {
    deployment.spec.as_ref().and_then(|spec| spec.replicas).unwrap_or(1)
}

/// Builds the Deployment a DeploySet asks for, from nothing but the DeploySet.
pub fn make_deployment(ds: &DeploySet, config: &ReconcilerConfig) -> Result<Deployment, OwnershipLinkError> {
    let name = ds.metadata.name.clone().ok_or(OwnershipLinkError::MissingName)?;
    let namespace = ds.metadata.namespace.clone().ok_or(OwnershipLinkError::MissingNamespace)?;
    let owner_reference = make_owner_reference(ds)?;
    let labels = make_labels(ds);

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(namespace),
            owner_references: Some(vec![owner_reference]),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(desired_replicas(ds)),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name,
                        image: Some(ds.spec.container.image.clone()),
                        image_pull_policy: Some(config.image_pull_policy.to_string()),
                        ports: Some(vec![ContainerPort {
                            container_port: ds.spec.container.port,
                            name: Some(CONTAINER_PORT_NAME.to_string()),
                            ..ContainerPort::default()
                        }]),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    })
}

// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use deployset_controller::deployset_controller::exec::resource::status::{find_condition, CONDITION_AVAILABLE};
use deployset_controller::deployset_controller::trusted::config::{CONTAINER_PORT_NAME, LABEL_INSTANCE};
use deployset_controller::deployset_controller::trusted::spec_types::DeploySet;
use k8s_openapi::api::apps::v1::Deployment;
use kube::{
    api::{Api, DeleteParams, Patch, PatchParams},
    discovery::Discovery,
    Client,
};
use serde_json::json;
use std::time::Duration;
use tracing::*;

use crate::common::*;

const DEPLOYSET_NAME: &str = "web";
const TIMEOUT: Duration = Duration::from_secs(120);

pub fn deploy_set() -> String {
    "
    apiVersion: deploy.nagesh-node.me/v1
    kind: DeploySet
    metadata:
      name: web
      namespace: default
    spec:
      replica:
        count: 3
        version: v1
      container:
        image: nginx:1.25
        port: 80
    "
    .to_string()
}

// Checks the Deployment against a DeploySet asking for count replicas.
// Ok(false) means the Deployment has not caught up yet.
async fn deployment_matches(client: Client, count: i32) -> Result<bool, Error> {
    let deploy_set_api: Api<DeploySet> = Api::default_namespaced(client.clone());
    let deployment_api: Api<Deployment> = Api::default_namespaced(client);
    let ds = match deploy_set_api.get(DEPLOYSET_NAME).await {
        Err(e) => {
            info!("Get DeploySet failed with error {}.", e);
            return Ok(false);
        }
        Ok(ds) => ds,
    };
    let deployment = match deployment_api.get(DEPLOYSET_NAME).await {
        Err(e) => {
            info!("Get Deployment failed with error {}; still creating.", e);
            return Ok(false);
        }
        Ok(deployment) => deployment,
    };

    let owned = deployment
        .metadata
        .owner_references
        .iter()
        .flatten()
        .any(|owner_ref| owner_ref.controller == Some(true) && Some(&owner_ref.uid) == ds.metadata.uid.as_ref());
    if !owned {
        return Err(Error::DeploymentFailed("not controlled by the DeploySet".to_string()));
    }
    let spec = deployment.spec.unwrap_or_default();
    let template_labels = spec.template.metadata.and_then(|m| m.labels);
    if spec.selector.match_labels != template_labels {
        return Err(Error::DeploymentFailed("selector differs from pod template labels".to_string()));
    }
    if template_labels.as_ref().and_then(|labels| labels.get(LABEL_INSTANCE)).map(String::as_str) != Some(DEPLOYSET_NAME) {
        return Err(Error::DeploymentFailed(format!("missing label {}", LABEL_INSTANCE)));
    }
    let container = spec.template.spec.and_then(|pod_spec| pod_spec.containers.into_iter().next());
    let port = container.as_ref().and_then(|c| c.ports.as_ref()).and_then(|ports| ports.first());
    if port.and_then(|p| p.name.as_deref()) != Some(CONTAINER_PORT_NAME) || port.map(|p| p.container_port) != Some(80) {
        return Err(Error::DeploymentFailed("container port is not 80/deployset".to_string()));
    }
    if spec.replicas != Some(count) {
        info!("Deployment replicas is {:?}, waiting for {}.", spec.replicas, count);
        return Ok(false);
    }
    Ok(true)
}

async fn status_matches(client: Client, count: i32) -> Result<bool, Error> {
    let deploy_set_api: Api<DeploySet> = Api::default_namespaced(client);
    let ds = match deploy_set_api.get(DEPLOYSET_NAME).await {
        Err(e) => {
            info!("Get DeploySet failed with error {}.", e);
            return Ok(false);
        }
        Ok(ds) => ds,
    };
    let status = match ds.status {
        Some(status) => status,
        None => {
            info!("DeploySet has no status yet.");
            return Ok(false);
        }
    };
    if status.ready_replicas > count {
        return Err(Error::DeploySetStatusFailed(format!(
            "{} ready replicas reported for {} desired",
            status.ready_replicas, count
        )));
    }
    let available = find_condition(&status.condition, CONDITION_AVAILABLE).map(|c| c.status == "True");
    if status.ready_replicas < count || available != Some(true) {
        info!("DeploySet reports {} ready replicas, waiting for {}.", status.ready_replicas, count);
        return Ok(false);
    }
    Ok(true)
}

pub async fn desired_state_test(client: Client) -> Result<(), Error> {
    wait_for("desired state test", TIMEOUT, || deployment_matches(client.clone(), 3)).await?;
    // The status follows on the next resync or Deployment change.
    wait_for("status test", TIMEOUT, || status_matches(client.clone(), 3)).await
}

pub async fn scaling_test(client: Client) -> Result<(), Error> {
    let deploy_set_api: Api<DeploySet> = Api::default_namespaced(client.clone());
    let patch = json!({"spec": {"replica": {"count": 5}}});
    deploy_set_api
        .patch(DEPLOYSET_NAME, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    info!("Scaled DeploySet to 5 replicas.");
    wait_for("scaling test", TIMEOUT, || deployment_matches(client.clone(), 5)).await?;
    wait_for("scaled status test", TIMEOUT, || status_matches(client.clone(), 5)).await
}

pub async fn recovery_test(client: Client) -> Result<(), Error> {
    let deployment_api: Api<Deployment> = Api::default_namespaced(client.clone());
    let old_uid = deployment_api.get(DEPLOYSET_NAME).await?.metadata.uid;
    deployment_api.delete(DEPLOYSET_NAME, &DeleteParams::default()).await?;
    info!("Deleted Deployment {}.", DEPLOYSET_NAME);
    wait_for("recovery test", TIMEOUT, || {
        let client = client.clone();
        let deployment_api = deployment_api.clone();
        let old_uid = old_uid.clone();
        async move {
            match deployment_api.get(DEPLOYSET_NAME).await {
                Ok(deployment) if deployment.metadata.uid != old_uid => deployment_matches(client, 3).await,
                _ => Ok(false),
            }
        }
    })
    .await
}

async fn setup() -> Result<Client, Error> {
    let client = Client::try_default().await?;
    check_crd(client.clone(), "deploysets.deploy.nagesh-node.me").await?;
    let discovery = Discovery::new(client.clone()).run().await?;
    apply(deploy_set(), client.clone(), &discovery).await?;
    Ok(client)
}

pub async fn deployset_e2e_test() -> Result<(), Error> {
    let client = setup().await?;
    desired_state_test(client).await?;
    info!("E2e test passed.");
    Ok(())
}

pub async fn deployset_scaling_e2e_test() -> Result<(), Error> {
    let client = setup().await?;
    desired_state_test(client.clone()).await?;
    scaling_test(client).await?;
    info!("E2e test passed.");
    Ok(())
}

pub async fn deployset_recovery_e2e_test() -> Result<(), Error> {
    let client = setup().await?;
    desired_state_test(client.clone()).await?;
    recovery_test(client).await?;
    info!("E2e test passed.");
    Ok(())
}

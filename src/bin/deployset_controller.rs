// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use anyhow::Result;
use deployset_controller::config::ControllerConfig;
use deployset_controller::deployset_controller::exec::reconciler::DeploySetReconciler;
use deployset_controller::deployset_controller::trusted::spec_types::DeploySet;
use deployset_controller::shim_layer::controller_runtime::run_controller;
use k8s_openapi::api::apps::v1::Deployment;
use kube::CustomResourceExt;
use std::env;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args: Vec<String> = env::args().collect();
    let cmd = args.get(1).map(String::as_str).unwrap_or_default();

    if cmd == "export" {
        println!("{}", serde_yaml::to_string(&DeploySet::crd())?);
        return Ok(());
    }
    let fault_injection = match cmd {
        "run" => {
            info!("running deployset-controller");
            false
        }
        "crash" => {
            info!("running deployset-controller in crash-testing mode");
            true
        }
        _ => {
            error!("wrong command; please use \"export\", \"run\" or \"crash\"");
            return Ok(());
        }
    };
    let config = ControllerConfig::from_env()?;
    info!("using {:?}", config);
    run_controller::<DeploySet, Deployment, DeploySetReconciler>(
        DeploySetReconciler::new(config.reconciler),
        config.runtime,
        fault_injection,
    )
    .await
}

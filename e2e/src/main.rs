// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod common;
pub mod deployset_e2e;

use common::Error;
use deployset_e2e::{deployset_e2e_test, deployset_recovery_e2e_test, deployset_scaling_e2e_test};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();
    let args: Vec<String> = env::args().collect();
    let cmd = args.get(1).cloned().unwrap_or_default();
    match cmd.as_str() {
        "deployset" => {
            println!("Running deployset end-to-end test");
            deployset_e2e_test().await
        }
        "deployset-scaling" => {
            println!("Running deployset end-to-end test for scaling");
            deployset_scaling_e2e_test().await
        }
        "deployset-recovery" => {
            println!("Running deployset end-to-end test for recovering a deleted Deployment");
            deployset_recovery_e2e_test().await
        }
        _ => {
            println!("Please specify one test: deployset, deployset-scaling or deployset-recovery");
            Ok(())
        }
    }
}

//! Tessera operator - transport CA lifecycle for Tessera clusters

use std::sync::Arc;

use clap::Parser;
use kube::{Client, CustomResourceExt};
use tracing::info;

use tessera_common::crd::TesseraCluster;
use tessera_common::telemetry::{init_telemetry, TelemetryConfig};
use tessera_operator::{build_controller, Cli, Context, OperatorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        print!("{}", serde_yaml::to_string(&TesseraCluster::crd())?);
        return Ok(());
    }

    let _telemetry = init_telemetry(TelemetryConfig::from_env())?;

    let config = OperatorConfig::from_cli(&cli)?;
    info!(
        validity_secs = config.rotation.validity.as_secs(),
        rotate_before_secs = config.rotation.rotate_before.as_secs(),
        shared_ca = config.shared_ca.is_some(),
        "Starting Tessera operator"
    );

    let client = Client::try_default().await?;
    let ctx = Arc::new(
        Context::builder(client.clone())
            .rotation(config.rotation)
            .operation_timeout(config.operation_timeout)
            .shared_ca(config.shared_ca)
            .build(),
    );

    build_controller(client, ctx).await;

    info!("Tessera operator shut down");
    Ok(())
}

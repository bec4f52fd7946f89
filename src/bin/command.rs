use anyhow::{Context, Result};
use async_trait::async_trait;
use motomap_provisioner::client::{Accepted, Provisioner};
use motomap_provisioner::error::SubmissionError;
use motomap_provisioner::request::ContainerGroup;
use motomap_provisioner::{app, client};
use serde_json::{json, Value};
use std::env::var;
use tokio::io::{stdin, AsyncReadExt};
use tracing::info;

/// Prints container groups instead of submitting them.
struct DryRun;

#[async_trait]
impl Provisioner for DryRun {
    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        group: &ContainerGroup,
    ) -> Result<Accepted, SubmissionError> {
        println!(
            "{}",
            json!({"resourceGroup": resource_group, "name": name, "containerGroup": group})
        );
        Ok(Accepted {
            name: name.to_string(),
            status: 0,
            provisioning_state: None,
            operation: None,
        })
    }
}

/// Handle a single batch payload read from stdin, as the trigger
/// would. With `DRY_RUN` set, the container groups are printed
/// instead of submitted.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
    app::init()?;

    let mut input = Vec::new();
    stdin()
        .read_to_end(&mut input)
        .await
        .context("Failed to read batch payload from stdin")?;
    let payload: Value =
        serde_json::from_slice(&input).context("Batch payload is not valid JSON")?;

    let handled = if var("DRY_RUN").is_ok() {
        app::current().handle(&payload, &DryRun).await
    } else {
        client::init(&app::current().settings)?;
        let client = client::current();
        app::current().handle(&payload, client.as_ref()).await
    };
    let report = handled.context("Failed to handle batch payload")?;

    info!(
        records = report.records,
        accepted = report.accepted.len(),
        "Handled batch"
    );
    Ok(())
}

use super::report_outcome;
use crate::FilterArgs;
use crate::{docker, utils};
use colored::Colorize;
use layerflow_core::{ImageClient, ImageCollection, PushOptions};

pub async fn handle(
    images: &ImageCollection,
    filters: &FilterArgs,
    registry: Option<String>,
) -> anyhow::Result<()> {
    let selected = utils::select(images, filters)?;
    let client = docker::init_docker_with_error_handling().await?;
    push_collection(&client, &selected, &PushOptions { registry }).await
}

pub async fn push_collection(
    client: &dyn ImageClient,
    images: &ImageCollection,
    options: &PushOptions,
) -> anyhow::Result<()> {
    println!();
    println!(
        "{}",
        format!("{}個のイメージをプッシュします", images.len()).blue()
    );
    if let Some(registry) = &options.registry {
        println!("  レジストリ: {}", registry.cyan());
    }

    tracing::info!(images = images.len(), "Starting push");
    report_outcome(
        images.push(client, options).await,
        "プッシュに失敗したイメージがあります",
    )?;
    Ok(())
}

use super::report_outcome;
use crate::FilterArgs;
use crate::{docker, utils};
use colored::Colorize;
use layerflow_config::Settings;
use layerflow_core::{BuildOptions, ImageCollection, PushOptions};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// CLI引数と設定ファイルからビルドオプションを組み立てる（CLI引数が優先）
pub fn options(
    settings: &Settings,
    parallel: Option<usize>,
    no_cache: bool,
    pull: bool,
    context: Option<PathBuf>,
    build_args: &[String],
) -> anyhow::Result<BuildOptions> {
    let mut args = BTreeMap::new();
    for arg in build_args {
        let (key, value) = arg.split_once('=').ok_or_else(|| {
            anyhow::anyhow!("--build-arg は KEY=VALUE 形式で指定してください: {}", arg)
        })?;
        args.insert(key.to_string(), value.to_string());
    }

    Ok(BuildOptions {
        parallelism: parallel.or(settings.parallelism).unwrap_or(1).max(1),
        no_cache: no_cache || settings.no_cache,
        pull: pull || settings.pull,
        context_dir: context.or_else(|| settings.context_dir.clone()),
        build_args: args,
    })
}

/// `push` が `Some` ならビルド後にそのレジストリ設定でプッシュ
pub async fn handle(
    images: &ImageCollection,
    filters: &FilterArgs,
    options: BuildOptions,
    push: Option<Option<String>>,
) -> anyhow::Result<()> {
    let selected = utils::select(images, filters)?;

    println!(
        "{}",
        format!(
            "{}個のイメージをビルドします（並列数: {}）",
            selected.len(),
            options.parallelism
        )
        .blue()
    );
    for image in &selected {
        println!("  • {}", utils::describe(image));
    }
    println!();

    let client = docker::init_docker_with_error_handling().await?;

    tracing::info!(
        images = selected.len(),
        parallelism = options.parallelism,
        "Starting build"
    );
    report_outcome(
        selected.build(&client, &options).await,
        "ビルドに失敗したイメージがあります",
    )?;

    if let Some(registry) = push {
        super::push::push_collection(&client, &selected, &PushOptions { registry }).await?;
    }

    Ok(())
}

use crate::FilterArgs;
use crate::utils;
use colored::Colorize;
use layerflow_core::{Attribute, ImageCollection};

pub fn handle(images: &ImageCollection, filters: &FilterArgs, json: bool) -> anyhow::Result<()> {
    let selected = filters.apply(images)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&selected)?);
        return Ok(());
    }

    if selected.is_empty() {
        println!("{}", "条件に一致するイメージがありません".yellow());
        return Ok(());
    }

    for (arch, group) in selected.group_by(Attribute::Architecture) {
        println!("{}", arch.unwrap_or_default().bold());
        for image in &group {
            println!("  {}", utils::describe(image));
        }
    }

    println!();
    println!("{}個のイメージ", selected.len());
    Ok(())
}

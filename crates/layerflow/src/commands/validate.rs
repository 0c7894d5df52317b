use colored::Colorize;
use layerflow_core::{Attribute, ImageCollection};

pub fn handle(images: &ImageCollection) -> anyhow::Result<()> {
    println!("{}", "イメージ定義を検証中...".blue());

    let summary = layerflow_core::validate(images)?;
    tracing::debug!(?summary, "Validation finished");

    println!("{}", "✓ イメージ定義は正常です！".green().bold());
    println!();
    println!("サマリー:");
    println!("  イメージ: {}個", summary.images);
    for (arch, group) in images.group_by(Attribute::Architecture) {
        println!(
            "    - {} ({}個)",
            arch.unwrap_or_default().cyan(),
            group.len()
        );
    }
    println!("  ビルド段数: {}", summary.layers);

    if !summary.duplicates.is_empty() {
        println!();
        println!("{}", "⚠ 同じ名前のイメージが複数定義されています:".yellow());
        for fqn in &summary.duplicates {
            println!("    - {}", fqn);
        }
    }

    if !summary.external_bases.is_empty() {
        println!();
        println!("ビルド対象外のベースイメージ:");
        for fqn in &summary.external_bases {
            println!("    - {}", fqn.dimmed());
        }
    }

    Ok(())
}

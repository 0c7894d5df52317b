use crate::FilterArgs;
use colored::Colorize;
use layerflow_config::Settings;
use layerflow_core::catalog::{CatalogOptions, default_images};
use layerflow_core::filter::matching;
use layerflow_core::{Attribute, Criterion, ImageCollection, ImageDescriptor};
use std::path::PathBuf;

/// イメージ定義の読み込み元
pub struct Source {
    pub images: Option<PathBuf>,
    pub builtin: bool,
    pub assets: PathBuf,
}

/// イメージ定義を読み込む
///
/// `--builtin` なら組み込みカタログ、それ以外は `--images` か探索した images.kdl。
pub fn load_collection(source: &Source, settings: &Settings) -> anyhow::Result<ImageCollection> {
    if source.builtin {
        let mut options = CatalogOptions::from_assets(source.assets.clone())?;
        if let Some(organization) = &settings.organization {
            options = options.with_organization(organization);
        }
        let images = default_images(&options)?;
        tracing::debug!(
            assets = %source.assets.display(),
            images = images.len(),
            "Using built-in image catalog"
        );
        return Ok(images);
    }

    let path = match &source.images {
        Some(path) => path.clone(),
        None => layerflow_config::find_images_file()?,
    };
    eprintln!("📄 {}", path.display().to_string().cyan());
    tracing::debug!(path = %path.display(), "Using image definitions");

    Ok(layerflow_core::load_images(
        &path,
        settings.organization.as_deref(),
    )?)
}

impl FilterArgs {
    /// 指定された条件をglobパターンとしてコレクションに適用
    pub fn apply(&self, images: &ImageCollection) -> anyhow::Result<ImageCollection> {
        let patterns = [
            (Attribute::Name, &self.name),
            (Attribute::Tag, &self.tag),
            (Attribute::Architecture, &self.arch),
            (Attribute::Os, &self.os),
            (Attribute::Variant, &self.variant),
            (Attribute::Organization, &self.org),
        ];

        let mut criteria: Vec<(Attribute, Criterion)> = Vec::new();
        for (attribute, pattern) in patterns {
            if let Some(pattern) = pattern {
                criteria.push((attribute, matching(pattern)?.into()));
            }
        }

        tracing::debug!(criteria = criteria.len(), "Filtering images");
        Ok(images.filter(criteria))
    }
}

/// 絞り込んだ結果が空ならエラー
pub fn select(images: &ImageCollection, filters: &FilterArgs) -> anyhow::Result<ImageCollection> {
    let selected = filters.apply(images)?;
    if selected.is_empty() {
        anyhow::bail!("条件に一致するイメージがありません");
    }
    Ok(selected)
}

/// 1行分のイメージ表示
pub fn describe(image: &ImageDescriptor) -> String {
    let title = image
        .title()
        .map(|t| format!(" {}", t.dimmed()))
        .unwrap_or_default();
    format!("{}{} ← {}", image.fqn().cyan(), title, image.base())
}

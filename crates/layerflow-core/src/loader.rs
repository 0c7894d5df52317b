//! イメージ定義ローダー

use crate::collection::ImageCollection;
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::parser::parse_kdl_string_with_organization;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, instrument};

/// `images.kdl` を読み込んでImageCollectionを生成
///
/// ADD の相対パスはファイルのあるディレクトリを基準に解決します。
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load_images(path: &Path, default_organization: Option<&str>) -> Result<ImageCollection> {
    debug!("Reading image definitions");
    let content = std::fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let images = parse_kdl_string_with_organization(&content, base_dir, default_organization)?;
    info!(images = images.len(), "Image definitions loaded");

    Ok(images)
}

/// 依存グラフの検査結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSummary {
    pub images: usize,
    pub layers: usize,
    /// 同じ fqn を持つイメージ
    pub duplicates: Vec<String>,
    /// コレクション外のイメージをベースにしているもの
    pub external_bases: Vec<String>,
}

/// 循環依存がないことを確認してサマリーを返す
pub fn validate(images: &ImageCollection) -> Result<ValidationSummary> {
    let graph = DependencyGraph::from_collection(images);
    let layers = graph.layers()?;

    let mut duplicates = Vec::new();
    for (idx, image) in images.iter().enumerate() {
        let fqn = image.fqn();
        if images.iter().take(idx).any(|other| other.fqn() == fqn) && !duplicates.contains(&fqn) {
            duplicates.push(fqn);
        }
    }

    let mut seen = HashSet::new();
    let external_bases = images
        .iter()
        .filter_map(|image| image.base().as_image())
        .map(|base| base.fqn())
        .filter(|fqn| images.find_by_fqn(fqn).is_none() && seen.insert(fqn.clone()))
        .collect();

    Ok(ValidationSummary {
        images: images.len(),
        layers: layers.len(),
        duplicates,
        external_bases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImageError;
    use crate::model::ImageDescriptor;

    #[test]
    fn test_load_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.kdl");
        std::fs::write(
            &path,
            r#"
            image "cpp" {
                base "ubuntu:18.04"
                arch "amd64"
                os "ubuntu-18.04"
            }
            image "python" from="cpp"
            "#,
        )
        .unwrap();

        let images = load_images(&path, Some("ursalab")).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].organization(), "ursalab");

        let summary = validate(&images).unwrap();
        assert_eq!(summary.images, 2);
        assert_eq!(summary.layers, 2);
        assert!(summary.duplicates.is_empty());
        assert!(summary.external_bases.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_images(Path::new("/nonexistent/images.kdl"), None);
        assert!(matches!(result, Err(ImageError::Io(_))));
    }

    #[test]
    fn test_validate_reports_duplicates_and_external_bases() {
        let cpp = ImageDescriptor::builder("cpp", "ubuntu:18.04")
            .architecture("amd64")
            .os("ubuntu-18.04")
            .finish()
            .unwrap();
        let python = ImageDescriptor::builder("python", &cpp).finish().unwrap();
        let images = ImageCollection::from(vec![python.clone(), python]);

        let summary = validate(&images).unwrap();
        assert_eq!(
            summary.duplicates,
            vec!["layerflow/amd64-ubuntu-18.04-python:latest"]
        );
        assert_eq!(
            summary.external_bases,
            vec!["layerflow/amd64-ubuntu-18.04-cpp:latest"]
        );
    }

    #[test]
    fn test_external_bases_listed_once_in_order() {
        let cpp = ImageDescriptor::builder("cpp", "ubuntu:18.04")
            .architecture("amd64")
            .os("ubuntu-18.04")
            .finish()
            .unwrap();
        let conda = ImageDescriptor::builder("conda", "ubuntu:18.04")
            .architecture("amd64")
            .os("ubuntu-18.04")
            .finish()
            .unwrap();
        let python = ImageDescriptor::builder("python", &cpp).finish().unwrap();
        let java = ImageDescriptor::builder("java", &cpp).finish().unwrap();
        let r = ImageDescriptor::builder("r", &conda).finish().unwrap();
        let images = ImageCollection::from(vec![python, r, java]);

        let summary = validate(&images).unwrap();
        assert!(summary.duplicates.is_empty());
        assert_eq!(
            summary.external_bases,
            vec![
                "layerflow/amd64-ubuntu-18.04-cpp:latest",
                "layerflow/amd64-ubuntu-18.04-conda:latest",
            ]
        );
    }
}

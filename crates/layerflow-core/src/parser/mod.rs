//! KDLパーサー
//!
//! `images.kdl` をパースして [`ImageCollection`] を生成します。
//! 各ノードタイプのパース処理はモジュールに分離されています。

mod image;
mod step;

pub use step::parse_steps;

use crate::collection::ImageCollection;
use crate::error::{ImageError, Result};
use image::{ImageContext, parse_image};
use kdl::{KdlDocument, KdlNode};
use std::fs;
use std::path::Path;
use tracing::debug;

/// KDLファイルをパースしてImageCollectionを生成
///
/// ADD の相対パスはファイルのあるディレクトリを基準に解決します。
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<ImageCollection> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_kdl_string(&content, base_dir)
}

/// KDL文字列をパース
pub fn parse_kdl_string(content: &str, base_dir: &Path) -> Result<ImageCollection> {
    parse_kdl_string_with_organization(content, base_dir, None)
}

/// KDL文字列を organization の既定値を指定してパース
///
/// ファイル内の `organization` ノードは `default_organization` より優先されます。
pub fn parse_kdl_string_with_organization(
    content: &str,
    base_dir: &Path,
    default_organization: Option<&str>,
) -> Result<ImageCollection> {
    let doc: KdlDocument = content.parse()?;

    let mut ctx = ImageContext {
        base_dir,
        organization: default_organization.map(str::to_string),
        defined: Vec::new(),
    };

    for node in doc.nodes() {
        match node.name().value() {
            "organization" => {
                let organization = first_string(node).ok_or_else(|| {
                    ImageError::InvalidDefinition("organization requires a value".to_string())
                })?;
                ctx.organization = Some(organization.to_string());
            }
            "image" => {
                let images = parse_image(node, &ctx)?;
                debug!(
                    name = first_string(node).unwrap_or_default(),
                    count = images.len(),
                    "Parsed image node"
                );
                ctx.defined.extend(images);
            }
            _ => {
                // 不明なノードはスキップ
            }
        }
    }

    Ok(ImageCollection::from(ctx.defined))
}

/// 最初の引数（文字列）
pub(crate) fn first_string(node: &KdlNode) -> Option<&str> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
}

/// 全ての引数（プロパティを除く）
pub(crate) fn string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string().map(|s| s.to_string()))
        .collect()
}

/// 文字列プロパティ
pub(crate) fn string_prop<'a>(node: &'a KdlNode, key: &str) -> Option<&'a str> {
    node.get(key).and_then(|v| v.as_string())
}

/// 同名のプロパティを全て取得
pub(crate) fn string_props(node: &KdlNode, key: &str) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_some_and(|n| n.value() == key))
        .filter_map(|e| e.value().as_string().map(|s| s.to_string()))
        .collect()
}

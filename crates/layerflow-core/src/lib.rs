//! layerflow core
//!
//! Docker イメージを依存グラフのノードとして扱います。
//! ベースイメージが別の管理対象イメージであれば辺が張られ、
//! コレクションのビルドは依存関係の順に [`ImageClient`] へ委譲されます。
//!
//! - [`model`]: イメージ定義とプラットフォーム
//! - [`dsl`]: Dockerfile の命令を組み立てる関数群
//! - [`collection`] / [`filter`]: イメージの絞り込みとグループ化
//! - [`graph`] / [`executor`]: 依存グラフとトポロジカル順のビルド
//! - [`parser`] / [`loader`]: `images.kdl` の読み込み
//! - [`catalog`]: 組み込みのイメージマトリクス

pub mod catalog;
pub mod client;
pub mod collection;
pub mod dockerfile;
pub mod dsl;
pub mod error;
pub mod executor;
pub mod filter;
pub mod graph;
pub mod loader;
pub mod model;
pub mod parser;

#[cfg(test)]
mod testing;

pub use client::{BuildOptions, ImageClient, ImageHandle, PushOptions};
pub use collection::{Attribute, Criterion, ImageCollection};
pub use dockerfile::Dockerfile;
pub use error::{ImageError, Result};
pub use executor::{BuildReport, ImageOutcome, ImageState};
pub use filter::Filter;
pub use graph::DependencyGraph;
pub use loader::{ValidationSummary, load_images, validate};
pub use model::{
    Architecture, Base, DEFAULT_ORGANIZATION, DEFAULT_TAG, ImageDescriptor,
    ImageDescriptorBuilder, ImageRef, Platform,
};
pub use parser::{parse_kdl_file, parse_kdl_string};

//! Dockerクライアントの抽象化
//!
//! コアはビルドの「何を」「どの順で」だけを決め、実際のDocker操作は
//! [`ImageClient`] の実装（`layerflow-build` の bollard 実装など）に委譲します。

use crate::dockerfile::Dockerfile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// ビルドオプション
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// 同じレイヤー内で同時に実行するビルド数
    pub parallelism: usize,
    /// キャッシュを使用しない
    pub no_cache: bool,
    /// ベースイメージを常にpullする
    pub pull: bool,
    /// ADD のソースパスを解決する基準ディレクトリ
    pub context_dir: Option<PathBuf>,
    /// ビルド引数
    pub build_args: BTreeMap<String, String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            parallelism: 1,
            no_cache: false,
            pull: false,
            context_dir: None,
            build_args: BTreeMap::new(),
        }
    }
}

/// プッシュオプション
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushOptions {
    /// プッシュ先レジストリ（例: `ghcr.io`）。指定時は `{registry}/{fqn}` にタグ付けしてプッシュ
    pub registry: Option<String>,
}

impl PushOptions {
    /// 実際にプッシュされるイメージ名
    pub fn target(&self, fqn: &str) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}", registry.trim_end_matches('/'), fqn),
            None => fqn.to_string(),
        }
    }
}

/// ビルド結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHandle {
    pub tag: String,
    pub id: Option<String>,
}

/// Dockerfileのビルドとプッシュを行うクライアント
#[async_trait]
pub trait ImageClient: Send + Sync {
    /// Dockerfileからイメージをビルドし `tag` を付ける
    async fn build_from_dockerfile(
        &self,
        dockerfile: &Dockerfile,
        tag: &str,
        options: &BuildOptions,
    ) -> anyhow::Result<ImageHandle>;

    /// タグ付け済みのイメージをプッシュ
    async fn push(&self, tag: &str, options: &PushOptions) -> anyhow::Result<()>;
}

//! 依存関係順のビルドとプッシュ
//!
//! # 処理順序
//!
//! [`DependencyGraph::layers`] で分割したレイヤーを順に処理します。
//! 同じレイヤー内のイメージは互いに依存しないため、
//! `buffer_unordered(parallelism)` で並行にビルドし、全て完了してから次のレイヤーへ進みます。
//! 依存先が失敗またはスキップされたイメージはビルドせずスキップします。

use crate::client::{BuildOptions, ImageClient, PushOptions};
use crate::error::{ImageError, Result};
use crate::graph::DependencyGraph;
use crate::model::ImageDescriptor;
use futures_util::StreamExt;
use std::fmt;
use tracing::{debug, info, warn};

/// イメージごとの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageState {
    Unvisited,
    Queued,
    Built,
    Pushed,
    Failed,
    Skipped,
}

impl fmt::Display for ImageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImageState::Unvisited => "unvisited",
            ImageState::Queued => "queued",
            ImageState::Built => "built",
            ImageState::Pushed => "pushed",
            ImageState::Failed => "failed",
            ImageState::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// 1イメージの処理結果
#[derive(Debug)]
pub struct ImageOutcome {
    /// イメージの fqn
    pub image: String,
    pub state: ImageState,
    /// 失敗時のエラー
    pub error: Option<ImageError>,
    /// スキップの原因になった（最初に失敗した）イメージ
    pub skipped_because: Option<String>,
}

impl ImageOutcome {
    fn new(image: String) -> Self {
        Self {
            image,
            state: ImageState::Unvisited,
            error: None,
            skipped_because: None,
        }
    }
}

/// ビルド・プッシュの結果
///
/// 順序はコレクションの順序と同じです。
#[derive(Debug, Default)]
pub struct BuildReport {
    outcomes: Vec<ImageOutcome>,
}

impl BuildReport {
    pub fn outcomes(&self) -> &[ImageOutcome] {
        &self.outcomes
    }

    /// 指定した状態のイメージの fqn
    pub fn images_in(&self, state: ImageState) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.state == state)
            .map(|o| o.image.as_str())
            .collect()
    }

    pub fn built(&self) -> Vec<&str> {
        self.images_in(ImageState::Built)
    }

    pub fn pushed(&self) -> Vec<&str> {
        self.images_in(ImageState::Pushed)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.images_in(ImageState::Failed)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.images_in(ImageState::Skipped)
    }

    /// 失敗もスキップもない
    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| !matches!(o.state, ImageState::Failed | ImageState::Skipped))
    }

    pub fn first_error(&self) -> Option<&ImageError> {
        self.outcomes.iter().find_map(|o| o.error.as_ref())
    }

    /// 人が読むための要約
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "ビルド結果: 成功 {}, プッシュ {}, 失敗 {}, スキップ {}",
            self.built().len(),
            self.pushed().len(),
            self.failed().len(),
            self.skipped().len()
        )];

        for outcome in &self.outcomes {
            match outcome.state {
                ImageState::Failed => {
                    let reason = outcome
                        .error
                        .as_ref()
                        .map(|e| e.to_string())
                        .unwrap_or_default();
                    lines.push(format!("  ✗ {}: {}", outcome.image, reason));
                }
                ImageState::Skipped => {
                    let cause = outcome.skipped_because.as_deref().unwrap_or("?");
                    lines.push(format!("  - {} (依存先 {} が失敗)", outcome.image, cause));
                }
                _ => {}
            }
        }

        lines.join("\n")
    }

    /// 失敗またはスキップがあれば [`ImageError::Incomplete`] に変換
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ImageError::Incomplete(Box::new(self)))
        }
    }
}

/// 依存関係順にビルド
///
/// 循環依存がある場合は何もビルドせずにエラーを返します。
/// 個々のビルド失敗はレポートに記録されます。
pub async fn build_all(
    images: &[ImageDescriptor],
    client: &dyn ImageClient,
    options: &BuildOptions,
) -> Result<BuildReport> {
    let graph = DependencyGraph::from_images(images);
    let layers = graph.layers()?;
    let parallelism = options.parallelism.max(1);

    info!(
        images = images.len(),
        layers = layers.len(),
        parallelism,
        "Building images in dependency order"
    );

    let mut outcomes: Vec<ImageOutcome> = images
        .iter()
        .map(|image| ImageOutcome::new(image.fqn()))
        .collect();

    for (layer_idx, layer) in layers.iter().enumerate() {
        let mut queued = Vec::with_capacity(layer.len());

        for &node in layer {
            let blocked = graph
                .dependencies(node)
                .iter()
                .copied()
                .find(|&dep| outcomes[dep].state != ImageState::Built);

            match blocked {
                Some(dep) => {
                    let cause = outcomes[dep]
                        .skipped_because
                        .clone()
                        .unwrap_or_else(|| outcomes[dep].image.clone());
                    warn!(
                        "Skipping {} because its base {} was not built",
                        outcomes[node].image, outcomes[dep].image
                    );
                    outcomes[node].state = ImageState::Skipped;
                    outcomes[node].skipped_because = Some(cause);
                }
                None => {
                    outcomes[node].state = ImageState::Queued;
                    queued.push(node);
                }
            }
        }

        let results: Vec<(usize, Result<()>)> = futures_util::stream::iter(queued)
            .map(|node| async move {
                let result = images[node].build(client, options).await.map(|_| ());
                (node, result)
            })
            .buffer_unordered(parallelism)
            .collect()
            .await;

        for (node, result) in results {
            match result {
                Ok(()) => outcomes[node].state = ImageState::Built,
                Err(e) => {
                    warn!("{}", e);
                    outcomes[node].state = ImageState::Failed;
                    outcomes[node].error = Some(e);
                }
            }
        }

        debug!(layer = layer_idx, images = layer.len(), "Layer complete");
    }

    Ok(BuildReport { outcomes })
}

/// コレクションの順にプッシュ
///
/// レイヤーはビルド時にキャッシュ済みのため順序は問いません。
/// 失敗しても残りのプッシュを続行します。
pub async fn push_all(
    images: &[ImageDescriptor],
    client: &dyn ImageClient,
    options: &PushOptions,
) -> BuildReport {
    let mut outcomes = Vec::with_capacity(images.len());

    for image in images {
        let mut outcome = ImageOutcome::new(image.fqn());
        match image.push(client, options).await {
            Ok(_) => outcome.state = ImageState::Pushed,
            Err(e) => {
                warn!("{}", e);
                outcome.state = ImageState::Failed;
                outcome.error = Some(e);
            }
        }
        outcomes.push(outcome);
    }

    BuildReport { outcomes }
}

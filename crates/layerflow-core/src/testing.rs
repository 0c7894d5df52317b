//! テスト用の ImageClient

use crate::client::{BuildOptions, ImageClient, ImageHandle, PushOptions};
use crate::dockerfile::Dockerfile;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Build { tag: String, dockerfile: String },
    Push { tag: String },
}

/// 呼び出しを記録するクライアント
#[derive(Debug, Default)]
pub(crate) struct RecordingClient {
    calls: Mutex<Vec<Call>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 指定した fqn のビルド・プッシュを失敗させる
    pub(crate) fn failing(mut self, fqn: impl Into<String>) -> Self {
        self.failing.insert(fqn.into());
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn built(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Build { tag, .. } => Some(tag),
                Call::Push { .. } => None,
            })
            .collect()
    }

    pub(crate) fn pushed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Push { tag } => Some(tag),
                Call::Build { .. } => None,
            })
            .collect()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageClient for RecordingClient {
    async fn build_from_dockerfile(
        &self,
        dockerfile: &Dockerfile,
        tag: &str,
        _options: &BuildOptions,
    ) -> anyhow::Result<ImageHandle> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().unwrap().push(Call::Build {
            tag: tag.to_string(),
            dockerfile: dockerfile.to_string(),
        });
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(tag) {
            anyhow::bail!("build of {} failed", tag);
        }
        Ok(ImageHandle {
            tag: tag.to_string(),
            id: Some(format!("sha256:{}", tag.len())),
        })
    }

    async fn push(&self, tag: &str, options: &PushOptions) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(Call::Push {
            tag: options.target(tag),
        });

        if self.failing.contains(tag) {
            anyhow::bail!("push of {} failed", tag);
        }
        Ok(())
    }
}

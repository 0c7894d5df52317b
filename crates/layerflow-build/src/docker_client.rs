//! bollard による [`ImageClient`] 実装

use crate::builder::ImageBuilder;
use crate::context::ContextBuilder;
use crate::error::BuildResult;
use crate::pusher::ImagePusher;
use async_trait::async_trait;
use bollard::Docker;
use layerflow_core::{BuildOptions, Dockerfile, ImageClient, ImageHandle, PushOptions};

/// ローカルのDockerデーモンに対してビルド・プッシュを行うクライアント
pub struct DockerClient {
    builder: ImageBuilder,
    pusher: ImagePusher,
}

impl DockerClient {
    pub fn new(docker: Docker) -> Self {
        Self {
            builder: ImageBuilder::new(docker.clone()),
            pusher: ImagePusher::new(docker),
        }
    }

    /// ローカルのDockerに接続し、疎通を確認する
    pub async fn connect_local() -> BuildResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        docker.ping().await?;
        tracing::debug!("Connected to Docker daemon");
        Ok(Self::new(docker))
    }
}

#[async_trait]
impl ImageClient for DockerClient {
    async fn build_from_dockerfile(
        &self,
        dockerfile: &Dockerfile,
        tag: &str,
        options: &BuildOptions,
    ) -> anyhow::Result<ImageHandle> {
        let context_data = ContextBuilder::from_dockerfile(dockerfile, options.context_dir.as_deref())
            .map_err(anyhow::Error::new)?;

        let id = self
            .builder
            .build_image(context_data, tag, options)
            .await
            .map_err(anyhow::Error::new)?;

        Ok(ImageHandle {
            tag: tag.to_string(),
            id,
        })
    }

    async fn push(&self, tag: &str, options: &PushOptions) -> anyhow::Result<()> {
        let target = options.target(tag);
        if target != tag {
            self.pusher
                .tag(tag, &target)
                .await
                .map_err(anyhow::Error::new)?;
        }

        self.pusher
            .push(&target)
            .await
            .map_err(anyhow::Error::new)
    }
}

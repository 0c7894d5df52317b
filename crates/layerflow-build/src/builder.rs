//! イメージビルド処理

use crate::error::{BuildError, BuildResult};
use crate::progress::BuildProgress;
use bollard::Docker;
use bollard::models::BuildInfo;
use bytes::Bytes;
use futures_util::stream::StreamExt;
use http_body_util::{Either, Full};
use layerflow_core::BuildOptions;
use std::collections::HashMap;

pub struct ImageBuilder {
    docker: Docker,
}

impl ImageBuilder {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// コンテキストからイメージをビルドして `tag` を付ける
    ///
    /// ビルドされたイメージIDが分かればそれを返します。
    pub async fn build_image(
        &self,
        context_data: Vec<u8>,
        tag: &str,
        options: &BuildOptions,
    ) -> BuildResult<Option<String>> {
        tracing::info!("Building image: {}", tag);

        let build_args: HashMap<&str, &str> = options
            .build_args
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        #[allow(deprecated)]
        let build_options = bollard::image::BuildImageOptions {
            dockerfile: "Dockerfile",
            t: tag,
            buildargs: build_args,
            nocache: options.no_cache,
            rm: true,      // 中間コンテナを削除
            forcerm: true, // ビルド失敗時も中間コンテナを削除
            pull: options.pull,
            ..Default::default()
        };
        tracing::debug!("Build options: {:?}", build_options);

        let body = Full::new(Bytes::from(context_data));
        let mut stream = self
            .docker
            .build_image(build_options, None, Some(Either::Left(body)));

        let progress = BuildProgress::new(tag);
        let mut image_id = None;

        while let Some(msg) = stream.next().await {
            let output = match msg {
                Ok(output) => output,
                Err(e) => {
                    progress.finish_error(&e.to_string());
                    return Err(BuildError::DockerConnection(e));
                }
            };
            match handle_build_output(output, &progress) {
                Ok(Some(id)) => image_id = Some(id),
                Ok(None) => {}
                Err(e) => {
                    progress.finish_error(&e.to_string());
                    return Err(e);
                }
            }
        }

        progress.finish_success();
        tracing::info!("Successfully built: {}", tag);
        Ok(image_id)
    }
}

/// ビルド出力の処理
///
/// aux にイメージIDが含まれていれば返します。
fn handle_build_output(output: BuildInfo, progress: &BuildProgress) -> BuildResult<Option<String>> {
    if let Some(stream) = &output.stream {
        tracing::debug!("{}", stream.trim_end());
        progress.set_message(stream);
    }

    if let Some(error_detail) = output.error_detail {
        let error_msg = error_detail
            .message
            .unwrap_or_else(|| "Unknown build error".to_string());
        return Err(BuildError::BuildFailed(error_msg));
    }

    if let Some(error) = output.error {
        return Err(BuildError::BuildFailed(error));
    }

    if let Some(status) = &output.status {
        // ステータスメッセージ（ベースイメージのpullなど）
        progress.set_message(status);
    }

    Ok(output.aux.and_then(|aux| aux.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextBuilder;
    use layerflow_core::Dockerfile;

    #[tokio::test]
    #[ignore] // Docker接続が必要なため、通常のテストではスキップ
    async fn test_build_simple_image() {
        let docker = Docker::connect_with_local_defaults().unwrap();
        let builder = ImageBuilder::new(docker);

        let mut dockerfile = Dockerfile::new("alpine:latest");
        dockerfile.apply(&layerflow_core::dsl::cmd("echo test"));
        dockerfile.finalize();
        let context_data = ContextBuilder::from_dockerfile(&dockerfile, None).unwrap();

        let result = builder
            .build_image(context_data, "layerflow-test:latest", &BuildOptions::default())
            .await;
        assert!(result.is_ok());
    }
}

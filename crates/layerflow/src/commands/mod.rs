pub mod build;
pub mod dockerfile;
pub mod list;
pub mod push;
pub mod validate;

use colored::Colorize;
use layerflow_build::BuildError;
use layerflow_core::{BuildReport, ImageError};

/// ビルド/プッシュ結果を表示し、未完了ならエラーにする
pub fn report_outcome(
    result: layerflow_core::Result<BuildReport>,
    failure: &str,
) -> anyhow::Result<BuildReport> {
    match result {
        Ok(report) => {
            println!();
            println!("{}", report.summary().green());
            Ok(report)
        }
        Err(ImageError::Incomplete(report)) => {
            println!();
            println!("{}", report.summary().red());
            if let Some(error) = report.first_error() {
                tracing::debug!("first failure: {:?}", error);
                eprintln!();
                eprintln!("{}", "原因:".yellow());
                eprintln!("  {}", describe_error(error));
            }
            Err(anyhow::anyhow!("{}", failure))
        }
        Err(e) => Err(e.into()),
    }
}

/// Dockerクライアント由来のエラーはユーザー向けメッセージで表示
pub fn describe_error(error: &ImageError) -> String {
    match error {
        ImageError::Build { image, source } | ImageError::Push { image, source } => {
            let reason = source
                .downcast_ref::<BuildError>()
                .map(BuildError::user_message)
                .unwrap_or_else(|| format!("{:#}", source));
            format!("{}\n{}", image, reason)
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_describe_build_error_uses_user_message() {
        let error = ImageError::Build {
            image: "ursalab/amd64-ubuntu-18.04-cpp:latest".to_string(),
            source: anyhow::Error::new(BuildError::ContextFileNotFound(PathBuf::from(
                "docker/buildbot.tac",
            ))),
        };

        let message = describe_error(&error);
        assert!(message.starts_with("ursalab/amd64-ubuntu-18.04-cpp:latest"));
        assert!(message.contains("ADD するファイルが見つかりません"));
        assert!(message.contains("docker/buildbot.tac"));
    }

    #[test]
    fn test_describe_other_client_error() {
        let error = ImageError::Push {
            image: "ursalab/amd64-alpine-3.9-cpp:latest".to_string(),
            source: anyhow::anyhow!("denied"),
        };
        assert!(describe_error(&error).ends_with("denied"));
    }
}

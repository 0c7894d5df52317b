//! イメージプッシュ処理
//!
//! ビルド済みイメージにレジストリ用のタグを付け、プッシュします。

use crate::auth::RegistryAuth;
use crate::error::{BuildError, BuildResult};
use bollard::Docker;
use bollard::models::PushImageInfo;
use colored::Colorize;
use futures_util::StreamExt;
use std::io::Write;

/// イメージプッシュを実行するハンドラ
pub struct ImagePusher {
    docker: Docker,
    auth: RegistryAuth,
}

impl ImagePusher {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            auth: RegistryAuth::new(),
        }
    }

    /// 認証情報マネージャーを指定して作成
    pub fn with_auth(docker: Docker, auth: RegistryAuth) -> Self {
        Self { docker, auth }
    }

    /// `source` に `target`（`repo:tag`）を追加で付ける
    pub async fn tag(&self, source: &str, target: &str) -> BuildResult<()> {
        let (repo, tag) = split_image_tag(target);
        validate_tag(tag)?;

        tracing::debug!("Tagging {} as {}", source, target);

        #[allow(deprecated)]
        let options = bollard::image::TagImageOptions {
            repo: repo.to_string(),
            tag: tag.to_string(),
        };
        self.docker
            .tag_image(source, Some(options))
            .await
            .map_err(|e| BuildError::PushFailed {
                message: format!("Failed to tag {} as {}: {}", source, target, e),
            })
    }

    /// イメージ（`repo:tag`）をレジストリにプッシュ
    pub async fn push(&self, reference: &str) -> BuildResult<()> {
        let (repo, tag) = split_image_tag(reference);
        validate_tag(tag)?;

        let credentials = self.auth.credentials_for(reference)?;

        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> {
            tag: tag.to_string(),
        };

        println!("  → {}", reference.cyan());

        #[allow(deprecated)]
        let mut stream = self.docker.push_image(repo, Some(options), credentials);

        let mut error_message: Option<String> = None;
        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(err) = info.error {
                        error_message = Some(err);
                    } else {
                        handle_progress(&info);
                    }
                }
                Err(e) => {
                    return Err(BuildError::PushFailed {
                        message: e.to_string(),
                    });
                }
            }
        }

        if let Some(message) = error_message {
            return Err(BuildError::PushFailed { message });
        }

        tracing::info!("Pushed: {}", reference);
        Ok(())
    }
}

/// `repo:tag` をリポジトリとタグに分割
///
/// タグが無い場合は `latest` です。レジストリのポート（`localhost:5000/app`）は
/// タグとして扱いません。
pub fn split_image_tag(reference: &str) -> (&str, &str) {
    let name_start = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
    match reference[name_start..].rfind(':') {
        Some(i) => (&reference[..name_start + i], &reference[name_start + i + 1..]),
        None => (reference, "latest"),
    }
}

/// Docker タグの制約:
/// - 128文字以下
/// - 英数字、ピリオド、ハイフン、アンダースコアのみ
/// - 先頭はピリオドまたはハイフンではない
pub fn validate_tag(tag: &str) -> BuildResult<()> {
    if tag.is_empty() {
        return Err(BuildError::InvalidTag {
            tag: "(empty)".to_string(),
        });
    }

    if tag.len() > 128 {
        return Err(BuildError::InvalidTag {
            tag: format!("Tag too long ({} characters, max 128)", tag.len()),
        });
    }

    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(BuildError::InvalidTag {
            tag: tag.to_string(),
        });
    }

    if let Some(c) = tag
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '-' | '_'))
    {
        return Err(BuildError::InvalidTag {
            tag: format!("Invalid character '{}' in tag: {}", c, tag),
        });
    }

    Ok(())
}

fn handle_progress(info: &PushImageInfo) {
    let Some(status) = &info.status else {
        return;
    };

    match status.as_str() {
        "Pushing" => {
            let progress = info.progress.as_deref().unwrap_or("");
            print!("\r  ↑ {} {}     ", status, progress);
            std::io::stdout().flush().ok();
        }
        "Pushed" => println!("\r  {} Pushed                    ", "✓".green()),
        "Layer already exists" => println!("\r  {} Layer already exists      ", "✓".green()),
        "Preparing" | "Waiting" => {}
        _ => tracing::debug!("push: {}", status),
    }
}

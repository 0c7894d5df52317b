//! ビルドコンテキスト作成
//!
//! 生成したDockerfileと、ADD で参照されるファイルだけを含む tar.gz を作成します。

use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use layerflow_core::Dockerfile;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tar::{Builder, Header};

/// 警告を出すコンテキストサイズ
const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

pub struct ContextBuilder;

impl ContextBuilder {
    /// Dockerfileからビルドコンテキストを作成
    ///
    /// 相対パスのファイルは `context_dir`（未指定ならカレントディレクトリ）を基準に解決します。
    pub fn from_dockerfile(dockerfile: &Dockerfile, context_dir: Option<&Path>) -> BuildResult<Vec<u8>> {
        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);

            append_bytes(&mut tar, "Dockerfile", dockerfile.text().as_bytes())?;

            // アーカイブ内のパス -> ホスト側のパス
            let mut added: HashMap<&str, PathBuf> = HashMap::new();
            for file in dockerfile.context_files() {
                let source = resolve(&file.source, context_dir);

                if let Some(existing) = added.get(file.archive_path.as_str()) {
                    if existing == &source {
                        continue;
                    }
                    return Err(BuildError::InvalidConfig(format!(
                        "`{}` and `{}` would both be added as `{}`",
                        existing.display(),
                        source.display(),
                        file.archive_path
                    )));
                }

                if !source.is_file() {
                    return Err(BuildError::ContextFileNotFound(source));
                }
                tracing::debug!(
                    "Adding {} to build context as {}",
                    source.display(),
                    file.archive_path
                );
                tar.append_path_with_name(&source, &file.archive_path)?;
                added.insert(file.archive_path.as_str(), source);
            }

            tar.into_inner()?.finish()?;
        }

        tracing::debug!("Build context created: {} bytes", archive_data.len());
        check_context_size(archive_data.len());

        Ok(archive_data)
    }
}

fn resolve(source: &Path, context_dir: Option<&Path>) -> PathBuf {
    match context_dir {
        Some(dir) if source.is_relative() => dir.join(source),
        _ => source.to_path_buf(),
    }
}

fn append_bytes<W: std::io::Write>(tar: &mut Builder<W>, path: &str, data: &[u8]) -> BuildResult<()> {
    let mut header = Header::new_gnu();
    header
        .set_path(path)
        .map_err(|e| BuildError::InvalidConfig(format!("Failed to set {} path: {}", path, e)))?;
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    tar.append(&header, data)?;
    Ok(())
}

fn check_context_size(size: usize) {
    if size > MAX_CONTEXT_SIZE {
        tracing::warn!(
            "警告: ビルドコンテキストが大きすぎます（{}MB）",
            size / 1024 / 1024
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerflow_core::dsl::{add, add_to, run};
    use std::fs;
    use std::io::Read;
    use tempfile::tempdir;

    fn unpack(archive: Vec<u8>) -> HashMap<String, String> {
        let decoder = flate2::read::GzDecoder::new(std::io::Cursor::new(archive));
        let mut tar = tar::Archive::new(decoder);
        let mut entries = HashMap::new();
        for entry in tar.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            entries.insert(path, content);
        }
        entries
    }

    #[test]
    fn test_context_contains_dockerfile_and_added_files() {
        let temp_dir = tempdir().unwrap();
        fs::create_dir(temp_dir.path().join("docker")).unwrap();
        fs::write(temp_dir.path().join("docker/buildbot.tac"), "application = None").unwrap();

        let mut dockerfile = Dockerfile::new("ubuntu:18.04");
        dockerfile.apply(&add_to("docker/buildbot.tac", "/buildbot/buildbot.tac"));
        dockerfile.apply(&run("echo ok"));
        dockerfile.finalize();

        let archive = ContextBuilder::from_dockerfile(&dockerfile, Some(temp_dir.path())).unwrap();
        let entries = unpack(archive);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries["Dockerfile"], dockerfile.text());
        assert_eq!(entries["buildbot.tac"], "application = None");
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = tempdir().unwrap();

        let mut dockerfile = Dockerfile::new("ubuntu:18.04");
        dockerfile.apply(&add("requirements.txt"));
        dockerfile.finalize();

        let result = ContextBuilder::from_dockerfile(&dockerfile, Some(temp_dir.path()));
        assert!(matches!(result, Err(BuildError::ContextFileNotFound(_))));
    }

    #[test]
    fn test_conflicting_basenames() {
        let temp_dir = tempdir().unwrap();
        for dir in ["a", "b"] {
            fs::create_dir(temp_dir.path().join(dir)).unwrap();
            fs::write(temp_dir.path().join(dir).join("requirements.txt"), dir).unwrap();
        }

        let mut dockerfile = Dockerfile::new("ubuntu:18.04");
        dockerfile.apply(&add("a/requirements.txt"));
        dockerfile.apply(&add("b/requirements.txt"));
        dockerfile.finalize();

        let result = ContextBuilder::from_dockerfile(&dockerfile, Some(temp_dir.path()));
        assert!(matches!(result, Err(BuildError::InvalidConfig(_))));
    }

    #[test]
    fn test_same_file_added_twice() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("install.sh"), "#!/bin/sh").unwrap();

        let mut dockerfile = Dockerfile::new("ubuntu:18.04");
        dockerfile.apply(&add("install.sh"));
        dockerfile.apply(&add_to("install.sh", "/opt/install.sh"));
        dockerfile.finalize();

        let archive = ContextBuilder::from_dockerfile(&dockerfile, Some(temp_dir.path())).unwrap();
        assert_eq!(unpack(archive).len(), 2);
    }
}

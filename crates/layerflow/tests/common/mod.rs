use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const IMAGES_KDL: &str = r#"
organization "ursalab"

image "cpp" {
    base "ubuntu:18.04"
    arch "amd64" "arm64v8"
    os "ubuntu-18.04"
    title "Ubuntu C++"
    steps {
        run { apt "cmake" "ninja-build" }
    }
}

image "python" from="cpp" {
    steps {
        run "pip install six"
        cmd "python"
    }
}
"#;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn with_images(content: &str) -> Self {
        let project = Self::new();
        project.write_images_kdl(content);
        project
    }

    pub fn write_images_kdl(&self, content: &str) {
        fs::write(self.root.path().join("images.kdl"), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    /// ホームディレクトリや環境変数の設定に影響されない layerflow コマンド
    pub fn command(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("layerflow").unwrap();
        cmd.current_dir(self.path())
            .env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join(".config"))
            .env("LAYERFLOW_SETTINGS_PATH", self.path().join("no-settings.yaml"))
            .env("NO_COLOR", "1")
            .env_remove("LAYERFLOW_IMAGES_PATH")
            .env_remove("RUST_LOG");
        cmd
    }
}

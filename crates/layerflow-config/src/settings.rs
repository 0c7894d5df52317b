//! ユーザー設定 (`config.yaml`)

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 設定ファイルのパスを上書きする環境変数
pub const SETTINGS_PATH_ENV: &str = "LAYERFLOW_SETTINGS_PATH";

/// CLIのデフォルト値を与える設定
///
/// すべてのフィールドは省略可能で、CLI引数が指定されればそちらが優先されます。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// イメージ定義に organization が無い場合に使う組織名
    pub organization: Option<String>,
    /// 同時ビルド数
    pub parallelism: Option<usize>,
    /// ADD のソースパスを解決する基準ディレクトリ
    pub context_dir: Option<PathBuf>,
    pub no_cache: bool,
    pub pull: bool,
}

impl Settings {
    /// 既定の場所から設定を読み込む。ファイルが無ければデフォルト値
    pub fn load() -> Result<Self> {
        match settings_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Settings file not found: {}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let settings = serde_yaml::from_str(&content).map_err(|source| ConfigError::InvalidSettings {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }
}

/// `LAYERFLOW_SETTINGS_PATH`、なければ `~/.config/layerflow/config.yaml`
pub fn settings_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(SETTINGS_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("layerflow").join("config.yaml"))
}

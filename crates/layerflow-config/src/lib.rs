pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{SETTINGS_PATH_ENV, Settings, settings_path};

use std::path::PathBuf;

/// イメージ定義ファイルのパスを直接指定する環境変数
pub const IMAGES_PATH_ENV: &str = "LAYERFLOW_IMAGES_PATH";

const CANDIDATES: [&str; 2] = ["images.local.kdl", "images.kdl"];

/// layerflowの設定ディレクトリを取得（無ければ作成）
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("layerflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// プロジェクトのimages.kdlファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 LAYERFLOW_IMAGES_PATH (直接パス指定)
/// 2. カレントディレクトリ: images.local.kdl, images.kdl
/// 3. ./.layerflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/layerflow/images.kdl (グローバル設定)
pub fn find_images_file() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(IMAGES_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points to a missing file: {}", IMAGES_PATH_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;
    for dir in [current_dir.clone(), current_dir.join(".layerflow")] {
        if let Some(path) = CANDIDATES
            .iter()
            .map(|filename| dir.join(filename))
            .find(|path| path.is_file())
        {
            return Ok(path);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("layerflow").join("images.kdl");
        if global.is_file() {
            return Ok(global);
        }
    }

    Err(ConfigError::ImagesFileNotFound)
}

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "イメージ定義ファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: images.local.kdl, images.kdl\n\
        - ./.layerflow/ ディレクトリ\n\
        - ~/.config/layerflow/images.kdl\n\
        または LAYERFLOW_IMAGES_PATH 環境変数で直接指定できます"
    )]
    ImagesFileNotFound,

    #[error("設定ファイルの形式が不正です ({path}): {source}")]
    InvalidSettings {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

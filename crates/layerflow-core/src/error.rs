use crate::executor::BuildReport;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("無効なイメージ定義: {0}")]
    Validation(String),

    #[error("循環依存が検出されました: {}", images.join(", "))]
    CyclicDependency { images: Vec<String> },

    #[error("イメージのビルドに失敗しました: {image}\n理由: {source}")]
    Build {
        image: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("イメージのプッシュに失敗しました: {image}\n理由: {source}")]
    Push {
        image: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("条件に一致するイメージが見つかりません")]
    NotFound,

    #[error("条件に一致するイメージが複数あります: {}", .0.join(", "))]
    Ambiguous(Vec<String>),

    #[error("{}", .0.summary())]
    Incomplete(Box<BuildReport>),

    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("イメージ定義エラー: {0}")]
    InvalidDefinition(String),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ImageError>;

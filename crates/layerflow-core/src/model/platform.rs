//! プラットフォーム定義

use crate::error::ImageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// サポートするDockerアーキテクチャ
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Amd64,
    Arm64v8,
}

impl Architecture {
    pub const ALL: [Architecture; 2] = [Architecture::Amd64, Architecture::Arm64v8];

    /// 文字列からパース
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "amd64" => Some(Self::Amd64),
            "arm64v8" => Some(Self::Arm64v8),
            _ => None,
        }
    }

    /// Dockerのイメージ名で使用する文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64v8 => "arm64v8",
        }
    }
}

impl FromStr for Architecture {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            ImageError::Validation(format!(
                "未対応のアーキテクチャです: `{}`（amd64, arm64v8 のみ指定できます）",
                s
            ))
        })
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// (architecture, os, variant) の組
///
/// イメージのグループ化や継承チェックのキーとして使用します。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Platform {
    pub architecture: Architecture,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Platform {
    pub fn new(architecture: Architecture, os: impl Into<String>) -> Self {
        Self {
            architecture,
            os: os.into(),
            variant: None,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// リポジトリ名に埋め込まれるセグメント
    ///
    /// 例: `amd64-ubuntu-18.04`, `amd64-ubuntu-18.04-conda`
    pub fn segment(&self) -> String {
        match &self.variant {
            Some(variant) => format!("{}-{}-{}", self.architecture, self.os, variant),
            None => format!("{}-{}", self.architecture, self.os),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segment())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_parse() {
        assert_eq!(Architecture::parse("amd64"), Some(Architecture::Amd64));
        assert_eq!(Architecture::parse("arm64v8"), Some(Architecture::Arm64v8));
        assert_eq!(Architecture::parse("arm32v7"), None);
        assert_eq!(Architecture::parse("AMD64"), None);
    }

    #[test]
    fn test_architecture_from_str_rejects_unknown() {
        for invalid in ["arm32v7", "x86", "", "i386"] {
            let result = invalid.parse::<Architecture>();
            assert!(matches!(result, Err(ImageError::Validation(_))), "{invalid}");
        }
    }

    #[test]
    fn test_platform_segment() {
        let plain = Platform::new(Architecture::Amd64, "ubuntu-18.04");
        assert_eq!(plain.segment(), "amd64-ubuntu-18.04");

        let conda = Platform::new(Architecture::Arm64v8, "ubuntu-18.04").with_variant("conda");
        assert_eq!(conda.segment(), "arm64v8-ubuntu-18.04-conda");
    }
}

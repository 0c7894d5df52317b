//! Dockerfile バッファ

use crate::dsl::{ContextFile, Instruction};
use std::fmt;
use std::path::Path;

/// 生成途中または生成済みのDockerfile
///
/// `FROM` 行から始まり、[`apply`](Self::apply) された命令を順に追記します。
/// WORKDIR / USER は現在値として保持されます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dockerfile {
    base: String,
    text: String,
    workdir: Option<String>,
    user: Option<String>,
    context_files: Vec<ContextFile>,
}

impl Dockerfile {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        let text = format!("FROM {}\n\n", base);
        Self {
            base,
            text,
            workdir: None,
            user: None,
            context_files: Vec::new(),
        }
    }

    /// 命令を1つ追記
    ///
    /// RUN は後ろに空行を入れて独立したブロックにします。
    pub fn apply(&mut self, instruction: &Instruction) {
        self.text.push_str(instruction.keyword());
        self.text.push(' ');
        self.text.push_str(&instruction.arguments());
        self.text.push('\n');

        match instruction {
            Instruction::Run { .. } => self.text.push('\n'),
            Instruction::Workdir { path } => self.workdir = Some(path.clone()),
            Instruction::User { name } => self.user = Some(name.clone()),
            Instruction::Add { file, .. } => self.context_files.push(file.clone()),
            _ => {}
        }
    }

    /// 末尾の空白を整理して改行1つで終える
    pub fn finalize(&mut self) {
        let trimmed = self.text.trim_end().len();
        self.text.truncate(trimmed);
        self.text.push('\n');
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn workdir(&self) -> Option<&str> {
        self.workdir.as_deref()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// ADD されたローカルファイル
    pub fn context_files(&self) -> &[ContextFile] {
        &self.context_files
    }

    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, &self.text)
    }
}

impl fmt::Display for Dockerfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

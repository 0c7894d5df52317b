//! Dockerfile DSL
//!
//! 各関数は [`Instruction`] の値を返すだけで、バッファには触れません。
//! 値は [`Dockerfile`](crate::dockerfile::Dockerfile) によって順番に適用されます。
//!
//! ```
//! use layerflow_core::dsl::{apt, cmd, env, run, workdir};
//!
//! let steps = vec![
//!     run(apt(["python3", "python3-pip"])),
//!     env([("PATH", "/opt/conda/bin:$PATH")]),
//!     workdir("/buildbot"),
//!     cmd(["python3"]),
//! ];
//! assert_eq!(steps.len(), 4);
//! ```

mod shell;

pub use shell::{apk, apt, conda, mkdir, pip, symlink};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// RUN / CMD / ENTRYPOINT の引数
///
/// 文字列はシェル形式、リストはexec形式（JSON配列）として出力されます。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Shell(String),
    Exec(Vec<String>),
}

impl Command {
    pub fn is_shell(&self) -> bool {
        matches!(self, Command::Shell(_))
    }

    /// 命令の引数部分を描画
    pub fn render(&self) -> String {
        match self {
            Command::Shell(line) => line.trim_end().to_string(),
            Command::Exec(args) => exec_form(args),
        }
    }
}

impl From<&str> for Command {
    fn from(line: &str) -> Self {
        Command::Shell(line.to_string())
    }
}

impl From<String> for Command {
    fn from(line: String) -> Self {
        Command::Shell(line)
    }
}

impl From<Vec<String>> for Command {
    fn from(args: Vec<String>) -> Self {
        Command::Exec(args)
    }
}

impl From<Vec<&str>> for Command {
    fn from(args: Vec<&str>) -> Self {
        Command::Exec(args.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Command {
    fn from(args: &[&str]) -> Self {
        Command::Exec(args.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Command {
    fn from(args: [&str; N]) -> Self {
        Command::Exec(args.iter().map(|s| s.to_string()).collect())
    }
}

/// ビルドコンテキストに追加されるローカルファイル
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextFile {
    /// ホスト側のパス
    pub source: PathBuf,
    /// コンテキスト（tarアーカイブ）内のパス
    pub archive_path: String,
}

/// Dockerfileの1命令
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    Add { file: ContextFile, dest: String },
    CopyFrom {
        image: String,
        src: String,
        dest: String,
    },
    Run { command: Command },
    Env { pairs: Vec<(String, String)> },
    Cmd { command: Command },
    Entrypoint { command: Command },
    Shell { argv: Vec<String> },
    Workdir { path: String },
    User { name: String },
}

impl Instruction {
    /// 命令のキーワード（`RUN`, `ENV` など）
    pub fn keyword(&self) -> &'static str {
        match self {
            Instruction::Add { .. } => "ADD",
            Instruction::CopyFrom { .. } => "COPY",
            Instruction::Run { .. } => "RUN",
            Instruction::Env { .. } => "ENV",
            Instruction::Cmd { .. } => "CMD",
            Instruction::Entrypoint { .. } => "ENTRYPOINT",
            Instruction::Shell { .. } => "SHELL",
            Instruction::Workdir { .. } => "WORKDIR",
            Instruction::User { .. } => "USER",
        }
    }

    /// キーワードに続く引数部分を描画
    pub fn arguments(&self) -> String {
        match self {
            Instruction::Add { file, dest } => format!("{} {}", file.archive_path, dest),
            Instruction::CopyFrom { image, src, dest } => {
                format!("--from={} {} {}", image, src, dest)
            }
            Instruction::Run { command }
            | Instruction::Cmd { command }
            | Instruction::Entrypoint { command } => command.render(),
            Instruction::Env { pairs } => {
                let lines: Vec<String> = pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                shell::indent(&lines.join(" \\\n"), shell::TAB)
                    .trim_start()
                    .to_string()
            }
            Instruction::Shell { argv } => exec_form(argv),
            Instruction::Workdir { path } => path.clone(),
            Instruction::User { name } => name.clone(),
        }
    }

    /// ビルドコンテキストに必要なファイル
    pub fn context_file(&self) -> Option<&ContextFile> {
        match self {
            Instruction::Add { file, .. } => Some(file),
            _ => None,
        }
    }
}

fn exec_form(args: &[String]) -> String {
    let quoted: Vec<String> = args
        .iter()
        .map(|arg| serde_json::Value::from(arg.as_str()).to_string())
        .collect();
    format!("[{}]", quoted.join(", "))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// `ADD <basename> /<basename>`
pub fn add(src: impl AsRef<Path>) -> Instruction {
    let name = file_name(src.as_ref());
    let dest = format!("/{}", name);
    add_to(src, dest)
}

/// `ADD <basename> <dest>`
pub fn add_to(src: impl AsRef<Path>, dest: impl Into<String>) -> Instruction {
    let source = src.as_ref().to_path_buf();
    Instruction::Add {
        file: ContextFile {
            archive_path: file_name(&source),
            source,
        },
        dest: dest.into(),
    }
}

/// `COPY --from=<image> <src> <dest>`
pub fn copy_from(
    image: impl Into<String>,
    src: impl Into<String>,
    dest: impl Into<String>,
) -> Instruction {
    Instruction::CopyFrom {
        image: image.into(),
        src: src.into(),
        dest: dest.into(),
    }
}

pub fn run(command: impl Into<Command>) -> Instruction {
    Instruction::Run {
        command: command.into(),
    }
}

/// 全ての組を1つの `ENV` 命令にまとめる
pub fn env<I, K, V>(pairs: I) -> Instruction
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    Instruction::Env {
        pairs: pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect(),
    }
}

pub fn cmd(command: impl Into<Command>) -> Instruction {
    Instruction::Cmd {
        command: command.into(),
    }
}

pub fn entrypoint(command: impl Into<Command>) -> Instruction {
    Instruction::Entrypoint {
        command: command.into(),
    }
}

/// SHELL はexec形式のみ
pub fn shell<I, S>(argv: I) -> Instruction
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Instruction::Shell {
        argv: argv.into_iter().map(Into::into).collect(),
    }
}

pub fn workdir(path: impl Into<String>) -> Instruction {
    Instruction::Workdir { path: path.into() }
}

pub fn user(name: impl Into<String>) -> Instruction {
    Instruction::User { name: name.into() }
}

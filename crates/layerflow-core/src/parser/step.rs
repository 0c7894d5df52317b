//! steps ブロックのパース

use super::{first_string, string_args, string_prop, string_props};
use crate::dsl::{self, Command, Instruction};
use crate::error::{ImageError, Result};
use kdl::{KdlDocument, KdlNode};
use std::path::Path;

/// steps ブロックをパース
///
/// `run { ... }` の子ノードはそれぞれ独立した RUN 命令になります。
pub fn parse_steps(doc: &KdlDocument, base_dir: &Path) -> Result<Vec<Instruction>> {
    let mut steps = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "run" => {
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        steps.push(dsl::run(parse_snippet(child)?));
                    }
                } else {
                    steps.push(dsl::run(parse_command(node)?));
                }
            }
            "cmd" => steps.push(dsl::cmd(parse_command(node)?)),
            "entrypoint" => steps.push(dsl::entrypoint(parse_command(node)?)),
            "shell" => {
                let argv = string_args(node);
                if argv.is_empty() {
                    return Err(missing_argument(node));
                }
                steps.push(dsl::shell(argv));
            }
            "env" => steps.push(parse_env(node)?),
            "add" => {
                let args = string_args(node);
                let src = args.first().ok_or_else(|| missing_argument(node))?;
                let source = base_dir.join(src);
                match args.get(1) {
                    Some(dest) => steps.push(dsl::add_to(source, dest.clone())),
                    None => steps.push(dsl::add(source)),
                }
            }
            "copy" => {
                let image = string_prop(node, "from").ok_or_else(|| {
                    ImageError::InvalidDefinition("copy requires from=\"<image>\"".to_string())
                })?;
                let args = string_args(node);
                let [src, dest] = args.as_slice() else {
                    return Err(ImageError::InvalidDefinition(
                        "copy requires <src> and <dest>".to_string(),
                    ));
                };
                steps.push(dsl::copy_from(image, src.clone(), dest.clone()));
            }
            "workdir" => {
                let path = first_string(node).ok_or_else(|| missing_argument(node))?;
                steps.push(dsl::workdir(path));
            }
            "user" => {
                let user = first_string(node).ok_or_else(|| missing_argument(node))?;
                steps.push(dsl::user(user));
            }
            other => {
                return Err(ImageError::InvalidDefinition(format!(
                    "unknown step `{}`",
                    other
                )));
            }
        }
    }

    Ok(steps)
}

/// 引数1つはシェル形式、複数（または `exec=#true`）はexec形式
fn parse_command(node: &KdlNode) -> Result<Command> {
    let args = string_args(node);
    let force_exec = node.get("exec").and_then(|v| v.as_bool()).unwrap_or(false);

    match args.len() {
        0 => Err(missing_argument(node)),
        1 if !force_exec => Ok(Command::Shell(args[0].clone())),
        _ => Ok(Command::Exec(args)),
    }
}

/// `env KEY="VALUE"` または `env "KEY=VALUE"`
fn parse_env(node: &KdlNode) -> Result<Instruction> {
    let mut pairs = Vec::new();

    for entry in node.entries() {
        let Some(value) = entry.value().as_string() else {
            continue;
        };
        match entry.name() {
            Some(key) => pairs.push((key.value().to_string(), value.to_string())),
            None => {
                let (key, value) = value.split_once('=').ok_or_else(|| {
                    ImageError::InvalidDefinition(format!("env expects KEY=VALUE, got `{}`", value))
                })?;
                pairs.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
    }

    if pairs.is_empty() {
        return Err(missing_argument(node));
    }
    Ok(dsl::env(pairs))
}

/// `run` ブロック内のショートカット
fn parse_snippet(node: &KdlNode) -> Result<String> {
    let args = string_args(node);
    let snippet = match node.name().value() {
        "apt" => dsl::apt(&args),
        "apk" => dsl::apk(&args),
        "pip" => dsl::pip(&args, string_props(node, "file")),
        "conda" => dsl::conda(&args, string_props(node, "file")),
        "symlink" => {
            let [target, original] = args.as_slice() else {
                return Err(ImageError::InvalidDefinition(
                    "symlink requires <target> and <original>".to_string(),
                ));
            };
            dsl::symlink([(target, original)])
        }
        "mkdir" => {
            let path = args.first().ok_or_else(|| missing_argument(node))?;
            dsl::mkdir(path)
        }
        "sh" => {
            let line = args.first().ok_or_else(|| missing_argument(node))?;
            line.clone()
        }
        other => {
            return Err(ImageError::InvalidDefinition(format!(
                "unknown run shortcut `{}`",
                other
            )));
        }
    };
    Ok(snippet)
}

fn missing_argument(node: &KdlNode) -> ImageError {
    ImageError::InvalidDefinition(format!("`{}` requires an argument", node.name().value()))
}

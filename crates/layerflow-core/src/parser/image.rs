//! image ノードのパース

use super::step::parse_steps;
use super::{first_string, string_args, string_prop};
use crate::error::{ImageError, Result};
use crate::model::{Architecture, Base, ImageDescriptor};
use kdl::KdlNode;
use std::path::Path;

pub(super) struct ImageContext<'a> {
    pub base_dir: &'a Path,
    /// ファイル内で指定された organization
    pub organization: Option<String>,
    /// これまでに定義されたイメージ（定義順）
    pub defined: Vec<ImageDescriptor>,
}

#[derive(Default)]
struct ImageFields {
    base: Option<String>,
    architectures: Vec<String>,
    os: Option<String>,
    variant: Option<String>,
    title: Option<String>,
    runtime: Option<String>,
    tag: Option<String>,
    organization: Option<String>,
}

/// image ノードをパース
///
/// `arch` に複数の値を指定した場合はアーキテクチャごとにイメージを生成します。
/// `from="<name>"` は同じアーキテクチャで直近に定義された同名イメージをベースにします。
pub(super) fn parse_image(node: &KdlNode, ctx: &ImageContext<'_>) -> Result<Vec<ImageDescriptor>> {
    let name = first_string(node)
        .ok_or_else(|| ImageError::InvalidDefinition("image requires a name".to_string()))?
        .to_string();

    let from = string_prop(node, "from");
    let from_tag = string_prop(node, "from-tag");

    let mut fields = ImageFields::default();
    let mut steps = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "base" => fields.base = first_string(child).map(|s| s.to_string()),
                "arch" | "architecture" => fields.architectures = string_args(child),
                "os" => fields.os = first_string(child).map(|s| s.to_string()),
                "variant" => fields.variant = first_string(child).map(|s| s.to_string()),
                "title" => fields.title = first_string(child).map(|s| s.to_string()),
                "runtime" => fields.runtime = first_string(child).map(|s| s.to_string()),
                "tag" => fields.tag = first_string(child).map(|s| s.to_string()),
                "organization" => {
                    fields.organization = first_string(child).map(|s| s.to_string())
                }
                "steps" => {
                    if let Some(step_nodes) = child.children() {
                        steps = parse_steps(step_nodes, ctx.base_dir)?;
                    }
                }
                other => {
                    return Err(ImageError::InvalidDefinition(format!(
                        "image `{}`: unknown field `{}`",
                        name, other
                    )));
                }
            }
        }
    }

    let bases: Vec<(Option<String>, Base)> = match (from, &fields.base) {
        (Some(_), Some(_)) => {
            return Err(ImageError::InvalidDefinition(format!(
                "image `{}`: `from` and `base` cannot be used together",
                name
            )));
        }
        (None, None) => {
            return Err(ImageError::InvalidDefinition(format!(
                "image `{}` requires either `from` or `base`",
                name
            )));
        }
        (None, Some(literal)) => {
            if fields.architectures.is_empty() {
                return Err(ImageError::Validation(format!(
                    "イメージ `{}` の architecture が指定されていません",
                    name
                )));
            }
            fields
                .architectures
                .iter()
                .map(|arch| (Some(arch.clone()), Base::Literal(literal.clone())))
                .collect()
        }
        (Some(base_name), None) => resolve_managed_bases(&name, base_name, from_tag, &fields, ctx)?,
    };

    bases
        .into_iter()
        .map(|(arch, base)| {
            let mut builder = ImageDescriptor::builder(name.clone(), base).steps(steps.clone());
            if let Some(arch) = arch {
                builder = builder.architecture(arch);
            }
            if let Some(os) = &fields.os {
                builder = builder.os(os.clone());
            }
            if let Some(variant) = &fields.variant {
                builder = builder.variant(variant.clone());
            }
            if let Some(title) = &fields.title {
                builder = builder.title(title.clone());
            }
            if let Some(runtime) = &fields.runtime {
                builder = builder.runtime(runtime.clone());
            }
            if let Some(tag) = &fields.tag {
                builder = builder.tag(tag.clone());
            }
            // 明示指定 > ファイルの organization > ベースから継承
            if let Some(organization) = fields.organization.as_ref().or(ctx.organization.as_ref()) {
                builder = builder.organization(organization.clone());
            }
            builder.finish()
        })
        .collect()
}

/// `from` で参照されたベースイメージをアーキテクチャごとに解決
fn resolve_managed_bases(
    name: &str,
    base_name: &str,
    base_tag: Option<&str>,
    fields: &ImageFields,
    ctx: &ImageContext<'_>,
) -> Result<Vec<(Option<String>, Base)>> {
    let candidates: Vec<&ImageDescriptor> = ctx
        .defined
        .iter()
        .filter(|image| image.name() == base_name)
        .filter(|image| base_tag.is_none_or(|tag| image.tag() == tag))
        .filter(|image| fields.os.as_deref().is_none_or(|os| image.os() == os))
        .collect();

    if candidates.is_empty() {
        return Err(ImageError::InvalidDefinition(format!(
            "image `{}`: base image `{}` is not defined before it",
            name, base_name
        )));
    }

    let architectures: Vec<Architecture> = if fields.architectures.is_empty() {
        let mut seen = Vec::new();
        for image in &candidates {
            if !seen.contains(&image.architecture()) {
                seen.push(image.architecture());
            }
        }
        seen
    } else {
        fields
            .architectures
            .iter()
            .map(|arch| arch.parse::<Architecture>())
            .collect::<Result<_>>()?
    };

    architectures
        .into_iter()
        .map(|arch| {
            let base = candidates
                .iter()
                .rev()
                .find(|image| image.architecture() == arch)
                .ok_or_else(|| {
                    ImageError::InvalidDefinition(format!(
                        "image `{}`: base image `{}` is not defined for {}",
                        name, base_name, arch
                    ))
                })?;
            Ok((None, Base::from(*base)))
        })
        .collect()
}

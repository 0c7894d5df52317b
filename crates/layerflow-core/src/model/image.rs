//! イメージ定義

use super::platform::{Architecture, Platform};
use crate::client::{BuildOptions, ImageClient, PushOptions};
use crate::dockerfile::Dockerfile;
use crate::dsl::{ContextFile, Instruction};
use crate::error::{ImageError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// organization を指定しない場合の既定値
pub const DEFAULT_ORGANIZATION: &str = "layerflow";

/// tag を指定しない場合の既定値
pub const DEFAULT_TAG: &str = "latest";

/// 管理対象イメージへの参照
///
/// ベースイメージとして使用する際の検索キーです。
/// 参照先の所有権は持たず、fqn だけでコレクション内のイメージを特定します。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub organization: String,
    pub name: String,
    pub tag: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
}

impl ImageRef {
    /// `{architecture}-{os}[-{variant}]-{name}`
    pub fn repo(&self) -> String {
        format!("{}-{}", self.platform.segment(), self.name)
    }

    /// `{organization}/{repo}:{tag}`
    pub fn fqn(&self) -> String {
        format!("{}/{}:{}", self.organization, self.repo(), self.tag)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqn())
    }
}

/// ベースイメージ
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Base {
    /// 外部イメージ（例: `amd64/ubuntu:18.04`）
    Literal(String),
    /// 同じコレクションで管理されるイメージ
    Image(ImageRef),
}

impl Base {
    pub fn as_image(&self) -> Option<&ImageRef> {
        match self {
            Base::Image(reference) => Some(reference),
            Base::Literal(_) => None,
        }
    }

    pub fn is_managed(&self) -> bool {
        self.as_image().is_some()
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Base::Literal(image) => f.write_str(image),
            Base::Image(reference) => write!(f, "{}", reference),
        }
    }
}

impl From<&str> for Base {
    fn from(image: &str) -> Self {
        Base::Literal(image.to_string())
    }
}

impl From<String> for Base {
    fn from(image: String) -> Self {
        Base::Literal(image)
    }
}

impl From<ImageRef> for Base {
    fn from(reference: ImageRef) -> Self {
        Base::Image(reference)
    }
}

impl From<&ImageDescriptor> for Base {
    fn from(image: &ImageDescriptor) -> Self {
        Base::Image(image.reference())
    }
}

/// ビルド可能な1つのコンテナイメージ
///
/// [`ImageDescriptor::builder`] で作成し、以降は変更できません。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageDescriptor {
    name: String,
    base: Base,
    tag: String,
    organization: String,
    platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    runtime: Option<String>,
    steps: Vec<Instruction>,
}

impl ImageDescriptor {
    pub fn builder(name: impl Into<String>, base: impl Into<Base>) -> ImageDescriptorBuilder {
        ImageDescriptorBuilder::new(name, base)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> &Base {
        &self.base
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn architecture(&self) -> Architecture {
        self.platform.architecture
    }

    pub fn os(&self) -> &str {
        &self.platform.os
    }

    pub fn variant(&self) -> Option<&str> {
        self.platform.variant.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn runtime(&self) -> Option<&str> {
        self.runtime.as_deref()
    }

    pub fn steps(&self) -> &[Instruction] {
        &self.steps
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn repo(&self) -> String {
        format!("{}-{}", self.platform.segment(), self.name)
    }

    pub fn fqn(&self) -> String {
        format!("{}/{}:{}", self.organization, self.repo(), self.tag)
    }

    /// 他のイメージのベースとして使用する参照
    pub fn reference(&self) -> ImageRef {
        ImageRef {
            organization: self.organization.clone(),
            name: self.name.clone(),
            tag: self.tag.clone(),
            platform: self.platform.clone(),
            title: self.title.clone(),
            runtime: self.runtime.clone(),
        }
    }

    /// Dockerfileを生成
    ///
    /// 呼び出しごとに新しいバッファを作るため、何度呼んでも同じ結果になります。
    pub fn render_dockerfile(&self) -> Dockerfile {
        let mut dockerfile = Dockerfile::new(self.base.to_string());
        for step in &self.steps {
            dockerfile.apply(step);
        }
        dockerfile.finalize();
        dockerfile
    }

    /// 全ステップ適用後の WORKDIR
    pub fn workdir(&self) -> Option<String> {
        self.render_dockerfile().workdir().map(str::to_string)
    }

    /// 全ステップ適用後の USER
    pub fn user(&self) -> Option<String> {
        self.render_dockerfile().user().map(str::to_string)
    }

    /// ビルドコンテキストに含めるローカルファイル
    pub fn context_files(&self) -> Vec<&ContextFile> {
        self.steps
            .iter()
            .filter_map(Instruction::context_file)
            .collect()
    }

    /// `{repo}.{tag}.dockerfile` として `dir` に保存
    pub fn save_dockerfile(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let path = dir.join(format!("{}.{}.dockerfile", self.repo(), self.tag));
        self.render_dockerfile().save(&path)?;
        debug!(path = %path.display(), "Saved Dockerfile");

        Ok(path)
    }

    /// イメージをビルド
    ///
    /// クライアントのエラーは [`ImageError::Build`] の `source` にそのまま格納されます。
    pub async fn build(&self, client: &dyn ImageClient, options: &BuildOptions) -> Result<&Self> {
        let fqn = self.fqn();
        info!("Start building {}", fqn);

        let dockerfile = self.render_dockerfile();
        debug!("Dockerfile for {}:\n{}", fqn, dockerfile);

        let handle = client
            .build_from_dockerfile(&dockerfile, &fqn, options)
            .await
            .map_err(|source| ImageError::Build {
                image: fqn.clone(),
                source,
            })?;

        if let Some(id) = &handle.id {
            debug!(image = %fqn, id = %id, "Build produced image id");
        }
        info!("Image has been built successfully: {}", fqn);

        Ok(self)
    }

    /// イメージをレジストリにプッシュ
    pub async fn push(&self, client: &dyn ImageClient, options: &PushOptions) -> Result<&Self> {
        let fqn = self.fqn();
        info!("Pushing {}", fqn);

        client
            .push(&fqn, options)
            .await
            .map_err(|source| ImageError::Push {
                image: fqn.clone(),
                source,
            })?;

        info!("Image has been pushed successfully: {}", fqn);
        Ok(self)
    }
}

impl Hash for ImageDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fqn().hash(state);
    }
}

impl fmt::Display for ImageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqn())
    }
}

/// [`ImageDescriptor`] のビルダー
#[derive(Debug, Clone)]
pub struct ImageDescriptorBuilder {
    name: String,
    base: Base,
    tag: Option<String>,
    organization: Option<String>,
    architecture: Option<String>,
    os: Option<String>,
    variant: Option<String>,
    title: Option<String>,
    runtime: Option<String>,
    steps: Vec<Instruction>,
}

impl ImageDescriptorBuilder {
    fn new(name: impl Into<String>, base: impl Into<Base>) -> Self {
        Self {
            name: name.into(),
            base: base.into(),
            tag: None,
            organization: None,
            architecture: None,
            os: None,
            variant: None,
            title: None,
            runtime: None,
            steps: Vec::new(),
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// 文字列で指定し、[`finish`](Self::finish) で検証します
    pub fn architecture(mut self, architecture: impl Into<String>) -> Self {
        self.architecture = Some(architecture.into());
        self
    }

    pub fn os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }

    pub fn step(mut self, step: Instruction) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Instruction>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// 検証して [`ImageDescriptor`] を作成
    pub fn finish(self) -> Result<ImageDescriptor> {
        require_non_empty("name", &self.name)?;

        let architecture = self
            .architecture
            .as_deref()
            .map(str::parse::<Architecture>)
            .transpose()?;

        let (platform, inherited_org, inherited_title, inherited_runtime) = match &self.base {
            Base::Image(reference) => {
                let inherited = &reference.platform;

                if let Some(arch) = architecture
                    && arch != inherited.architecture
                {
                    return Err(conflict(
                        &self.name,
                        "architecture",
                        arch.as_str(),
                        inherited.architecture.as_str(),
                    ));
                }
                if let Some(os) = &self.os
                    && os != &inherited.os
                {
                    return Err(conflict(&self.name, "os", os, &inherited.os));
                }
                if let Some(variant) = &self.variant
                    && inherited.variant.as_ref() != Some(variant)
                {
                    return Err(conflict(
                        &self.name,
                        "variant",
                        variant,
                        inherited.variant.as_deref().unwrap_or("(なし)"),
                    ));
                }

                (
                    inherited.clone(),
                    Some(reference.organization.clone()),
                    reference.title.clone(),
                    reference.runtime.clone(),
                )
            }
            Base::Literal(image) => {
                require_non_empty("base", image)?;

                let architecture = architecture.ok_or_else(|| {
                    ImageError::Validation(format!(
                        "イメージ `{}` の architecture が指定されていません",
                        self.name
                    ))
                })?;
                let os = self.os.clone().ok_or_else(|| {
                    ImageError::Validation(format!(
                        "イメージ `{}` の os が指定されていません",
                        self.name
                    ))
                })?;

                let platform = Platform {
                    architecture,
                    os,
                    variant: self.variant.clone(),
                };
                (platform, None, None, None)
            }
        };

        let organization = self
            .organization
            .or(inherited_org)
            .unwrap_or_else(|| DEFAULT_ORGANIZATION.to_string());
        let tag = self.tag.unwrap_or_else(|| DEFAULT_TAG.to_string());

        require_non_empty("organization", &organization)?;
        require_non_empty("tag", &tag)?;
        require_non_empty("os", &platform.os)?;
        if let Some(variant) = &platform.variant {
            require_non_empty("variant", variant)?;
        }

        Ok(ImageDescriptor {
            name: self.name,
            base: self.base,
            tag,
            organization,
            platform,
            title: self.title.or(inherited_title),
            runtime: self.runtime.or(inherited_runtime),
            steps: self.steps,
        })
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ImageError::Validation(format!(
            "{} は空にできません",
            field
        )));
    }
    Ok(())
}

fn conflict(name: &str, field: &str, given: &str, inherited: &str) -> ImageError {
    ImageError::Validation(format!(
        "イメージ `{}` の {} `{}` がベースイメージの `{}` と一致しません",
        name, field, given, inherited
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::{add, cmd, run, workdir};

    fn ubuntu_cpp() -> ImageDescriptor {
        ImageDescriptor::builder("cpp", "ubuntu:18.04")
            .architecture("amd64")
            .os("ubuntu-18.04")
            .finish()
            .unwrap()
    }

    #[test]
    fn test_defaults_and_derived_names() {
        let image = ubuntu_cpp();

        assert_eq!(image.tag(), DEFAULT_TAG);
        assert_eq!(image.organization(), DEFAULT_ORGANIZATION);
        assert_eq!(image.repo(), "amd64-ubuntu-18.04-cpp");
        assert_eq!(image.fqn(), "layerflow/amd64-ubuntu-18.04-cpp:latest");
        assert_eq!(image.to_string(), image.fqn());
    }

    #[test]
    fn test_variant_in_repo() {
        let image = ImageDescriptor::builder("cpp", "continuumio/miniconda3")
            .architecture("arm64v8")
            .os("ubuntu-18.04")
            .variant("conda")
            .organization("ursalab")
            .tag("worker")
            .finish()
            .unwrap();

        assert_eq!(image.fqn(), "ursalab/arm64v8-ubuntu-18.04-conda-cpp:worker");
    }

    #[test]
    fn test_architecture_allow_list() {
        for arch in ["arm32v7", "x86_64", ""] {
            let result = ImageDescriptor::builder("cpp", "ubuntu:18.04")
                .architecture(arch)
                .os("ubuntu-18.04")
                .finish();
            assert!(matches!(result, Err(ImageError::Validation(_))), "{arch}");
        }
    }

    #[test]
    fn test_literal_base_requires_platform() {
        let missing_arch = ImageDescriptor::builder("cpp", "ubuntu:18.04")
            .os("ubuntu-18.04")
            .finish();
        assert!(matches!(missing_arch, Err(ImageError::Validation(_))));

        let missing_os = ImageDescriptor::builder("cpp", "ubuntu:18.04")
            .architecture("amd64")
            .finish();
        assert!(matches!(missing_os, Err(ImageError::Validation(_))));

        let empty_base = ImageDescriptor::builder("cpp", "")
            .architecture("amd64")
            .os("ubuntu-18.04")
            .finish();
        assert!(matches!(empty_base, Err(ImageError::Validation(_))));
    }

    #[test]
    fn test_empty_fields_are_rejected() {
        let empty_name = ImageDescriptor::builder("", "ubuntu:18.04")
            .architecture("amd64")
            .os("ubuntu-18.04")
            .finish();
        assert!(matches!(empty_name, Err(ImageError::Validation(_))));

        let empty_tag = ImageDescriptor::builder("cpp", "ubuntu:18.04")
            .architecture("amd64")
            .os("ubuntu-18.04")
            .tag("")
            .finish();
        assert!(matches!(empty_tag, Err(ImageError::Validation(_))));

        let empty_org = ImageDescriptor::builder("cpp", "ubuntu:18.04")
            .architecture("amd64")
            .os("ubuntu-18.04")
            .organization(" ")
            .finish();
        assert!(matches!(empty_org, Err(ImageError::Validation(_))));
    }

    #[test]
    fn test_platform_inheritance() {
        let cpp = ImageDescriptor::builder("cpp", "continuumio/miniconda3")
            .architecture("amd64")
            .os("ubuntu-18.04")
            .variant("conda")
            .organization("ursalab")
            .runtime("nvidia")
            .finish()
            .unwrap();
        let python = ImageDescriptor::builder("python-3", &cpp).finish().unwrap();

        assert_eq!(python.platform(), cpp.platform());
        assert_eq!(python.title(), None);
        assert_eq!(python.organization(), "ursalab");
        assert_eq!(python.runtime(), Some("nvidia"));
        assert_eq!(
            python.fqn(),
            "ursalab/amd64-ubuntu-18.04-conda-python-3:latest"
        );
    }

    #[test]
    fn test_title_is_inherited_unless_given() {
        let cpp = ImageDescriptor::builder("cpp", "ubuntu:18.04")
            .architecture("amd64")
            .os("ubuntu-18.04")
            .title("AMD64 Ubuntu 18.04 C++")
            .finish()
            .unwrap();

        let worker = ImageDescriptor::builder("cpp", &cpp)
            .tag("worker")
            .finish()
            .unwrap();
        assert_eq!(worker.title(), Some("AMD64 Ubuntu 18.04 C++"));

        let python = ImageDescriptor::builder("python-3", &cpp)
            .title("AMD64 Ubuntu 18.04 Python 3")
            .finish()
            .unwrap();
        assert_eq!(python.title(), Some("AMD64 Ubuntu 18.04 Python 3"));
    }

    #[test]
    fn test_explicit_values_must_match_managed_base() {
        let cpp = ubuntu_cpp();

        let same = ImageDescriptor::builder("python", &cpp)
            .architecture("amd64")
            .os("ubuntu-18.04")
            .finish();
        assert!(same.is_ok());

        let other_os = ImageDescriptor::builder("python", &cpp)
            .os("alpine-3.9")
            .finish();
        assert!(matches!(other_os, Err(ImageError::Validation(_))));

        let other_arch = ImageDescriptor::builder("python", &cpp)
            .architecture("arm64v8")
            .finish();
        assert!(matches!(other_arch, Err(ImageError::Validation(_))));

        let other_variant = ImageDescriptor::builder("python", &cpp)
            .variant("conda")
            .finish();
        assert!(matches!(other_variant, Err(ImageError::Validation(_))));
    }

    #[test]
    fn test_own_organization_overrides_inherited() {
        let cpp = ubuntu_cpp();
        let python = ImageDescriptor::builder("python", &cpp)
            .organization("ursalab")
            .finish()
            .unwrap();

        assert_eq!(python.organization(), "ursalab");
        assert_eq!(python.base().as_image().unwrap().organization, "layerflow");
    }

    #[test]
    fn test_managed_base_renders_fqn() {
        let cpp = ubuntu_cpp();
        let python = ImageDescriptor::builder("python", &cpp)
            .step(run("echo ok"))
            .finish()
            .unwrap();

        let dockerfile = python.render_dockerfile();
        assert!(
            dockerfile
                .text()
                .starts_with("FROM layerflow/amd64-ubuntu-18.04-cpp:latest\n")
        );
    }

    #[test]
    fn test_render_is_idempotent() {
        let image = ImageDescriptor::builder("worker", "ubuntu:18.04")
            .architecture("amd64")
            .os("ubuntu-18.04")
            .steps([run("echo 1"), workdir("/buildbot"), cmd(["twistd"])])
            .finish()
            .unwrap();

        let first = image.render_dockerfile().to_string();
        let second = image.render_dockerfile().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn test_workdir_and_context_files() {
        let image = ImageDescriptor::builder("worker", "ubuntu:18.04")
            .architecture("amd64")
            .os("ubuntu-18.04")
            .steps([
                add("docker/buildbot.tac"),
                workdir("/tmp"),
                workdir("/buildbot"),
            ])
            .finish()
            .unwrap();

        assert_eq!(image.workdir().as_deref(), Some("/buildbot"));
        assert_eq!(image.user(), None);

        let files = image.context_files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].archive_path, "buildbot.tac");
    }

    #[test]
    fn test_save_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        let image = ubuntu_cpp();

        let path = image.save_dockerfile(dir.path()).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "amd64-ubuntu-18.04-cpp.latest.dockerfile"
        );
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content, image.render_dockerfile().text());
    }

    #[test]
    fn test_hash_follows_fqn() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(ubuntu_cpp());
        set.insert(ubuntu_cpp());
        assert_eq!(set.len(), 1);
    }
}

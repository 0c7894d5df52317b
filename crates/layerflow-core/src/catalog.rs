//! 組み込みイメージカタログ
//!
//! C++ / Python を中心としたCI用イメージのマトリクスを生成します。
//! 呼び出すたびに新しいコレクションを返します。
//!
//! buildbot はPythonを必要とするため、全てのイメージに python と pip が入ります。

use crate::collection::ImageCollection;
use crate::dsl::{
    Command, Instruction, add, add_to, apk, apt, cmd, conda, entrypoint, env, mkdir, pip, run,
    shell, symlink, workdir,
};
use crate::error::Result;
use crate::model::{Architecture, DEFAULT_ORGANIZATION, ImageDescriptor};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// ワーカーイメージのタグ
pub const WORKER_TAG: &str = "worker";

/// ワーカーイメージで実行するコマンド
pub const WORKER_COMMAND: &str = "twistd --pidfile= -ny buildbot.tac";

const UBUNTU_VERSIONS: [&str; 2] = ["16.04", "18.04"];
const ALPINE_VERSIONS: [&str; 1] = ["3.9"];
const CONDA_PYTHON_VERSIONS: [&str; 3] = ["2.7", "3.6", "3.7"];
const CUDA_VERSIONS: [&str; 1] = ["10.0"];
const JAVA_VERSIONS: [&str; 2] = ["8", "11"];
const MAVEN_VERSION: &str = "3";
const GO_VERSIONS: [&str; 2] = ["1.12.6", "1.11.11"];
const RUST_VERSIONS: [&str; 1] = ["1.35"];

const PYTHON_SYMLINKS: [(&str, &str); 2] = [
    ("/usr/local/bin/python", "/usr/bin/python3"),
    ("/usr/local/bin/pip", "/usr/bin/pip3"),
];

/// カタログ生成オプション
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// `requirements.txt` などADDするファイルのディレクトリ
    pub assets_dir: PathBuf,
    pub organization: String,
    /// Ubuntu系イメージに追加で入れるパッケージ
    pub ubuntu_packages: Vec<String>,
    /// Alpine系イメージに追加で入れるパッケージ
    pub alpine_packages: Vec<String>,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("docker"),
            organization: DEFAULT_ORGANIZATION.to_string(),
            ubuntu_packages: Vec::new(),
            alpine_packages: Vec::new(),
        }
    }
}

impl CatalogOptions {
    /// `pkgs-ubuntu.txt` / `pkgs-alpine.txt` を読み込んで作成
    ///
    /// ファイルが存在しない場合は空のリストになります。
    pub fn from_assets(assets_dir: impl Into<PathBuf>) -> Result<Self> {
        let assets_dir = assets_dir.into();

        let read_optional = |name: &str| -> Result<Vec<String>> {
            let path = assets_dir.join(name);
            if path.exists() {
                read_dependency_list(&path)
            } else {
                debug!(path = %path.display(), "Package list not found, using none");
                Ok(Vec::new())
            }
        };

        Ok(Self {
            ubuntu_packages: read_optional("pkgs-ubuntu.txt")?,
            alpine_packages: read_optional("pkgs-alpine.txt")?,
            assets_dir,
            ..Default::default()
        })
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = organization.into();
        self
    }

    fn asset(&self, name: &str) -> PathBuf {
        self.assets_dir.join(name)
    }
}

/// 依存パッケージのリストファイルを読み込む
///
/// `#` で始まる行と空行は無視します。
pub fn read_dependency_list(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let content = fs::read_to_string(path.as_ref())?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// イメージからbuildbotワーカーイメージを作成
///
/// conda イメージは bash のエントリーポイントを持つため、CMD をexec形式にします。
pub fn worker_image_for(image: &ImageDescriptor, assets_dir: &Path) -> Result<ImageDescriptor> {
    let command = if image.variant() == Some("conda") {
        Command::Exec(vec![WORKER_COMMAND.to_string()])
    } else {
        Command::Shell(WORKER_COMMAND.to_string())
    };

    ImageDescriptor::builder(image.name(), image)
        .tag(WORKER_TAG)
        .steps(worker_steps(assets_dir))
        .step(cmd(command))
        .finish()
}

fn worker_steps(assets_dir: &Path) -> Vec<Instruction> {
    vec![
        run(pip(["buildbot-worker"], NO_FILES)),
        run(mkdir("/buildbot")),
        add_to(assets_dir.join("buildbot.tac"), "/buildbot/buildbot.tac"),
        workdir("/buildbot"),
    ]
}

const NO_FILES: [&str; 0] = [];

fn python_steps(options: &CatalogOptions) -> Vec<Instruction> {
    vec![
        add(options.asset("requirements.txt")),
        add(options.asset("requirements-test.txt")),
        run(pip(["cython"], ["requirements.txt"])),
        run(pip(NO_FILES, ["requirements-test.txt"])),
    ]
}

fn python3_steps(install: String) -> Vec<Instruction> {
    vec![run(install), run(symlink(PYTHON_SYMLINKS))]
}

fn with_packages(extra: &[String], packages: &[&str]) -> Vec<String> {
    extra
        .iter()
        .cloned()
        .chain(packages.iter().map(|p| p.to_string()))
        .collect()
}

fn upper(arch: Architecture) -> String {
    arch.as_str().to_uppercase()
}

/// 組み込みのイメージマトリクスを生成
///
/// ワーカーイメージ（タグ `worker`）も含みます。
pub fn default_images(options: &CatalogOptions) -> Result<ImageCollection> {
    let org = options.organization.as_str();
    let mut images = ImageCollection::new();

    for arch in Architecture::ALL {
        // UBUNTU
        for version in UBUNTU_VERSIONS {
            let title = format!("{} Ubuntu {}", upper(arch), version);
            let cpp = ImageDescriptor::builder("cpp", format!("{}/ubuntu:{}", arch, version))
                .architecture(arch.as_str())
                .os(format!("ubuntu-{}", version))
                .organization(org)
                .title(format!("{} C++", title))
                .steps(python3_steps(apt(with_packages(
                    &options.ubuntu_packages,
                    &["python3", "python3-pip"],
                ))))
                .finish()?;
            let python = ImageDescriptor::builder("python-3", &cpp)
                .title(format!("{} Python 3", title))
                .steps(python_steps(options))
                .finish()?;

            if version == "18.04" {
                let benchmark = ImageDescriptor::builder("cpp-benchmark", &cpp)
                    .title(format!("{} C++ Benchmark", title))
                    .step(run(apt(["libbenchmark-dev"])))
                    .step(run(pip(["click", "pandas"], NO_FILES)))
                    .finish()?;
                images.extend([cpp, python, benchmark]);
            } else {
                images.extend([cpp, python]);
            }
        }

        // ALPINE
        for version in ALPINE_VERSIONS {
            let title = format!("{} Alpine {}", upper(arch), version);
            let cpp = ImageDescriptor::builder("cpp", format!("{}/alpine:{}", arch, version))
                .architecture(arch.as_str())
                .os(format!("alpine-{}", version))
                .organization(org)
                .title(format!("{} C++", title))
                .steps(python3_steps(apk(with_packages(
                    &options.alpine_packages,
                    &["python3-dev", "py3-pip"],
                ))))
                .finish()?;
            let python = ImageDescriptor::builder("python-3", &cpp)
                .title(format!("{} Python 3", title))
                .steps(python_steps(options))
                .finish()?;
            images.extend([cpp, python]);
        }
    }

    images.extend(conda_images(options, Architecture::Amd64)?);
    images.extend(cuda_images(options, Architecture::Amd64)?);
    images.extend(language_images(options, Architecture::Amd64)?);

    let workers = images
        .iter()
        .map(|image| worker_image_for(image, &options.assets_dir))
        .collect::<Result<Vec<_>>>()?;
    images.extend(workers);

    debug!(images = images.len(), "Built default image catalog");
    Ok(images)
}

fn conda_images(options: &CatalogOptions, arch: Architecture) -> Result<Vec<ImageDescriptor>> {
    let title = format!("{} Conda", upper(arch));

    let base = ImageDescriptor::builder("base", format!("{}/ubuntu:18.04", arch))
        .architecture(arch.as_str())
        .os("ubuntu-18.04")
        .variant("conda")
        .organization(&options.organization)
        .title(title.clone())
        .steps([
            run(apt(["wget"])),
            env([("PATH", "/opt/conda/bin:$PATH")]),
            add(options.asset("install_conda.sh")),
            run(format!("/install_conda.sh {} /opt/conda", arch)),
            // conda activate のため .bashrc を読み込む
            shell(["/bin/bash", "-l", "-c"]),
            entrypoint(["/bin/bash", "-l", "-c"]),
        ])
        .finish()?;

    let crossbow = ImageDescriptor::builder("crossbow", &base)
        .title(format!("{} Crossbow", title))
        .steps([
            add(options.asset("conda-crossbow.txt")),
            run(conda(["git", "twisted"], ["conda-crossbow.txt"])),
        ])
        .finish()?;

    let cpp = ImageDescriptor::builder("cpp", &base)
        .title(format!("{} C++", title))
        .steps([
            add(options.asset("conda-linux.txt")),
            add(options.asset("conda-cpp.txt")),
            run(conda(NO_FILES, ["conda-linux.txt", "conda-cpp.txt"])),
        ])
        .finish()?;

    let benchmark = ImageDescriptor::builder("cpp-benchmark", &cpp)
        .title(format!("{} C++ Benchmark", title))
        .step(run(conda(["benchmark", "click", "pandas"], NO_FILES)))
        .finish()?;

    let mut images = vec![base, crossbow, cpp.clone(), benchmark];

    for version in CONDA_PYTHON_VERSIONS {
        let python = ImageDescriptor::builder(format!("python-{}", version), &cpp)
            .title(format!("{} Python {}", title, version))
            .steps([
                add(options.asset("conda-python.txt")),
                run(conda([format!("python={}", version)], ["conda-python.txt"])),
            ])
            .finish()?;
        images.push(python);
    }

    Ok(images)
}

fn cuda_images(options: &CatalogOptions, arch: Architecture) -> Result<Vec<ImageDescriptor>> {
    let mut images = Vec::new();

    for version in CUDA_VERSIONS {
        let title = format!("{} Nvidia Cuda {}", upper(arch), version);
        let cpp = ImageDescriptor::builder("cpp", format!("nvidia/cuda:{}-devel-ubuntu18.04", version))
            .architecture(arch.as_str())
            .os("ubuntu-18.04")
            .variant("cuda")
            .organization(&options.organization)
            // `docker run --runtime=nvidia` で実行する
            .runtime("nvidia")
            .title(format!("{} C++", title))
            .steps(python3_steps(apt(with_packages(
                &options.ubuntu_packages,
                &["python3", "python3-pip"],
            ))))
            .finish()?;
        let python = ImageDescriptor::builder("python-3", &cpp)
            .title(format!("{} Python 3", title))
            .steps(python_steps(options))
            .finish()?;
        images.extend([cpp, python]);
    }

    Ok(images)
}

/// Java / Go / Rust / ursabot
fn language_images(options: &CatalogOptions, arch: Architecture) -> Result<Vec<ImageDescriptor>> {
    let org = options.organization.as_str();
    let debian = |name: String, base: String, title: String| {
        ImageDescriptor::builder(name, base)
            .architecture(arch.as_str())
            .os("debian-9")
            .organization(org)
            .title(title)
            .steps(python3_steps(apt(["python3", "python3-pip"])))
            .finish()
    };

    let mut images = Vec::new();
    for version in JAVA_VERSIONS {
        images.push(debian(
            format!("java-{}", version),
            format!("{}/maven:{}-jdk-{}", arch, MAVEN_VERSION, version),
            format!("{} Java OpenJDK {}", upper(arch), version),
        )?);
    }
    for version in GO_VERSIONS {
        images.push(debian(
            format!("go-{}", version),
            format!("{}/golang:{}-stretch", arch, version),
            format!("{} Debian 9 Go {}", upper(arch), version),
        )?);
    }
    for version in RUST_VERSIONS {
        images.push(debian(
            format!("rust-{}", version),
            format!("{}/rust:{}-stretch", arch, version),
            format!("{} Debian 9 Rust {}", upper(arch), version),
        )?);
    }

    let ursabot = ImageDescriptor::builder("ursabot", "python:3.7")
        .architecture(arch.as_str())
        .os("debian-9")
        .organization(org)
        .title("Ursabot Python 3.7")
        .steps([
            add(options.asset("requirements-ursabot.txt")),
            run(pip(NO_FILES, ["requirements-ursabot.txt"])),
        ])
        .finish()?;
    images.push(ursabot);

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{Attribute, Criterion};
    use crate::filter::starts_with;
    use crate::graph::DependencyGraph;

    fn catalog() -> ImageCollection {
        default_images(&CatalogOptions::default()).unwrap()
    }

    #[test]
    fn test_catalog_is_fresh_and_acyclic() {
        let first = catalog();
        let second = catalog();
        assert_eq!(first, second);

        let graph = DependencyGraph::from_collection(&first);
        assert!(graph.layers().is_ok());
    }

    #[test]
    fn test_every_image_has_worker() {
        let images = catalog();
        let workers = images.filter([(Attribute::Tag, WORKER_TAG)]);
        let others = images.filter([(Attribute::Tag, "latest")]);

        assert_eq!(workers.len(), others.len());
        assert_eq!(workers.len() * 2, images.len());
    }

    #[test]
    fn test_only_supported_architectures() {
        let groups = catalog().group_by(Attribute::Architecture);
        let keys: Vec<Option<String>> = groups.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![Some("amd64".to_string()), Some("arm64v8".to_string())]
        );
    }

    #[test]
    fn test_ubuntu_filter() {
        let ubuntu = catalog().filter([
            (Attribute::Os, Criterion::from(starts_with("ubuntu"))),
            (Attribute::Variant, Criterion::Equals(None)),
            (Attribute::Tag, Criterion::from("latest")),
        ]);
        // 2 arch × (16.04: cpp, python-3 + 18.04: cpp, python-3, cpp-benchmark)
        assert_eq!(ubuntu.len(), 10);
    }

    #[test]
    fn test_conda_worker_uses_exec_form() {
        let images = catalog();
        let worker = images
            .get([
                (Attribute::Name, "cpp"),
                (Attribute::Variant, "conda"),
                (Attribute::Tag, WORKER_TAG),
            ])
            .unwrap();

        let dockerfile = worker.render_dockerfile().to_string();
        assert!(dockerfile.starts_with("FROM layerflow/amd64-ubuntu-18.04-conda-cpp:latest\n"));
        assert!(dockerfile.ends_with("CMD [\"twistd --pidfile= -ny buildbot.tac\"]\n"));
        assert_eq!(worker.workdir().as_deref(), Some("/buildbot"));
    }

    #[test]
    fn test_cuda_runtime_is_inherited() {
        let images = catalog();
        let cuda = images.filter([(Attribute::Variant, "cuda")]);

        assert_eq!(cuda.len(), 4);
        assert!(cuda.iter().all(|image| image.runtime() == Some("nvidia")));
    }

    #[test]
    fn test_read_dependency_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkgs-ubuntu.txt");
        fs::write(&path, "# build tools\ncmake\n\n  ninja-build  \n#ccache\n").unwrap();

        let packages = read_dependency_list(&path).unwrap();
        assert_eq!(packages, vec!["cmake", "ninja-build"]);
    }

    #[test]
    fn test_options_from_assets() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pkgs-alpine.txt"), "bash\ncmake\n").unwrap();

        let options = CatalogOptions::from_assets(dir.path())
            .unwrap()
            .with_organization("ursalab");
        assert!(options.ubuntu_packages.is_empty());
        assert_eq!(options.alpine_packages, vec!["bash", "cmake"]);

        let images = default_images(&options).unwrap();
        let alpine = images
            .get([
                (Attribute::Name, "cpp"),
                (Attribute::Os, "alpine-3.9"),
                (Attribute::Architecture, "amd64"),
                (Attribute::Tag, "latest"),
            ])
            .unwrap();
        assert_eq!(alpine.organization(), "ursalab");
        assert!(alpine.render_dockerfile().text().contains("        cmake \\\n"));
    }
}

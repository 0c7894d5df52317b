//! layerflow Docker backend
//!
//! [`layerflow_core::ImageClient`] を bollard で実装します。
//! 生成された Dockerfile と ADD されるファイルからビルドコンテキストを作り、
//! ビルド・タグ付け・レジストリへのプッシュを行います。

pub mod auth;
pub mod builder;
pub mod context;
pub mod docker_client;
pub mod error;
pub mod progress;
pub mod pusher;

pub use auth::{RegistryAuth, registry_host};
pub use builder::ImageBuilder;
pub use context::ContextBuilder;
pub use docker_client::DockerClient;
pub use error::{BuildError, BuildResult};
pub use progress::BuildProgress;
pub use pusher::{ImagePusher, split_image_tag, validate_tag};

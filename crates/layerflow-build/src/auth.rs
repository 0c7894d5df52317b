//! レジストリ認証
//!
//! Docker の `config.json` から認証情報を探します。優先順位:
//! 1. `credHelpers` に登録されたレジストリ専用のヘルパー
//! 2. `auths` の `username:password`（Base64）
//! 3. `credsStore` の共通ヘルパー

use crate::error::{BuildError, BuildResult};
use base64::Engine;
use bollard::auth::DockerCredentials;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Docker Hub のレジストリ名
pub const DOCKER_HUB: &str = "docker.io";

/// `auths` で Docker Hub に使われるキー
const DOCKER_HUB_AUTH_KEY: &str = "https://index.docker.io/v1/";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    #[serde(default)]
    creds_store: Option<String>,
    #[serde(default)]
    cred_helpers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct AuthEntry {
    auth: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HelperResponse {
    username: String,
    secret: String,
}

/// イメージ名からレジストリのホストを取り出す
///
/// 先頭のパスに `.` か `:` を含むか `localhost` ならレジストリとみなし、
/// それ以外は Docker Hub です。
///
/// - `ghcr.io/org/app:tag` -> `ghcr.io`
/// - `ursalab/amd64-ubuntu-18.04-cpp:latest` -> `docker.io`
/// - `localhost:5000/app` -> `localhost:5000`
pub fn registry_host(image: &str) -> &str {
    match image.split_once('/') {
        Some((first, _)) if first.contains('.') || first.contains(':') || first == "localhost" => first,
        _ => DOCKER_HUB,
    }
}

/// レジストリ認証を管理
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    config_path: PathBuf,
}

impl Default for RegistryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryAuth {
    /// `$DOCKER_CONFIG/config.json`、未設定なら `~/.docker/config.json` を使用
    pub fn new() -> Self {
        let dir = std::env::var_os("DOCKER_CONFIG")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".docker")))
            .unwrap_or_else(|| PathBuf::from(".docker"));

        Self {
            config_path: dir.join("config.json"),
        }
    }

    pub fn with_config_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// イメージのプッシュに使う認証情報
    ///
    /// 見つからない場合は `Ok(None)` を返し、認証なしで続行します。
    pub fn credentials_for(&self, image: &str) -> BuildResult<Option<DockerCredentials>> {
        let registry = registry_host(image);

        let Some(config) = self.load_config()? else {
            tracing::debug!("Docker config not found at {}", self.config_path.display());
            return Ok(None);
        };

        if let Some(helper) = config.cred_helpers.get(registry) {
            tracing::debug!("Using credential helper {} for {}", helper, registry);
            return run_helper(helper, registry);
        }

        let auth_keys: &[&str] = if registry == DOCKER_HUB {
            &[DOCKER_HUB_AUTH_KEY, DOCKER_HUB]
        } else {
            &[registry]
        };
        for key in auth_keys {
            if let Some(AuthEntry { auth: Some(encoded) }) = config.auths.get(*key)
                && let Some(credentials) = decode_auth(encoded, registry)?
            {
                tracing::debug!("Found credentials in auths for {}", registry);
                return Ok(Some(credentials));
            }
        }

        if let Some(helper) = &config.creds_store {
            tracing::debug!("Trying credential store: {}", helper);
            match run_helper(helper, registry) {
                Ok(credentials) => return Ok(credentials),
                Err(e) => tracing::debug!("Credential store lookup failed: {}", e),
            }
        }

        tracing::debug!("No credentials found for {}", registry);
        Ok(None)
    }

    fn load_config(&self) -> BuildResult<Option<DockerConfig>> {
        if !self.config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.config_path).map_err(|e| BuildError::AuthFailed {
            registry: self.config_path.display().to_string(),
            message: format!("Failed to read config.json: {}", e),
        })?;

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| BuildError::AuthFailed {
                registry: self.config_path.display().to_string(),
                message: format!("Failed to parse config.json: {}", e),
            })
    }
}

fn credentials(username: String, password: String, registry: &str) -> DockerCredentials {
    DockerCredentials {
        username: Some(username),
        password: Some(password),
        serveraddress: Some(registry.to_string()),
        ..Default::default()
    }
}

fn decode_auth(encoded: &str, registry: &str) -> BuildResult<Option<DockerCredentials>> {
    let auth_failed = |message: String| BuildError::AuthFailed {
        registry: registry.to_string(),
        message,
    };

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| auth_failed(format!("Failed to decode auth: {}", e)))?;
    let decoded =
        String::from_utf8(decoded).map_err(|e| auth_failed(format!("Invalid UTF-8 in auth: {}", e)))?;

    Ok(decoded
        .split_once(':')
        .map(|(user, pass)| credentials(user.to_string(), pass.to_string(), registry)))
}

/// `docker-credential-<helper> get` を実行
fn run_helper(helper: &str, registry: &str) -> BuildResult<Option<DockerCredentials>> {
    let program = format!("docker-credential-{}", helper);
    let auth_failed = |message: String| BuildError::AuthFailed {
        registry: registry.to_string(),
        message,
    };

    let mut child = Command::new(&program)
        .arg("get")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| auth_failed(format!("Failed to run {}: {}", program, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(registry.as_bytes()).ok();
    }

    let output = child
        .wait_with_output()
        .map_err(|e| auth_failed(format!("Credential helper failed: {}", e)))?;

    if !output.status.success() {
        // ヘルパーが認証情報を持っていない
        tracing::debug!(
            "{} returned error for {}: {}",
            program,
            registry,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Ok(None);
    }

    let response: HelperResponse = serde_json::from_slice(&output.stdout)
        .map_err(|e| auth_failed(format!("Failed to parse credential helper response: {}", e)))?;

    Ok(Some(credentials(response.username, response.secret, registry)))
}

//! Layered configuration store (C9). Six precedence-ordered JSON layers are
//! deep-merged into one effective document; `global`/`project` are persisted
//! to disk with secret-shaped fields scrubbed first.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::fs;

use crate::error::{ConclaveError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    pub jwt_secret: Option<String>,
    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default)]
    pub cors_credentials: bool,
    pub otel_endpoint: Option<String>,
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
}

fn default_port() -> u16 {
    3000
}

fn default_service_name() -> String {
    "conclave".to_string()
}

fn default_max_body_size() -> usize {
    1_048_576
}

fn default_jwt_issuer() -> String {
    "conclave".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            service_name: default_service_name(),
            max_body_size: default_max_body_size(),
            jwt_secret: None,
            jwt_issuer: default_jwt_issuer(),
            cors_origins: Vec::new(),
            cors_credentials: false,
            otel_endpoint: None,
            allowed_hosts: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Dev mode is implied by an absent `jwt_secret`: authentication and
    /// output filtering are disabled.
    pub fn is_dev_mode(&self) -> bool {
        self.jwt_secret.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".orchestrator-runtime")
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Default)]
struct ConfigLayers {
    global: Value,
    project: Value,
    managed: Value,
    env: Value,
    runtime: Value,
    cli: Value,
}

/// Layered configuration store. See `SPEC_FULL.md` §4.9.
pub struct ConfigStore {
    project_path: PathBuf,
    global_path: PathBuf,
    managed_path: PathBuf,
    layers: ConfigLayers,
}

impl ConfigStore {
    pub async fn load(project_path: impl AsRef<Path>, cli_overrides: Option<Value>) -> Result<Self> {
        let project_path = project_path.as_ref().to_path_buf();
        if let Some(parent) = project_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let managed_path = project_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("managed_config.json");
        let global_path = resolve_global_config_path().await?;

        let mut global = read_json_file(&global_path).await?;
        let mut project = read_json_file(&project_path).await?;
        let mut managed = read_json_file(&managed_path).await?;

        scrub_and_persist_if_changed(&mut global, &global_path).await?;
        scrub_and_persist_if_changed(&mut project, &project_path).await?;
        scrub_and_persist_if_changed(&mut managed, &managed_path).await?;

        let layers = ConfigLayers {
            global,
            project,
            managed,
            env: env_layer(),
            runtime: empty_object(),
            cli: cli_overrides.unwrap_or_else(empty_object),
        };

        Ok(Self {
            project_path,
            global_path,
            managed_path,
            layers,
        })
    }

    /// Deep-merges all six layers in precedence order: global, project,
    /// managed, env, runtime, cli.
    pub fn effective(&self) -> Value {
        let mut merged = empty_object();
        deep_merge(&mut merged, &self.layers.global);
        deep_merge(&mut merged, &self.layers.project);
        deep_merge(&mut merged, &self.layers.managed);
        deep_merge(&mut merged, &self.layers.env);
        deep_merge(&mut merged, &self.layers.runtime);
        deep_merge(&mut merged, &self.layers.cli);
        merged
    }

    pub fn typed(&self) -> AppConfig {
        serde_json::from_value(self.effective()).unwrap_or_default()
    }

    pub fn set_runtime(&mut self, overlay: Value) {
        deep_merge(&mut self.layers.runtime, &overlay);
    }

    pub async fn set_project(&mut self, overlay: Value) -> Result<()> {
        deep_merge(&mut self.layers.project, &overlay);
        let mut to_write = self.layers.project.clone();
        scrub_secrets(&mut to_write);
        write_json_file(&self.project_path, &to_write).await
    }

    pub async fn set_global(&mut self, overlay: Value) -> Result<()> {
        deep_merge(&mut self.layers.global, &overlay);
        let mut to_write = self.layers.global.clone();
        scrub_secrets(&mut to_write);
        write_json_file(&self.global_path, &to_write).await
    }

    pub fn managed_path(&self) -> &Path {
        &self.managed_path
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

async fn read_json_file(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(empty_object());
    }
    let raw = fs::read_to_string(path).await?;
    Ok(serde_json::from_str::<Value>(&raw).unwrap_or_else(|_| empty_object()))
}

async fn write_json_file(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let raw = serde_json::to_string_pretty(value).map_err(ConclaveError::Serialization)?;
    fs::write(path, raw).await?;
    Ok(())
}

/// Secret-shaped fields never hit disk even when they arrived via a merge;
/// the in-memory `env` layer still carries them for `effective()`.
fn scrub_secrets(value: &mut Value) {
    if let Value::Object(root) = value {
        if let Some(gateway) = root.get_mut("gateway").and_then(|v| v.as_object_mut()) {
            gateway.remove("jwt_secret");
        }
    }
}

async fn scrub_and_persist_if_changed(value: &mut Value, path: &Path) -> Result<()> {
    let before = value.clone();
    scrub_secrets(value);
    if *value != before {
        write_json_file(path, value).await?;
    }
    Ok(())
}

async fn resolve_global_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("GLOBAL_CONFIG_PATH") {
        let path = PathBuf::from(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        return Ok(path);
    }
    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join("conclave").join("config.json");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        return Ok(path);
    }
    Ok(PathBuf::from(".conclave/global_config.json"))
}

fn parse_bool_like(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_layer() -> Value {
    let mut root = empty_object();

    if let Ok(port) = std::env::var("PORT") {
        if let Ok(port) = port.trim().parse::<u16>() {
            deep_merge(&mut root, &json!({ "gateway": { "port": port } }));
        }
    }
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        deep_merge(&mut root, &json!({ "log_level": level }));
    }
    if let Ok(name) = std::env::var("SERVICE_NAME") {
        deep_merge(&mut root, &json!({ "gateway": { "service_name": name } }));
    }
    if let Ok(size) = std::env::var("MAX_BODY_SIZE") {
        if let Ok(size) = size.trim().parse::<usize>() {
            deep_merge(&mut root, &json!({ "gateway": { "max_body_size": size } }));
        }
    }
    if let Ok(secret) = std::env::var("JWT_SECRET") {
        if !secret.trim().is_empty() {
            deep_merge(&mut root, &json!({ "gateway": { "jwt_secret": secret } }));
        }
    }
    if let Ok(issuer) = std::env::var("JWT_ISSUER") {
        deep_merge(&mut root, &json!({ "gateway": { "jwt_issuer": issuer } }));
    }
    if let Ok(origins) = std::env::var("CORS_ORIGINS") {
        let origins = if origins.trim() == "*" {
            vec!["*".to_string()]
        } else {
            parse_csv(&origins)
        };
        deep_merge(&mut root, &json!({ "gateway": { "cors_origins": origins } }));
    }
    if let Ok(creds) = std::env::var("CORS_CREDENTIALS") {
        if let Some(v) = parse_bool_like(&creds) {
            deep_merge(&mut root, &json!({ "gateway": { "cors_credentials": v } }));
        }
    }
    if let Ok(endpoint) = std::env::var("OTEL_ENDPOINT") {
        deep_merge(&mut root, &json!({ "gateway": { "otel_endpoint": endpoint } }));
    }
    if let Ok(hosts) = std::env::var("ALLOWED_HOSTS") {
        deep_merge(
            &mut root,
            &json!({ "gateway": { "allowed_hosts": parse_csv(&hosts) } }),
        );
    }
    if let Ok(root_dir) = std::env::var("SESSION_ROOT_DIR") {
        if !root_dir.trim().is_empty() {
            deep_merge(&mut root, &json!({ "session": { "root_dir": root_dir } }));
        }
    }

    root
}

/// Object fields merge recursively key-by-key; arrays and scalars at the
/// overlay replace the base value wholesale; a `null` overlay value is a
/// no-op, never deleting a base key. `deep_merge` never mutates `overlay`.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    if overlay.is_null() {
        return;
    }
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_merge_identity_with_empty_overlay() {
        let mut base = json!({ "a": 1, "b": { "c": 2 } });
        let before = base.clone();
        deep_merge(&mut base, &empty_object());
        assert_eq!(base, before);
    }

    #[test]
    fn deep_merge_does_not_mutate_overlay() {
        let mut base = json!({ "a": 1 });
        let overlay = json!({ "a": 2, "b": 3 });
        let overlay_before = overlay.clone();
        deep_merge(&mut base, &overlay);
        assert_eq!(overlay, overlay_before);
        assert_eq!(base, json!({ "a": 2, "b": 3 }));
    }

    #[test]
    fn deep_merge_replaces_arrays_wholesale() {
        let mut base = json!({ "xs": [1, 2, 3] });
        deep_merge(&mut base, &json!({ "xs": [4] }));
        assert_eq!(base, json!({ "xs": [4] }));
    }

    #[test]
    fn deep_merge_null_overlay_field_is_noop() {
        let mut base = json!({ "a": 1 });
        deep_merge(&mut base, &json!({ "a": null, "b": 2 }));
        assert_eq!(base, json!({ "a": 1, "b": 2 }));
    }

    #[tokio::test]
    async fn load_missing_files_reads_as_empty_object_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("GLOBAL_CONFIG_PATH", dir.path().join("global.json"));
        std::env::remove_var("JWT_SECRET");
        let store = ConfigStore::load(dir.path().join("project.json"), None)
            .await
            .unwrap();
        let cfg = store.typed();
        assert_eq!(cfg.gateway.port, 3000);
        assert!(cfg.gateway.is_dev_mode());
        std::env::remove_var("GLOBAL_CONFIG_PATH");
    }

    #[tokio::test]
    async fn project_layer_persists_without_jwt_secret() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("GLOBAL_CONFIG_PATH", dir.path().join("global.json"));
        let mut store = ConfigStore::load(dir.path().join("project.json"), None)
            .await
            .unwrap();
        store
            .set_project(json!({ "gateway": { "jwt_secret": "super-secret", "port": 4000 } }))
            .await
            .unwrap();
        let on_disk = read_json_file(&dir.path().join("project.json")).await.unwrap();
        assert!(on_disk["gateway"].get("jwt_secret").is_none());
        assert_eq!(on_disk["gateway"]["port"], 4000);
        std::env::remove_var("GLOBAL_CONFIG_PATH");
    }
}

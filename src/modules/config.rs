use std::fs;
use std::path::{Path, PathBuf};

use crate::proxy::GatewayConfig;

const DATA_DIR: &str = ".backend-gateway";
const CONFIG_FILE: &str = "gateway_config.json";

/// Get data directory path, creating it when missing
pub fn get_data_dir() -> Result<PathBuf, String> {
    let data_dir = match std::env::var("GATEWAY_DATA_DIR") {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .ok_or("Failed to get user home directory")?
            .join(DATA_DIR),
    };

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)
            .map_err(|e| format!("Failed to create data directory: {}", e))?;
    }

    Ok(data_dir)
}

/// Load gateway configuration from the data directory
pub fn load_gateway_config() -> Result<GatewayConfig, String> {
    load_config_from(&get_data_dir()?.join(CONFIG_FILE))
}

/// Save gateway configuration to the data directory
pub fn save_gateway_config(config: &GatewayConfig) -> Result<(), String> {
    save_config_to(&get_data_dir()?.join(CONFIG_FILE), config)
}

fn load_config_from(config_path: &Path) -> Result<GatewayConfig, String> {
    if !config_path.exists() {
        let config = GatewayConfig::default();
        let _ = save_config_to(config_path, &config);
        return Ok(config);
    }

    let content = fs::read_to_string(config_path)
        .map_err(|e| format!("Failed to read config file: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))
}

fn save_config_to(config_path: &Path, config: &GatewayConfig) -> Result<(), String> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    fs::write(config_path, content).map_err(|e| format!("Failed to save config: {}", e))
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes" | "on")
}

/// Apply environment overrides. Returns the bind address when `GATEWAY_BIND` is set.
pub fn apply_env_overrides(config: &mut GatewayConfig) -> Option<String> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

fn apply_overrides(
    config: &mut GatewayConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = env("BACKEND_API_URL") {
        config.upstream_base_url = Some(url);
    }
    if let Some(url) = env("AUTH_URL") {
        config.auth.url = Some(url);
    }
    if let Some(key) = env("AUTH_ANON_KEY") {
        config.auth.anon_key = Some(key);
    }
    if let Some(name) = env("AUTH_COOKIE_NAME") {
        config.auth.cookie_name = Some(name);
    }
    if let Some(value) = env("AUTH_COOKIE_SECURE") {
        config.auth.secure_cookies = is_truthy(&value);
    }
    if let Some(value) = env("GATEWAY_ALLOW_LAN") {
        if is_truthy(&value) {
            config.allow_lan_access = true;
        }
    }
    if let Some(value) = env("GATEWAY_PORT") {
        match value.trim().parse::<u16>() {
            Ok(port) => config.port = port,
            Err(_) => tracing::warn!("Ignoring invalid GATEWAY_PORT: {}", value),
        }
    }
    if let Some(value) = env("GATEWAY_CORS_ORIGINS") {
        config.cors_origins = value
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
    }

    let bind = env("GATEWAY_BIND")?;
    if bind != "127.0.0.1" && bind != "localhost" {
        config.allow_lan_access = true;
    }
    Some(bind)
}

//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{ApiKeyConfig, GatewayConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "EDGE_";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: String, message: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, message } => write!(f, "Invalid {}: {}", var, message),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load a TOML file, apply `EDGE_*` overrides, validate.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: GatewayConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
    finish(config)
}

/// Defaults plus environment overrides, for deployments without a file.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    finish(GatewayConfig::default())
}

fn finish(mut config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply overrides from `lookup` (an environment accessor).
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| {
        let name = format!("{ENV_PREFIX}{suffix}");
        lookup(&name).map(|value| (name, value))
    };

    if let Some((_, value)) = var("BIND_ADDRESS") {
        config.listener.bind_address = value;
    }
    if let Some((_, value)) = var("ALLOWED_IMAGE_TYPES") {
        config.upload.allowed_types = split_list(&value);
    }
    if let Some((name, value)) = var("MAX_UPLOAD_SIZE") {
        config.upload.max_size_bytes = parse_number(&name, &value)?;
    }
    if let Some((_, value)) = var("PUBLIC_BASE_URL") {
        config.upload.public_base_url = value;
    }
    if let Some((name, value)) = var("CACHE_TTL_SECS") {
        config.cache.default_ttl_secs = parse_number(&name, &value)?;
    }
    if let Some((name, value)) = var("RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.window_secs = parse_number(&name, &value)?;
    }
    if let Some((name, value)) = var("RATE_LIMIT_MAX_REQUESTS") {
        config.rate_limit.max_requests = parse_number(&name, &value)?;
    }
    if let Some((name, value)) = var("API_KEYS") {
        config.auth.api_keys = parse_api_keys(&name, &value)?;
    }
    if let Some((_, value)) = var("LOG_LEVEL") {
        config.observability.log_level = value;
    }
    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var: name.to_string(),
        message: format!("'{value}' is not a number"),
    })
}

/// `id:secret,id:secret`
fn parse_api_keys(name: &str, value: &str) -> Result<Vec<ApiKeyConfig>, ConfigError> {
    split_list(value)
        .into_iter()
        .map(|pair| match pair.split_once(':') {
            Some((id, secret)) => Ok(ApiKeyConfig {
                id: id.to_string(),
                secret: secret.to_string(),
            }),
            None => Err(ConfigError::Env {
                var: name.to_string(),
                message: "expected comma separated id:secret pairs".to_string(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("EDGE_ALLOWED_IMAGE_TYPES", "image/png, image/jpeg"),
                ("EDGE_MAX_UPLOAD_SIZE", "2048"),
                ("EDGE_RATE_LIMIT_MAX_REQUESTS", "7"),
                ("EDGE_API_KEYS", "admin:abc,master:def"),
            ]),
        )
        .unwrap();

        assert_eq!(config.upload.allowed_types, vec!["image/png", "image/jpeg"]);
        assert_eq!(config.upload.max_size_bytes, 2048);
        assert_eq!(config.rate_limit.max_requests, 7);
        assert_eq!(config.auth.api_keys.len(), 2);
        assert_eq!(config.auth.api_keys[1].id, "master");
        assert_eq!(config.auth.api_keys[1].secret, "def");
    }

    #[test]
    fn test_bad_number_names_variable() {
        let mut config = GatewayConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("EDGE_CACHE_TTL_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("EDGE_CACHE_TTL_SECS"));
    }

    #[test]
    fn test_load_config_file() {
        let path = std::env::temp_dir().join(format!("edge-gate-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[cache]\ndefault_ttl_secs = 120\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.cache.default_ttl_secs, 120);

        fs::write(&path, "[cache]\ndefault_ttl_secs = 0\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));

        fs::remove_file(&path).unwrap_or_default();
    }
}

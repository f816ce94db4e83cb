//! Configuration loading from disk and environment.

use std::env;
use std::fs;
use std::path::Path;

use crate::config::schema::{LogFormat, RouterConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
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

/// Load and validate configuration from a TOML file, then apply
/// environment overrides.
pub fn load_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content, |key| env::var(key).ok())
}

/// Build a configuration from defaults and environment overrides only.
pub fn config_from_env() -> Result<RouterConfig, ConfigError> {
    parse_config("", |key| env::var(key).ok())
}

/// Load from `path` when given, otherwise from defaults plus environment.
pub fn load_or_default(path: Option<&Path>) -> Result<RouterConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => config_from_env(),
    }
}

fn parse_config<F>(content: &str, lookup: F) -> Result<RouterConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: RouterConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    apply_env_overrides(&mut config, lookup);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the deployment environment variables on top of file values.
///
/// `GEOIP_PATH`, `ASN_PATH` and `SQLITE_PATH` replace the database paths.
/// `DEPLOY_ENVIRONMENT=production` switches to JSON logs at `warn`.
pub fn apply_env_overrides<F>(config: &mut RouterConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup("GEOIP_PATH").filter(|v| !v.is_empty()) {
        config.geoip.city_db_path = path;
    }
    if let Some(path) = lookup("ASN_PATH").filter(|v| !v.is_empty()) {
        config.geoip.asn_db_path = path;
    }
    if let Some(path) = lookup("SQLITE_PATH").filter(|v| !v.is_empty()) {
        config.catalog.database_path = path;
    }
    if let Some(deploy) = lookup("DEPLOY_ENVIRONMENT") {
        if deploy.eq_ignore_ascii_case("production") {
            config.observability.log_level = "warn".to_string();
            config.observability.log_format = LogFormat::Json;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_partial_file() {
        let config = parse_config(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [cache]
            ttl_secs = 60
            "#,
            no_env,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.cache.ttl_secs, 60);
        // Untouched sections keep their defaults
        assert_eq!(config.timeouts.request_secs, 10);
        assert_eq!(config.ranking.default_protocols, vec!["https", "http"]);
    }

    #[test]
    fn test_invalid_toml() {
        let err = parse_config("[listener", no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_failure_is_reported() {
        let err = parse_config("[timeouts]\nrequest_secs = 0\n", no_env).unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("GEOIP_PATH", "/srv/geo.mmdb"),
            ("ASN_PATH", "/srv/asn.mmdb"),
            ("SQLITE_PATH", "/srv/mirrors.db"),
            ("DEPLOY_ENVIRONMENT", "Production"),
        ]
        .into_iter()
        .collect();

        let config = parse_config("", |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.geoip.city_db_path, "/srv/geo.mmdb");
        assert_eq!(config.geoip.asn_db_path, "/srv/asn.mmdb");
        assert_eq!(config.catalog.database_path, "/srv/mirrors.db");
        assert_eq!(config.observability.log_level, "warn");
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let config = parse_config("", |k| (k == "SQLITE_PATH").then(String::new)).unwrap();
        assert_eq!(config.catalog.database_path, "/data/mirrors.db");
    }
}

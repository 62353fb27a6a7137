use std::path::{Path, PathBuf};

use axum::http::Method;
use httpwrap_api::api::Config;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read JSON config file at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode JSON config file at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid endpoint {route:?}: {reason}")]
    Invalid { route: String, reason: &'static str },
}

/// Something that can produce a [`Config`].
pub trait ConfigSource {
    /// Loads and validates the configuration, never returning a partial one.
    fn config(&self) -> Result<Config, ConfigError>;
}

/// Reads the configuration from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for JsonFileSource {
    fn config(&self) -> Result<Config, ConfigError> {
        let data = std::fs::read(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        let config: Config =
            serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?;
        validate(&config)?;
        Ok(config)
    }
}

/// Rejects endpoints the router could not serve as an exact path match.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    for (route, endpoint) in &config.endpoints {
        let invalid = |reason| ConfigError::Invalid {
            route: route.clone(),
            reason,
        };
        if !route.starts_with('/') {
            return Err(invalid("route must start with '/'"));
        }
        // axum parses `:` and `*` anywhere in a path as parameters.
        // Braces are the capture syntax of newer axum releases.
        if route.contains([':', '*', '{', '}']) {
            return Err(invalid("route must not contain path parameters"));
        }
        if endpoint.command.is_empty() {
            return Err(invalid("command must not be empty"));
        }
        if parse_method(endpoint.http_method()).is_none() {
            return Err(invalid("http_method is not a valid HTTP method"));
        }
    }
    Ok(())
}

/// Parses a method case-insensitively.
pub fn parse_method(method: &str) -> Option<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes()).ok()
}

/*!
 * Config Types
 */

use crate::core::limits::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_LISTEN_BACKLOG, DEFAULT_MAX_BLOCKING_THREADS,
    DEFAULT_MAX_RESOURCES, DEFAULT_MAX_SYMLINK_DEPTH, DEFAULT_STREAM_CAPACITY,
    DEFAULT_WORKER_THREADS,
};
use crate::http::{HeaderError, HeaderPolicy, DEFAULT_FORBIDDEN_HEADERS};
use crate::sockets::AuthorityParseError;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming a JSON config file
pub const CONFIG_ENV_VAR: &str = "WASI_HOST_CONFIG";

/// Instantiation failures
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    #[diagnostic(code(config::io))]
    Io { path: PathBuf, message: String },

    #[error("Invalid config: {0}")]
    #[diagnostic(code(config::parse))]
    Parse(String),

    #[error("Environment variable {0} is not set")]
    #[diagnostic(code(config::env), help("Point it at a JSON host config file."))]
    MissingEnv(&'static str),

    #[error("Preopen {guest_path}: {reason}")]
    #[diagnostic(code(config::preopen))]
    InvalidPreopen { guest_path: String, reason: String },

    #[error("Guest path {0} is preopened twice")]
    #[diagnostic(code(config::duplicate_preopen))]
    DuplicatePreopen(String),

    #[error(transparent)]
    #[diagnostic(code(config::authority))]
    Authority(#[from] AuthorityParseError),

    #[error("Forbidden header {name}: {source}")]
    #[diagnostic(code(config::header))]
    Header {
        name: String,
        #[source]
        source: HeaderError,
    },

    #[error("Failed to start host runtime: {0}")]
    #[diagnostic(code(config::runtime))]
    Runtime(String),

    #[error("HTTP client unavailable: {0}")]
    #[diagnostic(code(config::http_client))]
    HttpClient(crate::translate::ErrorCode),

    #[error("Limit {name}: {reason}")]
    #[diagnostic(code(config::limit))]
    InvalidLimit { name: &'static str, reason: &'static str },
}

/// One host directory exposed to the guest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreopenConfig {
    pub guest_path: String,
    pub host_path: PathBuf,
    #[serde(default)]
    pub read_only: bool,
}

impl PreopenConfig {
    pub fn new(guest_path: impl Into<String>, host_path: impl AsRef<Path>) -> Self {
        Self {
            guest_path: guest_path.into(),
            host_path: host_path.as_ref().to_path_buf(),
            read_only: false,
        }
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// Per-instantiation resource limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostLimits {
    pub max_resources: usize,
    pub stream_capacity: usize,
    pub max_symlink_depth: usize,
    pub worker_threads: usize,
    pub max_blocking_threads: usize,
    pub connect_timeout_ms: u64,
    pub default_listen_backlog: u32,
}

impl Default for HostLimits {
    fn default() -> Self {
        Self {
            max_resources: DEFAULT_MAX_RESOURCES,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            max_symlink_depth: DEFAULT_MAX_SYMLINK_DEPTH,
            worker_threads: DEFAULT_WORKER_THREADS,
            max_blocking_threads: DEFAULT_MAX_BLOCKING_THREADS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            default_listen_backlog: DEFAULT_LISTEN_BACKLOG,
        }
    }
}

impl HostLimits {
    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool); 6] = [
            ("max_resources", self.max_resources > 0),
            ("stream_capacity", self.stream_capacity > 0),
            ("worker_threads", self.worker_threads > 0),
            ("max_blocking_threads", self.max_blocking_threads > 0),
            ("connect_timeout_ms", self.connect_timeout_ms > 0),
            ("default_listen_backlog", self.default_listen_backlog > 0),
        ];
        match checks.iter().find(|(_, ok)| !ok) {
            Some((name, _)) => Err(ConfigError::InvalidLimit {
                name: *name,
                reason: "must be greater than zero",
            }),
            None => Ok(()),
        }
    }
}

fn default_forbidden_headers() -> Vec<String> {
    DEFAULT_FORBIDDEN_HEADERS.iter().map(|s| s.to_string()).collect()
}

/// Unvalidated host config
///
/// An empty `allowed_authorities` list denies all network access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    pub preopens: Vec<PreopenConfig>,
    pub allowed_authorities: Vec<String>,
    pub forbidden_headers: Vec<String>,
    pub forbidden_header_policy: HeaderPolicy,
    pub limits: HostLimits,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            preopens: Vec::new(),
            allowed_authorities: Vec::new(),
            forbidden_headers: default_forbidden_headers(),
            forbidden_header_policy: HeaderPolicy::default(),
            limits: HostLimits::default(),
        }
    }
}

impl HostConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&json)
    }

    /// Load the file named by `WASI_HOST_CONFIG`
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV_VAR).ok_or(ConfigError::MissingEnv(CONFIG_ENV_VAR))?;
        Self::from_json_file(PathBuf::from(path))
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = HostConfig::from_json("{}").unwrap();
        assert_eq!(config, HostConfig::default());
        assert!(config.allowed_authorities.is_empty());
        assert!(config.forbidden_headers.iter().any(|h| h == "connection"));
        assert_eq!(config.limits.stream_capacity, 64 * 1024);
        assert_eq!(config.limits.max_symlink_depth, 40);
    }

    #[test]
    fn test_full_document() {
        let json = r#"{
            "preopens": [
                {"guest_path": "/data", "host_path": "/srv/data", "read_only": true},
                {"guest_path": "/tmp", "host_path": "/tmp"}
            ],
            "allowed_authorities": ["example.com:443", "10.0.0.0/8:*"],
            "forbidden_header_policy": "strip",
            "limits": {"max_resources": 32, "connect_timeout_ms": 500}
        }"#;
        let config = HostConfig::from_json(json).unwrap();
        assert_eq!(config.preopens.len(), 2);
        assert!(config.preopens[0].read_only);
        assert!(!config.preopens[1].read_only);
        assert_eq!(config.forbidden_header_policy, HeaderPolicy::Strip);
        assert_eq!(config.limits.max_resources, 32);
        assert_eq!(config.limits.connect_timeout(), Duration::from_millis(500));
        assert_eq!(config.limits.worker_threads, DEFAULT_WORKER_THREADS);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(matches!(
            HostConfig::from_json(r#"{"preopen": []}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            HostConfig::from_json(r#"{"limits": {"max_handles": 3}}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = HostConfig::default();
        config.preopens.push(PreopenConfig::new("/", "/srv").read_only());
        let back = HostConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_zero_limit_invalid() {
        let limits = HostLimits {
            stream_capacity: 0,
            ..Default::default()
        };
        assert_eq!(
            limits.validate(),
            Err(ConfigError::InvalidLimit {
                name: "stream_capacity",
                reason: "must be greater than zero",
            })
        );
    }

    #[test]
    fn test_missing_file() {
        let err = HostConfig::from_json_file("/nonexistent/host.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

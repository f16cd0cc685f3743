/*!
 * Host Config Builder
 * Fluent construction of `HostConfig` for embedders and tests
 */

use super::instance::InstanceConfig;
use super::types::{ConfigError, HostConfig, HostLimits, PreopenConfig};
use crate::http::HeaderPolicy;
use std::path::Path;
use std::time::Duration;

/// Builder for `HostConfig`
#[derive(Debug, Clone, Default)]
pub struct HostConfigBuilder {
    config: HostConfig,
}

impl HostConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose `host_path` with all rights under `guest_path`
    pub fn preopen(mut self, guest_path: impl Into<String>, host_path: impl AsRef<Path>) -> Self {
        self.config
            .preopens
            .push(PreopenConfig::new(guest_path, host_path));
        self
    }

    /// Expose `host_path` with read and lookup rights only
    pub fn preopen_read_only(
        mut self,
        guest_path: impl Into<String>,
        host_path: impl AsRef<Path>,
    ) -> Self {
        self.config
            .preopens
            .push(PreopenConfig::new(guest_path, host_path).read_only());
        self
    }

    /// Add an authority pattern (`host:port`, `*.domain:*`, `10.0.0.0/8:*`, `!host:port`)
    pub fn allow_authority(mut self, pattern: impl Into<String>) -> Self {
        self.config.allowed_authorities.push(pattern.into());
        self
    }

    pub fn allow_all_authorities(self) -> Self {
        self.allow_authority("*:*")
    }

    /// Replace the forbidden header list
    pub fn forbidden_headers<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.config.forbidden_headers = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn forbidden_header_policy(mut self, policy: HeaderPolicy) -> Self {
        self.config.forbidden_header_policy = policy;
        self
    }

    pub fn limits(mut self, limits: HostLimits) -> Self {
        self.config.limits = limits;
        self
    }

    pub fn max_resources(mut self, max: usize) -> Self {
        self.config.limits.max_resources = max;
        self
    }

    pub fn stream_capacity(mut self, capacity: usize) -> Self {
        self.config.limits.stream_capacity = capacity;
        self
    }

    pub fn max_symlink_depth(mut self, depth: usize) -> Self {
        self.config.limits.max_symlink_depth = depth;
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config.limits.worker_threads = threads;
        self
    }

    pub fn max_blocking_threads(mut self, threads: usize) -> Self {
        self.config.limits.max_blocking_threads = threads;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.limits.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn listen_backlog(mut self, backlog: u32) -> Self {
        self.config.limits.default_listen_backlog = backlog;
        self
    }

    pub fn build(self) -> HostConfig {
        self.config
    }

    /// Build and validate in one step
    pub fn validate(self) -> Result<InstanceConfig, ConfigError> {
        self.config.validate()
    }
}

impl HostConfig {
    pub fn builder() -> HostConfigBuilder {
        HostConfigBuilder::new()
    }
}

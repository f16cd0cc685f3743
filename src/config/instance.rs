/*!
 * Instance Config
 * Validated, immutable settings for one instantiation
 */

use super::types::{ConfigError, HostConfig, HostLimits};
use crate::filesystem::{Preopen, Rights};
use crate::http::ForbiddenHeaders;
use crate::sockets::AuthorityAllowList;
use std::sync::Arc;
use tracing::{debug, info};

/// Output of `HostConfig::validate`, shared by `Arc` across managers
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    preopens: Vec<Arc<Preopen>>,
    allow: Arc<AuthorityAllowList>,
    forbidden: Arc<ForbiddenHeaders>,
    limits: HostLimits,
}

impl InstanceConfig {
    #[inline]
    pub fn preopens(&self) -> &[Arc<Preopen>] {
        &self.preopens
    }

    #[inline]
    pub fn allow_list(&self) -> &Arc<AuthorityAllowList> {
        &self.allow
    }

    #[inline]
    pub fn forbidden_headers(&self) -> &Arc<ForbiddenHeaders> {
        &self.forbidden
    }

    #[inline]
    pub fn limits(&self) -> &HostLimits {
        &self.limits
    }
}

/// Normalize a guest prefix; `..` may not climb above the guest root
fn clean_guest_path(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidPreopen {
        guest_path: raw.to_string(),
        reason: reason.to_string(),
    };
    if raw.is_empty() {
        return Err(invalid("guest path is empty"));
    }
    let cleaned = path_clean::clean(raw);
    let cleaned = cleaned
        .to_str()
        .ok_or_else(|| invalid("guest path is not valid UTF-8"))?;
    if cleaned == ".." || cleaned.starts_with("../") {
        return Err(invalid("guest path climbs above its root"));
    }
    Ok(cleaned.to_string())
}

impl HostConfig {
    /// Check every field and resolve host paths
    ///
    /// Host paths are canonicalized once here; the sandbox root of each
    /// preopen never changes afterwards.
    pub fn validate(&self) -> Result<InstanceConfig, ConfigError> {
        self.limits.validate()?;

        let mut preopens: Vec<Arc<Preopen>> = Vec::with_capacity(self.preopens.len());
        for entry in &self.preopens {
            let guest_path = clean_guest_path(&entry.guest_path)?;
            if preopens.iter().any(|p| p.guest_path() == guest_path) {
                return Err(ConfigError::DuplicatePreopen(guest_path));
            }

            let host_root = entry.host_path.canonicalize().map_err(|e| ConfigError::InvalidPreopen {
                guest_path: guest_path.clone(),
                reason: format!("{}: {}", entry.host_path.display(), e),
            })?;
            if !host_root.is_dir() {
                return Err(ConfigError::InvalidPreopen {
                    guest_path,
                    reason: format!("{} is not a directory", host_root.display()),
                });
            }

            let rights = if entry.read_only {
                Rights::READ_ONLY
            } else {
                Rights::ALL
            };
            debug!(guest = %guest_path, host = %host_root.display(), %rights, "preopen validated");
            preopens.push(Arc::new(Preopen::new(guest_path, host_root, rights)));
        }

        let allow = AuthorityAllowList::parse(&self.allowed_authorities)?;

        for name in &self.forbidden_headers {
            ForbiddenHeaders::new([name.as_str()], self.forbidden_header_policy).map_err(
                |source| ConfigError::Header {
                    name: name.clone(),
                    source,
                },
            )?;
        }
        let forbidden = ForbiddenHeaders::new(&self.forbidden_headers, self.forbidden_header_policy)
            .map_err(|source| ConfigError::Header {
                name: String::new(),
                source,
            })?;

        info!(
            preopens = preopens.len(),
            authorities = self.allowed_authorities.len(),
            forbidden_headers = self.forbidden_headers.len(),
            "host config validated"
        );

        Ok(InstanceConfig {
            preopens,
            allow: Arc::new(allow),
            forbidden: Arc::new(forbidden),
            limits: self.limits,
        })
    }
}

/*!
 * Header Fields
 * Validated header collections and the forbidden-header policy
 */

use ahash::AHashSet;
use miette::Diagnostic;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Diagnostic)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderError {
    #[error("invalid header syntax")]
    #[diagnostic(code(http::header_syntax))]
    InvalidSyntax,

    #[error("header is forbidden by host policy")]
    #[diagnostic(code(http::header_forbidden))]
    Forbidden,

    #[error("header fields are immutable")]
    #[diagnostic(
        code(http::header_immutable),
        help("Fields attached to a received message cannot be modified.")
    )]
    Immutable,
}

fn parse_name(name: &str) -> Result<HeaderName, HeaderError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| HeaderError::InvalidSyntax)
}

fn parse_value(value: &[u8]) -> Result<HeaderValue, HeaderError> {
    HeaderValue::from_bytes(value).map_err(|_| HeaderError::InvalidSyntax)
}

/// Ordered, multi-valued header collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    map: HeaderMap,
    immutable: bool,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_list<N, V>(entries: impl IntoIterator<Item = (N, V)>) -> Result<Self, HeaderError>
    where
        N: AsRef<str>,
        V: AsRef<[u8]>,
    {
        let mut fields = Self::new();
        for (name, value) in entries {
            fields.append(name.as_ref(), value.as_ref())?;
        }
        Ok(fields)
    }

    /// Header map of a received message
    pub(crate) fn received(map: HeaderMap) -> Self {
        Self {
            map,
            immutable: true,
        }
    }

    #[inline]
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    fn mutable(&mut self) -> Result<&mut HeaderMap, HeaderError> {
        if self.immutable {
            return Err(HeaderError::Immutable);
        }
        Ok(&mut self.map)
    }

    pub fn get(&self, name: &str) -> Vec<Vec<u8>> {
        match parse_name(name) {
            Ok(name) => self
                .map
                .get_all(&name)
                .iter()
                .map(|v| v.as_bytes().to_vec())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        parse_name(name).map_or(false, |name| self.map.contains_key(&name))
    }

    /// Replace every value of `name`
    pub fn set(&mut self, name: &str, values: &[Vec<u8>]) -> Result<(), HeaderError> {
        let name = parse_name(name)?;
        let values = values
            .iter()
            .map(|v| parse_value(v))
            .collect::<Result<Vec<_>, _>>()?;
        let map = self.mutable()?;
        map.remove(&name);
        for value in values {
            map.append(name.clone(), value);
        }
        Ok(())
    }

    pub fn append(&mut self, name: &str, value: &[u8]) -> Result<(), HeaderError> {
        let name = parse_name(name)?;
        let value = parse_value(value)?;
        self.mutable()?.append(name, value);
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Result<(), HeaderError> {
        let name = parse_name(name)?;
        self.mutable()?.remove(&name);
        Ok(())
    }

    /// Every (name, value) pair in insertion order per name
    pub fn entries(&self) -> Vec<(String, Vec<u8>)> {
        self.map
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Mutable copy, as when cloning fields taken from a received message
    pub fn to_mutable(&self) -> Self {
        Self {
            map: self.map.clone(),
            immutable: false,
        }
    }

    pub(crate) fn as_map(&self) -> &HeaderMap {
        &self.map
    }
}

/// What happens when an outgoing message carries a forbidden header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderPolicy {
    /// Refuse the message
    #[default]
    Reject,
    /// Silently remove the header
    Strip,
}

/// Header names guests may not set on outgoing messages
pub const DEFAULT_FORBIDDEN_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "host",
    "http2-settings",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForbiddenHeaders {
    names: AHashSet<HeaderName>,
    policy: HeaderPolicy,
}

impl Default for ForbiddenHeaders {
    fn default() -> Self {
        let names = DEFAULT_FORBIDDEN_HEADERS
            .iter()
            .map(|n| HeaderName::from_static(n))
            .collect();
        Self {
            names,
            policy: HeaderPolicy::default(),
        }
    }
}

impl ForbiddenHeaders {
    pub fn new<S: AsRef<str>>(
        names: impl IntoIterator<Item = S>,
        policy: HeaderPolicy,
    ) -> Result<Self, HeaderError> {
        let names = names
            .into_iter()
            .map(|n| parse_name(n.as_ref()))
            .collect::<Result<AHashSet<_>, _>>()?;
        Ok(Self { names, policy })
    }

    #[inline]
    pub fn policy(&self) -> HeaderPolicy {
        self.policy
    }

    pub fn is_forbidden(&self, name: &str) -> bool {
        parse_name(name).map_or(false, |name| self.names.contains(&name))
    }

    /// Gate a single header as the guest sets it
    pub fn check(&self, name: &str) -> Result<(), HeaderError> {
        match self.policy {
            HeaderPolicy::Reject if self.is_forbidden(name) => Err(HeaderError::Forbidden),
            _ => Ok(()),
        }
    }

    /// Header map to send, after the policy is applied
    pub fn apply(&self, fields: &Fields) -> Result<HeaderMap, HeaderError> {
        let mut map = fields.as_map().clone();
        for name in &self.names {
            if map.contains_key(name) {
                match self.policy {
                    HeaderPolicy::Reject => {
                        warn!(header = %name, "forbidden header rejected");
                        return Err(HeaderError::Forbidden);
                    }
                    HeaderPolicy::Strip => {
                        map.remove(name);
                    }
                }
            }
        }
        Ok(map)
    }
}

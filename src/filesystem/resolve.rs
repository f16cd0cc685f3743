/*!
 * Path Resolution
 *
 * Resolves a guest path relative to a directory descriptor inside one
 * preopen. Resolution happens in two phases:
 *
 * 1. Lexical: absolute paths, NUL bytes, and `..` segments that climb above
 *    the preopen root are refused before any native call.
 * 2. Walk: components are applied one at a time against the host
 *    filesystem, expanding symlinks in place (bounded by the hop limit).
 *    A symlink target that is absolute, or whose `..` segments climb above
 *    the root, is refused.
 *
 * The result is a component list relative to the root, never a host path
 * the guest supplied.
 */

use super::native::NativeFs;
use super::preopen::Preopen;
use super::types::DescriptorType;
use crate::translate::{ErrorCode, ErrorCodeTranslator, Operation};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A path inside a preopen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub components: Vec<String>,
    pub host_path: PathBuf,
}

impl ResolvedPath {
    /// Final component, `None` for the preopen root itself
    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }
}

/// Syntax checks that need no filesystem access
pub(crate) fn validate(path: &str) -> Result<(), ErrorCode> {
    if path.is_empty() {
        return Err(ErrorCode::NotFound);
    }
    if path.contains('\0') {
        return Err(ErrorCode::InvalidArgument);
    }
    if is_absolute(path) {
        return Err(ErrorCode::AccessDenied);
    }
    Ok(())
}

fn is_absolute(path: &str) -> bool {
    let host = Path::new(path);
    path.starts_with('/') || path.starts_with('\\') || host.has_root() || host.is_absolute()
}

/// Whether `..` segments alone climb above the root from `depth`
pub(crate) fn escapes_lexically(depth: usize, path: &str) -> bool {
    let mut depth = depth;
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => match depth.checked_sub(1) {
                Some(parent) => depth = parent,
                None => return true,
            },
            _ => depth += 1,
        }
    }
    false
}

pub(crate) struct PathResolver<'a> {
    fs: &'a dyn NativeFs,
    preopen: &'a Preopen,
    translator: ErrorCodeTranslator,
    max_links: usize,
}

impl<'a> PathResolver<'a> {
    pub fn new(
        fs: &'a dyn NativeFs,
        preopen: &'a Preopen,
        translator: ErrorCodeTranslator,
        max_links: usize,
    ) -> Self {
        Self {
            fs,
            preopen,
            translator,
            max_links,
        }
    }

    /// Resolve `path` relative to `base` (components of a directory inside
    /// the preopen). `follow_final` controls the last component; a trailing
    /// slash always follows.
    pub fn resolve(
        &self,
        base: &[String],
        path: &str,
        follow_final: bool,
    ) -> Result<ResolvedPath, ErrorCode> {
        validate(path)?;
        if escapes_lexically(base.len(), path) {
            warn!(path, root = %self.preopen.guest_path(), "path escapes preopen");
            return Err(ErrorCode::AccessDenied);
        }

        let follow_final = follow_final || path.ends_with('/');
        let mut pending: VecDeque<String> = path.split('/').map(str::to_owned).collect();
        let mut stack = base.to_vec();
        let mut hops = 0usize;

        while let Some(component) = pending.pop_front() {
            match component.as_str() {
                "" | "." => continue,
                ".." => {
                    if stack.pop().is_none() {
                        warn!(path, "symlink target escapes preopen");
                        return Err(ErrorCode::AccessDenied);
                    }
                    continue;
                }
                _ => {}
            }
            if cfg!(windows) && (component.contains('\\') || component.contains(':')) {
                return Err(ErrorCode::InvalidArgument);
            }

            let is_final = pending.iter().all(|c| c.is_empty() || c == ".");
            stack.push(component);
            if is_final && !follow_final {
                break;
            }

            let host = self.preopen.host_path(&stack);
            match self.fs.symlink_metadata(&host) {
                Ok(stat) if stat.kind == DescriptorType::SymbolicLink => {
                    hops += 1;
                    if hops > self.max_links {
                        return Err(ErrorCode::TooManyLinks);
                    }
                    let target = self
                        .fs
                        .read_link(&host)
                        .map_err(|e| self.translator.translate(&e, Operation::ReadLink))?;
                    stack.pop();
                    let target = symlink_target(&target)?;
                    for part in target.split('/').rev() {
                        pending.push_front(part.to_owned());
                    }
                }
                Ok(stat) => {
                    if !is_final && stat.kind != DescriptorType::Directory {
                        return Err(ErrorCode::NotDirectory);
                    }
                }
                Err(e) => {
                    let code = self.translator.translate(&e, Operation::Stat);
                    // A missing final component may be about to be created
                    if !(is_final && code == ErrorCode::NotFound) {
                        return Err(code);
                    }
                }
            }
        }

        Ok(ResolvedPath {
            host_path: self.preopen.host_path(&stack),
            components: stack,
        })
    }
}

fn symlink_target(target: &Path) -> Result<String, ErrorCode> {
    let text = target.to_str().ok_or(ErrorCode::InvalidArgument)?;
    let text = if cfg!(windows) {
        text.replace('\\', "/")
    } else {
        text.to_owned()
    };
    if is_absolute(&text) || target.has_root() {
        warn!(target = %text, "absolute symlink target refused");
        return Err(ErrorCode::AccessDenied);
    }
    Ok(text)
}

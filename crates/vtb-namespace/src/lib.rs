// SPDX-License-Identifier: MIT OR Apache-2.0
//! Logical-to-physical collection name resolution.
//!
//! Several tenants share one vector store. A caller addresses a collection by
//! a *logical* name plus an isolation *scope*; the store only ever sees the
//! *physical* name computed here:
//!
//! ```
//! use vtb_namespace::resolve;
//!
//! assert_eq!(resolve("kb", "team_a").unwrap(), "kb-team_a");
//! assert_eq!(resolve("kb", "").unwrap(), "kb");
//! ```
//!
//! Both parts are restricted to ASCII letters, digits and `_`. The separator
//! `-` can therefore appear at most once in a physical name, which makes
//! resolution injective: no crafted scope can reach another tenant's
//! collection.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::fmt;
use vtb_error::{BridgeError, ErrorKind};

/// Character joining logical name and scope.
pub const SEPARATOR: char = '-';

/// Longest physical name accepted by the vector store.
pub const MAX_PHYSICAL_LEN: usize = 255;

/// A validated (logical, scope) pair and its physical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionName {
    logical: String,
    scope: String,
    physical: String,
}

impl CollectionName {
    /// Validate `logical` and `scope` and compute the physical name.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidArgument`] when `logical` is empty or the result is
    /// too long; [`ErrorKind::NamespaceConflict`] when either part contains
    /// the separator or any character outside `[A-Za-z0-9_]`.
    pub fn resolve(logical: &str, scope: &str) -> Result<Self, BridgeError> {
        if logical.is_empty() {
            return Err(BridgeError::invalid_argument(
                "collection",
                "must not be empty",
            ));
        }
        check_part("collection", logical)?;
        check_part("scope", scope)?;

        let physical = if scope.is_empty() {
            logical.to_string()
        } else {
            format!("{logical}{SEPARATOR}{scope}")
        };
        if physical.len() > MAX_PHYSICAL_LEN {
            return Err(BridgeError::invalid_argument(
                "collection",
                format_args!("resolved name exceeds {MAX_PHYSICAL_LEN} bytes"),
            ));
        }
        Ok(Self {
            logical: logical.to_string(),
            scope: scope.to_string(),
            physical,
        })
    }

    /// Name the caller used.
    pub fn logical(&self) -> &str {
        &self.logical
    }

    /// Isolation scope; empty when unscoped.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Name used in the vector store.
    pub fn physical(&self) -> &str {
        &self.physical
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.physical)
    }
}

fn allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn check_part(field: &str, part: &str) -> Result<(), BridgeError> {
    if let Some(bad) = part.chars().find(|c| !allowed(*c)) {
        let reason = if bad == SEPARATOR {
            format!("`{part}` contains the scope separator '{SEPARATOR}'")
        } else {
            format!("`{part}` contains '{}'; only letters, digits and '_' are allowed", bad.escape_default())
        };
        return Err(BridgeError::new(
            ErrorKind::NamespaceConflict,
            format!("invalid {field}: {reason}"),
        )
        .with_context("field", field));
    }
    Ok(())
}

/// Physical name for `(logical, scope)`.
///
/// Pure and deterministic. See [`CollectionName::resolve`] for the rules.
pub fn resolve(logical: &str, scope: &str) -> Result<String, BridgeError> {
    CollectionName::resolve(logical, scope).map(|n| n.physical)
}

/// Inverse of [`resolve`]. Returns `None` for names no valid pair produces.
pub fn parse(physical: &str) -> Option<CollectionName> {
    let (logical, scope) = physical
        .split_once(SEPARATOR)
        .unwrap_or((physical, ""));
    if physical.ends_with(SEPARATOR) {
        return None;
    }
    CollectionName::resolve(logical, scope).ok()
}

/// The logical name of `physical` if it belongs to `scope`.
///
/// With an empty scope only unscoped collections match.
pub fn logical_in_scope<'a>(physical: &'a str, scope: &str) -> Option<&'a str> {
    let parsed = parse(physical)?;
    if parsed.scope() != scope {
        return None;
    }
    Some(&physical[..parsed.logical().len()])
}

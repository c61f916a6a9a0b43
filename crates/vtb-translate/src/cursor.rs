// SPDX-License-Identifier: MIT OR Apache-2.0
//! Opaque pagination cursors.
//!
//! A cursor is `<fingerprint>.<position>`. The fingerprint is a SHA-256
//! prefix over the physical collection, the canonical filter and a kind tag
//! (scroll cursors carry `scroll`, search cursors carry the query vector), so
//! replaying a cursor anywhere else fails instead of silently returning the
//! wrong page.

use sha2::{Digest, Sha256};
use vtb_core::{FilterExpression, PointId};
use vtb_error::BridgeError;

const FINGERPRINT_LEN: usize = 16;

/// Where the next page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorPosition {
    /// Scroll: id of the first point of the next page.
    Point(PointId),
    /// Search: number of hits already returned.
    Skip(u64),
}

/// What a cursor is bound to.
#[derive(Debug, Clone, Copy)]
pub struct CursorScope<'a> {
    /// Physical collection name.
    pub collection: &'a str,
    /// Filter of the original request.
    pub filter: Option<&'a FilterExpression>,
    /// Anything else the page depends on.
    pub query: &'a str,
}

impl CursorScope<'_> {
    fn fingerprint(&self) -> String {
        let filter = self
            .filter
            .map(FilterExpression::canonical_json)
            .unwrap_or_else(|| "null".into());
        let mut hasher = Sha256::new();
        hasher.update(self.collection.as_bytes());
        hasher.update([0u8]);
        hasher.update(filter.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.query.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..FINGERPRINT_LEN].to_string()
    }
}

/// Encode `position` as a cursor bound to `scope`.
pub fn encode_cursor(scope: &CursorScope<'_>, position: &CursorPosition) -> String {
    let pos = match position {
        CursorPosition::Point(PointId::Num(n)) => format!("n{n}"),
        CursorPosition::Point(PointId::Str(s)) => format!("s{s}"),
        CursorPosition::Skip(k) => format!("k{k}"),
    };
    format!("{}.{pos}", scope.fingerprint())
}

fn malformed() -> BridgeError {
    BridgeError::invalid_argument("cursor", "malformed cursor")
}

/// Decode a cursor, checking it was issued for `scope`.
///
/// # Errors
///
/// [`vtb_error::ErrorKind::InvalidArgument`] naming `cursor` when the token
/// is malformed or was issued for a different collection, filter or query.
pub fn decode_cursor(token: &str, scope: &CursorScope<'_>) -> Result<CursorPosition, BridgeError> {
    let (fingerprint, pos) = token.split_once('.').ok_or_else(malformed)?;
    if fingerprint.len() != FINGERPRINT_LEN || !fingerprint.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return Err(malformed());
    }
    if fingerprint != scope.fingerprint() {
        return Err(BridgeError::invalid_argument(
            "cursor",
            "cursor was issued for a different collection or filter",
        ));
    }
    let (tag, rest) = pos.split_at_checked(1).ok_or_else(malformed)?;
    match tag {
        "n" => rest
            .parse()
            .map(|n| CursorPosition::Point(PointId::Num(n)))
            .map_err(|_| malformed()),
        "s" if !rest.is_empty() => Ok(CursorPosition::Point(PointId::Str(rest.to_string()))),
        "k" => rest.parse().map(CursorPosition::Skip).map_err(|_| malformed()),
        _ => Err(malformed()),
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Translation between canonical bridge types and the Qdrant REST wire
//! format.
//!
//! Everything here is a pure function: no I/O, no shared state. Failures are
//! [`vtb_error::BridgeError`]s: `TranslationUnsupported` for requests the
//! backend cannot express, `Internal` for responses that do not decode.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod collection;
pub mod cursor;
pub mod filter;
pub mod points;
pub mod query;

pub use collection::{
    distance_to_wire, from_backend_cluster, from_backend_collection,
    from_backend_collection_names, from_backend_snapshot, from_backend_snapshots,
    to_backend_create, to_backend_update,
};
pub use cursor::{CursorPosition, CursorScope, decode_cursor, encode_cursor};
pub use filter::to_backend_filter;
pub use points::{
    ORIGINAL_ID_KEY, UNNAMED_VECTOR, from_backend_offset, from_backend_point,
    from_backend_points, from_backend_search_hit, from_backend_search_hits, payload_selector,
    to_backend_point, wire_id, wire_ids,
};
pub use query::{
    from_backend_scroll, to_backend_count, to_backend_delete, to_backend_get,
    to_backend_recommend, to_backend_scroll, to_backend_search, to_backend_search_batch,
};

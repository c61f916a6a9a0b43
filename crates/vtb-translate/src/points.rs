// SPDX-License-Identifier: MIT OR Apache-2.0
//! Point ids, records and search hits.
//!
//! Qdrant only accepts unsigned integers and UUIDs as point ids. Any other
//! string id is mapped to a UUIDv5 in the DNS namespace and the caller's
//! string is kept in the payload under [`ORIGINAL_ID_KEY`]; decoding reverses
//! the mapping so callers always get back the id they wrote. Reads without
//! payload still fetch that one key, see [`payload_selector`].

use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use uuid::Uuid;
use vtb_core::{NamedVectors, Payload, PointId, PointRecord, ScoredPoint, SparseVector, VectorData};
use vtb_error::BridgeError;

/// Payload key holding a string id that was mapped to a UUID.
pub const ORIGINAL_ID_KEY: &str = "original_id";

/// Vector-space name used for collections with a single unnamed vector.
pub const UNNAMED_VECTOR: &str = "";

pub(crate) fn malformed(what: &str, err: impl std::fmt::Display) -> BridgeError {
    BridgeError::internal(format!("unexpected backend response for {what}: {err}"))
}

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// Wire id for `id`, and whether the original must be kept in the payload.
pub fn wire_id(id: &PointId) -> (Value, bool) {
    match id {
        PointId::Num(n) => (json!(n), false),
        PointId::Str(s) => match Uuid::parse_str(s) {
            Ok(u) => {
                let canonical = u.hyphenated().to_string();
                let changed = canonical != *s;
                (Value::String(canonical), changed)
            }
            Err(_) => (
                Value::String(Uuid::new_v5(&Uuid::NAMESPACE_DNS, s.as_bytes()).to_string()),
                true,
            ),
        },
    }
}

/// Wire ids for a list of ids.
pub fn wire_ids(ids: &[PointId]) -> Vec<Value> {
    ids.iter().map(|id| wire_id(id).0).collect()
}

fn parse_wire_id(raw: &Value) -> Result<PointId, BridgeError> {
    PointId::deserialize(raw).map_err(|e| malformed("point id", e))
}

/// Decode a wire id, restoring a mapped string id from the payload.
///
/// `original_id` is only honoured when it maps back to the wire id, so user
/// data stored under the same key is left alone.
fn restore_id(wire: PointId, payload: &mut Option<Payload>) -> PointId {
    let Some(p) = payload.as_mut() else {
        return wire;
    };
    let Some(Value::String(original)) = p.get(ORIGINAL_ID_KEY) else {
        return wire;
    };
    let candidate = PointId::Str(original.clone());
    if let (Value::String(mapped), PointId::Str(w)) = (wire_id(&candidate).0, &wire)
        && mapped == *w
    {
        p.remove(ORIGINAL_ID_KEY);
        return candidate;
    }
    wire
}

/// `with_payload` value for a read body.
///
/// Without payload the backend is still asked for [`ORIGINAL_ID_KEY`] so
/// mapped string ids can be restored; the decoders drop it again.
pub fn payload_selector(with_payload: bool) -> Value {
    if with_payload {
        Value::Bool(true)
    } else {
        json!({ "include": [ORIGINAL_ID_KEY] })
    }
}

/// Decode a scroll offset returned by the backend.
pub fn from_backend_offset(raw: &Value) -> Result<Option<PointId>, BridgeError> {
    if raw.is_null() {
        return Ok(None);
    }
    parse_wire_id(raw).map(Some)
}

// ---------------------------------------------------------------------------
// Vectors
// ---------------------------------------------------------------------------

fn vector_to_wire(v: &VectorData) -> Value {
    match v {
        VectorData::Dense(values) => json!(values),
        VectorData::Sparse(SparseVector { indices, values }) => {
            json!({ "indices": indices, "values": values })
        }
    }
}

/// Encode named vectors. A lone unnamed vector is sent as a plain array.
pub(crate) fn vectors_to_wire(vectors: &NamedVectors) -> Value {
    if vectors.len() == 1
        && let Some(v) = vectors.get(UNNAMED_VECTOR)
    {
        return vector_to_wire(v);
    }
    let map: Map<String, Value> = vectors
        .iter()
        .map(|(name, v)| (name.clone(), vector_to_wire(v)))
        .collect();
    Value::Object(map)
}

fn vectors_from_wire(raw: Option<&Value>) -> Result<Option<NamedVectors>, BridgeError> {
    let Some(raw) = raw else { return Ok(None) };
    match raw {
        Value::Null => Ok(None),
        Value::Array(_) => {
            let dense = Vec::<f64>::deserialize(raw).map_err(|e| malformed("vector", e))?;
            let mut out = BTreeMap::new();
            out.insert(UNNAMED_VECTOR.to_string(), VectorData::Dense(dense));
            Ok(Some(out))
        }
        Value::Object(_) => NamedVectors::deserialize(raw)
            .map(Some)
            .map_err(|e| malformed("vector", e)),
        other => Err(malformed("vector", format!("unexpected {other}"))),
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Encode a record for upsert.
///
/// # Errors
///
/// [`vtb_error::ErrorKind::InvalidArgument`] when a mapped string id would
/// overwrite a different `original_id` already present in the payload.
pub fn to_backend_point(record: &PointRecord) -> Result<Value, BridgeError> {
    let (id, keep_original) = wire_id(&record.id);
    let mut payload = record.payload.clone();
    if keep_original {
        let original = record.id.to_string();
        match payload.get(ORIGINAL_ID_KEY) {
            Some(Value::String(existing)) if *existing == original => {}
            Some(_) => {
                return Err(BridgeError::invalid_argument(
                    "payload",
                    format_args!(
                        "point `{original}` carries its own `{ORIGINAL_ID_KEY}`, which is reserved for string ids"
                    ),
                ));
            }
            None => {
                payload.insert(ORIGINAL_ID_KEY.into(), Value::String(original));
            }
        }
    }
    Ok(json!({
        "id": id,
        "vector": vectors_to_wire(&record.vectors),
        "payload": payload,
    }))
}

#[derive(Deserialize)]
struct WireRecord {
    id: Value,
    #[serde(default)]
    payload: Option<Payload>,
    #[serde(default)]
    vector: Option<Value>,
}

#[derive(Deserialize)]
struct WireHit {
    id: Value,
    score: f64,
    #[serde(default)]
    payload: Option<Payload>,
    #[serde(default)]
    vector: Option<Value>,
}

/// Restore the caller's id, then keep the payload only if it was asked for.
fn decode_id_and_payload(
    raw_id: &Value,
    payload: Option<Payload>,
    with_payload: bool,
) -> Result<(PointId, Option<Payload>), BridgeError> {
    let mut payload = payload;
    let id = restore_id(parse_wire_id(raw_id)?, &mut payload);
    Ok((id, payload.filter(|_| with_payload)))
}

/// Decode a stored record read with the given `with_payload` flag.
pub fn from_backend_point(raw: &Value, with_payload: bool) -> Result<PointRecord, BridgeError> {
    let wire = WireRecord::deserialize(raw).map_err(|e| malformed("point", e))?;
    let (id, payload) = decode_id_and_payload(&wire.id, wire.payload, with_payload)?;
    Ok(PointRecord {
        id,
        vectors: vectors_from_wire(wire.vector.as_ref())?.unwrap_or_default(),
        payload: payload.unwrap_or_default(),
    })
}

/// Decode a search or recommend hit.
pub fn from_backend_search_hit(raw: &Value, with_payload: bool) -> Result<ScoredPoint, BridgeError> {
    let wire = WireHit::deserialize(raw).map_err(|e| malformed("search hit", e))?;
    let (id, payload) = decode_id_and_payload(&wire.id, wire.payload, with_payload)?;
    Ok(ScoredPoint {
        id,
        score: wire.score,
        payload,
        vectors: vectors_from_wire(wire.vector.as_ref())?,
    })
}

/// Decode an array of records.
pub fn from_backend_points(raw: &Value, with_payload: bool) -> Result<Vec<PointRecord>, BridgeError> {
    raw.as_array()
        .ok_or_else(|| malformed("points", "expected an array"))?
        .iter()
        .map(|p| from_backend_point(p, with_payload))
        .collect()
}

/// Decode an array of hits.
pub fn from_backend_search_hits(
    raw: &Value,
    with_payload: bool,
) -> Result<Vec<ScoredPoint>, BridgeError> {
    raw.as_array()
        .ok_or_else(|| malformed("search hits", "expected an array"))?
        .iter()
        .map(|h| from_backend_search_hit(h, with_payload))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtb_error::ErrorKind;

    fn record(id: PointId, payload: Value) -> PointRecord {
        let mut vectors = BTreeMap::new();
        vectors.insert("text-dense".to_string(), VectorData::Dense(vec![0.5, -0.25]));
        PointRecord {
            id,
            vectors,
            payload: payload.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn integer_ids_pass_through() {
        assert_eq!(wire_id(&PointId::Num(9)), (json!(9), false));
    }

    #[test]
    fn canonical_uuid_passes_through() {
        let u = "6f3c2a10-64a6-4f2b-9f55-0a1e4a3c2b11";
        assert_eq!(wire_id(&PointId::from(u)), (json!(u), false));
    }

    #[test]
    fn non_canonical_uuid_is_normalised_and_remembered() {
        let (id, keep) = wire_id(&PointId::from("6F3C2A1064A64F2B9F550A1E4A3C2B11"));
        assert_eq!(id, json!("6f3c2a10-64a6-4f2b-9f55-0a1e4a3c2b11"));
        assert!(keep);
    }

    #[test]
    fn string_ids_map_to_stable_uuid_v5() {
        let (a, keep) = wire_id(&PointId::from("doc-1"));
        let (b, _) = wire_id(&PointId::from("doc-1"));
        let (c, _) = wire_id(&PointId::from("doc-2"));
        assert!(keep);
        assert_eq!(a, b);
        assert_ne!(a, c);
        let u = Uuid::parse_str(a.as_str().unwrap()).unwrap();
        assert_eq!(u.get_version_num(), 5);
    }

    #[test]
    fn to_backend_point_shape() {
        let out = to_backend_point(&record(PointId::Num(1), json!({"title": "a"}))).unwrap();
        assert_eq!(
            out,
            json!({"id": 1, "vector": {"text-dense": [0.5, -0.25]}, "payload": {"title": "a"}})
        );
    }

    #[test]
    fn string_id_round_trips_through_payload() {
        let original = record(PointId::from("readme.md#intro"), json!({"title": "a"}));
        let wire = to_backend_point(&original).unwrap();
        assert_eq!(wire["payload"][ORIGINAL_ID_KEY], "readme.md#intro");
        let back = from_backend_point(&wire, true).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn string_id_is_restored_when_payload_is_not_wanted() {
        let original = record(PointId::from("doc-1"), json!({"title": "a"}));
        let (mapped, _) = wire_id(&original.id);
        assert_eq!(payload_selector(false), json!({"include": [ORIGINAL_ID_KEY]}));

        let raw = json!({"id": mapped, "payload": {ORIGINAL_ID_KEY: "doc-1"}});
        let back = from_backend_point(&raw, false).unwrap();
        assert_eq!(back.id, PointId::from("doc-1"));
        assert!(back.payload.is_empty());

        let raw = json!({"id": mapped, "score": 0.5, "payload": {ORIGINAL_ID_KEY: "doc-1"}});
        let hit = from_backend_search_hit(&raw, false).unwrap();
        assert_eq!(hit.id, PointId::from("doc-1"));
        assert!(hit.payload.is_none());
    }

    #[test]
    fn conflicting_original_id_is_rejected() {
        let r = record(PointId::from("doc-1"), json!({"original_id": "other"}));
        let err = to_backend_point(&r).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert_eq!(err.field(), Some("payload"));
    }

    #[test]
    fn unrelated_original_id_in_payload_is_kept() {
        let raw = json!({"id": 3, "payload": {"original_id": "x"}, "vector": null});
        let p = from_backend_point(&raw, true).unwrap();
        assert_eq!(p.id, PointId::Num(3));
        assert_eq!(p.payload["original_id"], "x");
    }

    #[test]
    fn unnamed_and_sparse_vectors_decode() {
        let raw = json!({"id": 1, "payload": null, "vector": [1.0, 2.0]});
        let p = from_backend_point(&raw, true).unwrap();
        assert_eq!(p.vectors[UNNAMED_VECTOR], VectorData::Dense(vec![1.0, 2.0]));
        assert!(p.payload.is_empty());

        let raw = json!({"id": 2, "vector": {"text-sparse": {"indices": [3], "values": [0.5]}}});
        let p = from_backend_point(&raw, true).unwrap();
        assert_eq!(
            p.vectors["text-sparse"],
            VectorData::Sparse(SparseVector {
                indices: vec![3],
                values: vec![0.5]
            })
        );
    }

    #[test]
    fn unnamed_vector_encodes_as_plain_array() {
        let mut vectors = BTreeMap::new();
        vectors.insert(UNNAMED_VECTOR.to_string(), VectorData::Dense(vec![1.0]));
        assert_eq!(vectors_to_wire(&vectors), json!([1.0]));
    }

    #[test]
    fn search_hit_decodes_score_exactly() {
        let raw = json!({"id": 1, "version": 3, "score": 0.999_999_999_999_9, "payload": {"title": "a"}});
        let hit = from_backend_search_hit(&raw, true).unwrap();
        assert_eq!(hit.id, PointId::Num(1));
        assert_eq!(hit.score, 0.999_999_999_999_9);
        assert_eq!(hit.payload.unwrap()["title"], "a");
        assert!(hit.vectors.is_none());
    }

    #[test]
    fn malformed_hit_is_internal() {
        let err = from_backend_search_hit(&json!({"id": 1}), true).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[test]
    fn offset_decoding() {
        assert_eq!(from_backend_offset(&Value::Null).unwrap(), None);
        assert_eq!(
            from_backend_offset(&json!(17)).unwrap(),
            Some(PointId::Num(17))
        );
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request bodies for search, recommend, scroll, count, get and delete.

use crate::filter::to_backend_filter;
use crate::points::{
    UNNAMED_VECTOR, from_backend_offset, from_backend_points, payload_selector, wire_id, wire_ids,
};
use serde_json::{Map, Value, json};
use vtb_core::{
    FilterExpression, PointId, PointSelector, RecommendQuery, ScrollPage, ScrollRequest,
    SearchQuery,
};
use vtb_error::BridgeError;

fn put_filter(
    body: &mut Map<String, Value>,
    filter: Option<&FilterExpression>,
) -> Result<(), BridgeError> {
    if let Some(f) = filter {
        body.insert("filter".into(), to_backend_filter(f)?);
    }
    Ok(())
}

fn put_threshold(body: &mut Map<String, Value>, threshold: Option<f64>) {
    if let Some(t) = threshold {
        body.insert("score_threshold".into(), json!(t));
    }
}

/// Body of `POST /collections/{name}/points/search`.
pub fn to_backend_search(query: &SearchQuery) -> Result<Value, BridgeError> {
    let mut body = Map::new();
    let vector = if query.vector_name == UNNAMED_VECTOR {
        json!(query.vector)
    } else {
        json!({ "name": query.vector_name, "vector": query.vector })
    };
    body.insert("vector".into(), vector);
    put_filter(&mut body, query.filter.as_ref())?;
    put_threshold(&mut body, query.score_threshold);
    body.insert("limit".into(), json!(query.limit));
    if query.offset > 0 {
        body.insert("offset".into(), json!(query.offset));
    }
    body.insert("with_payload".into(), payload_selector(query.with_payload));
    body.insert("with_vector".into(), json!(query.with_vector));
    Ok(Value::Object(body))
}

/// Body of `POST /collections/{name}/points/search/batch`.
pub fn to_backend_search_batch(queries: &[SearchQuery]) -> Result<Value, BridgeError> {
    let searches = queries
        .iter()
        .map(to_backend_search)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "searches": searches }))
}

/// Body of `POST /collections/{name}/points/recommend`.
pub fn to_backend_recommend(query: &RecommendQuery) -> Result<Value, BridgeError> {
    let mut body = Map::new();
    body.insert("positive".into(), json!(wire_ids(&query.positive)));
    body.insert("negative".into(), json!(wire_ids(&query.negative)));
    if query.vector_name != UNNAMED_VECTOR {
        body.insert("using".into(), json!(query.vector_name));
    }
    put_filter(&mut body, query.filter.as_ref())?;
    put_threshold(&mut body, query.score_threshold);
    body.insert("limit".into(), json!(query.limit));
    body.insert("with_payload".into(), payload_selector(query.with_payload));
    body.insert("with_vector".into(), json!(query.with_vector));
    Ok(Value::Object(body))
}

/// Body of `POST /collections/{name}/points/scroll`.
pub fn to_backend_scroll(request: &ScrollRequest) -> Result<Value, BridgeError> {
    let mut body = Map::new();
    put_filter(&mut body, request.filter.as_ref())?;
    body.insert("limit".into(), json!(request.limit));
    if let Some(offset) = &request.offset {
        body.insert("offset".into(), wire_id(offset).0);
    }
    body.insert("with_payload".into(), payload_selector(request.with_payload));
    body.insert("with_vector".into(), json!(request.with_vector));
    Ok(Value::Object(body))
}

/// Decode the `result` of a scroll.
pub fn from_backend_scroll(raw: &Value, with_payload: bool) -> Result<ScrollPage, BridgeError> {
    Ok(ScrollPage {
        points: from_backend_points(raw.get("points").unwrap_or(&Value::Null), with_payload)?,
        next_offset: from_backend_offset(raw.get("next_page_offset").unwrap_or(&Value::Null))?,
    })
}

/// Body of `POST /collections/{name}/points/count`.
pub fn to_backend_count(filter: Option<&FilterExpression>, exact: bool) -> Result<Value, BridgeError> {
    let mut body = Map::new();
    put_filter(&mut body, filter)?;
    body.insert("exact".into(), json!(exact));
    Ok(Value::Object(body))
}

/// Body of `POST /collections/{name}/points` (retrieve by ids).
pub fn to_backend_get(ids: &[PointId], with_payload: bool, with_vector: bool) -> Value {
    json!({
        "ids": wire_ids(ids),
        "with_payload": payload_selector(with_payload),
        "with_vector": with_vector,
    })
}

/// Body of `POST /collections/{name}/points/delete`.
pub fn to_backend_delete(selector: &PointSelector) -> Result<Value, BridgeError> {
    match selector {
        PointSelector::Ids(ids) => Ok(json!({ "points": wire_ids(ids) })),
        PointSelector::Filter(f) => Ok(json!({ "filter": to_backend_filter(f)? })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtb_error::ErrorKind;

    fn search() -> SearchQuery {
        SearchQuery {
            vector_name: "text-dense".into(),
            vector: vec![0.1, 0.2],
            filter: None,
            score_threshold: None,
            limit: 5,
            offset: 0,
            with_payload: true,
            with_vector: false,
        }
    }

    #[test]
    fn search_body_uses_named_vector() {
        assert_eq!(
            to_backend_search(&search()).unwrap(),
            json!({
                "vector": {"name": "text-dense", "vector": [0.1, 0.2]},
                "limit": 5,
                "with_payload": true,
                "with_vector": false
            })
        );
    }

    #[test]
    fn search_body_with_filter_threshold_and_offset() {
        let mut q = search();
        q.filter = Some(FilterExpression::eq("lang", "rust"));
        q.score_threshold = Some(0.75);
        q.offset = 10;
        let body = to_backend_search(&q).unwrap();
        assert_eq!(body["filter"]["must"][0]["key"], "lang");
        assert_eq!(body["score_threshold"], 0.75);
        assert_eq!(body["offset"], 10);
    }

    #[test]
    fn unsupported_filter_fails_before_any_body_is_built() {
        let mut q = search();
        q.filter = Some(FilterExpression::eq("x", 1.5));
        let err = to_backend_search(&q).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TranslationUnsupported);
    }

    #[test]
    fn batch_wraps_searches() {
        let body = to_backend_search_batch(&[search(), search()]).unwrap();
        assert_eq!(body["searches"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn recommend_maps_ids_and_using() {
        let q = RecommendQuery {
            positive: vec![PointId::Num(1), PointId::from("doc")],
            negative: vec![],
            vector_name: "text-dense".into(),
            filter: None,
            score_threshold: None,
            limit: 3,
            with_payload: true,
            with_vector: false,
        };
        let body = to_backend_recommend(&q).unwrap();
        assert_eq!(body["positive"][0], 1);
        assert!(body["positive"][1].as_str().unwrap().contains('-'));
        assert_eq!(body["using"], "text-dense");
        assert_eq!(body["negative"], json!([]));
    }

    #[test]
    fn scroll_round_trip_of_offset() {
        let req = ScrollRequest {
            filter: None,
            limit: 2,
            offset: Some(PointId::Num(4)),
            with_payload: true,
            with_vector: false,
        };
        let body = to_backend_scroll(&req).unwrap();
        assert_eq!(body["offset"], 4);
        let page = from_backend_scroll(&json!({
            "points": [{"id": 4, "payload": {}}, {"id": 5, "payload": {}}],
            "next_page_offset": 6
        }), true)
        .unwrap();
        assert_eq!(page.points.len(), 2);
        assert_eq!(page.next_offset, Some(PointId::Num(6)));
    }

    #[test]
    fn delete_by_ids_or_filter() {
        assert_eq!(
            to_backend_delete(&PointSelector::Ids(vec![PointId::Num(1)])).unwrap(),
            json!({"points": [1]})
        );
        let body =
            to_backend_delete(&PointSelector::Filter(FilterExpression::eq("a", "b"))).unwrap();
        assert_eq!(body["filter"]["must"][0]["match"]["value"], "b");
    }

    #[test]
    fn count_and_get_bodies() {
        assert_eq!(to_backend_count(None, true).unwrap(), json!({"exact": true}));
        assert_eq!(
            to_backend_get(&[PointId::Num(2)], false, true),
            json!({"ids": [2], "with_payload": {"include": ["original_id"]}, "with_vector": true})
        );
        assert_eq!(to_backend_get(&[], true, false)["with_payload"], json!(true));
    }
}

//! Response materialization
//!
//! Turns a response body into typed results and splices included references
//! into the entries that point at them.
//!
//! Reference fields arrive as stubs, `{"uid": ..., "_content_type_uid": ...}`.
//! For each requested inclusion path the stub is replaced by the matching
//! document from the response's `included` section. Stubs without a match
//! stay as stubs; a missing reference never fails the whole response.
//! Resolution only follows the requested dotted paths and stops at a uid
//! already on the current chain, so cyclic references cannot recurse.

use crate::asset::Asset;
use crate::entry::{Entry, CONTENT_TYPE_UID_KEY};
use crate::error::Result;
use crate::query::ReferenceInclusionSet;
use crate::transport::TransportError;
use crate::types::{AssetQueryResult, ContentTypeSchema, QueryResult};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Side-channel section holding referenced documents
pub const INCLUDED_KEY: &str = "included";

/// Whether `document` is an unresolved reference marker
pub fn is_reference_stub(document: &Map<String, Value>) -> bool {
    matches!(document.get("uid"), Some(Value::String(_)))
        && document
            .keys()
            .all(|k| k == "uid" || k == CONTENT_TYPE_UID_KEY)
}

/// Referenced documents by uid
#[derive(Debug, Default)]
struct ReferenceIndex {
    documents: HashMap<String, Map<String, Value>>,
}

impl ReferenceIndex {
    /// Accepts an array of documents, an object of arrays
    /// (`{"entries": [..], "assets": [..]}`) or a uid-keyed object.
    fn from_body(body: &Map<String, Value>) -> Self {
        let mut index = Self::default();
        match body.get(INCLUDED_KEY) {
            Some(Value::Array(documents)) => index.add_all(documents),
            Some(Value::Object(sections)) => {
                for section in sections.values() {
                    match section {
                        Value::Array(documents) => index.add_all(documents),
                        Value::Object(document) => index.add(document),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        index
    }

    fn add_all(&mut self, documents: &[Value]) {
        for document in documents.iter().filter_map(Value::as_object) {
            self.add(document);
        }
    }

    fn add(&mut self, document: &Map<String, Value>) {
        if let Some(uid) = document.get("uid").and_then(Value::as_str) {
            self.documents.insert(uid.to_string(), document.clone());
        }
    }

    fn get(&self, uid: &str) -> Option<&Map<String, Value>> {
        self.documents.get(uid)
    }

    fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Builds typed results for one request
#[derive(Debug, Clone, Default)]
pub struct ResultMaterializer {
    includes: ReferenceInclusionSet,
    include_count: bool,
    include_schema: bool,
    include_content_type: bool,
}

impl ResultMaterializer {
    /// Materializer resolving the references in `includes`.
    pub fn new(includes: ReferenceInclusionSet) -> Self {
        Self {
            includes,
            ..Default::default()
        }
    }

    pub fn with_count(mut self, include_count: bool) -> Self {
        self.include_count = include_count;
        self
    }

    pub fn with_schema(mut self, include_schema: bool) -> Self {
        self.include_schema = include_schema;
        self
    }

    pub fn with_content_type(mut self, include_content_type: bool) -> Self {
        self.include_content_type = include_content_type;
        self
    }

    /// Materialize an entry list response
    pub fn query_result(&self, content_type_uid: &str, body: Value) -> Result<QueryResult> {
        let mut body = into_object(body)?;
        let index = ReferenceIndex::from_body(&body);

        let documents = match body.remove("entries") {
            Some(Value::Array(documents)) => documents,
            _ => return Err(malformed("missing 'entries' array")),
        };

        let entries = documents
            .into_iter()
            .filter_map(|document| self.entry_from(content_type_uid, document, &index))
            .collect();

        Ok(QueryResult {
            entries,
            count: self
                .include_count
                .then(|| body.get("count").and_then(Value::as_u64))
                .flatten(),
            schema: self
                .include_schema
                .then(|| body.get("schema").cloned())
                .flatten(),
            content_type: self
                .include_content_type
                .then(|| body.get("content_type").cloned())
                .flatten(),
        })
    }

    /// Materialize a single entry response
    pub fn entry(&self, content_type_uid: &str, body: Value) -> Result<Entry> {
        let mut body = into_object(body)?;
        let index = ReferenceIndex::from_body(&body);

        let document = body
            .remove("entry")
            .ok_or_else(|| malformed("missing 'entry' object"))?;

        self.entry_from(content_type_uid, document, &index)
            .ok_or_else(|| malformed("entry has no uid"))
    }

    /// Materialize a single asset response
    pub fn asset(&self, body: Value) -> Result<Asset> {
        let mut body = into_object(body)?;
        body.remove("asset")
            .as_ref()
            .and_then(Asset::from_value)
            .ok_or_else(|| malformed("missing or incomplete 'asset' object"))
    }

    /// Materialize an asset list response
    pub fn asset_result(&self, body: Value) -> Result<AssetQueryResult> {
        let mut body = into_object(body)?;
        let documents = match body.remove("assets") {
            Some(Value::Array(documents)) => documents,
            _ => return Err(malformed("missing 'assets' array")),
        };

        let assets = documents
            .iter()
            .filter_map(|document| {
                let asset = Asset::from_value(document);
                if asset.is_none() {
                    warn!("Skipping asset without uid or url");
                }
                asset
            })
            .collect();

        Ok(AssetQueryResult {
            assets,
            count: self
                .include_count
                .then(|| body.get("count").and_then(Value::as_u64))
                .flatten(),
        })
    }

    /// Materialize a content type response.
    pub fn content_type(&self, body: Value) -> Result<ContentTypeSchema> {
        let mut body = into_object(body)?;
        let document = body
            .remove("content_type")
            .ok_or_else(|| malformed("missing 'content_type' object"))?;
        serde_json::from_value(document).map_err(|e| malformed(&e.to_string()))
    }

    /// Materialize a content type list response.
    pub fn content_types(&self, body: Value) -> Result<Vec<ContentTypeSchema>> {
        let mut body = into_object(body)?;
        let documents = body
            .remove("content_types")
            .ok_or_else(|| malformed("missing 'content_types' array"))?;
        serde_json::from_value(documents).map_err(|e| malformed(&e.to_string()))
    }

    fn entry_from(
        &self,
        content_type_uid: &str,
        document: Value,
        index: &ReferenceIndex,
    ) -> Option<Entry> {
        let Value::Object(mut document) = document else {
            warn!(content_type = content_type_uid, "Skipping non-object entry");
            return None;
        };

        if !self.includes.is_empty() && !index.is_empty() {
            splice_references(&mut document, &self.includes, index);
        }

        let entry = Entry::from_document(content_type_uid, document);
        if entry.is_none() {
            warn!(content_type = content_type_uid, "Skipping entry without uid");
        }
        entry
    }
}

fn splice_references(
    document: &mut Map<String, Value>,
    includes: &ReferenceInclusionSet,
    index: &ReferenceIndex,
) {
    let mut chain: Vec<String> = document
        .get("uid")
        .and_then(Value::as_str)
        .map(|uid| vec![uid.to_string()])
        .unwrap_or_default();

    for path in includes.iter() {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        resolve_path(document, &segments, index, &mut chain);
    }
}

fn resolve_path(
    fields: &mut Map<String, Value>,
    segments: &[&str],
    index: &ReferenceIndex,
    chain: &mut Vec<String>,
) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    match fields.get_mut(*head) {
        Some(Value::Array(items)) => {
            for item in items.iter_mut() {
                resolve_item(item, rest, index, chain);
            }
        }
        Some(item @ Value::Object(_)) => resolve_item(item, rest, index, chain),
        _ => {}
    }
}

fn resolve_item(item: &mut Value, rest: &[&str], index: &ReferenceIndex, chain: &mut Vec<String>) {
    let Value::Object(document) = item else {
        return;
    };

    if is_reference_stub(document) {
        let uid = document
            .get("uid")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if chain.contains(&uid) {
            debug!(uid = %uid, "Reference cycle, leaving stub");
            return;
        }
        match index.get(&uid) {
            Some(resolved) => *document = resolved.clone(),
            None => {
                warn!(uid = %uid, "Unresolved reference, leaving stub");
                return;
            }
        }
    }

    if rest.is_empty() {
        return;
    }

    let uid = document.get("uid").and_then(Value::as_str).map(str::to_string);
    match uid {
        Some(uid) => {
            chain.push(uid);
            resolve_path(document, rest, index, chain);
            chain.pop();
        }
        // Groups carry no uid and cannot close a cycle
        None => resolve_path(document, rest, index, chain),
    }
}

fn into_object(body: Value) -> Result<Map<String, Value>> {
    match body {
        Value::Object(body) => Ok(body),
        _ => Err(malformed("response body is not an object")),
    }
}

fn malformed(reason: &str) -> crate::error::DeliveryError {
    TransportError::MalformedResponse(reason.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn includes(paths: &[&str]) -> ReferenceInclusionSet {
        paths.iter().copied().collect()
    }

    #[test]
    fn test_is_reference_stub() {
        let stub = json!({"uid": "blt1", "_content_type_uid": "brand"});
        let doc = json!({"uid": "blt1", "_content_type_uid": "brand", "title": "X"});
        assert!(is_reference_stub(stub.as_object().unwrap()));
        assert!(!is_reference_stub(doc.as_object().unwrap()));
        assert!(!is_reference_stub(json!({"title": "X"}).as_object().unwrap()));
    }

    #[test]
    fn test_partial_resolution_keeps_order_and_stub() {
        let body = json!({
            "entries": [{
                "uid": "blt_parent",
                "brand": [
                    {"uid": "blt_missing", "_content_type_uid": "brand"},
                    {"uid": "blt_found", "_content_type_uid": "brand"}
                ]
            }],
            "included": [
                {"uid": "blt_found", "_content_type_uid": "brand", "title": "Found"}
            ]
        });

        let result = ResultMaterializer::new(includes(&["brand"]))
            .query_result("product", body)
            .unwrap();

        let brand = result.entries[0].get("brand").unwrap().as_array().unwrap();
        assert_eq!(brand.len(), 2);
        assert_eq!(brand[0], json!({"uid": "blt_missing", "_content_type_uid": "brand"}));
        assert_eq!(brand[1]["title"], "Found");
    }

    #[test]
    fn test_nested_path_resolution() {
        let body = json!({
            "entries": [{
                "uid": "blt_parent",
                "package_info": [{"uid": "blt_pkg", "_content_type_uid": "package"}]
            }],
            "included": {
                "entries": [
                    {
                        "uid": "blt_pkg",
                        "title": "Package",
                        "info_category": [{"uid": "blt_cat", "_content_type_uid": "category"}]
                    },
                    {"uid": "blt_cat", "title": "Phones"}
                ]
            }
        });

        let result = ResultMaterializer::new(includes(&["package_info.info_category"]))
            .query_result("product", body)
            .unwrap();

        let package = &result.entries[0].get("package_info").unwrap()[0];
        assert_eq!(package["title"], "Package");
        assert_eq!(package["info_category"][0]["title"], "Phones");
    }

    #[test]
    fn test_paths_not_included_stay_stubs() {
        let body = json!({
            "entries": [{
                "uid": "blt_parent",
                "brand": [{"uid": "blt_b", "_content_type_uid": "brand"}]
            }],
            "included": [{"uid": "blt_b", "title": "Brand"}]
        });

        let result = ResultMaterializer::new(ReferenceInclusionSet::new())
            .query_result("product", body)
            .unwrap();
        assert_eq!(
            result.entries[0].get("brand").unwrap()[0],
            json!({"uid": "blt_b", "_content_type_uid": "brand"})
        );
    }

    #[test]
    fn test_cycle_is_left_as_stub() {
        let body = json!({
            "entry": {
                "uid": "blt_a",
                "related": [{"uid": "blt_b", "_content_type_uid": "product"}]
            },
            "included": {
                "blt_b": {
                    "uid": "blt_b",
                    "related": [{"uid": "blt_a", "_content_type_uid": "product"}]
                }
            }
        });

        let entry = ResultMaterializer::new(includes(&["related.related"]))
            .entry("product", body)
            .unwrap();

        let b = &entry.get("related").unwrap()[0];
        assert_eq!(b["uid"], "blt_b");
        assert_eq!(
            b["related"][0],
            json!({"uid": "blt_a", "_content_type_uid": "product"})
        );
    }

    #[test]
    fn test_group_fields_are_walked() {
        let body = json!({
            "entries": [{
                "uid": "blt_parent",
                "details": {"maker": [{"uid": "blt_m", "_content_type_uid": "maker"}]}
            }],
            "included": [{"uid": "blt_m", "title": "Maker"}]
        });

        let result = ResultMaterializer::new(includes(&["details.maker"]))
            .query_result("product", body)
            .unwrap();
        assert_eq!(
            result.entries[0].get("details").unwrap()["maker"][0]["title"],
            "Maker"
        );
    }

    #[test]
    fn test_metadata_absent_unless_requested() {
        let body = json!({
            "entries": [],
            "count": 3,
            "schema": [{"uid": "title"}],
            "content_type": {"uid": "product"}
        });

        let plain = ResultMaterializer::default()
            .query_result("product", body.clone())
            .unwrap();
        assert_eq!(plain.count, None);
        assert_eq!(plain.schema, None);
        assert_eq!(plain.content_type, None);

        let full = ResultMaterializer::default()
            .with_count(true)
            .with_schema(true)
            .with_content_type(true)
            .query_result("product", body)
            .unwrap();
        assert_eq!(full.count, Some(3));
        assert_eq!(full.schema, Some(json!([{"uid": "title"}])));
        assert_eq!(full.content_type, Some(json!({"uid": "product"})));
    }

    #[test]
    fn test_requested_zero_count_is_present() {
        let result = ResultMaterializer::default()
            .with_count(true)
            .query_result("product", json!({"entries": [], "count": 0}))
            .unwrap();
        assert_eq!(result.count, Some(0));
    }

    #[test]
    fn test_entries_without_uid_are_skipped() {
        let result = ResultMaterializer::default()
            .query_result("product", json!({"entries": [{"title": "no uid"}, {"uid": "blt1"}]}))
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.entries[0].uid(), "blt1");
    }

    #[test]
    fn test_malformed_body() {
        let err = ResultMaterializer::default()
            .query_result("product", json!({"entry": {}}))
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(err.code(), crate::transport::codes::MALFORMED_RESPONSE);

        assert!(ResultMaterializer::default().asset(json!([])).is_err());
    }

    #[test]
    fn test_asset_list() {
        let result = ResultMaterializer::default()
            .with_count(true)
            .asset_result(json!({
                "assets": [
                    {"uid": "blt_a", "url": "https://cdn.example.com/a.png"},
                    {"uid": "blt_b"}
                ],
                "count": 2
            }))
            .unwrap();
        assert_eq!(result.assets.len(), 1);
        assert_eq!(result.count, Some(2));
    }
}

//! Query pipeline integration tests
//!
//! Drives queries end to end over the scripted mock transport: parameter
//! snapshots, callback completion, find_one, metadata flags, reference
//! splicing and error delivery.

use async_trait::async_trait;
use delivery_sdk::transport::{codes, TransportRequest, TransportResponse};
use delivery_sdk::{
    DeliveryConfig, DeliveryError, FetchPipeline, MockTransport, ParameterBag, Query, Stack,
    Target, Transport, TransportError,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

fn product_list() -> Value {
    json!({
        "entries": [
            {"uid": "blt1", "title": "Redmi Note 3", "price": 146},
            {"uid": "blt2", "title": "Galaxy S7", "price": 180},
            {"uid": "blt3", "title": "Moto G", "price": 120}
        ],
        "count": 3
    })
}

/// Transport that never answers
struct StalledTransport;

#[async_trait]
impl Transport for StalledTransport {
    async fn send(&self, _request: TransportRequest) -> Result<TransportResponse, TransportError> {
        std::future::pending().await
    }
}

// =============================================================================
// Snapshots
// =============================================================================

#[tokio::test]
async fn test_query_changes_after_issue_do_not_affect_request() {
    let transport = Arc::new(MockTransport::new().with_body(product_list()));
    let pipeline = FetchPipeline::new(transport.clone());

    let mut query = Query::new("product").greater_than("price", 100).limit(10);
    let pending = pipeline.find(&query);

    query = query.limit(99).where_eq("title", "changed");
    pending.await.unwrap();

    let request = transport.last_request().await.unwrap();
    assert_eq!(request.query_value("limit"), Some("10"));
    assert_eq!(request.query_value("query"), Some(r#"{"price":{"$gt":100}}"#));
    assert_eq!(query.parameters().get("limit"), Some(&json!(99)));
}

#[tokio::test]
async fn test_fetch_params_are_borrowed_not_consumed() {
    let transport = Arc::new(MockTransport::new());
    let pipeline = FetchPipeline::new(transport.clone());

    let mut params = ParameterBag::new().with("include_count", true);
    let pending = pipeline.fetch(Target::Assets, &params);
    params.insert("limit", 2);
    pending.await.unwrap();

    let request = transport.last_request().await.unwrap();
    assert_eq!(request.query_value("limit"), None);
    assert_eq!(params.len(), 2);
}

#[tokio::test]
async fn test_repeated_field_predicates_are_all_sent() {
    let transport = Arc::new(MockTransport::new().with_body(product_list()));
    let pipeline = FetchPipeline::new(transport.clone());

    let query = Query::new("product")
        .where_eq("color", "red")
        .where_eq("color", "blue")
        .greater_than("price", 10)
        .greater_than("price", 20);
    pipeline.find(&query).await.unwrap();

    let request = transport.last_request().await.unwrap();
    let sent: Value = serde_json::from_str(request.query_value("query").unwrap()).unwrap();
    assert_eq!(
        sent,
        json!({
            "color": "red",
            "price": {"$gt": 10},
            "$and": [{"color": "blue"}, {"price": {"$gt": 20}}]
        })
    );
}

// =============================================================================
// find_one
// =============================================================================

#[tokio::test]
async fn test_find_one_forces_limit_and_keeps_skip() {
    let transport = Arc::new(MockTransport::new().with_body(product_list()));
    let pipeline = FetchPipeline::new(transport.clone());

    let query = Query::new("product").skip(4).limit(10);
    let entry = pipeline.find_one(&query).await.unwrap().unwrap();
    assert_eq!(entry.uid(), "blt1");

    let request = transport.last_request().await.unwrap();
    assert_eq!(request.query_values("limit"), vec!["1"]);
    assert_eq!(request.query_value("skip"), Some("4"));

    // Caller's query keeps its own limit
    assert_eq!(query.parameters().get("limit"), Some(&json!(10)));
}

#[tokio::test]
async fn test_find_one_without_match() {
    let transport = Arc::new(MockTransport::new().with_body(json!({"entries": []})));
    let pipeline = FetchPipeline::new(transport);

    let entry = pipeline.find_one(&Query::new("product")).await.unwrap();
    assert!(entry.is_none());
}

// =============================================================================
// Metadata flags
// =============================================================================

#[tokio::test]
async fn test_count_only_when_requested() {
    let transport = Arc::new(MockTransport::new().with_body(product_list()));
    let pipeline = FetchPipeline::new(transport);

    let plain = pipeline.find(&Query::new("product")).await.unwrap();
    assert_eq!(plain.len(), 3);
    assert_eq!(plain.count, None);

    let counted = pipeline
        .find(&Query::new("product").include_count())
        .await
        .unwrap();
    assert_eq!(counted.count, Some(3));
}

#[tokio::test]
async fn test_schema_and_content_type_only_when_requested() {
    let body = json!({
        "entries": [{"uid": "blt1", "title": "Redmi Note 3"}],
        "schema": [{"uid": "title", "data_type": "text"}],
        "content_type": {"uid": "product", "title": "Product"}
    });
    let transport = Arc::new(MockTransport::new().with_body(body));
    let pipeline = FetchPipeline::new(transport.clone());

    let plain = pipeline.find(&Query::new("product")).await.unwrap();
    assert_eq!(plain.schema, None);
    assert_eq!(plain.content_type, None);

    let with_schema = pipeline
        .find(&Query::new("product").include_schema())
        .await
        .unwrap();
    assert_eq!(
        with_schema.schema,
        Some(json!([{"uid": "title", "data_type": "text"}]))
    );
    assert_eq!(with_schema.content_type, None);
    let request = transport.last_request().await.unwrap();
    assert_eq!(request.query_value("include_schema"), Some("true"));

    let with_content_type = pipeline
        .find(&Query::new("product").include_content_type())
        .await
        .unwrap();
    assert_eq!(with_content_type.schema, None);
    assert_eq!(
        with_content_type.content_type,
        Some(json!({"uid": "product", "title": "Product"}))
    );
    let request = transport.last_request().await.unwrap();
    assert_eq!(request.query_value("include_content_type"), Some("true"));
}

// =============================================================================
// Reference splicing
// =============================================================================

#[tokio::test]
async fn test_included_references_are_spliced() {
    let transport = Arc::new(MockTransport::new().with_body(json!({
        "entries": [{
            "uid": "blt1",
            "brand": [
                {"uid": "blt_xiaomi", "_content_type_uid": "brand"},
                {"uid": "blt_unpublished", "_content_type_uid": "brand"}
            ]
        }],
        "included": {
            "entries": [{"uid": "blt_xiaomi", "_content_type_uid": "brand", "title": "Xiaomi"}]
        }
    })));
    let pipeline = FetchPipeline::new(transport.clone());

    let result = pipeline
        .find(&Query::new("product").include_reference("brand"))
        .await
        .unwrap();

    let brand = result.entries[0].get("brand").unwrap().as_array().unwrap();
    assert_eq!(brand[0]["title"], "Xiaomi");
    assert_eq!(
        brand[1],
        json!({"uid": "blt_unpublished", "_content_type_uid": "brand"})
    );
    assert_eq!(result.entries[0].get_references("brand").len(), 1);

    let request = transport.last_request().await.unwrap();
    assert_eq!(request.query_values("include[]"), vec!["brand"]);
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_validation_error_without_network() {
    let transport = Arc::new(MockTransport::new());
    let pipeline = FetchPipeline::new(transport.clone());

    let query = Query::new("product").regex("title", "", None);
    let err = pipeline.find(&query).await.unwrap_err();

    assert!(matches!(err, DeliveryError::Validation(_)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_api_error_from_status() {
    let transport = Arc::new(MockTransport::new().with_status(
        404,
        json!({"error_code": 118, "error_message": "The Content Type 'x' was not found."}),
    ));
    let stack = Stack::with_transport(
        DeliveryConfig::new("blt_key", "cs_token", "production"),
        transport,
    );

    let err = stack.find(&Query::new("x")).await.unwrap_err();
    assert!(err.is_api());
    assert_eq!(err.code(), 118);
    assert!(err.details().is_empty());
}

// =============================================================================
// Callbacks
// =============================================================================

#[tokio::test]
async fn test_callback_fires_once_on_success() {
    let transport = Arc::new(MockTransport::new().with_body(product_list()));
    let pipeline = FetchPipeline::new(transport);
    let calls = Arc::new(AtomicU32::new(0));

    let (tx, rx) = oneshot::channel();
    let counter = calls.clone();
    let handle = pipeline.find_with(&Query::new("product"), move |result| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(result);
    });

    handle.await.unwrap();
    let result = rx.await.unwrap().unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_callback_fires_once_on_failure() {
    let transport = Arc::new(
        MockTransport::new().with_failure(TransportError::Network("connection reset".into())),
    );
    let pipeline = FetchPipeline::new(transport);
    let calls = Arc::new(AtomicU32::new(0));

    let (tx, rx) = oneshot::channel();
    let counter = calls.clone();
    let handle = pipeline.find_one_with(&Query::new("product"), move |result| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(result);
    });

    handle.await.unwrap();
    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(err.code(), codes::NETWORK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_aborted_callback_reports_abandoned() {
    let pipeline = FetchPipeline::new(Arc::new(StalledTransport));

    let (tx, rx) = oneshot::channel();
    let handle = pipeline.fetch_with(Target::ContentTypes, &ParameterBag::new(), move |result| {
        let _ = tx.send(result);
    });

    handle.abort();
    let _ = handle.await;

    let err = rx.await.unwrap().unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.code(), codes::ABANDONED);
}

#[tokio::test]
async fn test_concurrent_finds_are_independent() {
    let transport = Arc::new(MockTransport::new().with_body(product_list()));
    let stack = Stack::with_transport(
        DeliveryConfig::new("blt_key", "cs_token", "production"),
        transport.clone(),
    );

    let cheap = Query::new("product").less_than("price", 150);
    let pricey = Query::new("product").greater_than("price", 150);
    let (a, b) = tokio::join!(stack.find(&cheap), stack.find(&pricey));

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(transport.call_count(), 2);
}

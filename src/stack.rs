//! Stack handle and request builders
//!
//! [`Stack`] is the entry point: it owns the configuration and the fetch
//! pipeline, and hands out builders for content types, single entries and
//! assets. Entry lists go through [`Query`].

use crate::asset::Asset;
use crate::config::DeliveryConfig;
use crate::entry::Entry;
use crate::error::Result;
use crate::image::build_url;
use crate::materialize::ResultMaterializer;
use crate::params::ParameterBag;
use crate::pipeline::{FetchPipeline, Target};
use crate::query::{Order, ProjectionResolver, Query};
use crate::transport::{HttpTransport, Transport};
use crate::types::{AssetQueryResult, ContentTypeSchema, QueryResult};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// Read-only handle on one stack's published content.
///
/// Cheap to clone; clones share the configuration and the transport.
#[derive(Clone)]
pub struct Stack {
    config: Arc<DeliveryConfig>,
    pipeline: FetchPipeline,
}

impl Stack {
    /// Connect over HTTP with `config`
    pub fn new(config: DeliveryConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        info!(
            base_url = %transport.base_url(),
            environment = %config.environment,
            "Delivery stack initialized"
        );
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Use a caller-supplied transport
    pub fn with_transport(config: DeliveryConfig, transport: Arc<dyn Transport>) -> Self {
        let pipeline = FetchPipeline::new(transport).with_version(config.version.clone());
        Self {
            config: Arc::new(config),
            pipeline,
        }
    }

    /// Configuration this stack was built with.
    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Pipeline shared by every request of this stack.
    pub fn pipeline(&self) -> &FetchPipeline {
        &self.pipeline
    }

    /// Handle on content type `uid`.
    pub fn content_type(&self, uid: impl Into<String>) -> ContentType {
        ContentType {
            pipeline: self.pipeline.clone(),
            uid: uid.into(),
        }
    }

    /// Every content type of the stack
    pub fn content_types(
        &self,
    ) -> impl Future<Output = Result<Vec<ContentTypeSchema>>> + Send + 'static {
        let body = self.pipeline.fetch(Target::ContentTypes, &ParameterBag::new());
        async move { ResultMaterializer::default().content_types(body.await?) }
    }

    /// Request for asset `uid`.
    pub fn asset(&self, uid: impl Into<String>) -> AssetRequest {
        AssetRequest {
            pipeline: self.pipeline.clone(),
            uid: uid.into(),
            params: ParameterBag::new(),
        }
    }

    /// Listing over every asset.
    pub fn asset_library(&self) -> AssetLibrary {
        AssetLibrary {
            pipeline: self.pipeline.clone(),
            params: ParameterBag::new(),
        }
    }

    /// Run `query`. See [`FetchPipeline::find`].
    pub fn find(
        &self,
        query: &Query,
    ) -> impl Future<Output = Result<QueryResult>> + Send + 'static {
        self.pipeline.find(query)
    }

    /// First entry matching `query`. See [`FetchPipeline::find_one`].
    pub fn find_one(
        &self,
        query: &Query,
    ) -> impl Future<Output = Result<Option<Entry>>> + Send + 'static {
        self.pipeline.find_one(query)
    }

    /// `url` with image transform `params` appended
    pub fn image_transform(&self, url: &str, params: &ParameterBag) -> String {
        build_url(url, params)
    }
}

/// One content type of a stack
#[derive(Clone)]
pub struct ContentType {
    pipeline: FetchPipeline,
    uid: String,
}

impl ContentType {
    /// Content type UID.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// New empty query over this content type's entries
    pub fn query(&self) -> Query {
        Query::new(self.uid.clone())
    }

    /// Request for entry `uid` of this content type.
    pub fn entry(&self, uid: impl Into<String>) -> EntryRequest {
        EntryRequest {
            pipeline: self.pipeline.clone(),
            content_type_uid: self.uid.clone(),
            uid: uid.into(),
            resolver: ProjectionResolver::default(),
            params: ParameterBag::new(),
        }
    }

    /// This content type's definition
    pub fn fetch(&self) -> impl Future<Output = Result<ContentTypeSchema>> + Send + 'static {
        let body = self.pipeline.fetch(
            Target::ContentType {
                uid: self.uid.clone(),
            },
            &ParameterBag::new(),
        );
        async move { ResultMaterializer::default().content_type(body.await?) }
    }
}

/// Fetch of a single entry by uid
#[derive(Clone)]
pub struct EntryRequest {
    pipeline: FetchPipeline,
    content_type_uid: String,
    uid: String,
    resolver: ProjectionResolver,
    params: ParameterBag,
}

impl EntryRequest {
    /// Return only `fields` of the entry.
    pub fn only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resolver.only(fields);
        self
    }

    /// Leave `fields` out of the entry.
    pub fn except<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resolver.except(fields);
        self
    }

    /// Return only `fields` of the entries referenced through `reference_path`.
    pub fn only_with_reference_uid<I, S>(mut self, fields: I, reference_path: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resolver.only_with_reference_uid(fields, reference_path);
        self
    }

    /// Leave `fields` out of the entries referenced through `reference_path`.
    pub fn except_with_reference_uid<I, S>(mut self, fields: I, reference_path: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resolver.except_with_reference_uid(fields, reference_path);
        self
    }

    /// Resolve the reference field at dotted `path`.
    pub fn include_reference(mut self, path: impl Into<String>) -> Self {
        self.resolver.include_reference(path);
        self
    }

    /// Read the entry in locale `code`.
    pub fn locale(self, code: impl Into<String>) -> Self {
        self.add_param("locale", code.into())
    }

    /// Fall back to the master locale when the entry is missing in `locale`.
    pub fn include_fallback(self) -> Self {
        self.add_param("include_fallback", true)
    }

    /// Set an arbitrary request parameter. `only`, `except` and `include[]`
    /// set here are only sent while the matching typed state is empty.
    pub fn add_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Projections, `include[]`, then every other parameter
    pub fn parameters(&self) -> ParameterBag {
        let mut bag = ParameterBag::new();
        self.resolver.write_to(&mut bag);
        bag.extend_missing(&self.params);
        bag
    }

    /// Fetch the entry and splice its included references.
    pub fn fetch(&self) -> impl Future<Output = Result<Entry>> + Send + 'static {
        let body = self.pipeline.fetch(
            Target::entry(self.content_type_uid.clone(), self.uid.clone()),
            &self.parameters(),
        );
        let materializer = ResultMaterializer::new(self.resolver.includes().clone());
        let content_type_uid = self.content_type_uid.clone();

        async move { materializer.entry(&content_type_uid, body.await?) }
    }
}

/// Fetch of a single asset by uid
#[derive(Clone)]
pub struct AssetRequest {
    pipeline: FetchPipeline,
    uid: String,
    params: ParameterBag,
}

impl AssetRequest {
    /// Ask for image dimensions
    pub fn include_dimension(self) -> Self {
        self.add_param("include_dimension", true)
    }

    /// Set an arbitrary request parameter.
    pub fn add_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Fetch the asset.
    pub fn fetch(&self) -> impl Future<Output = Result<Asset>> + Send + 'static {
        let body = self
            .pipeline
            .fetch(Target::Asset { uid: self.uid.clone() }, &self.params);
        async move { ResultMaterializer::default().asset(body.await?) }
    }
}

/// Listing over every asset of a stack
#[derive(Clone)]
pub struct AssetLibrary {
    pipeline: FetchPipeline,
    params: ParameterBag,
}

impl AssetLibrary {
    /// Ask for the total number of assets.
    pub fn include_count(self) -> Self {
        self.add_param("include_count", true)
    }

    /// Ask for image dimensions.
    pub fn include_dimension(self) -> Self {
        self.add_param("include_dimension", true)
    }

    /// Sort by `field` in `order`.
    pub fn sort(self, field: impl Into<String>, order: Order) -> Self {
        match order {
            Order::Ascending => self.add_param("asc", field.into()),
            Order::Descending => self.add_param("desc", field.into()),
        }
    }

    /// Return at most `limit` assets.
    pub fn limit(self, limit: u64) -> Self {
        self.add_param("limit", limit)
    }

    /// Skip the first `skip` assets.
    pub fn skip(self, skip: u64) -> Self {
        self.add_param("skip", skip)
    }

    /// Set an arbitrary request parameter.
    pub fn add_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Fetch one page of assets.
    pub fn fetch_all(&self) -> impl Future<Output = Result<AssetQueryResult>> + Send + 'static {
        let body = self.pipeline.fetch(Target::Assets, &self.params);
        let materializer =
            ResultMaterializer::default().with_count(self.params.flag("include_count"));
        async move { materializer.asset_result(body.await?) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use serde_json::json;

    fn stack(transport: Arc<MockTransport>) -> Stack {
        Stack::with_transport(DeliveryConfig::new("blt_key", "cs_token", "production"), transport)
    }

    #[tokio::test]
    async fn test_entry_request() {
        let transport = Arc::new(MockTransport::new().with_body(json!({
            "entry": {
                "uid": "blt_entry",
                "title": "Redmi Note 3",
                "brand": [{"uid": "blt_brand", "_content_type_uid": "brand"}]
            },
            "included": [{"uid": "blt_brand", "_content_type_uid": "brand", "title": "Xiaomi"}]
        })));

        let entry = stack(transport.clone())
            .content_type("product")
            .entry("blt_entry")
            .only(["title", "brand"])
            .include_reference("brand")
            .locale("en-us")
            .fetch()
            .await
            .unwrap();

        assert_eq!(entry.uid(), "blt_entry");
        assert_eq!(entry.get_references("brand")[0].title(), Some("Xiaomi"));

        let request = transport.last_request().await.unwrap();
        assert_eq!(request.path, "/v3/content_types/product/entries/blt_entry");
        assert_eq!(request.query_values("only[BASE][]"), vec!["title", "brand"]);
        assert_eq!(request.query_values("include[]"), vec!["brand"]);
        assert_eq!(request.query_value("locale"), Some("en-us"));
    }

    #[tokio::test]
    async fn test_asset_library() {
        let transport = Arc::new(MockTransport::new().with_body(json!({
            "assets": [{"uid": "blt_a", "url": "https://cdn.example.com/a.png"}],
            "count": 17
        })));

        let result = stack(transport.clone())
            .asset_library()
            .include_count()
            .sort("created_at", Order::Descending)
            .limit(1)
            .fetch_all()
            .await
            .unwrap();

        assert_eq!(result.assets[0].uid(), "blt_a");
        assert_eq!(result.count, Some(17));

        let request = transport.last_request().await.unwrap();
        assert_eq!(request.path, "/v3/assets");
        assert_eq!(request.query_value("desc"), Some("created_at"));
    }

    #[tokio::test]
    async fn test_asset_request() {
        let transport = Arc::new(MockTransport::new().with_body(json!({
            "asset": {
                "uid": "blt_a",
                "url": "https://cdn.example.com/a.png",
                "dimension": {"height": 10, "width": 20}
            }
        })));

        let asset = stack(transport.clone())
            .asset("blt_a")
            .include_dimension()
            .fetch()
            .await
            .unwrap();
        assert_eq!(asset.get("dimension").unwrap()["width"], 20);

        let request = transport.last_request().await.unwrap();
        assert_eq!(request.path, "/v3/assets/blt_a");
        assert_eq!(request.query_value("include_dimension"), Some("true"));
    }

    #[tokio::test]
    async fn test_content_types() {
        let transport = Arc::new(
            MockTransport::new()
                .then_reply(Ok(crate::transport::TransportResponse::ok(json!({
                    "content_types": [{"uid": "product", "title": "Product"}]
                }))))
                .with_body(json!({
                    "content_type": {"uid": "product", "title": "Product", "schema": [{"uid": "title"}]}
                })),
        );
        let stack = stack(transport);

        let all = stack.content_types().await.unwrap();
        assert_eq!(all[0].uid, "product");

        let one = stack.content_type("product").fetch().await.unwrap();
        assert_eq!(one.schema.len(), 1);
    }

    #[test]
    fn test_image_transform() {
        let transport = Arc::new(MockTransport::new());
        let url = stack(transport).image_transform(
            "https://images.example.com/a.png",
            &ParameterBag::new().with("width", 100).with("fit", "bounds"),
        );
        assert_eq!(url, "https://images.example.com/a.png?width=100&fit=bounds");
    }
}

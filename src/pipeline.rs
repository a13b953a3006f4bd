//! Fetch pipeline
//!
//! Every operation snapshots its parameters when it is called, sends one
//! request through the [`Transport`], separates API errors from data and
//! hands the body to the [`ResultMaterializer`].
//!
//! The returned futures own their snapshot and do not borrow the query, so
//! a query can be changed or dropped while an earlier request is in flight.

use crate::entry::Entry;
use crate::error::{DeliveryError, Result};
use crate::materialize::ResultMaterializer;
use crate::params::ParameterBag;
use crate::query::Query;
use crate::transport::{codes, Transport, TransportRequest, TransportResponse};
use crate::types::QueryResult;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Default delivery API version
pub const DEFAULT_VERSION: &str = "v3";

/// What a request reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Entries { content_type_uid: String },
    Entry { content_type_uid: String, uid: String },
    Assets,
    Asset { uid: String },
    ContentTypes,
    ContentType { uid: String },
}

impl Target {
    /// Entry list of a content type.
    pub fn entries(content_type_uid: impl Into<String>) -> Self {
        Target::Entries {
            content_type_uid: content_type_uid.into(),
        }
    }

    /// Single entry of a content type.
    pub fn entry(content_type_uid: impl Into<String>, uid: impl Into<String>) -> Self {
        Target::Entry {
            content_type_uid: content_type_uid.into(),
            uid: uid.into(),
        }
    }

    /// Request path for API `version`, with uid segments percent-encoded
    pub fn path(&self, version: &str) -> String {
        match self {
            Target::Entries { content_type_uid } => format!(
                "/{}/content_types/{}/entries",
                version,
                urlencoding::encode(content_type_uid)
            ),
            Target::Entry {
                content_type_uid,
                uid,
            } => format!(
                "/{}/content_types/{}/entries/{}",
                version,
                urlencoding::encode(content_type_uid),
                urlencoding::encode(uid)
            ),
            Target::Assets => format!("/{}/assets", version),
            Target::Asset { uid } => format!("/{}/assets/{}", version, urlencoding::encode(uid)),
            Target::ContentTypes => format!("/{}/content_types", version),
            Target::ContentType { uid } => {
                format!("/{}/content_types/{}", version, urlencoding::encode(uid))
            }
        }
    }
}

/// Sends requests and materializes their results.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct FetchPipeline {
    transport: Arc<dyn Transport>,
    version: String,
}

impl FetchPipeline {
    /// Create a pipeline over `transport` for the default API version.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            version: DEFAULT_VERSION.to_string(),
        }
    }

    /// Use API `version` in request paths.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// API version used in request paths.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Fetch the raw body for `target`.
    ///
    /// Resolves to the body of a successful response, or the single error
    /// that ended the request.
    pub fn fetch(
        &self,
        target: Target,
        params: &ParameterBag,
    ) -> impl Future<Output = Result<Value>> + Send + 'static {
        let request = self.request(&target, params);
        let transport = self.transport.clone();
        async move { execute(transport, request).await }
    }

    /// Run `query` and materialize the matching entries
    pub fn find(
        &self,
        query: &Query,
    ) -> impl Future<Output = Result<QueryResult>> + Send + 'static {
        let prepared = self.prepare(query, None);
        let transport = self.transport.clone();

        async move {
            let (content_type_uid, request, materializer) = prepared?;
            let body = execute(transport, request).await?;
            materializer.query_result(&content_type_uid, body)
        }
    }

    /// Run `query` for its first entry.
    ///
    /// The request carries `limit=1` regardless of the query's own limit;
    /// `skip` and everything else are sent as set. The query itself is not
    /// changed.
    pub fn find_one(
        &self,
        query: &Query,
    ) -> impl Future<Output = Result<Option<Entry>>> + Send + 'static {
        let prepared = self.prepare(query, Some(1));
        let transport = self.transport.clone();

        async move {
            let (content_type_uid, request, materializer) = prepared?;
            let body = execute(transport, request).await?;
            let result = materializer.query_result(&content_type_uid, body)?;
            Ok(result.entries.into_iter().next())
        }
    }

    /// [`fetch`](Self::fetch) with a completion callback.
    ///
    /// Runs on the current tokio runtime. `completion` is called exactly
    /// once: with the result, or with an abandoned transport error if the
    /// task is dropped first.
    pub fn fetch_with<F>(
        &self,
        target: Target,
        params: &ParameterBag,
        completion: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        spawn_completion(self.fetch(target, params), completion)
    }

    /// [`find`](Self::find) with a completion callback, called exactly once.
    pub fn find_with<F>(&self, query: &Query, completion: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<QueryResult>) + Send + 'static,
    {
        spawn_completion(self.find(query), completion)
    }

    /// [`find_one`](Self::find_one) with a completion callback, called exactly once.
    pub fn find_one_with<F>(&self, query: &Query, completion: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Option<Entry>>) + Send + 'static,
    {
        spawn_completion(self.find_one(query), completion)
    }

    fn request(&self, target: &Target, params: &ParameterBag) -> TransportRequest {
        TransportRequest::get(target.path(&self.version)).with_query(params.to_query_pairs())
    }

    fn prepare(
        &self,
        query: &Query,
        limit: Option<u64>,
    ) -> Result<(String, TransportRequest, ResultMaterializer)> {
        query.validate()?;

        let mut params = query.parameters();
        if let Some(limit) = limit {
            params.insert("limit", limit);
        }

        let target = Target::entries(query.content_type_uid());
        let materializer = ResultMaterializer::new(query.includes().clone())
            .with_count(query.flag("include_count"))
            .with_schema(query.flag("include_schema"))
            .with_content_type(query.flag("include_content_type"));

        Ok((
            query.content_type_uid().to_string(),
            self.request(&target, &params),
            materializer,
        ))
    }
}

async fn execute(transport: Arc<dyn Transport>, request: TransportRequest) -> Result<Value> {
    let path = request.path.clone();
    debug!(path = %path, params = request.query.len(), "Sending delivery request");

    let response = transport.send(request).await.map_err(|e| {
        debug!(path = %path, error = %e, "Delivery request failed");
        DeliveryError::from(e)
    })?;

    debug!(path = %path, status = response.status, "Delivery request completed");
    into_body(response)
}

/// Split a response into data or an API error.
///
/// A non-success status or an `error_code` in the body is an API error,
/// whatever the status says.
fn into_body(response: TransportResponse) -> Result<Value> {
    let has_error_code = response
        .body
        .as_object()
        .is_some_and(|body| body.contains_key("error_code"));

    if response.is_success() && !has_error_code {
        return Ok(response.body);
    }

    let body = response.body.as_object();
    let code = body
        .and_then(|b| b.get("error_code"))
        .and_then(Value::as_i64)
        .unwrap_or(i64::from(response.status));
    let message = body
        .and_then(|b| b.get("error_message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", response.status));
    let details = body
        .and_then(|b| b.get("errors"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Map::new);

    Err(DeliveryError::Api {
        code,
        message,
        details,
    })
}

/// Completion callback that fires exactly once
struct Completion<T> {
    callback: Option<Box<dyn FnOnce(Result<T>) + Send>>,
}

impl<T> Completion<T> {
    fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    fn complete(mut self, result: Result<T>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            error!("Delivery request abandoned before completion");
            callback(Err(DeliveryError::Transport {
                code: codes::ABANDONED,
                message: "Request abandoned before completion".to_string(),
            }));
        }
    }
}

fn spawn_completion<T, Fut, F>(future: Fut, completion: F) -> JoinHandle<()>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    F: FnOnce(Result<T>) + Send + 'static,
{
    let completion = Completion::new(completion);
    tokio::spawn(async move {
        let result = future.await;
        completion.complete(result);
    })
}
